use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use common::errors::AppError;
use common::events::{consumer_name, USER_EVENTS_STREAM, USER_EVENTS_WILDCARD, USER_LEVEL_UP};
use common::jetstream::subscriber::unmarshal_proto;
use common::jetstream::{ConsumerConfig, Subscriber};
use common::pb;

use crate::service::TournamentService;

const SERVICE_NAME: &str = "tournament-service";

/// Consumes the user events stream and feeds level-ups into the score
/// pipeline.
pub struct EventSubscriber {
    subscriber: Subscriber,
    service: Arc<TournamentService>,
}

impl EventSubscriber {
    pub fn new(subscriber: Subscriber, service: Arc<TournamentService>) -> Self {
        Self { subscriber, service }
    }

    pub async fn start(&self, token: CancellationToken) -> Result<JoinHandle<()>, AppError> {
        let cfg = ConsumerConfig {
            stream_name: USER_EVENTS_STREAM.to_string(),
            stream_subjects: vec![USER_EVENTS_WILDCARD.to_string()],
            consumer_name: consumer_name(SERVICE_NAME, USER_EVENTS_STREAM),
            filter_subject: USER_EVENTS_WILDCARD.to_string(),
        };

        info!(stream = USER_EVENTS_STREAM, "Starting event subscription");

        let service = self.service.clone();
        self.subscriber
            .spawn(cfg, token, move |subject, payload| {
                let service = service.clone();
                async move {
                    match subject.as_str() {
                        USER_LEVEL_UP => {
                            let event: pb::UserLevelUp = unmarshal_proto(&payload)?;
                            debug!(
                                user_id = %event.user_id,
                                level_increase = event.level_increase,
                                "Processing user level up event"
                            );
                            service
                                .update_participation_score(&event.user_id, event.level_increase)
                                .await
                        }
                        _ => {
                            debug!(subject = %subject, "Ignoring user event");
                            Ok(())
                        }
                    }
                }
            })
            .await
    }
}
