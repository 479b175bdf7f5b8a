use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use common::errors::AppError;
use common::events::{
    consumer_name, TOURNAMENT_ENTERED, TOURNAMENT_EVENTS_STREAM, TOURNAMENT_EVENTS_WILDCARD,
    TOURNAMENT_PARTICIPATION_SCORE_UPDATED, USER_CREATED, USER_EVENTS_STREAM,
    USER_EVENTS_WILDCARD,
};
use common::jetstream::subscriber::unmarshal_proto;
use common::jetstream::{ConsumerConfig, Subscriber};
use common::pb;

use crate::service::LeaderboardService;

const SERVICE_NAME: &str = "leaderboard-service";

/// Consumes both event streams and projects them into the sorted-set cache.
pub struct EventSubscriber {
    subscriber: Subscriber,
    service: Arc<LeaderboardService>,
}

impl EventSubscriber {
    pub fn new(subscriber: Subscriber, service: Arc<LeaderboardService>) -> Self {
        Self { subscriber, service }
    }

    pub async fn start(
        &self,
        token: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>, AppError> {
        info!("Starting event subscriptions");

        let user_handle = self.subscribe_to_user_events(token.clone()).await?;
        let tournament_handle = self.subscribe_to_tournament_events(token).await?;

        info!("All event subscriptions started");
        Ok(vec![user_handle, tournament_handle])
    }

    async fn subscribe_to_user_events(
        &self,
        token: CancellationToken,
    ) -> Result<JoinHandle<()>, AppError> {
        let cfg = ConsumerConfig {
            stream_name: USER_EVENTS_STREAM.to_string(),
            stream_subjects: vec![USER_EVENTS_WILDCARD.to_string()],
            consumer_name: consumer_name(SERVICE_NAME, USER_EVENTS_STREAM),
            filter_subject: USER_EVENTS_WILDCARD.to_string(),
        };

        let service = self.service.clone();
        self.subscriber
            .spawn(cfg, token, move |subject, payload| {
                let service = service.clone();
                async move {
                    match subject.as_str() {
                        USER_CREATED => {
                            let event: pb::UserCreated = unmarshal_proto(&payload)?;
                            service
                                .add_global_user(&event.user_id, &event.display_name)
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

    async fn subscribe_to_tournament_events(
        &self,
        token: CancellationToken,
    ) -> Result<JoinHandle<()>, AppError> {
        let cfg = ConsumerConfig {
            stream_name: TOURNAMENT_EVENTS_STREAM.to_string(),
            stream_subjects: vec![TOURNAMENT_EVENTS_WILDCARD.to_string()],
            consumer_name: consumer_name(SERVICE_NAME, TOURNAMENT_EVENTS_STREAM),
            filter_subject: TOURNAMENT_EVENTS_WILDCARD.to_string(),
        };

        let service = self.service.clone();
        self.subscriber
            .spawn(cfg, token, move |subject, payload| {
                let service = service.clone();
                async move {
                    match subject.as_str() {
                        TOURNAMENT_ENTERED => {
                            let event: pb::TournamentEntered = unmarshal_proto(&payload)?;
                            service
                                .add_user_to_tournament(
                                    &event.user_id,
                                    &event.display_name,
                                    &event.group_id,
                                    &event.tournament_id,
                                )
                                .await
                        }
                        TOURNAMENT_PARTICIPATION_SCORE_UPDATED => {
                            let event: pb::TournamentParticipationScoreUpdated =
                                unmarshal_proto(&payload)?;
                            service
                                .update_tournament_score(
                                    &event.user_id,
                                    &event.tournament_id,
                                    event.new_score,
                                )
                                .await
                        }
                        _ => {
                            debug!(subject = %subject, "Ignoring tournament event");
                            Ok(())
                        }
                    }
                }
            })
            .await
    }
}
