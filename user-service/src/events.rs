use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use common::errors::AppError;
use common::events::{USER_CREATED, USER_LEVEL_UP};
use common::jetstream::Publisher;
use common::pb;

#[async_trait]
pub trait UserEventPublisher: Send + Sync {
    async fn publish_user_created(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), AppError>;

    async fn publish_user_level_up(
        &self,
        user_id: &str,
        level_increase: i64,
        new_level: i64,
    ) -> Result<(), AppError>;
}

pub struct JetStreamUserPublisher {
    publisher: Publisher,
}

impl JetStreamUserPublisher {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl UserEventPublisher for JetStreamUserPublisher {
    async fn publish_user_created(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        let event = pb::UserCreated {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            timestamp: Utc::now().timestamp(),
        };

        self.publisher.publish_proto(USER_CREATED, &event).await?;
        info!(user_id, "Published user created event");
        Ok(())
    }

    async fn publish_user_level_up(
        &self,
        user_id: &str,
        level_increase: i64,
        new_level: i64,
    ) -> Result<(), AppError> {
        let event = pb::UserLevelUp {
            user_id: user_id.to_string(),
            level_increase,
            new_level,
            timestamp: Utc::now().timestamp(),
        };

        self.publisher.publish_proto(USER_LEVEL_UP, &event).await?;
        info!(user_id, new_level, "Published user level up event");
        Ok(())
    }
}
