use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use common::errors::AppError;
use common::events::{TOURNAMENT_ENTERED, TOURNAMENT_PARTICIPATION_SCORE_UPDATED};
use common::jetstream::Publisher;
use common::pb;

#[async_trait]
pub trait TournamentEventPublisher: Send + Sync {
    async fn publish_entered(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError>;

    async fn publish_score_updated(
        &self,
        user_id: &str,
        group_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError>;
}

pub struct JetStreamTournamentPublisher {
    publisher: Publisher,
}

impl JetStreamTournamentPublisher {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl TournamentEventPublisher for JetStreamTournamentPublisher {
    async fn publish_entered(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let event = pb::TournamentEntered {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            group_id: group_id.to_string(),
            tournament_id: tournament_id.to_string(),
            timestamp: Utc::now().timestamp(),
        };

        self.publisher
            .publish_proto(TOURNAMENT_ENTERED, &event)
            .await?;

        info!(user_id, tournament_id, "Published tournament entered event");
        Ok(())
    }

    async fn publish_score_updated(
        &self,
        user_id: &str,
        group_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError> {
        let event = pb::TournamentParticipationScoreUpdated {
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            tournament_id: tournament_id.to_string(),
            new_score,
            timestamp: Utc::now().timestamp(),
        };

        self.publisher
            .publish_proto(TOURNAMENT_PARTICIPATION_SCORE_UPDATED, &event)
            .await?;

        info!(user_id, tournament_id, new_score, "Published score updated event");
        Ok(())
    }
}
