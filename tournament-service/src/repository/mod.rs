pub mod group;
pub mod participation;
pub mod tournament;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{Put, Update};
use chrono::{DateTime, Utc};

use common::errors::AppError;
use common::models::{Group, Participation, Tournament};

pub use group::DynamoGroupRepository;
pub use participation::DynamoParticipationRepository;
pub use tournament::DynamoTournamentRepository;

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Conditional insert; a tournament id is never overwritten.
    async fn create(&self, tournament: &Tournament) -> Result<(), AppError>;

    /// The tournament whose window covers `now`, via the CURRENT_TOURNAMENT
    /// index partition.
    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Tournament>, AppError>;

    async fn get_by_id(&self, tournament_id: &str) -> Result<Option<Tournament>, AppError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create(&self, group: &Group) -> Result<(), AppError>;

    /// First group of the tournament with a free slot, if any.
    async fn find_available(&self, tournament_id: &str) -> Result<Option<Group>, AppError>;

    /// Transaction item incrementing `participant_count`, guarded by the
    /// capacity condition.
    fn add_participant_update(
        &self,
        tournament_id: &str,
        group_id: &str,
    ) -> Result<Update, AppError>;
}

#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    async fn get_by_user_and_tournament(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError>;

    /// Atomic score increment. `None` when the user has no participation row
    /// for this tournament.
    async fn add_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        gained_score: i64,
    ) -> Result<Option<Participation>, AppError>;

    /// UNCLAIMED → PROCESSING; `None` when the lease is not available.
    async fn mark_processing(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError>;

    /// PROCESSING → UNCLAIMED rollback.
    async fn mark_unclaimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError>;

    /// PROCESSING → CLAIMED.
    async fn mark_claimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError>;

    /// Transaction item inserting the participation row, guarded against
    /// replays.
    fn entry_put(&self, participation: &Participation) -> Result<Put, AppError>;
}
