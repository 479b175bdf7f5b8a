pub mod reservation;
pub mod reward_claim;
pub mod user;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{Put, Update};

use common::errors::AppError;
use common::models::{Reservation, ReservationStatus, User};

pub use reservation::DynamoReservationRepository;
pub use reward_claim::DynamoRewardClaimRepository;
pub use user::DynamoUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), AppError>;

    async fn get_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Atomic level + coin increment; returns the updated profile.
    async fn update_level_progress(
        &self,
        user_id: &str,
        level_increase: i64,
        coin_reward: i64,
    ) -> Result<User, AppError>;

    /// Unconditional coin credit, used by the reward payout.
    async fn add_coin(&self, user_id: &str, coin: i64) -> Result<(), AppError>;

    /// Transaction item deducting coins, guarded by the non-negative wallet
    /// condition.
    fn coin_deduction_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError>;

    /// Transaction item restoring coins during a rollback.
    fn coin_addition_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Reservation>, AppError>;

    /// Conditional `from` → `to` flip; `false` when the reservation is
    /// missing or not in `from`.
    async fn update_status(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool, AppError>;

    /// Transaction item inserting the reservation, guarded against replays.
    fn create_put(&self, reservation: &Reservation) -> Result<Put, AppError>;

    /// Transaction item for the conditional status flip.
    fn status_update(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Update, AppError>;
}

#[async_trait]
pub trait RewardClaimRepository: Send + Sync {
    /// Insert the existence witness; `false` when a claim was already
    /// recorded for this (user, tournament).
    async fn create(&self, user_id: &str, tournament_id: &str) -> Result<bool, AppError>;
}
