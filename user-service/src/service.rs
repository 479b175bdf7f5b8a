use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::database::{TransactionBuilder, TransactionRepository};
use common::errors::{AppError, ErrorCode};
use common::models::{Reservation, ReservationStatus, User};

use crate::events::UserEventPublisher;
use crate::repository::{ReservationRepository, RewardClaimRepository, UserRepository};

const DEFAULT_LEVEL: i64 = 1;
const DEFAULT_COIN: i64 = 1000;
const COIN_REWARD_PER_LEVEL_UPGRADE: i64 = 100;

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    reservation_repo: Arc<dyn ReservationRepository>,
    reward_claim_repo: Arc<dyn RewardClaimRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn UserEventPublisher>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        reservation_repo: Arc<dyn ReservationRepository>,
        reward_claim_repo: Arc<dyn RewardClaimRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn UserEventPublisher>,
    ) -> Self {
        Self {
            user_repo,
            reservation_repo,
            reward_claim_repo,
            transaction_repo,
            publisher,
        }
    }

    pub async fn create_user(&self, display_name: &str) -> Result<User, AppError> {
        if display_name.is_empty() {
            return Err(AppError::invalid_input("display name is required"));
        }

        let user = User {
            user_id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            level: DEFAULT_LEVEL,
            coin: DEFAULT_COIN,
            created_at: Utc::now(),
        };

        self.user_repo.create(&user).await?;
        info!(user_id = %user.user_id, "User created");

        if let Err(err) = self
            .publisher
            .publish_user_created(&user.user_id, &user.display_name)
            .await
        {
            warn!(user_id = %user.user_id, error = %err, "Failed to publish user created event");
        }

        Ok(user)
    }

    pub async fn get_by_id(&self, user_id: &str) -> Result<User, AppError> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {} not found", user_id)))
    }

    /// Level progress also pays a coin reward per level gained, in the same
    /// atomic update.
    pub async fn update_progress(
        &self,
        user_id: &str,
        progress_amount: i64,
    ) -> Result<User, AppError> {
        if progress_amount <= 0 {
            return Err(AppError::invalid_input("progress amount must be positive"));
        }

        let coin_reward = progress_amount * COIN_REWARD_PER_LEVEL_UPGRADE;
        let user = self
            .user_repo
            .update_level_progress(user_id, progress_amount, coin_reward)
            .await?;

        info!(user_id, level = user.level, "User progressed");

        if let Err(err) = self
            .publisher
            .publish_user_level_up(user_id, progress_amount, user.level)
            .await
        {
            warn!(user_id, error = %err, "Failed to publish user level up event");
        }

        Ok(user)
    }

    /// First phase of the entry fee: deduct coins and insert the RESERVED row
    /// in one atomic write. Replays against a live or confirmed reservation
    /// are no-ops.
    pub async fn reserve_coins(
        &self,
        user_id: &str,
        amount: i64,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        if amount <= 0 {
            return Err(AppError::invalid_input("amount must be positive"));
        }

        if let Some(existing) = self.reservation_repo.get(user_id, tournament_id).await? {
            match existing.status {
                ReservationStatus::Reserved | ReservationStatus::Confirmed => {
                    info!(user_id, tournament_id, "Reservation already in place");
                    return Ok(());
                }
                ReservationStatus::RolledBack => {
                    return Err(AppError::forbidden(
                        "reservation was rolled back and cannot be reused",
                    ));
                }
            }
        }

        let reservation = Reservation::for_tournament_entry(user_id, tournament_id, amount);

        let mut builder = TransactionBuilder::new();
        builder.add_update(self.user_repo.coin_deduction_update(user_id, amount)?)?;
        builder.add_put(self.reservation_repo.create_put(&reservation)?)?;

        match self.transaction_repo.execute(builder).await {
            Ok(()) => {
                info!(user_id, tournament_id, amount, "Coins reserved");
                Ok(())
            }
            Err(err) if err.code == ErrorCode::Conflict => Err(AppError::forbidden(
                "insufficient coins or reservation already exists",
            )),
            Err(err) => Err(err),
        }
    }

    pub async fn confirm_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let flipped = self
            .reservation_repo
            .update_status(
                user_id,
                tournament_id,
                ReservationStatus::Reserved,
                ReservationStatus::Confirmed,
            )
            .await?;

        if flipped {
            info!(user_id, tournament_id, "Reservation confirmed");
            return Ok(());
        }

        match self.reservation_repo.get(user_id, tournament_id).await? {
            None => Err(AppError::not_found("reservation not found")),
            Some(reservation) if reservation.status == ReservationStatus::Confirmed => Ok(()),
            Some(_) => Err(AppError::forbidden("reservation cannot be confirmed")),
        }
    }

    /// Compensation path: restore the coins and flip the reservation to
    /// ROLLED_BACK in one atomic write. Terminal states are absorbing.
    pub async fn rollback_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let reservation = self
            .reservation_repo
            .get(user_id, tournament_id)
            .await?
            .ok_or_else(|| AppError::not_found("reservation not found"))?;

        match reservation.status {
            ReservationStatus::RolledBack => Ok(()),
            ReservationStatus::Confirmed => {
                Err(AppError::forbidden("reservation cannot be rolled back"))
            }
            ReservationStatus::Reserved => {
                let mut builder = TransactionBuilder::new();
                builder.add_update(
                    self.user_repo
                        .coin_addition_update(user_id, reservation.amount)?,
                )?;
                builder.add_update(self.reservation_repo.status_update(
                    user_id,
                    tournament_id,
                    ReservationStatus::Reserved,
                    ReservationStatus::RolledBack,
                )?)?;

                match self.transaction_repo.execute(builder).await {
                    Ok(()) => {
                        info!(user_id, tournament_id, "Reservation rolled back");
                        Ok(())
                    }
                    Err(err) if err.code == ErrorCode::Conflict => Err(AppError::conflict(
                        "reservation state changed concurrently",
                    )),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Idempotent payout keyed on (user, tournament). The RewardClaim row is
    /// inserted first; the coin credit only runs when this call won the
    /// insert, so a replay can never pay twice.
    pub async fn collect_tournament_reward(
        &self,
        user_id: &str,
        tournament_id: &str,
        coin: i64,
    ) -> Result<(), AppError> {
        if coin <= 0 {
            return Err(AppError::invalid_input("reward coin must be positive"));
        }

        let inserted = self.reward_claim_repo.create(user_id, tournament_id).await?;
        if !inserted {
            info!(user_id, tournament_id, "Reward already collected");
            return Ok(());
        }

        if let Err(err) = self.user_repo.add_coin(user_id, coin).await {
            error!(
                user_id,
                tournament_id,
                coin,
                error = %err,
                "Reward claim recorded but coin credit failed; delete the claim row to retry"
            );
            return Err(err);
        }

        info!(user_id, tournament_id, coin, "Tournament reward collected");
        Ok(())
    }
}
