use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use common::database::{TransactionBuilder, TransactionRepository};
use common::errors::{AppError, ErrorCode};
use common::models::{Group, Participation, RewardingMap, Tournament};

use crate::clients::{LeaderboardGateway, UserGateway};
use crate::events::TournamentEventPublisher;
use crate::repository::{GroupRepository, ParticipationRepository, TournamentRepository};

/// Bounded retries for the entry commit when the chosen group fills
/// concurrently.
const ENTRY_COMMIT_ATTEMPTS: u32 = 3;

/// Every entry and score update resolves the active tournament; a short
/// process-local TTL keeps those lookups off the store.
const ACTIVE_TOURNAMENT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CachedTournament {
    tournament: Tournament,
    fetched_at: Instant,
}

pub struct TournamentService {
    tournament_repo: Arc<dyn TournamentRepository>,
    participation_repo: Arc<dyn ParticipationRepository>,
    group_repo: Arc<dyn GroupRepository>,
    transaction_repo: Arc<dyn TransactionRepository>,
    user_gateway: Arc<dyn UserGateway>,
    leaderboard_gateway: Arc<dyn LeaderboardGateway>,
    publisher: Arc<dyn TournamentEventPublisher>,
    active_cache: RwLock<Option<CachedTournament>>,
}

impl TournamentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tournament_repo: Arc<dyn TournamentRepository>,
        participation_repo: Arc<dyn ParticipationRepository>,
        group_repo: Arc<dyn GroupRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        user_gateway: Arc<dyn UserGateway>,
        leaderboard_gateway: Arc<dyn LeaderboardGateway>,
        publisher: Arc<dyn TournamentEventPublisher>,
    ) -> Self {
        Self {
            tournament_repo,
            participation_repo,
            group_repo,
            transaction_repo,
            user_gateway,
            leaderboard_gateway,
            publisher,
            active_cache: RwLock::new(None),
        }
    }

    pub async fn create_tournament(
        &self,
        starts_at: DateTime<Utc>,
    ) -> Result<Tournament, AppError> {
        let tournament = Tournament::daily(starts_at);
        self.tournament_repo.create(&tournament).await?;
        info!(tournament_id = %tournament.tournament_id, "Created tournament");
        Ok(tournament)
    }

    /// Startup path: reuse the active tournament when one covers "now",
    /// otherwise create one anchored at today's midnight UTC.
    pub async fn create_current_tournament_if_not_exists(
        &self,
    ) -> Result<Tournament, AppError> {
        if let Some(existing) = self.tournament_repo.get_active(Utc::now()).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let starts_at = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .ok_or_else(|| AppError::internal("failed to compute start of day"))?;

        self.create_tournament(starts_at).await
    }

    /// Entry saga: reserve the fee, bind participation and group counter in
    /// one atomic write, then confirm; any commit failure rolls the
    /// reservation back.
    pub async fn enter_tournament(&self, user_id: &str) -> Result<(String, String), AppError> {
        let now = Utc::now();
        let tournament = self
            .active_tournament()
            .await?
            .ok_or_else(|| AppError::not_found("no active tournament"))?;
        let tournament_id = tournament.tournament_id.clone();

        if let Some(existing) = self
            .participation_repo
            .get_by_user_and_tournament(user_id, &tournament_id)
            .await?
        {
            info!(user_id, tournament_id = %tournament_id, "User already entered; replaying result");
            return Ok((existing.tournament_id, existing.group_id));
        }

        let user = self.user_gateway.get_by_id(user_id).await?;

        if user.level < tournament.user_level_limit {
            return Err(AppError::forbidden(format!(
                "user level must be at least {}",
                tournament.user_level_limit
            )));
        }
        if tournament.last_allowed_participation_date < now {
            return Err(AppError::forbidden(
                "tournament participation window is closed",
            ));
        }

        self.user_gateway
            .reserve_coins(user_id, tournament.entrance_fee, &tournament_id)
            .await?;

        match self.commit_entry(user_id, &tournament).await {
            Ok(group_id) => {
                if let Err(err) = self
                    .user_gateway
                    .confirm_reservation(user_id, &tournament_id)
                    .await
                {
                    warn!(
                        user_id,
                        tournament_id = %tournament_id,
                        error = %err,
                        "Failed to confirm reservation; entry is durable and the fee is deducted"
                    );
                }

                if let Err(err) = self
                    .publisher
                    .publish_entered(user_id, &user.display_name, &group_id, &tournament_id)
                    .await
                {
                    warn!(
                        user_id,
                        tournament_id = %tournament_id,
                        error = %err,
                        "Failed to publish tournament entered event"
                    );
                }

                info!(user_id, tournament_id = %tournament_id, group_id = %group_id, "User entered tournament");
                Ok((tournament_id, group_id))
            }
            Err(err) => {
                warn!(
                    user_id,
                    tournament_id = %tournament_id,
                    error = %err,
                    "Entry commit failed; rolling back reservation"
                );
                if let Err(rollback_err) = self
                    .user_gateway
                    .rollback_reservation(user_id, &tournament_id)
                    .await
                {
                    error!(
                        user_id,
                        tournament_id = %tournament_id,
                        error = %rollback_err,
                        "CRITICAL: failed to roll back reservation; manual reconciliation required"
                    );
                }
                Err(err)
            }
        }
    }

    /// Score pipeline: translate a level-up into a bounded score increment on
    /// the user's participation and fan the new total out to the
    /// leaderboard.
    pub async fn update_participation_score(
        &self,
        user_id: &str,
        level_increase: i64,
    ) -> Result<(), AppError> {
        let Some(tournament) = self.active_tournament().await? else {
            debug!(user_id, "No active tournament; dropping level up event");
            return Ok(());
        };

        let score_reward = level_increase * tournament.score_reward_per_level_upgrade;
        match self
            .participation_repo
            .add_score(user_id, &tournament.tournament_id, score_reward)
            .await?
        {
            Some(participation) => {
                info!(user_id, score = participation.score, "Participation score updated");
                if let Err(err) = self
                    .publisher
                    .publish_score_updated(
                        user_id,
                        &participation.group_id,
                        &participation.tournament_id,
                        participation.score,
                    )
                    .await
                {
                    warn!(user_id, error = %err, "Failed to publish score updated event");
                }
            }
            None => {
                debug!(user_id, "User is not participating in the active tournament");
            }
        }

        Ok(())
    }

    /// Two-phase claim: the UNCLAIMED → PROCESSING flip is the exclusive
    /// lease; every failure afterwards reverts it so the claim stays
    /// retryable.
    pub async fn claim_reward(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(String, i64), AppError> {
        let participation = self
            .participation_repo
            .mark_processing(user_id, tournament_id)
            .await?
            .ok_or_else(|| AppError::forbidden("no participation or reward already claimed"))?;

        let reward = match self.resolve_reward(user_id, &participation).await {
            Ok(reward) => reward,
            Err(err) => {
                self.revert_to_unclaimed(user_id, tournament_id).await;
                return Err(err);
            }
        };

        if reward <= 0 {
            self.participation_repo
                .mark_claimed(user_id, tournament_id)
                .await?;
            info!(user_id, tournament_id, "No reward for this rank; claim closed");
            return Ok((tournament_id.to_string(), 0));
        }

        if let Err(err) = self
            .user_gateway
            .collect_tournament_reward(user_id, tournament_id, reward)
            .await
        {
            self.revert_to_unclaimed(user_id, tournament_id).await;
            return Err(err);
        }

        self.participation_repo
            .mark_claimed(user_id, tournament_id)
            .await?;

        info!(user_id, tournament_id, reward, "Reward claimed");
        Ok((tournament_id.to_string(), reward))
    }

    async fn resolve_reward(
        &self,
        user_id: &str,
        participation: &Participation,
    ) -> Result<i64, AppError> {
        if participation.ends_at > Utc::now() {
            return Err(AppError::forbidden("tournament is not finished yet"));
        }

        let rank = self
            .leaderboard_gateway
            .tournament_rank(user_id, &participation.tournament_id)
            .await?;

        calculate_reward(rank, &participation.rewarding_map)
    }

    async fn revert_to_unclaimed(&self, user_id: &str, tournament_id: &str) {
        match self
            .participation_repo
            .mark_unclaimed(user_id, tournament_id)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => warn!(
                user_id,
                tournament_id, "Claim lease was not in PROCESSING while reverting"
            ),
            Err(err) => error!(
                user_id,
                tournament_id,
                error = %err,
                "Failed to revert claim to UNCLAIMED"
            ),
        }
    }

    async fn commit_entry(
        &self,
        user_id: &str,
        tournament: &Tournament,
    ) -> Result<String, AppError> {
        let mut last_err = AppError::internal("entry commit did not run");

        for attempt in 1..=ENTRY_COMMIT_ATTEMPTS {
            let group = self.find_or_create_group(tournament).await?;
            let participation = Participation::new(user_id, tournament, &group.group_id);

            let mut builder = TransactionBuilder::new();
            builder.add_put(self.participation_repo.entry_put(&participation)?)?;
            builder.add_update(
                self.group_repo
                    .add_participant_update(&tournament.tournament_id, &group.group_id)?,
            )?;

            match self.transaction_repo.execute(builder).await {
                Ok(()) => return Ok(group.group_id),
                Err(err) if err.code == ErrorCode::Conflict => {
                    debug!(
                        user_id,
                        group_id = %group.group_id,
                        attempt,
                        "Group filled concurrently; retrying with another group"
                    );
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err)
    }

    async fn find_or_create_group(&self, tournament: &Tournament) -> Result<Group, AppError> {
        if let Some(group) = self
            .group_repo
            .find_available(&tournament.tournament_id)
            .await?
        {
            return Ok(group);
        }

        // Concurrent entrants may both create a group here; spare empty
        // groups are harmless and get filled by later entrants.
        let group = Group::new(tournament);
        self.group_repo.create(&group).await?;
        debug!(group_id = %group.group_id, tournament_id = %tournament.tournament_id, "Created group");
        Ok(group)
    }

    async fn active_tournament(&self) -> Result<Option<Tournament>, AppError> {
        let now = Utc::now();

        {
            let cached = self.active_cache.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < ACTIVE_TOURNAMENT_CACHE_TTL
                    && entry.tournament.starts_at <= now
                    && entry.tournament.ends_at >= now
                {
                    return Ok(Some(entry.tournament.clone()));
                }
            }
        }

        let fetched = self.tournament_repo.get_active(now).await?;
        let mut cached = self.active_cache.write().await;
        *cached = fetched.clone().map(|tournament| CachedTournament {
            tournament,
            fetched_at: Instant::now(),
        });

        Ok(fetched)
    }
}

/// Reward lookup: literal rank key first, then the first enclosing "a-b"
/// range; no match pays nothing.
pub fn calculate_reward(rank: i64, rewarding_map: &RewardingMap) -> Result<i64, AppError> {
    if rank < 1 {
        return Err(AppError::internal(format!("invalid rank: {}", rank)));
    }

    if let Some(reward) = rewarding_map.get(&rank.to_string()) {
        return Ok(*reward);
    }

    for (key, reward) in rewarding_map {
        let Some((start, end)) = key.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (start.trim().parse::<i64>(), end.trim().parse::<i64>()) else {
            continue;
        };
        if rank >= start && rank <= end {
            return Ok(*reward);
        }
    }

    Ok(0)
}
