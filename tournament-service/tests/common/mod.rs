//! In-memory doubles for the storage, gateway, and publisher seams. The
//! transaction double interprets the same conditional writes the store would
//! run, so capacity and replay guards behave like the real table.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{Put, Update};
use chrono::{DateTime, Utc};

use ::common::database::attrs::{
    av_n, av_s, extract_i64, extract_i64_map, extract_string, extract_time,
};
use ::common::database::{TransactionBuilder, TransactionRepository};
use ::common::errors::{AppError, ErrorCode};
use ::common::models::{Group, Participation, RewardClaimStatus, Tournament};

use tournament_service::clients::{LeaderboardGateway, UserGateway, UserProfile};
use tournament_service::events::TournamentEventPublisher;
use tournament_service::repository::{
    GroupRepository, ParticipationRepository, TournamentRepository,
};

const TEST_TABLE: &str = "arena-test";

#[derive(Default)]
pub struct MemoryStore {
    pub tournaments: Mutex<Vec<Tournament>>,
    pub groups: Mutex<HashMap<(String, String), Group>>,
    pub participations: Mutex<HashMap<(String, String), Participation>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn participation(&self, user_id: &str, tournament_id: &str) -> Option<Participation> {
        self.participations
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
    }

    pub fn group(&self, tournament_id: &str, group_id: &str) -> Option<Group> {
        self.groups
            .lock()
            .unwrap()
            .get(&(tournament_id.to_string(), group_id.to_string()))
            .cloned()
    }

    pub fn seed_participation(&self, participation: Participation) {
        self.participations.lock().unwrap().insert(
            (
                participation.user_id.clone(),
                participation.tournament_id.clone(),
            ),
            participation,
        );
    }

    pub fn seed_group(&self, group: Group) {
        self.groups
            .lock()
            .unwrap()
            .insert((group.tournament_id.clone(), group.group_id.clone()), group);
    }
}

// --- Tournament repository ---

pub struct MemoryTournamentRepo {
    store: Arc<MemoryStore>,
}

impl MemoryTournamentRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TournamentRepository for MemoryTournamentRepo {
    async fn create(&self, tournament: &Tournament) -> Result<(), AppError> {
        let mut tournaments = self.store.tournaments.lock().unwrap();
        if tournaments
            .iter()
            .any(|t| t.tournament_id == tournament.tournament_id)
        {
            return Err(AppError::new(
                ErrorCode::AlreadyExists,
                "tournament already exists",
            ));
        }
        tournaments.push(tournament.clone());
        Ok(())
    }

    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Tournament>, AppError> {
        let tournaments = self.store.tournaments.lock().unwrap();
        Ok(tournaments
            .iter()
            .filter(|t| t.starts_at <= now && t.ends_at >= now)
            .max_by_key(|t| t.starts_at)
            .cloned())
    }

    async fn get_by_id(&self, tournament_id: &str) -> Result<Option<Tournament>, AppError> {
        let tournaments = self.store.tournaments.lock().unwrap();
        Ok(tournaments
            .iter()
            .find(|t| t.tournament_id == tournament_id)
            .cloned())
    }
}

// --- Group repository ---

pub struct MemoryGroupRepo {
    store: Arc<MemoryStore>,
}

impl MemoryGroupRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GroupRepository for MemoryGroupRepo {
    async fn create(&self, group: &Group) -> Result<(), AppError> {
        let mut groups = self.store.groups.lock().unwrap();
        let key = (group.tournament_id.clone(), group.group_id.clone());
        if groups.contains_key(&key) {
            return Err(AppError::new(ErrorCode::AlreadyExists, "group already exists"));
        }
        groups.insert(key, group.clone());
        Ok(())
    }

    async fn find_available(&self, tournament_id: &str) -> Result<Option<Group>, AppError> {
        let groups = self.store.groups.lock().unwrap();
        let mut candidates: Vec<&Group> = groups
            .values()
            .filter(|g| g.tournament_id == tournament_id && g.participant_count < g.group_size)
            .collect();
        candidates.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(candidates.first().map(|g| (*g).clone()))
    }

    fn add_participant_update(
        &self,
        tournament_id: &str,
        group_id: &str,
    ) -> Result<Update, AppError> {
        Update::builder()
            .table_name(TEST_TABLE)
            .key("PK", av_s(format!("TOURNAMENT#{}", tournament_id)))
            .key("SK", av_s(format!("GROUP#{}", group_id)))
            .update_expression(
                "SET participant_count = if_not_exists(participant_count, :zero) + :one",
            )
            .condition_expression("attribute_exists(PK) AND participant_count < group_size")
            .expression_attribute_values(":zero", av_n(0))
            .expression_attribute_values(":one", av_n(1))
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad update", err))
    }
}

// --- Participation repository ---

pub struct MemoryParticipationRepo {
    store: Arc<MemoryStore>,
}

impl MemoryParticipationRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn transition(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: RewardClaimStatus,
        to: RewardClaimStatus,
    ) -> Option<Participation> {
        let mut participations = self.store.participations.lock().unwrap();
        let participation =
            participations.get_mut(&(user_id.to_string(), tournament_id.to_string()))?;
        if participation.reward_claim_status != from {
            return None;
        }
        participation.reward_claim_status = to;
        Some(participation.clone())
    }
}

#[async_trait]
impl ParticipationRepository for MemoryParticipationRepo {
    async fn get_by_user_and_tournament(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        Ok(self.store.participation(user_id, tournament_id))
    }

    async fn add_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        gained_score: i64,
    ) -> Result<Option<Participation>, AppError> {
        let mut participations = self.store.participations.lock().unwrap();
        match participations.get_mut(&(user_id.to_string(), tournament_id.to_string())) {
            Some(participation) => {
                participation.score += gained_score;
                Ok(Some(participation.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_processing(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        Ok(self.transition(
            user_id,
            tournament_id,
            RewardClaimStatus::Unclaimed,
            RewardClaimStatus::Processing,
        ))
    }

    async fn mark_unclaimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        Ok(self.transition(
            user_id,
            tournament_id,
            RewardClaimStatus::Processing,
            RewardClaimStatus::Unclaimed,
        ))
    }

    async fn mark_claimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        Ok(self.transition(
            user_id,
            tournament_id,
            RewardClaimStatus::Processing,
            RewardClaimStatus::Claimed,
        ))
    }

    fn entry_put(&self, participation: &Participation) -> Result<Put, AppError> {
        let mut item = HashMap::new();
        item.insert(
            "PK".to_string(),
            av_s(format!("USER#{}", participation.user_id)),
        );
        item.insert(
            "SK".to_string(),
            av_s(format!("TOURNAMENT#{}", participation.tournament_id)),
        );
        item.insert("user_id".to_string(), av_s(&participation.user_id));
        item.insert(
            "tournament_id".to_string(),
            av_s(&participation.tournament_id),
        );
        item.insert("group_id".to_string(), av_s(&participation.group_id));
        item.insert("score".to_string(), av_n(participation.score));
        item.insert(
            "reward_claim_status".to_string(),
            av_s(participation.reward_claim_status.as_str()),
        );
        item.insert(
            "ends_at".to_string(),
            av_s(participation.ends_at.to_rfc3339()),
        );
        item.insert(
            "rewarding_map".to_string(),
            ::common::database::attrs::av_i64_map(&participation.rewarding_map),
        );
        item.insert(
            "created_at".to_string(),
            av_s(participation.created_at.to_rfc3339()),
        );

        Put::builder()
            .table_name(TEST_TABLE)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad put", err))
    }
}

// --- Transaction repository ---

/// Applies the entry-commit transaction against the memory store with the
/// same all-or-nothing conditional semantics as the real table. Failures can
/// be injected up front to simulate concurrent losers.
pub struct MemoryTransactionRepo {
    store: Arc<MemoryStore>,
    pub injected_failures: Mutex<VecDeque<AppError>>,
    pub executions: Mutex<u32>,
}

impl MemoryTransactionRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            injected_failures: Mutex::new(VecDeque::new()),
            executions: Mutex::new(0),
        }
    }

    pub fn inject_failure(&self, code: ErrorCode, message: &str) {
        self.injected_failures
            .lock()
            .unwrap()
            .push_back(AppError::new(code, message));
    }

    pub fn execution_count(&self) -> u32 {
        *self.executions.lock().unwrap()
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepo {
    async fn execute(&self, builder: TransactionBuilder) -> Result<(), AppError> {
        let items = builder.into_items()?;
        *self.executions.lock().unwrap() += 1;

        if let Some(err) = self.injected_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut participations = self.store.participations.lock().unwrap();
        let mut groups = self.store.groups.lock().unwrap();

        // Validate every condition before applying anything.
        let mut new_participations = Vec::new();
        let mut group_increments = Vec::new();

        for item in &items {
            if let Some(put) = &item.put {
                let participation = participation_from_item(&put.item);
                let key = (
                    participation.user_id.clone(),
                    participation.tournament_id.clone(),
                );
                if participations.contains_key(&key) {
                    return Err(AppError::new(
                        ErrorCode::Conflict,
                        "transaction cancelled by a conditional check",
                    ));
                }
                new_participations.push((key, participation));
            } else if let Some(update) = &item.update {
                let pk = update.key.get("PK").and_then(|v| v.as_s().ok()).unwrap().clone();
                let sk = update.key.get("SK").and_then(|v| v.as_s().ok()).unwrap().clone();
                let tournament_id = pk.strip_prefix("TOURNAMENT#").unwrap().to_string();
                let group_id = sk.strip_prefix("GROUP#").unwrap().to_string();
                let key = (tournament_id, group_id);

                match groups.get(&key) {
                    Some(group) if group.participant_count < group.group_size => {
                        group_increments.push(key);
                    }
                    _ => {
                        return Err(AppError::new(
                            ErrorCode::Conflict,
                            "transaction cancelled by a conditional check",
                        ));
                    }
                }
            }
        }

        for (key, participation) in new_participations {
            participations.insert(key, participation);
        }
        for key in group_increments {
            groups.get_mut(&key).unwrap().participant_count += 1;
        }

        Ok(())
    }
}

fn participation_from_item(
    item: &HashMap<String, aws_sdk_dynamodb::types::AttributeValue>,
) -> Participation {
    Participation {
        user_id: extract_string(item, "user_id").unwrap(),
        tournament_id: extract_string(item, "tournament_id").unwrap(),
        group_id: extract_string(item, "group_id").unwrap(),
        score: extract_i64(item, "score").unwrap_or(0),
        reward_claim_status: RewardClaimStatus::parse(
            &extract_string(item, "reward_claim_status").unwrap(),
        )
        .unwrap(),
        ends_at: extract_time(item, "ends_at").unwrap(),
        rewarding_map: extract_i64_map(item, "rewarding_map").unwrap_or_default(),
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
    }
}

// --- Gateways ---

#[derive(Default)]
pub struct MockUserGateway {
    pub users: Mutex<HashMap<String, UserProfile>>,
    pub reserve_calls: Mutex<Vec<(String, i64, String)>>,
    pub confirm_calls: Mutex<Vec<(String, String)>>,
    pub rollback_calls: Mutex<Vec<(String, String)>>,
    pub collect_calls: Mutex<Vec<(String, String, i64)>>,
    pub fail_reserve: Mutex<Option<(ErrorCode, String)>>,
    pub fail_confirm: Mutex<Option<(ErrorCode, String)>>,
    pub fail_rollback: Mutex<Option<(ErrorCode, String)>>,
    pub fail_collect: Mutex<Option<(ErrorCode, String)>>,
}

impl MockUserGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_user(&self, user_id: &str, level: i64, coin: i64) {
        self.users.lock().unwrap().insert(
            user_id.to_string(),
            UserProfile {
                user_id: user_id.to_string(),
                display_name: format!("player-{}", user_id),
                level,
                coin,
            },
        );
    }

    fn take_failure(slot: &Mutex<Option<(ErrorCode, String)>>) -> Option<AppError> {
        slot.lock()
            .unwrap()
            .take()
            .map(|(code, message)| AppError::new(code, message))
    }
}

#[async_trait]
impl UserGateway for MockUserGateway {
    async fn get_by_id(&self, user_id: &str) -> Result<UserProfile, AppError> {
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn reserve_coins(
        &self,
        user_id: &str,
        amount: i64,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        if let Some(err) = Self::take_failure(&self.fail_reserve) {
            return Err(err);
        }
        self.reserve_calls.lock().unwrap().push((
            user_id.to_string(),
            amount,
            tournament_id.to_string(),
        ));
        Ok(())
    }

    async fn confirm_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        if let Some(err) = Self::take_failure(&self.fail_confirm) {
            return Err(err);
        }
        self.confirm_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), tournament_id.to_string()));
        Ok(())
    }

    async fn rollback_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        if let Some(err) = Self::take_failure(&self.fail_rollback) {
            return Err(err);
        }
        self.rollback_calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), tournament_id.to_string()));
        Ok(())
    }

    async fn collect_tournament_reward(
        &self,
        user_id: &str,
        tournament_id: &str,
        coin: i64,
    ) -> Result<(), AppError> {
        if let Some(err) = Self::take_failure(&self.fail_collect) {
            return Err(err);
        }
        self.collect_calls.lock().unwrap().push((
            user_id.to_string(),
            tournament_id.to_string(),
            coin,
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockLeaderboardGateway {
    pub ranks: Mutex<HashMap<String, i64>>,
    pub fail_next: Mutex<Option<(ErrorCode, String)>>,
}

impl MockLeaderboardGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rank(&self, user_id: &str, rank: i64) {
        self.ranks.lock().unwrap().insert(user_id.to_string(), rank);
    }

    pub fn fail_next(&self, code: ErrorCode, message: &str) {
        *self.fail_next.lock().unwrap() = Some((code, message.to_string()));
    }
}

#[async_trait]
impl LeaderboardGateway for MockLeaderboardGateway {
    async fn tournament_rank(&self, user_id: &str, _tournament_id: &str) -> Result<i64, AppError> {
        if let Some((code, message)) = self.fail_next.lock().unwrap().take() {
            return Err(AppError::new(code, message));
        }
        Ok(*self.ranks.lock().unwrap().get(user_id).unwrap_or(&-1))
    }
}

// --- Publisher ---

#[derive(Default)]
pub struct RecordingPublisher {
    pub entered: Mutex<Vec<(String, String, String, String)>>,
    pub score_updates: Mutex<Vec<(String, String, String, i64)>>,
    pub fail_entered: Mutex<bool>,
    pub fail_score_updates: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TournamentEventPublisher for RecordingPublisher {
    async fn publish_entered(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        if *self.fail_entered.lock().unwrap() {
            return Err(AppError::new(ErrorCode::EventPublish, "bus unavailable"));
        }
        self.entered.lock().unwrap().push((
            user_id.to_string(),
            display_name.to_string(),
            group_id.to_string(),
            tournament_id.to_string(),
        ));
        Ok(())
    }

    async fn publish_score_updated(
        &self,
        user_id: &str,
        group_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError> {
        if *self.fail_score_updates.lock().unwrap() {
            return Err(AppError::new(ErrorCode::EventPublish, "bus unavailable"));
        }
        self.score_updates.lock().unwrap().push((
            user_id.to_string(),
            group_id.to_string(),
            tournament_id.to_string(),
            new_score,
        ));
        Ok(())
    }
}

// --- Fixture ---

pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub transactions: Arc<MemoryTransactionRepo>,
    pub user_gateway: Arc<MockUserGateway>,
    pub leaderboard_gateway: Arc<MockLeaderboardGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub service: Arc<tournament_service::service::TournamentService>,
}

impl TestFixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let transactions = Arc::new(MemoryTransactionRepo::new(store.clone()));
        let user_gateway = MockUserGateway::new();
        let leaderboard_gateway = MockLeaderboardGateway::new();
        let publisher = RecordingPublisher::new();

        let service = Arc::new(tournament_service::service::TournamentService::new(
            Arc::new(MemoryTournamentRepo::new(store.clone())),
            Arc::new(MemoryParticipationRepo::new(store.clone())),
            Arc::new(MemoryGroupRepo::new(store.clone())),
            transactions.clone(),
            user_gateway.clone(),
            leaderboard_gateway.clone(),
            publisher.clone(),
        ));

        Self {
            store,
            transactions,
            user_gateway,
            leaderboard_gateway,
            publisher,
            service,
        }
    }

    /// An active tournament that started an hour ago, with the entry window
    /// still open.
    pub fn seed_active_tournament(&self) -> Tournament {
        let tournament = Tournament::daily(Utc::now() - chrono::Duration::hours(1));
        self.store
            .tournaments
            .lock()
            .unwrap()
            .push(tournament.clone());
        tournament
    }
}
