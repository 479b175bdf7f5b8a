//! In-memory doubles for the user service seams. The transaction double
//! replays the wallet and reservation conditional writes against the memory
//! store with the same all-or-nothing semantics as the real table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, Update};

use ::common::database::attrs::{av_n, av_s, extract_i64, extract_string};
use ::common::database::{TransactionBuilder, TransactionRepository};
use ::common::errors::{AppError, ErrorCode};
use ::common::models::{Reservation, ReservationStatus, User};

use user_service::events::UserEventPublisher;
use user_service::repository::{ReservationRepository, RewardClaimRepository, UserRepository};

const TEST_TABLE: &str = "arena-test";

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<HashMap<String, User>>,
    pub reservations: Mutex<HashMap<(String, String), Reservation>>,
    pub reward_claims: Mutex<HashMap<(String, String), bool>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn coin(&self, user_id: &str) -> i64 {
        self.users.lock().unwrap().get(user_id).map(|u| u.coin).unwrap_or(0)
    }

    pub fn reservation(&self, user_id: &str, tournament_id: &str) -> Option<Reservation> {
        self.reservations
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
    }

    pub fn seed_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.user_id.clone(), user);
    }

    pub fn seed_reservation(&self, reservation: Reservation) {
        self.reservations.lock().unwrap().insert(
            (
                reservation.user_id.clone(),
                reservation.tournament_id.clone(),
            ),
            reservation,
        );
    }
}

pub fn test_user(user_id: &str, level: i64, coin: i64) -> User {
    User {
        user_id: user_id.to_string(),
        display_name: format!("player-{}", user_id),
        level,
        coin,
        created_at: chrono::Utc::now(),
    }
}

// --- User repository ---

pub struct MemoryUserRepo {
    store: Arc<MemoryStore>,
    pub fail_add_coin: Mutex<bool>,
}

impl MemoryUserRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            fail_add_coin: Mutex::new(false),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn create(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.store.users.lock().unwrap();
        if users.contains_key(&user.user_id) {
            return Err(AppError::new(ErrorCode::AlreadyExists, "user already exists"));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.store.users.lock().unwrap().get(user_id).cloned())
    }

    async fn update_level_progress(
        &self,
        user_id: &str,
        level_increase: i64,
        coin_reward: i64,
    ) -> Result<User, AppError> {
        let mut users = self.store.users.lock().unwrap();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        user.level += level_increase;
        user.coin += coin_reward;
        Ok(user.clone())
    }

    async fn add_coin(&self, user_id: &str, coin: i64) -> Result<(), AppError> {
        if *self.fail_add_coin.lock().unwrap() {
            return Err(AppError::new(ErrorCode::Database, "injected credit failure"));
        }
        let mut users = self.store.users.lock().unwrap();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::new(ErrorCode::Database, "user row missing"))?;
        user.coin += coin;
        Ok(())
    }

    fn coin_deduction_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError> {
        Update::builder()
            .table_name(TEST_TABLE)
            .key("PK", av_s(format!("USER#{}", user_id)))
            .key("SK", av_s("PROFILE"))
            .update_expression("SET coin = coin - :amount")
            .condition_expression("coin >= :amount")
            .expression_attribute_values(":amount", av_n(amount))
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad update", err))
    }

    fn coin_addition_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError> {
        Update::builder()
            .table_name(TEST_TABLE)
            .key("PK", av_s(format!("USER#{}", user_id)))
            .key("SK", av_s("PROFILE"))
            .update_expression("SET coin = coin + :amount")
            .expression_attribute_values(":amount", av_n(amount))
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad update", err))
    }
}

// --- Reservation repository ---

pub struct MemoryReservationRepo {
    store: Arc<MemoryStore>,
}

impl MemoryReservationRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReservationRepository for MemoryReservationRepo {
    async fn get(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Reservation>, AppError> {
        Ok(self.store.reservation(user_id, tournament_id))
    }

    async fn update_status(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool, AppError> {
        let mut reservations = self.store.reservations.lock().unwrap();
        match reservations.get_mut(&(user_id.to_string(), tournament_id.to_string())) {
            Some(reservation) if reservation.status == from => {
                reservation.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn create_put(&self, reservation: &Reservation) -> Result<Put, AppError> {
        let mut item = HashMap::new();
        item.insert(
            "PK".to_string(),
            av_s(format!("RESERVATION#{}", reservation.user_id)),
        );
        item.insert(
            "SK".to_string(),
            av_s(format!("TOURNAMENT#{}", reservation.tournament_id)),
        );
        item.insert("user_id".to_string(), av_s(&reservation.user_id));
        item.insert(
            "tournament_id".to_string(),
            av_s(&reservation.tournament_id),
        );
        item.insert("amount".to_string(), av_n(reservation.amount));
        item.insert("status".to_string(), av_s(reservation.status.as_str()));
        item.insert("purpose".to_string(), av_s(&reservation.purpose));

        Put::builder()
            .table_name(TEST_TABLE)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad put", err))
    }

    fn status_update(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Update, AppError> {
        Update::builder()
            .table_name(TEST_TABLE)
            .key("PK", av_s(format!("RESERVATION#{}", user_id)))
            .key("SK", av_s(format!("TOURNAMENT#{}", tournament_id)))
            .update_expression("SET #status = :to")
            .condition_expression("attribute_exists(PK) AND #status = :from")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":to", av_s(to.as_str()))
            .expression_attribute_values(":from", av_s(from.as_str()))
            .build()
            .map_err(|err| AppError::wrap(ErrorCode::Transaction, "bad update", err))
    }
}

// --- Reward claim repository ---

pub struct MemoryRewardClaimRepo {
    store: Arc<MemoryStore>,
}

impl MemoryRewardClaimRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RewardClaimRepository for MemoryRewardClaimRepo {
    async fn create(&self, user_id: &str, tournament_id: &str) -> Result<bool, AppError> {
        let mut claims = self.store.reward_claims.lock().unwrap();
        let key = (user_id.to_string(), tournament_id.to_string());
        if claims.contains_key(&key) {
            return Ok(false);
        }
        claims.insert(key, true);
        Ok(true)
    }
}

// --- Transaction repository ---

enum TxOp {
    DeductCoin { user_id: String, amount: i64 },
    AddCoin { user_id: String, amount: i64 },
    PutReservation(Reservation),
    FlipStatus {
        user_id: String,
        tournament_id: String,
        from: ReservationStatus,
        to: ReservationStatus,
    },
}

pub struct MemoryTransactionRepo {
    store: Arc<MemoryStore>,
    pub executions: Mutex<u32>,
}

impl MemoryTransactionRepo {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            executions: Mutex::new(0),
        }
    }

    pub fn execution_count(&self) -> u32 {
        *self.executions.lock().unwrap()
    }
}

fn key_string(key: &HashMap<String, AttributeValue>, name: &str) -> String {
    key.get(name).and_then(|v| v.as_s().ok()).unwrap().clone()
}

fn value_i64(update: &Update, name: &str) -> i64 {
    update
        .expression_attribute_values
        .as_ref()
        .and_then(|values| values.get(name))
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .unwrap()
}

fn value_status(update: &Update, name: &str) -> ReservationStatus {
    let raw = update
        .expression_attribute_values
        .as_ref()
        .and_then(|values| values.get(name))
        .and_then(|v| v.as_s().ok())
        .unwrap()
        .clone();
    ReservationStatus::parse(&raw).unwrap()
}

fn decode_op(item: &aws_sdk_dynamodb::types::TransactWriteItem) -> TxOp {
    if let Some(put) = &item.put {
        let reservation = Reservation {
            user_id: extract_string(&put.item, "user_id").unwrap(),
            tournament_id: extract_string(&put.item, "tournament_id").unwrap(),
            amount: extract_i64(&put.item, "amount").unwrap(),
            status: ReservationStatus::parse(&extract_string(&put.item, "status").unwrap())
                .unwrap(),
            purpose: extract_string(&put.item, "purpose").unwrap_or_default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        return TxOp::PutReservation(reservation);
    }

    let update = item.update.as_ref().expect("put or update");
    let pk = key_string(&update.key, "PK");

    if let Some(user_id) = pk.strip_prefix("USER#") {
        let amount = value_i64(update, ":amount");
        if update.update_expression.contains("coin - :amount") {
            return TxOp::DeductCoin {
                user_id: user_id.to_string(),
                amount,
            };
        }
        return TxOp::AddCoin {
            user_id: user_id.to_string(),
            amount,
        };
    }

    let user_id = pk.strip_prefix("RESERVATION#").unwrap().to_string();
    let tournament_id = key_string(&update.key, "SK")
        .strip_prefix("TOURNAMENT#")
        .unwrap()
        .to_string();
    TxOp::FlipStatus {
        user_id,
        tournament_id,
        from: value_status(update, ":from"),
        to: value_status(update, ":to"),
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepo {
    async fn execute(&self, builder: TransactionBuilder) -> Result<(), AppError> {
        let items = builder.into_items()?;
        *self.executions.lock().unwrap() += 1;

        let ops: Vec<TxOp> = items.iter().map(decode_op).collect();

        let mut users = self.store.users.lock().unwrap();
        let mut reservations = self.store.reservations.lock().unwrap();

        let conflict = || {
            AppError::new(
                ErrorCode::Conflict,
                "transaction cancelled by a conditional check",
            )
        };

        // Validate every condition before applying anything.
        for op in &ops {
            match op {
                TxOp::DeductCoin { user_id, amount } => match users.get(user_id) {
                    Some(user) if user.coin >= *amount => {}
                    _ => return Err(conflict()),
                },
                TxOp::AddCoin { user_id, .. } => {
                    if !users.contains_key(user_id) {
                        return Err(conflict());
                    }
                }
                TxOp::PutReservation(reservation) => {
                    let key = (
                        reservation.user_id.clone(),
                        reservation.tournament_id.clone(),
                    );
                    if reservations.contains_key(&key) {
                        return Err(conflict());
                    }
                }
                TxOp::FlipStatus {
                    user_id,
                    tournament_id,
                    from,
                    ..
                } => match reservations.get(&(user_id.clone(), tournament_id.clone())) {
                    Some(reservation) if reservation.status == *from => {}
                    _ => return Err(conflict()),
                },
            }
        }

        for op in ops {
            match op {
                TxOp::DeductCoin { user_id, amount } => {
                    users.get_mut(&user_id).unwrap().coin -= amount;
                }
                TxOp::AddCoin { user_id, amount } => {
                    users.get_mut(&user_id).unwrap().coin += amount;
                }
                TxOp::PutReservation(reservation) => {
                    reservations.insert(
                        (
                            reservation.user_id.clone(),
                            reservation.tournament_id.clone(),
                        ),
                        reservation,
                    );
                }
                TxOp::FlipStatus {
                    user_id,
                    tournament_id,
                    to,
                    ..
                } => {
                    reservations
                        .get_mut(&(user_id, tournament_id))
                        .unwrap()
                        .status = to;
                }
            }
        }

        Ok(())
    }
}

// --- Publisher ---

#[derive(Default)]
pub struct RecordingUserPublisher {
    pub created: Mutex<Vec<(String, String)>>,
    pub level_ups: Mutex<Vec<(String, i64, i64)>>,
    pub fail_next: Mutex<bool>,
}

impl RecordingUserPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl UserEventPublisher for RecordingUserPublisher {
    async fn publish_user_created(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        if *self.fail_next.lock().unwrap() {
            return Err(AppError::new(ErrorCode::EventPublish, "bus unavailable"));
        }
        self.created
            .lock()
            .unwrap()
            .push((user_id.to_string(), display_name.to_string()));
        Ok(())
    }

    async fn publish_user_level_up(
        &self,
        user_id: &str,
        level_increase: i64,
        new_level: i64,
    ) -> Result<(), AppError> {
        if *self.fail_next.lock().unwrap() {
            return Err(AppError::new(ErrorCode::EventPublish, "bus unavailable"));
        }
        self.level_ups
            .lock()
            .unwrap()
            .push((user_id.to_string(), level_increase, new_level));
        Ok(())
    }
}

// --- Fixture ---

pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub user_repo: Arc<MemoryUserRepo>,
    pub transactions: Arc<MemoryTransactionRepo>,
    pub publisher: Arc<RecordingUserPublisher>,
    pub service: user_service::service::UserService,
}

impl TestFixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let user_repo = Arc::new(MemoryUserRepo::new(store.clone()));
        let transactions = Arc::new(MemoryTransactionRepo::new(store.clone()));
        let publisher = RecordingUserPublisher::new();

        let service = user_service::service::UserService::new(
            user_repo.clone(),
            Arc::new(MemoryReservationRepo::new(store.clone())),
            Arc::new(MemoryRewardClaimRepo::new(store.clone())),
            transactions.clone(),
            publisher.clone(),
        );

        Self {
            store,
            user_repo,
            transactions,
            publisher,
            service,
        }
    }
}
