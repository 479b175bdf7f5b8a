use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Client;
use tracing::info;

use crate::config::RedisConfig;
use crate::errors::{AppError, ErrorCode};

// The sorted-set cache sits on the hot path of every rank lookup and score
// projection, so connection attempts give up quickly and reconnects back off
// in sub-second steps rather than stalling consumers for a minute.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_RETRIES: usize = 6;
const RECONNECT_STEP_MS: u64 = 500;
const RECONNECT_CAP_MS: u64 = 30_000;

/// Connect to the sorted-set cache. The returned manager reconnects on its
/// own and is cheap to clone per operation.
pub async fn create_connection_manager(cfg: &RedisConfig) -> Result<ConnectionManager, AppError> {
    let url = match &cfg.password {
        Some(password) => format!("redis://:{}@{}", password, cfg.address),
        None => format!("redis://{}", cfg.address),
    };

    let client = Client::open(url)
        .map_err(|err| AppError::wrap(ErrorCode::Redis, "invalid Redis address", err))?;

    // Delay per attempt: RECONNECT_STEP_MS * 2^n, capped at RECONNECT_CAP_MS.
    let config = ConnectionManagerConfig::new()
        .set_connection_timeout(CONNECT_TIMEOUT)
        .set_response_timeout(RESPONSE_TIMEOUT)
        .set_number_of_retries(RECONNECT_RETRIES)
        .set_exponent_base(2)
        .set_factor(RECONNECT_STEP_MS)
        .set_max_delay(RECONNECT_CAP_MS);

    let manager = ConnectionManager::new_with_config(client, config)
        .await
        .map_err(|err| {
            AppError::wrap(
                ErrorCode::Redis,
                format!("failed to connect to Redis at {}", cfg.address),
                err,
            )
        })?;

    info!(address = %cfg.address, "Connected to Redis");
    Ok(manager)
}
