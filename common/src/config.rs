use std::env;
use std::str::FromStr;

use crate::errors::{AppError, ErrorCode};

/// Process configuration, loaded from `ARENA_*` environment variables with an
/// optional `.env` file for local development.
#[derive(Debug, Clone)]
pub struct Config {
    pub aws: AwsConfig,
    pub dynamodb: DynamoDbConfig,
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    /// Endpoint override for a local DynamoDB container.
    pub endpoint: Option<String>,
    pub use_local_endpoint: bool,
}

#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    pub table_name: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub grpc_port: u16,
    pub environment: String,
    pub log_level: String,
    pub user_service_address: String,
    pub leaderboard_service_address: String,
}

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub max_reconnect: usize,
    pub reconnect_wait_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub address: String,
    pub password: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        Ok(Self {
            aws: AwsConfig {
                region: env_or("ARENA_AWS_REGION", "us-east-1"),
                endpoint: env::var("ARENA_AWS_ENDPOINT").ok().filter(|s| !s.is_empty()),
                use_local_endpoint: env_parse("ARENA_AWS_USE_LOCAL_ENDPOINT", false)?,
            },
            dynamodb: DynamoDbConfig {
                table_name: env_or("ARENA_DYNAMODB_TABLE_NAME", "arena"),
                max_retries: env_parse("ARENA_DYNAMODB_MAX_RETRIES", 3u32)?,
            },
            server: ServerConfig {
                grpc_port: env_parse("ARENA_GRPC_PORT", 50051u16)?,
                environment: env_or("ARENA_ENVIRONMENT", "development"),
                log_level: env_or("ARENA_LOG_LEVEL", "info"),
                user_service_address: env_or(
                    "ARENA_USER_SERVICE_ADDRESS",
                    "http://127.0.0.1:50051",
                ),
                leaderboard_service_address: env_or(
                    "ARENA_LEADERBOARD_SERVICE_ADDRESS",
                    "http://127.0.0.1:50053",
                ),
            },
            nats: NatsConfig {
                url: env_or("ARENA_NATS_URL", "nats://127.0.0.1:4222"),
                max_reconnect: env_parse("ARENA_NATS_MAX_RECONNECT", 10usize)?,
                reconnect_wait_seconds: env_parse("ARENA_NATS_RECONNECT_WAIT_SECONDS", 2u64)?,
                timeout_seconds: env_parse("ARENA_NATS_TIMEOUT_SECONDS", 5u64)?,
            },
            redis: RedisConfig {
                address: env_or("ARENA_REDIS_ADDRESS", "127.0.0.1:6379"),
                password: env::var("ARENA_REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| {
            AppError::new(
                ErrorCode::InvalidInput,
                format!("invalid value for {}: {}", key, e),
            )
        }),
        Err(_) => Ok(default),
    }
}
