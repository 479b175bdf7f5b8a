pub mod attrs;
pub mod transaction;

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::Client;
use tracing::info;

use crate::config::Config;
use crate::errors::{AppError, ErrorCode};

pub use transaction::{
    DynamoTransactionRepository, TransactionBuilder, TransactionRepository,
    TRANSACTION_ITEM_LIMIT,
};

const STARTUP_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the single-table DynamoDB store. Cheap to clone through
/// an `Arc`; the underlying SDK client is safe for concurrent use.
pub struct DynamoClient {
    client: Client,
    table_name: String,
}

impl DynamoClient {
    pub async fn new(cfg: &Config) -> Result<Self, AppError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.aws.region.clone()));

        if cfg.aws.use_local_endpoint {
            let endpoint = cfg.aws.endpoint.clone().ok_or_else(|| {
                AppError::invalid_input("local endpoint enabled but ARENA_AWS_ENDPOINT is unset")
            })?;
            loader = loader
                .endpoint_url(endpoint)
                .credentials_provider(Credentials::new("local", "local", None, None, "static"));
        }

        let sdk_config = loader.load().await;
        let ddb_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
            .retry_config(
                aws_sdk_dynamodb::config::retry::RetryConfig::standard()
                    .with_max_attempts(cfg.dynamodb.max_retries),
            )
            .build();

        info!(table = %cfg.dynamodb.table_name, "Initialized DynamoDB client");

        Ok(Self {
            client: Client::from_conf(ddb_config),
            table_name: cfg.dynamodb.table_name.clone(),
        })
    }

    pub fn raw(&self) -> &Client {
        &self.client
    }

    pub fn table(&self) -> &str {
        &self.table_name
    }

    /// Bounded reachability check run once at startup before serving.
    pub async fn ping(&self) -> Result<(), AppError> {
        let describe = self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send();

        match tokio::time::timeout(STARTUP_PING_TIMEOUT, describe).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(AppError::wrap(
                ErrorCode::Database,
                format!("table {} is not reachable", self.table_name),
                err,
            )),
            Err(_) => Err(AppError::new(
                ErrorCode::ServiceUnavailable,
                "timed out waiting for the store to answer",
            )),
        }
    }
}
