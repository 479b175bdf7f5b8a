pub mod publisher;
pub mod subscriber;

use std::time::Duration;

use async_nats::jetstream::{self, stream};
use tracing::info;

use crate::config::NatsConfig;
use crate::errors::{AppError, ErrorCode};

pub use publisher::Publisher;
pub use subscriber::{ConsumerConfig, Subscriber};

/// Connection to the bus plus its JetStream context. Process-wide singleton
/// with explicit lifecycle: connect on startup, close on shutdown.
pub struct Client {
    client: async_nats::Client,
    context: jetstream::Context,
}

impl Client {
    pub async fn connect(cfg: &NatsConfig) -> Result<Self, AppError> {
        let reconnect_wait = Duration::from_secs(cfg.reconnect_wait_seconds);
        let max_delay = reconnect_wait * cfg.max_reconnect.max(1) as u32;

        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .connection_timeout(Duration::from_secs(cfg.timeout_seconds))
            .reconnect_delay_callback(move |attempts| {
                reconnect_wait
                    .saturating_mul(attempts as u32)
                    .min(max_delay)
            })
            .connect(&cfg.url)
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::ServiceUnavailable,
                    format!("failed to connect to NATS at {}", cfg.url),
                    err,
                )
            })?;

        info!(url = %cfg.url, "Connected to NATS");

        let context = jetstream::new(client.clone());
        Ok(Self { client, context })
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.context
    }

    /// Create the stream if it does not exist yet; publishers call this for
    /// the streams they own before the first publish.
    pub async fn ensure_stream(
        &self,
        name: &str,
        subjects: Vec<String>,
    ) -> Result<(), AppError> {
        self.context
            .get_or_create_stream(stream::Config {
                name: name.to_string(),
                subjects,
                ..Default::default()
            })
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::EventPublish,
                    format!("failed to create stream {}", name),
                    err,
                )
            })?;

        info!(stream = name, "Stream ready");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), AppError> {
        self.client
            .flush()
            .await
            .map_err(|err| AppError::wrap(ErrorCode::EventPublish, "failed to flush NATS", err))
    }
}
