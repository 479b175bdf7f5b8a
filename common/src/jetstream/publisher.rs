use async_nats::jetstream;
use prost::Message;

use crate::errors::{AppError, ErrorCode};

/// Publishes protobuf-encoded events and waits for the stream ack, so a
/// returned `Ok` means the message is durable.
#[derive(Clone)]
pub struct Publisher {
    context: jetstream::Context,
}

impl Publisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }

    pub async fn publish_proto<M: Message>(&self, subject: &str, msg: &M) -> Result<(), AppError> {
        let payload = msg.encode_to_vec();
        let ack = self
            .context
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::EventPublish,
                    format!("failed to publish to {}", subject),
                    err,
                )
            })?;

        ack.await.map_err(|err| {
            AppError::wrap(
                ErrorCode::EventPublish,
                format!("publish to {} was not acknowledged", subject),
                err,
            )
        })?;

        Ok(())
    }
}
