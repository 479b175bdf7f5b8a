use std::future::Future;

use async_nats::jetstream::consumer::{pull, AckPolicy};
use async_nats::jetstream::{self, stream, AckKind};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{AppError, ErrorCode};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub stream_name: String,
    pub stream_subjects: Vec<String>,
    pub consumer_name: String,
    pub filter_subject: String,
}

/// Durable pull consumer with explicit acks. Handler success acks the
/// message; handler failure NAKs it and relies on redelivery.
#[derive(Clone)]
pub struct Subscriber {
    context: jetstream::Context,
}

impl Subscriber {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }

    pub async fn spawn<F, Fut>(
        &self,
        cfg: ConsumerConfig,
        token: CancellationToken,
        handler: F,
    ) -> Result<JoinHandle<()>, AppError>
    where
        F: Fn(String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let stream = self
            .context
            .get_or_create_stream(stream::Config {
                name: cfg.stream_name.clone(),
                subjects: cfg.stream_subjects.clone(),
                ..Default::default()
            })
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::EventSubscription,
                    format!("failed to open stream {}", cfg.stream_name),
                    err,
                )
            })?;

        let consumer = stream
            .get_or_create_consumer(
                &cfg.consumer_name,
                pull::Config {
                    durable_name: Some(cfg.consumer_name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    filter_subject: cfg.filter_subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::EventSubscription,
                    format!("failed to create consumer {}", cfg.consumer_name),
                    err,
                )
            })?;

        info!(
            stream = %cfg.stream_name,
            consumer = %cfg.consumer_name,
            "Subscribed"
        );

        let handle = tokio::spawn(async move {
            let mut messages = match consumer.messages().await {
                Ok(messages) => messages,
                Err(err) => {
                    error!(error = %err, consumer = %cfg.consumer_name, "Failed to open message stream");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!(consumer = %cfg.consumer_name, "Subscription stopped");
                        return;
                    }
                    next = messages.next() => {
                        let msg = match next {
                            Some(Ok(msg)) => msg,
                            Some(Err(err)) => {
                                warn!(error = %err, consumer = %cfg.consumer_name, "Error receiving message");
                                continue;
                            }
                            None => {
                                warn!(consumer = %cfg.consumer_name, "Message stream ended");
                                return;
                            }
                        };

                        let subject = msg.subject.to_string();
                        let payload = msg.payload.clone();

                        match handler(subject.clone(), payload).await {
                            Ok(()) => {
                                if let Err(err) = msg.ack().await {
                                    warn!(error = %err, subject = %subject, "Failed to ack message");
                                }
                            }
                            Err(err) => {
                                error!(error = %err, subject = %subject, "Handler failed; NAKing for redelivery");
                                if let Err(err) = msg.ack_with(AckKind::Nak(None)).await {
                                    warn!(error = %err, subject = %subject, "Failed to NAK message");
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(handle)
    }
}

/// Decode helper shared by every event handler.
pub fn unmarshal_proto<M: prost::Message + Default>(payload: &Bytes) -> Result<M, AppError> {
    M::decode(payload.as_ref()).map_err(|err| {
        AppError::wrap(
            ErrorCode::ObjectUnmarshal,
            "failed to decode event payload",
            err,
        )
    })
}
