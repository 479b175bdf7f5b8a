use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;

use common::config::Config;
use common::database::{DynamoClient, DynamoTransactionRepository};
use common::events::{USER_EVENTS_STREAM, USER_EVENTS_WILDCARD};
use common::jetstream::{Client as NatsClient, Publisher};
use common::pb::user_service_server::UserServiceServer;

use crate::events::JetStreamUserPublisher;
use crate::handler::UserHandler;
use crate::repository::{
    DynamoReservationRepository, DynamoRewardClaimRepository, DynamoUserRepository,
};
use crate::service::UserService;

pub struct App {
    cancellation: CancellationToken,
    server_handle: JoinHandle<Result<(), tonic::transport::Error>>,
    nats: NatsClient,
}

impl App {
    pub async fn start(cfg: Config) -> Result<Self> {
        let db = Arc::new(
            DynamoClient::new(&cfg)
                .await
                .context("failed to create DynamoDB client")?,
        );
        db.ping().await.context("store is not reachable")?;

        let nats = NatsClient::connect(&cfg.nats)
            .await
            .context("failed to connect to NATS")?;
        nats.ensure_stream(USER_EVENTS_STREAM, vec![USER_EVENTS_WILDCARD.to_string()])
            .await
            .context("failed to create user events stream")?;

        let publisher = Arc::new(JetStreamUserPublisher::new(Publisher::new(
            nats.jetstream().clone(),
        )));

        let service = Arc::new(UserService::new(
            Arc::new(DynamoUserRepository::new(db.clone())),
            Arc::new(DynamoReservationRepository::new(db.clone())),
            Arc::new(DynamoRewardClaimRepository::new(db.clone())),
            Arc::new(DynamoTransactionRepository::new(db.clone())),
            publisher,
        ));

        let cancellation = CancellationToken::new();

        let addr: SocketAddr = format!("0.0.0.0:{}", cfg.server.grpc_port)
            .parse()
            .context("invalid gRPC listen address")?;
        let shutdown = cancellation.child_token();
        let server_handle = tokio::spawn(
            Server::builder()
                .add_service(UserServiceServer::new(UserHandler::new(service)))
                .serve_with_shutdown(addr, async move { shutdown.cancelled().await }),
        );
        info!(%addr, "gRPC server listening");

        Ok(Self {
            cancellation,
            server_handle,
            nats,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down user service");
        self.cancellation.cancel();

        self.server_handle
            .await
            .context("gRPC server task panicked")?
            .context("gRPC server failed")?;
        self.nats.close().await.ok();

        info!("User service stopped");
        Ok(())
    }
}
