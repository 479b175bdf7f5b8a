use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;

use common::config::Config;
use common::database::{DynamoClient, DynamoTransactionRepository};
use common::events::{TOURNAMENT_EVENTS_STREAM, TOURNAMENT_EVENTS_WILDCARD};
use common::jetstream::{Client as NatsClient, Publisher, Subscriber};
use common::pb::tournament_service_server::TournamentServiceServer;

use crate::clients::{GrpcLeaderboardGateway, GrpcUserGateway};
use crate::events::{EventSubscriber, JetStreamTournamentPublisher};
use crate::handler::TournamentHandler;
use crate::repository::{
    DynamoGroupRepository, DynamoParticipationRepository, DynamoTournamentRepository,
};
use crate::scheduler::Scheduler;
use crate::service::TournamentService;

/// Wires the service together and owns the shutdown order: scheduler and
/// subscriber stop first, then the gRPC server, then the bus connection.
pub struct App {
    cancellation: CancellationToken,
    scheduler_handle: JoinHandle<()>,
    subscriber_handle: JoinHandle<()>,
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
        nats.ensure_stream(
            TOURNAMENT_EVENTS_STREAM,
            vec![TOURNAMENT_EVENTS_WILDCARD.to_string()],
        )
        .await
        .context("failed to create tournament events stream")?;

        let publisher = Arc::new(JetStreamTournamentPublisher::new(Publisher::new(
            nats.jetstream().clone(),
        )));

        let user_gateway = Arc::new(
            GrpcUserGateway::connect(&cfg.server.user_service_address)
                .await
                .context("failed to connect to user service")?,
        );
        let leaderboard_gateway = Arc::new(
            GrpcLeaderboardGateway::connect(&cfg.server.leaderboard_service_address)
                .await
                .context("failed to connect to leaderboard service")?,
        );

        let service = Arc::new(TournamentService::new(
            Arc::new(DynamoTournamentRepository::new(db.clone())),
            Arc::new(DynamoParticipationRepository::new(db.clone())),
            Arc::new(DynamoGroupRepository::new(db.clone())),
            Arc::new(DynamoTransactionRepository::new(db.clone())),
            user_gateway,
            leaderboard_gateway,
            publisher,
        ));

        let cancellation = CancellationToken::new();

        let subscriber =
            EventSubscriber::new(Subscriber::new(nats.jetstream().clone()), service.clone());
        let subscriber_handle = subscriber
            .start(cancellation.child_token())
            .await
            .context("failed to start event subscriber")?;

        let scheduler = Scheduler::new(service.clone());
        let scheduler_token = cancellation.child_token();
        let scheduler_handle =
            tokio::spawn(async move { scheduler.run(scheduler_token).await });
        info!("Tournament creation scheduler started");

        let addr: SocketAddr = format!("0.0.0.0:{}", cfg.server.grpc_port)
            .parse()
            .context("invalid gRPC listen address")?;
        let shutdown = cancellation.child_token();
        let server_handle = tokio::spawn(
            Server::builder()
                .add_service(TournamentServiceServer::new(TournamentHandler::new(
                    service,
                )))
                .serve_with_shutdown(addr, async move { shutdown.cancelled().await }),
        );
        info!(%addr, "gRPC server listening");

        Ok(Self {
            cancellation,
            scheduler_handle,
            subscriber_handle,
            server_handle,
            nats,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down tournament service");
        self.cancellation.cancel();

        self.scheduler_handle.await.ok();
        self.subscriber_handle.await.ok();
        self.server_handle
            .await
            .context("gRPC server task panicked")?
            .context("gRPC server failed")?;
        self.nats.close().await.ok();

        info!("Tournament service stopped");
        Ok(())
    }
}
