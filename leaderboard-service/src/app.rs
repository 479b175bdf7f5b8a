use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;

use common::cache::create_connection_manager;
use common::config::Config;
use common::jetstream::{Client as NatsClient, Subscriber};
use common::pb::leaderboard_service_server::LeaderboardServiceServer;

use crate::events::EventSubscriber;
use crate::handler::LeaderboardHandler;
use crate::repository::RedisLeaderboardRepository;
use crate::service::LeaderboardService;

pub struct App {
    cancellation: CancellationToken,
    subscriber_handles: Vec<JoinHandle<()>>,
    server_handle: JoinHandle<Result<(), tonic::transport::Error>>,
    nats: NatsClient,
}

impl App {
    pub async fn start(cfg: Config) -> Result<Self> {
        let redis = create_connection_manager(&cfg.redis)
            .await
            .context("failed to connect to Redis")?;

        let nats = NatsClient::connect(&cfg.nats)
            .await
            .context("failed to connect to NATS")?;

        let service = Arc::new(LeaderboardService::new(Arc::new(
            RedisLeaderboardRepository::new(redis),
        )));

        let cancellation = CancellationToken::new();

        let subscriber =
            EventSubscriber::new(Subscriber::new(nats.jetstream().clone()), service.clone());
        let subscriber_handles = subscriber
            .start(cancellation.child_token())
            .await
            .context("failed to start event subscribers")?;

        let addr: SocketAddr = format!("0.0.0.0:{}", cfg.server.grpc_port)
            .parse()
            .context("invalid gRPC listen address")?;
        let shutdown = cancellation.child_token();
        let server_handle = tokio::spawn(
            Server::builder()
                .add_service(LeaderboardServiceServer::new(LeaderboardHandler::new(
                    service,
                )))
                .serve_with_shutdown(addr, async move { shutdown.cancelled().await }),
        );
        info!(%addr, "gRPC server listening");

        Ok(Self {
            cancellation,
            subscriber_handles,
            server_handle,
            nats,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down leaderboard service");
        self.cancellation.cancel();

        for handle in self.subscriber_handles {
            handle.await.ok();
        }
        self.server_handle
            .await
            .context("gRPC server task panicked")?
            .context("gRPC server failed")?;
        self.nats.close().await.ok();

        info!("Leaderboard service stopped");
        Ok(())
    }
}
