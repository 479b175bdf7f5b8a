use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;

use common::pb;
use common::pb::tournament_service_server::TournamentService as TournamentServiceGrpc;

use crate::service::TournamentService;

pub struct TournamentHandler {
    service: Arc<TournamentService>,
}

impl TournamentHandler {
    pub fn new(service: Arc<TournamentService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl TournamentServiceGrpc for TournamentHandler {
    async fn enter_tournament(
        &self,
        request: Request<pb::EnterTournamentRequest>,
    ) -> Result<Response<pb::EnterTournamentResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() {
            return Err(Status::invalid_argument("user id is required"));
        }
        debug!(user_id = %req.user_id, "EnterTournament");

        // Detached so a client disconnect cannot abandon the saga before
        // compensation runs.
        let service = self.service.clone();
        let (tournament_id, group_id) =
            tokio::spawn(async move { service.enter_tournament(&req.user_id).await })
                .await
                .map_err(|err| Status::internal(format!("entry task failed: {}", err)))?
                .map_err(Status::from)?;

        Ok(Response::new(pb::EnterTournamentResponse {
            tournament_id,
            group_id,
        }))
    }

    async fn claim_reward(
        &self,
        request: Request<pb::ClaimRewardRequest>,
    ) -> Result<Response<pb::ClaimRewardResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }
        debug!(user_id = %req.user_id, tournament_id = %req.tournament_id, "ClaimReward");

        let service = self.service.clone();
        let (tournament_id, reward_coin) = tokio::spawn(async move {
            service
                .claim_reward(&req.user_id, &req.tournament_id)
                .await
        })
        .await
        .map_err(|err| Status::internal(format!("claim task failed: {}", err)))?
        .map_err(Status::from)?;

        Ok(Response::new(pb::ClaimRewardResponse {
            tournament_id,
            reward_coin,
        }))
    }
}
