use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;

use common::pb;
use common::pb::leaderboard_service_server::LeaderboardService as LeaderboardServiceGrpc;

use crate::service::{LeaderboardService, LeaderboardUser};

pub struct LeaderboardHandler {
    service: Arc<LeaderboardService>,
}

impl LeaderboardHandler {
    pub fn new(service: Arc<LeaderboardService>) -> Self {
        Self { service }
    }
}

fn to_pb(users: Vec<LeaderboardUser>) -> Vec<pb::LeaderboardUser> {
    users
        .into_iter()
        .map(|user| pb::LeaderboardUser {
            rank: user.rank,
            user_id: user.user_id,
            display_name: user.display_name,
            score: user.score,
        })
        .collect()
}

#[tonic::async_trait]
impl LeaderboardServiceGrpc for LeaderboardHandler {
    async fn get_global_leaderboard(
        &self,
        _request: Request<pb::GetGlobalLeaderboardRequest>,
    ) -> Result<Response<pb::GetGlobalLeaderboardResponse>, Status> {
        debug!("GetGlobalLeaderboard");

        let users = self.service.get_global_leaderboard().await?;
        Ok(Response::new(pb::GetGlobalLeaderboardResponse {
            users: to_pb(users),
        }))
    }

    async fn get_tournament_leaderboard(
        &self,
        request: Request<pb::GetTournamentLeaderboardRequest>,
    ) -> Result<Response<pb::GetTournamentLeaderboardResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }
        debug!(user_id = %req.user_id, tournament_id = %req.tournament_id, "GetTournamentLeaderboard");

        let users = self
            .service
            .get_tournament_leaderboard(&req.user_id, &req.tournament_id)
            .await?;
        Ok(Response::new(pb::GetTournamentLeaderboardResponse {
            users: to_pb(users),
        }))
    }

    async fn get_tournament_rank(
        &self,
        request: Request<pb::GetTournamentRankRequest>,
    ) -> Result<Response<pb::GetTournamentRankResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }
        debug!(user_id = %req.user_id, tournament_id = %req.tournament_id, "GetTournamentRank");

        let rank = self
            .service
            .get_tournament_rank(&req.user_id, &req.tournament_id)
            .await?;
        Ok(Response::new(pb::GetTournamentRankResponse { rank }))
    }
}
