use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;

use common::pb;
use common::pb::user_service_server::UserService as UserServiceGrpc;

use crate::service::UserService;

pub struct UserHandler {
    service: Arc<UserService>,
}

impl UserHandler {
    pub fn new(service: Arc<UserService>) -> Self {
        Self { service }
    }
}

fn ok_response(message: &str) -> pb::MessageResponse {
    pb::MessageResponse {
        is_success: true,
        message: message.to_string(),
    }
}

#[tonic::async_trait]
impl UserServiceGrpc for UserHandler {
    async fn create_user(
        &self,
        request: Request<pb::CreateUserRequest>,
    ) -> Result<Response<pb::CreateUserResponse>, Status> {
        let req = request.into_inner();
        debug!(display_name = %req.display_name, "CreateUser");

        let user = self.service.create_user(&req.display_name).await?;
        Ok(Response::new(pb::CreateUserResponse {
            user_id: user.user_id,
        }))
    }

    async fn get_by_id(
        &self,
        request: Request<pb::GetUserByIdRequest>,
    ) -> Result<Response<pb::GetUserByIdResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() {
            return Err(Status::invalid_argument("user id is required"));
        }

        let user = self.service.get_by_id(&req.user_id).await?;
        Ok(Response::new(pb::GetUserByIdResponse {
            user_id: user.user_id,
            display_name: user.display_name,
            level: user.level,
            coin: user.coin,
        }))
    }

    async fn update_progress(
        &self,
        request: Request<pb::UpdateProgressRequest>,
    ) -> Result<Response<pb::UpdateProgressResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() {
            return Err(Status::invalid_argument("user id is required"));
        }
        debug!(user_id = %req.user_id, progress = req.progress_amount, "UpdateProgress");

        let user = self
            .service
            .update_progress(&req.user_id, req.progress_amount)
            .await?;
        Ok(Response::new(pb::UpdateProgressResponse {
            user_id: user.user_id,
            level: user.level,
            coin: user.coin,
        }))
    }

    async fn reserve_coins(
        &self,
        request: Request<pb::ReserveCoinsRequest>,
    ) -> Result<Response<pb::MessageResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }
        debug!(user_id = %req.user_id, amount = req.amount, "ReserveCoins");

        self.service
            .reserve_coins(&req.user_id, req.amount, &req.tournament_id)
            .await?;
        Ok(Response::new(ok_response("coins reserved")))
    }

    async fn confirm_reservation(
        &self,
        request: Request<pb::ConfirmReservationRequest>,
    ) -> Result<Response<pb::MessageResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }

        self.service
            .confirm_reservation(&req.user_id, &req.tournament_id)
            .await?;
        Ok(Response::new(ok_response("reservation confirmed")))
    }

    async fn rollback_reservation(
        &self,
        request: Request<pb::RollbackReservationRequest>,
    ) -> Result<Response<pb::MessageResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }

        self.service
            .rollback_reservation(&req.user_id, &req.tournament_id)
            .await?;
        Ok(Response::new(ok_response("reservation rolled back")))
    }

    async fn collect_tournament_reward(
        &self,
        request: Request<pb::CollectTournamentRewardRequest>,
    ) -> Result<Response<pb::MessageResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() || req.tournament_id.is_empty() {
            return Err(Status::invalid_argument(
                "user id and tournament id are required",
            ));
        }
        debug!(user_id = %req.user_id, coin = req.coin, "CollectTournamentReward");

        self.service
            .collect_tournament_reward(&req.user_id, &req.tournament_id, req.coin)
            .await?;
        Ok(Response::new(ok_response("reward collected")))
    }
}
