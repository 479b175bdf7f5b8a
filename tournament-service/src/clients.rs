//! Typed gateways over the upstream gRPC services. The trait seams keep the
//! saga and claim workflows testable without a network.

use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::info;

use common::errors::{AppError, ErrorCode};
use common::pb;
use common::pb::leaderboard_service_client::LeaderboardServiceClient;
use common::pb::user_service_client::UserServiceClient;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub level: i64,
    pub coin: i64,
}

#[async_trait]
pub trait UserGateway: Send + Sync {
    async fn get_by_id(&self, user_id: &str) -> Result<UserProfile, AppError>;

    async fn reserve_coins(
        &self,
        user_id: &str,
        amount: i64,
        tournament_id: &str,
    ) -> Result<(), AppError>;

    async fn confirm_reservation(&self, user_id: &str, tournament_id: &str)
        -> Result<(), AppError>;

    async fn rollback_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError>;

    async fn collect_tournament_reward(
        &self,
        user_id: &str,
        tournament_id: &str,
        coin: i64,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait LeaderboardGateway: Send + Sync {
    /// 1-based group rank; -1 when the user is absent from the set.
    async fn tournament_rank(&self, user_id: &str, tournament_id: &str) -> Result<i64, AppError>;
}

pub struct GrpcUserGateway {
    client: UserServiceClient<Channel>,
}

impl GrpcUserGateway {
    pub async fn connect(address: &str) -> Result<Self, AppError> {
        let client = UserServiceClient::connect(address.to_string())
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::GrpcCall,
                    format!("failed to connect to user service at {}", address),
                    err,
                )
            })?;
        info!(address, "Connected to user service");
        Ok(Self { client })
    }
}

#[async_trait]
impl UserGateway for GrpcUserGateway {
    async fn get_by_id(&self, user_id: &str) -> Result<UserProfile, AppError> {
        let mut client = self.client.clone();
        let response = client
            .get_by_id(pb::GetUserByIdRequest {
                user_id: user_id.to_string(),
            })
            .await
            .map_err(AppError::from_status)?
            .into_inner();

        Ok(UserProfile {
            user_id: response.user_id,
            display_name: response.display_name,
            level: response.level,
            coin: response.coin,
        })
    }

    async fn reserve_coins(
        &self,
        user_id: &str,
        amount: i64,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let mut client = self.client.clone();
        client
            .reserve_coins(pb::ReserveCoinsRequest {
                user_id: user_id.to_string(),
                amount,
                tournament_id: tournament_id.to_string(),
            })
            .await
            .map_err(AppError::from_status)?;
        Ok(())
    }

    async fn confirm_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let mut client = self.client.clone();
        client
            .confirm_reservation(pb::ConfirmReservationRequest {
                user_id: user_id.to_string(),
                tournament_id: tournament_id.to_string(),
            })
            .await
            .map_err(AppError::from_status)?;
        Ok(())
    }

    async fn rollback_reservation(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let mut client = self.client.clone();
        client
            .rollback_reservation(pb::RollbackReservationRequest {
                user_id: user_id.to_string(),
                tournament_id: tournament_id.to_string(),
            })
            .await
            .map_err(AppError::from_status)?;
        Ok(())
    }

    async fn collect_tournament_reward(
        &self,
        user_id: &str,
        tournament_id: &str,
        coin: i64,
    ) -> Result<(), AppError> {
        let mut client = self.client.clone();
        client
            .collect_tournament_reward(pb::CollectTournamentRewardRequest {
                user_id: user_id.to_string(),
                tournament_id: tournament_id.to_string(),
                coin,
            })
            .await
            .map_err(AppError::from_status)?;
        Ok(())
    }
}

pub struct GrpcLeaderboardGateway {
    client: LeaderboardServiceClient<Channel>,
}

impl GrpcLeaderboardGateway {
    pub async fn connect(address: &str) -> Result<Self, AppError> {
        let client = LeaderboardServiceClient::connect(address.to_string())
            .await
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::GrpcCall,
                    format!("failed to connect to leaderboard service at {}", address),
                    err,
                )
            })?;
        info!(address, "Connected to leaderboard service");
        Ok(Self { client })
    }
}

#[async_trait]
impl LeaderboardGateway for GrpcLeaderboardGateway {
    async fn tournament_rank(&self, user_id: &str, tournament_id: &str) -> Result<i64, AppError> {
        let mut client = self.client.clone();
        let response = client
            .get_tournament_rank(pb::GetTournamentRankRequest {
                user_id: user_id.to_string(),
                tournament_id: tournament_id.to_string(),
            })
            .await
            .map_err(AppError::from_status)?
            .into_inner();
        Ok(response.rank)
    }
}
