use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;

use common::database::attrs::{av_s, av_time};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::reward_claim::reward_claim_pk;
use common::models::tournament::tournament_pk;
use common::models::RewardClaim;

use super::RewardClaimRepository;

pub struct DynamoRewardClaimRepository {
    db: Arc<DynamoClient>,
}

impl DynamoRewardClaimRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RewardClaimRepository for DynamoRewardClaimRepository {
    async fn create(&self, user_id: &str, tournament_id: &str) -> Result<bool, AppError> {
        let claim = RewardClaim {
            user_id: user_id.to_string(),
            tournament_id: tournament_id.to_string(),
            created_at: Utc::now(),
        };

        let result = self
            .db
            .raw()
            .put_item()
            .table_name(self.db.table())
            .set_item(Some(to_item(&claim)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception())
                {
                    return Ok(false);
                }
                Err(AppError::wrap(
                    ErrorCode::Database,
                    "failed to create reward claim",
                    err,
                ))
            }
        }
    }
}

fn to_item(claim: &RewardClaim) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(reward_claim_pk(&claim.user_id)));
    item.insert("SK".to_string(), av_s(tournament_pk(&claim.tournament_id)));
    item.insert("user_id".to_string(), av_s(&claim.user_id));
    item.insert("tournament_id".to_string(), av_s(&claim.tournament_id));
    item.insert("created_at".to_string(), av_time(claim.created_at));
    item
}
