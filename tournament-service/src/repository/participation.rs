use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, ReturnValue, Update};
use chrono::Utc;

use common::database::attrs::{
    av_i64_map, av_n, av_s, av_time, extract_i64, extract_i64_map, extract_string, extract_time,
};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::tournament::tournament_pk;
use common::models::user::user_pk;
use common::models::{Participation, RewardClaimStatus};

use super::ParticipationRepository;

pub struct DynamoParticipationRepository {
    db: Arc<DynamoClient>,
}

impl DynamoParticipationRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }

    /// Conditional status flip returning the updated row, or `None` when the
    /// row is missing or not in `from`.
    async fn transition_status(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: RewardClaimStatus,
        to: RewardClaimStatus,
    ) -> Result<Option<Participation>, AppError> {
        let result = self
            .db
            .raw()
            .update_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(tournament_pk(tournament_id)))
            .update_expression("SET reward_claim_status = :to, updated_at = :now")
            .condition_expression("attribute_exists(PK) AND reward_claim_status = :from")
            .expression_attribute_values(":to", av_s(to.as_str()))
            .expression_attribute_values(":from", av_s(from.as_str()))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => {
                let attrs = output.attributes.ok_or_else(|| {
                    AppError::new(ErrorCode::Database, "update returned no attributes")
                })?;
                Ok(Some(from_item(&attrs)?))
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception())
                {
                    return Ok(None);
                }
                Err(AppError::wrap(
                    ErrorCode::Database,
                    "failed to update participation claim status",
                    err,
                ))
            }
        }
    }
}

#[async_trait]
impl ParticipationRepository for DynamoParticipationRepository {
    async fn get_by_user_and_tournament(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        let result = self
            .db
            .raw()
            .get_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(tournament_pk(tournament_id)))
            .send()
            .await
            .map_err(|err| {
                AppError::wrap(ErrorCode::Database, "failed to get participation", err)
            })?;

        match result.item {
            Some(item) => Ok(Some(from_item(&item)?)),
            None => Ok(None),
        }
    }

    async fn add_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        gained_score: i64,
    ) -> Result<Option<Participation>, AppError> {
        let result = self
            .db
            .raw()
            .update_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(tournament_pk(tournament_id)))
            .update_expression("ADD score :gained SET updated_at = :now")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(":gained", av_n(gained_score))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => {
                let attrs = output.attributes.ok_or_else(|| {
                    AppError::new(ErrorCode::Database, "update returned no attributes")
                })?;
                Ok(Some(from_item(&attrs)?))
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception())
                {
                    return Ok(None);
                }
                Err(AppError::wrap(
                    ErrorCode::Database,
                    "failed to update participation score",
                    err,
                ))
            }
        }
    }

    async fn mark_processing(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        self.transition_status(
            user_id,
            tournament_id,
            RewardClaimStatus::Unclaimed,
            RewardClaimStatus::Processing,
        )
        .await
    }

    async fn mark_unclaimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        self.transition_status(
            user_id,
            tournament_id,
            RewardClaimStatus::Processing,
            RewardClaimStatus::Unclaimed,
        )
        .await
    }

    async fn mark_claimed(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AppError> {
        self.transition_status(
            user_id,
            tournament_id,
            RewardClaimStatus::Processing,
            RewardClaimStatus::Claimed,
        )
        .await
    }

    fn entry_put(&self, participation: &Participation) -> Result<Put, AppError> {
        Put::builder()
            .table_name(self.db.table())
            .set_item(Some(to_item(participation)))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::Transaction,
                    "failed to build participation put",
                    err,
                )
            })
    }
}

fn to_item(participation: &Participation) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(user_pk(&participation.user_id)));
    item.insert(
        "SK".to_string(),
        av_s(tournament_pk(&participation.tournament_id)),
    );
    item.insert("user_id".to_string(), av_s(&participation.user_id));
    item.insert("tournament_id".to_string(), av_s(&participation.tournament_id));
    item.insert("group_id".to_string(), av_s(&participation.group_id));
    item.insert("score".to_string(), av_n(participation.score));
    item.insert(
        "reward_claim_status".to_string(),
        av_s(participation.reward_claim_status.as_str()),
    );
    item.insert("ends_at".to_string(), av_time(participation.ends_at));
    item.insert(
        "rewarding_map".to_string(),
        av_i64_map(&participation.rewarding_map),
    );
    item.insert("created_at".to_string(), av_time(participation.created_at));
    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Participation, AppError> {
    let unmarshal = |field: &str| {
        AppError::new(
            ErrorCode::ObjectUnmarshal,
            format!("participation item is missing {}", field),
        )
    };

    let status_raw =
        extract_string(item, "reward_claim_status").ok_or_else(|| unmarshal("reward_claim_status"))?;
    let reward_claim_status = RewardClaimStatus::parse(&status_raw).ok_or_else(|| {
        AppError::new(
            ErrorCode::ObjectUnmarshal,
            format!("unknown reward claim status {}", status_raw),
        )
    })?;

    Ok(Participation {
        user_id: extract_string(item, "user_id").ok_or_else(|| unmarshal("user_id"))?,
        tournament_id: extract_string(item, "tournament_id")
            .ok_or_else(|| unmarshal("tournament_id"))?,
        group_id: extract_string(item, "group_id").ok_or_else(|| unmarshal("group_id"))?,
        score: extract_i64(item, "score").unwrap_or(0),
        reward_claim_status,
        ends_at: extract_time(item, "ends_at").ok_or_else(|| unmarshal("ends_at"))?,
        rewarding_map: extract_i64_map(item, "rewarding_map").unwrap_or_default(),
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
    })
}
