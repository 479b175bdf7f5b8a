use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

use common::database::attrs::{
    av_i64_map, av_n, av_s, av_time, extract_i64, extract_i64_map, extract_string, extract_time,
};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::tournament::{current_tournament_gsi1pk, start_gsi1sk, tournament_pk};
use common::models::{meta_sk, Tournament};

use super::TournamentRepository;

pub struct DynamoTournamentRepository {
    db: Arc<DynamoClient>,
}

impl DynamoTournamentRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TournamentRepository for DynamoTournamentRepository {
    async fn create(&self, tournament: &Tournament) -> Result<(), AppError> {
        let result = self
            .db
            .raw()
            .put_item()
            .table_name(self.db.table())
            .set_item(Some(to_item(tournament)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception())
                {
                    return Err(AppError::new(
                        ErrorCode::AlreadyExists,
                        format!("tournament {} already exists", tournament.tournament_id),
                    ));
                }
                Err(AppError::wrap(
                    ErrorCode::Database,
                    "failed to create tournament",
                    err,
                ))
            }
        }
    }

    async fn get_active(&self, now: DateTime<Utc>) -> Result<Option<Tournament>, AppError> {
        let result = self
            .db
            .raw()
            .query()
            .table_name(self.db.table())
            .index_name("GSI1")
            .key_condition_expression("GSI1PK = :current")
            .filter_expression("starts_at <= :now AND ends_at >= :now")
            .expression_attribute_values(":current", av_s(current_tournament_gsi1pk()))
            .expression_attribute_values(":now", av_time(now))
            .scan_index_forward(false)
            .send()
            .await
            .map_err(|err| {
                AppError::wrap(ErrorCode::Database, "failed to query active tournament", err)
            })?;

        match result.items().first() {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, tournament_id: &str) -> Result<Option<Tournament>, AppError> {
        let result = self
            .db
            .raw()
            .get_item()
            .table_name(self.db.table())
            .key("PK", av_s(tournament_pk(tournament_id)))
            .key("SK", av_s(meta_sk()))
            .send()
            .await
            .map_err(|err| AppError::wrap(ErrorCode::Database, "failed to get tournament", err))?;

        match result.item {
            Some(item) => Ok(Some(from_item(&item)?)),
            None => Ok(None),
        }
    }
}

fn to_item(tournament: &Tournament) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(tournament_pk(&tournament.tournament_id)));
    item.insert("SK".to_string(), av_s(meta_sk()));
    item.insert("GSI1PK".to_string(), av_s(current_tournament_gsi1pk()));
    item.insert("GSI1SK".to_string(), av_s(start_gsi1sk(tournament.starts_at)));
    item.insert("tournament_id".to_string(), av_s(&tournament.tournament_id));
    item.insert("starts_at".to_string(), av_time(tournament.starts_at));
    item.insert("ends_at".to_string(), av_time(tournament.ends_at));
    item.insert(
        "last_allowed_participation_date".to_string(),
        av_time(tournament.last_allowed_participation_date),
    );
    item.insert("user_level_limit".to_string(), av_n(tournament.user_level_limit));
    item.insert("group_size".to_string(), av_n(tournament.group_size));
    item.insert("entrance_fee".to_string(), av_n(tournament.entrance_fee));
    item.insert(
        "score_reward_per_level_upgrade".to_string(),
        av_n(tournament.score_reward_per_level_upgrade),
    );
    item.insert(
        "rewarding_map".to_string(),
        av_i64_map(&tournament.rewarding_map),
    );
    item.insert("created_at".to_string(), av_time(tournament.created_at));
    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Tournament, AppError> {
    let unmarshal =
        |field: &str| AppError::new(ErrorCode::ObjectUnmarshal, format!("tournament item is missing {}", field));

    Ok(Tournament {
        tournament_id: extract_string(item, "tournament_id")
            .ok_or_else(|| unmarshal("tournament_id"))?,
        starts_at: extract_time(item, "starts_at").ok_or_else(|| unmarshal("starts_at"))?,
        ends_at: extract_time(item, "ends_at").ok_or_else(|| unmarshal("ends_at"))?,
        last_allowed_participation_date: extract_time(item, "last_allowed_participation_date")
            .ok_or_else(|| unmarshal("last_allowed_participation_date"))?,
        user_level_limit: extract_i64(item, "user_level_limit")
            .ok_or_else(|| unmarshal("user_level_limit"))?,
        group_size: extract_i64(item, "group_size").ok_or_else(|| unmarshal("group_size"))?,
        entrance_fee: extract_i64(item, "entrance_fee").ok_or_else(|| unmarshal("entrance_fee"))?,
        score_reward_per_level_upgrade: extract_i64(item, "score_reward_per_level_upgrade")
            .ok_or_else(|| unmarshal("score_reward_per_level_upgrade"))?,
        rewarding_map: extract_i64_map(item, "rewarding_map").unwrap_or_default(),
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
    })
}
