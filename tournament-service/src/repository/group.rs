use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Update};

use common::database::attrs::{av_n, av_s, av_time, extract_i64, extract_string, extract_time};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::group::{group_sk, group_sk_prefix};
use common::models::tournament::tournament_pk;
use common::models::Group;
use chrono::Utc;

use super::GroupRepository;

pub struct DynamoGroupRepository {
    db: Arc<DynamoClient>,
}

impl DynamoGroupRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GroupRepository for DynamoGroupRepository {
    async fn create(&self, group: &Group) -> Result<(), AppError> {
        let result = self
            .db
            .raw()
            .put_item()
            .table_name(self.db.table())
            .set_item(Some(to_item(group)))
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
                        format!("group {} already exists", group.group_id),
                    ));
                }
                Err(AppError::wrap(ErrorCode::Database, "failed to create group", err))
            }
        }
    }

    async fn find_available(&self, tournament_id: &str) -> Result<Option<Group>, AppError> {
        let result = self
            .db
            .raw()
            .query()
            .table_name(self.db.table())
            .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
            .filter_expression("participant_count < group_size")
            .expression_attribute_values(":pk", av_s(tournament_pk(tournament_id)))
            .expression_attribute_values(":prefix", av_s(group_sk_prefix()))
            .send()
            .await
            .map_err(|err| {
                AppError::wrap(ErrorCode::Database, "failed to query available groups", err)
            })?;

        match result.items().first() {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    fn add_participant_update(
        &self,
        tournament_id: &str,
        group_id: &str,
    ) -> Result<Update, AppError> {
        Update::builder()
            .table_name(self.db.table())
            .key("PK", av_s(tournament_pk(tournament_id)))
            .key("SK", av_s(group_sk(group_id)))
            .update_expression(
                "SET participant_count = if_not_exists(participant_count, :zero) + :one",
            )
            .condition_expression("attribute_exists(PK) AND participant_count < group_size")
            .expression_attribute_values(":zero", av_n(0))
            .expression_attribute_values(":one", av_n(1))
            .build()
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::Transaction,
                    "failed to build group participant update",
                    err,
                )
            })
    }
}

fn to_item(group: &Group) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(tournament_pk(&group.tournament_id)));
    item.insert("SK".to_string(), av_s(group_sk(&group.group_id)));
    item.insert("group_id".to_string(), av_s(&group.group_id));
    item.insert("tournament_id".to_string(), av_s(&group.tournament_id));
    item.insert("group_size".to_string(), av_n(group.group_size));
    item.insert("participant_count".to_string(), av_n(group.participant_count));
    item.insert("created_at".to_string(), av_time(group.created_at));
    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Group, AppError> {
    let unmarshal =
        |field: &str| AppError::new(ErrorCode::ObjectUnmarshal, format!("group item is missing {}", field));

    Ok(Group {
        group_id: extract_string(item, "group_id").ok_or_else(|| unmarshal("group_id"))?,
        tournament_id: extract_string(item, "tournament_id")
            .ok_or_else(|| unmarshal("tournament_id"))?,
        group_size: extract_i64(item, "group_size").ok_or_else(|| unmarshal("group_size"))?,
        participant_count: extract_i64(item, "participant_count").unwrap_or(0),
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
    })
}
