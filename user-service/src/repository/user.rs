use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, Update};
use chrono::Utc;

use common::database::attrs::{av_n, av_s, av_time, extract_i64, extract_string, extract_time};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::user::{profile_sk, user_pk};
use common::models::User;

use super::UserRepository;

pub struct DynamoUserRepository {
    db: Arc<DynamoClient>,
}

impl DynamoUserRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for DynamoUserRepository {
    async fn create(&self, user: &User) -> Result<(), AppError> {
        let result = self
            .db
            .raw()
            .put_item()
            .table_name(self.db.table())
            .set_item(Some(to_item(user)))
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
                        format!("user {} already exists", user.user_id),
                    ));
                }
                Err(AppError::wrap(ErrorCode::Database, "failed to create user", err))
            }
        }
    }

    async fn get_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let result = self
            .db
            .raw()
            .get_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(profile_sk()))
            .send()
            .await
            .map_err(|err| AppError::wrap(ErrorCode::Database, "failed to get user", err))?;

        match result.item {
            Some(item) => Ok(Some(from_item(&item)?)),
            None => Ok(None),
        }
    }

    async fn update_level_progress(
        &self,
        user_id: &str,
        level_increase: i64,
        coin_reward: i64,
    ) -> Result<User, AppError> {
        let result = self
            .db
            .raw()
            .update_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(profile_sk()))
            .update_expression("ADD #level :level_inc, coin :coin_inc SET updated_at = :now")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_names("#level", "level")
            .expression_attribute_values(":level_inc", av_n(level_increase))
            .expression_attribute_values(":coin_inc", av_n(coin_reward))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => {
                let attrs = output.attributes.ok_or_else(|| {
                    AppError::new(ErrorCode::Database, "update returned no attributes")
                })?;
                from_item(&attrs)
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_conditional_check_failed_exception())
                {
                    return Err(AppError::not_found(format!("user {} not found", user_id)));
                }
                Err(AppError::wrap(
                    ErrorCode::Database,
                    "failed to update level progress",
                    err,
                ))
            }
        }
    }

    async fn add_coin(&self, user_id: &str, coin: i64) -> Result<(), AppError> {
        self.db
            .raw()
            .update_item()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(profile_sk()))
            .update_expression("SET coin = coin + :amount, updated_at = :now")
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(":amount", av_n(coin))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .send()
            .await
            .map_err(|err| AppError::wrap(ErrorCode::Database, "failed to add coin", err))?;

        Ok(())
    }

    fn coin_deduction_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError> {
        Update::builder()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(profile_sk()))
            .update_expression("SET coin = coin - :amount, updated_at = :now")
            .condition_expression("coin >= :amount")
            .expression_attribute_values(":amount", av_n(amount))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .build()
            .map_err(|err| {
                AppError::wrap(ErrorCode::Transaction, "failed to build coin deduction", err)
            })
    }

    fn coin_addition_update(&self, user_id: &str, amount: i64) -> Result<Update, AppError> {
        Update::builder()
            .table_name(self.db.table())
            .key("PK", av_s(user_pk(user_id)))
            .key("SK", av_s(profile_sk()))
            .update_expression("SET coin = coin + :amount, updated_at = :now")
            .expression_attribute_values(":amount", av_n(amount))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .build()
            .map_err(|err| {
                AppError::wrap(ErrorCode::Transaction, "failed to build coin addition", err)
            })
    }
}

fn to_item(user: &User) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(user_pk(&user.user_id)));
    item.insert("SK".to_string(), av_s(profile_sk()));
    item.insert("user_id".to_string(), av_s(&user.user_id));
    item.insert("display_name".to_string(), av_s(&user.display_name));
    item.insert("level".to_string(), av_n(user.level));
    item.insert("coin".to_string(), av_n(user.coin));
    item.insert("created_at".to_string(), av_time(user.created_at));
    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<User, AppError> {
    let unmarshal =
        |field: &str| AppError::new(ErrorCode::ObjectUnmarshal, format!("user item is missing {}", field));

    Ok(User {
        user_id: extract_string(item, "user_id").ok_or_else(|| unmarshal("user_id"))?,
        display_name: extract_string(item, "display_name")
            .ok_or_else(|| unmarshal("display_name"))?,
        level: extract_i64(item, "level").ok_or_else(|| unmarshal("level"))?,
        coin: extract_i64(item, "coin").ok_or_else(|| unmarshal("coin"))?,
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
    })
}
