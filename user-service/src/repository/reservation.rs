use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Put, Update};
use chrono::Utc;

use common::database::attrs::{av_n, av_s, av_time, extract_i64, extract_string, extract_time};
use common::database::DynamoClient;
use common::errors::{AppError, ErrorCode};
use common::models::reservation::reservation_pk;
use common::models::tournament::tournament_pk;
use common::models::{Reservation, ReservationStatus};

use super::ReservationRepository;

pub struct DynamoReservationRepository {
    db: Arc<DynamoClient>,
}

impl DynamoReservationRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReservationRepository for DynamoReservationRepository {
    async fn get(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<Reservation>, AppError> {
        let result = self
            .db
            .raw()
            .get_item()
            .table_name(self.db.table())
            .key("PK", av_s(reservation_pk(user_id)))
            .key("SK", av_s(tournament_pk(tournament_id)))
            .send()
            .await
            .map_err(|err| AppError::wrap(ErrorCode::Database, "failed to get reservation", err))?;

        match result.item {
            Some(item) => Ok(Some(from_item(&item)?)),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool, AppError> {
        let update = self.status_update(user_id, tournament_id, from, to)?;

        let result = self
            .db
            .raw()
            .update_item()
            .table_name(self.db.table())
            .set_key(Some(update.key))
            .set_update_expression(Some(update.update_expression))
            .set_condition_expression(update.condition_expression)
            .set_expression_attribute_names(update.expression_attribute_names)
            .set_expression_attribute_values(update.expression_attribute_values)
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
                    "failed to update reservation status",
                    err,
                ))
            }
        }
    }

    fn create_put(&self, reservation: &Reservation) -> Result<Put, AppError> {
        Put::builder()
            .table_name(self.db.table())
            .set_item(Some(to_item(reservation)))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|err| {
                AppError::wrap(ErrorCode::Transaction, "failed to build reservation put", err)
            })
    }

    fn status_update(
        &self,
        user_id: &str,
        tournament_id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Update, AppError> {
        Update::builder()
            .table_name(self.db.table())
            .key("PK", av_s(reservation_pk(user_id)))
            .key("SK", av_s(tournament_pk(tournament_id)))
            .update_expression("SET #status = :to, updated_at = :now")
            .condition_expression("attribute_exists(PK) AND #status = :from")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":to", av_s(to.as_str()))
            .expression_attribute_values(":from", av_s(from.as_str()))
            .expression_attribute_values(":now", av_time(Utc::now()))
            .build()
            .map_err(|err| {
                AppError::wrap(
                    ErrorCode::Transaction,
                    "failed to build reservation status update",
                    err,
                )
            })
    }
}

fn to_item(reservation: &Reservation) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), av_s(reservation_pk(&reservation.user_id)));
    item.insert(
        "SK".to_string(),
        av_s(tournament_pk(&reservation.tournament_id)),
    );
    item.insert("user_id".to_string(), av_s(&reservation.user_id));
    item.insert("tournament_id".to_string(), av_s(&reservation.tournament_id));
    item.insert("amount".to_string(), av_n(reservation.amount));
    item.insert("status".to_string(), av_s(reservation.status.as_str()));
    item.insert("purpose".to_string(), av_s(&reservation.purpose));
    item.insert("created_at".to_string(), av_time(reservation.created_at));
    item.insert("updated_at".to_string(), av_time(reservation.updated_at));
    item
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Reservation, AppError> {
    let unmarshal = |field: &str| {
        AppError::new(
            ErrorCode::ObjectUnmarshal,
            format!("reservation item is missing {}", field),
        )
    };

    let status_raw = extract_string(item, "status").ok_or_else(|| unmarshal("status"))?;
    let status = ReservationStatus::parse(&status_raw).ok_or_else(|| {
        AppError::new(
            ErrorCode::ObjectUnmarshal,
            format!("unknown reservation status {}", status_raw),
        )
    })?;

    Ok(Reservation {
        user_id: extract_string(item, "user_id").ok_or_else(|| unmarshal("user_id"))?,
        tournament_id: extract_string(item, "tournament_id")
            .ok_or_else(|| unmarshal("tournament_id"))?,
        amount: extract_i64(item, "amount").ok_or_else(|| unmarshal("amount"))?,
        status,
        purpose: extract_string(item, "purpose").unwrap_or_default(),
        created_at: extract_time(item, "created_at").unwrap_or_else(Utc::now),
        updated_at: extract_time(item, "updated_at").unwrap_or_else(Utc::now),
    })
}
