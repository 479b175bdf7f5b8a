//! Multi-item transactional writes. The builder collects up to
//! [`TRANSACTION_ITEM_LIMIT`] put/update/delete operations which execute as a
//! single atomic `TransactWriteItems` call. A conditional-check failure on
//! any item aborts the whole batch; it surfaces as a CONFLICT error so
//! callers can map it to their domain ("group full", "insufficient coin").

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{Delete, Put, TransactWriteItem, Update};
use tracing::debug;

use super::DynamoClient;
use crate::errors::{AppError, ErrorCode};

pub const TRANSACTION_ITEM_LIMIT: usize = 100;

#[derive(Default, Debug)]
pub struct TransactionBuilder {
    items: Vec<TransactWriteItem>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_put(&mut self, put: Put) -> Result<&mut Self, AppError> {
        self.push(TransactWriteItem::builder().put(put).build())
    }

    pub fn add_update(&mut self, update: Update) -> Result<&mut Self, AppError> {
        self.push(TransactWriteItem::builder().update(update).build())
    }

    pub fn add_delete(&mut self, delete: Delete) -> Result<&mut Self, AppError> {
        self.push(TransactWriteItem::builder().delete(delete).build())
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    fn push(&mut self, item: TransactWriteItem) -> Result<&mut Self, AppError> {
        if self.items.len() >= TRANSACTION_ITEM_LIMIT {
            return Err(AppError::new(
                ErrorCode::Transaction,
                format!("transaction limit exceeded: {} items", TRANSACTION_ITEM_LIMIT),
            ));
        }
        self.items.push(item);
        Ok(self)
    }

    pub fn into_items(self) -> Result<Vec<TransactWriteItem>, AppError> {
        if self.items.is_empty() {
            return Err(AppError::new(
                ErrorCode::Transaction,
                "no items in transaction",
            ));
        }
        Ok(self.items)
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn execute(&self, builder: TransactionBuilder) -> Result<(), AppError>;
}

pub struct DynamoTransactionRepository {
    db: Arc<DynamoClient>,
}

impl DynamoTransactionRepository {
    pub fn new(db: Arc<DynamoClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionRepository for DynamoTransactionRepository {
    async fn execute(&self, builder: TransactionBuilder) -> Result<(), AppError> {
        let items = builder.into_items()?;
        let count = items.len();

        let result = self
            .db
            .raw()
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(items = count, "Transaction committed");
                Ok(())
            }
            Err(err) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(cancel)) =
                    err.as_service_error()
                {
                    let conditional = cancel
                        .cancellation_reasons()
                        .iter()
                        .any(|reason| reason.code() == Some("ConditionalCheckFailed"));
                    if conditional {
                        return Err(AppError::new(
                            ErrorCode::Conflict,
                            "transaction cancelled by a conditional check",
                        ));
                    }
                }
                let message = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .unwrap_or("failed to execute transaction")
                    .to_string();
                Err(AppError::wrap(ErrorCode::Transaction, message, err))
            }
        }
    }
}
