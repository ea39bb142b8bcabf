//! User-driven transaction operations.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use crate::jobs::dates::next_occurrence;
use crate::models::{PaymentMethod, RecurringInterval, Transaction, TransactionType};
use crate::services::aggregator::to_minor_units;
use crate::services::error::ServiceError;
use crate::services::store::FinanceStore;

pub const MAX_BULK_INSERT: usize = 300;
/// Largest accepted amount in display units.
const MAX_AMOUNT: i64 = 1_000_000_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display units.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransaction {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub category: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub date: Option<DateTime<Utc>>,
    pub is_recurring: Option<bool>,
    pub recurring_interval: Option<RecurringInterval>,
}

fn validate_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<i64, ServiceError> {
    if amount <= Decimal::ZERO || amount > Decimal::from(MAX_AMOUNT) {
        return Err(ServiceError::Validation(format!(
            "amount must be greater than 0 and at most {}",
            MAX_AMOUNT
        )));
    }
    to_minor_units(amount).ok_or_else(|| {
        ServiceError::Validation("amount must have at most two decimal places".to_string())
    })
}

/// First due date for a new schedule, never in the past.
fn initial_next_date(
    anchor: DateTime<Utc>,
    interval: RecurringInterval,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ServiceError> {
    let overflow = || ServiceError::Validation("recurrence date out of range".to_string());
    let next = next_occurrence(anchor, interval).ok_or_else(overflow)?;
    if next < now {
        return next_occurrence(now, interval).ok_or_else(overflow);
    }
    Ok(next)
}

pub struct TransactionService {
    store: Arc<dyn FinanceStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    fn build(
        user_id: ObjectId,
        input: NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, ServiceError> {
        validate_text("title", &input.title)?;
        validate_text("category", &input.category)?;
        let amount = validate_amount(input.amount)?;

        let mut transaction = Transaction::new(
            user_id,
            input.title,
            amount,
            input.transaction_type,
            input.category,
            input.date,
            now,
        );
        transaction.description = input.description;
        transaction.receipt_url = input.receipt_url;
        transaction.payment_method = input.payment_method.unwrap_or_default();
        Ok(transaction)
    }

    #[tracing::instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: ObjectId,
        input: NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, ServiceError> {
        let recurrence = match (input.is_recurring, input.recurring_interval) {
            (false, _) => None,
            (true, Some(interval)) => Some(interval),
            (true, None) => {
                return Err(ServiceError::Validation(
                    "recurring transactions need an interval".to_string(),
                ))
            }
        };
        let date = input.date;

        let mut transaction = Self::build(user_id, input, now)?;
        if let Some(interval) = recurrence {
            let next = initial_next_date(date, interval, now)?;
            transaction = transaction.with_recurrence(interval, next);
        }

        self.store.insert_transaction(&transaction).await?;
        tracing::info!(transaction_id = %transaction.id, "Transaction created");
        Ok(transaction)
    }

    pub async fn get(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
    ) -> Result<Transaction, ServiceError> {
        self.store
            .find_transaction(user_id, transaction_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))
    }

    #[tracing::instrument(
        skip(self, changes),
        fields(user_id = %user_id, transaction_id = %transaction_id)
    )]
    pub async fn update(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
        changes: UpdateTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, ServiceError> {
        let mut transaction = self.get(user_id, transaction_id).await?;

        if let Some(title) = changes.title {
            validate_text("title", &title)?;
            transaction.title = title;
        }
        if let Some(category) = changes.category {
            validate_text("category", &category)?;
            transaction.category = category;
        }
        if let Some(amount) = changes.amount {
            transaction.amount = validate_amount(amount)?;
        }
        if let Some(description) = changes.description {
            transaction.description = Some(description);
        }
        if let Some(transaction_type) = changes.transaction_type {
            transaction.transaction_type = transaction_type;
        }
        if let Some(payment_method) = changes.payment_method {
            transaction.payment_method = payment_method;
        }
        if let Some(date) = changes.date {
            transaction.date = date;
        }

        let is_recurring = changes.is_recurring.unwrap_or(transaction.is_recurring);
        let interval = changes.recurring_interval.or(transaction.recurring_interval);
        match (is_recurring, interval) {
            (false, _) => transaction.clear_recurrence(),
            (true, Some(interval)) => {
                let next = initial_next_date(now, interval, now)?;
                transaction.is_recurring = true;
                transaction.recurring_interval = Some(interval);
                transaction.next_recurring_date = Some(next);
            }
            (true, None) => {
                return Err(ServiceError::Validation(
                    "recurring transactions need an interval".to_string(),
                ))
            }
        }
        transaction.updated_utc = now;

        if !self.store.replace_transaction(&transaction).await? {
            return Err(ServiceError::NotFound("Transaction not found".to_string()));
        }
        Ok(transaction)
    }

    pub async fn duplicate(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, ServiceError> {
        let original = self.get(user_id, transaction_id).await?;
        let copy = original.duplicate(now);
        self.store.insert_transaction(&copy).await?;
        Ok(copy)
    }

    pub async fn delete(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
    ) -> Result<(), ServiceError> {
        let deleted = self
            .store
            .delete_transactions(user_id, std::slice::from_ref(transaction_id))
            .await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("Transaction not found".to_string()));
        }
        Ok(())
    }

    /// Returns how many of `transaction_ids` were deleted.
    pub async fn bulk_delete(
        &self,
        user_id: &ObjectId,
        transaction_ids: &[ObjectId],
    ) -> Result<u64, ServiceError> {
        if transaction_ids.is_empty() {
            return Err(ServiceError::Validation(
                "at least one transaction id is required".to_string(),
            ));
        }
        let deleted = self
            .store
            .delete_transactions(user_id, transaction_ids)
            .await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("No transaction found".to_string()));
        }
        Ok(deleted)
    }

    /// Imports one-off transactions. Recurrence flags on the input are ignored.
    #[tracing::instrument(skip(self, items), fields(user_id = %user_id, count = items.len()))]
    pub async fn bulk_insert(
        &self,
        user_id: ObjectId,
        items: Vec<NewTransaction>,
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        if items.is_empty() || items.len() > MAX_BULK_INSERT {
            return Err(ServiceError::Validation(format!(
                "between 1 and {} transactions can be imported at once",
                MAX_BULK_INSERT
            )));
        }

        let transactions = items
            .into_iter()
            .map(|item| Self::build(user_id, item, now))
            .collect::<Result<Vec<_>, _>>()?;

        let inserted = self.store.insert_transactions(&transactions).await?;
        tracing::info!(inserted, "Transactions imported");
        Ok(inserted)
    }
}
