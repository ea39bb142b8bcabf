use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    PaymentMethod, RecurringInterval, Transaction, TransactionStatus, TransactionType,
};
use crate::services::aggregator::to_display_units;
use crate::services::NewTransaction;

/// Transaction as returned to clients, with the amount in display units.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub date: DateTime<Utc>,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    pub next_recurring_date: Option<DateTime<Utc>>,
    pub last_processed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.to_hex(),
            title: tx.title,
            description: tx.description,
            amount: to_display_units(tx.amount),
            transaction_type: tx.transaction_type,
            category: tx.category,
            payment_method: tx.payment_method,
            status: tx.status,
            receipt_url: tx.receipt_url,
            date: tx.date,
            is_recurring: tx.is_recurring,
            recurring_interval: tx.recurring_interval,
            next_recurring_date: tx.next_recurring_date,
            last_processed: tx.last_processed,
            created_at: tx.created_utc,
            updated_at: tx.updated_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkInsertRequest {
    pub transactions: Vec<NewTransaction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertResponse {
    pub inserted_count: u64,
}
