//! Persistence seam shared by the services and the scheduled jobs.
//!
//! `FinanceDb` implements it against MongoDB; `MemoryStore` keeps everything
//! in process for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Report, ReportSetting, Transaction, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The source record no longer holds the schedule the unit was built
    /// from; another run already advanced it.
    #[error("Stale record: {0}")]
    StaleRecord(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Lazy sequence of due records. Each call opens a fresh cursor.
pub type RecordStream<T> = BoxStream<'static, Result<T, StoreError>>;

/// Writes for one due recurring transaction: the materialised occurrence and
/// the advanced schedule of its source. Committed together or not at all.
#[derive(Debug, Clone)]
pub struct RecurrenceUnit {
    pub source_id: ObjectId,
    /// `next_recurring_date` as read by the cursor.
    pub expected_next_date: DateTime<Utc>,
    pub instance: Transaction,
    pub next_recurring_date: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// Writes for one due report setting: the appended audit row and the
/// setting's new schedule. Committed together or not at all.
#[derive(Debug, Clone)]
pub struct ReportOutcomeUnit {
    pub setting_id: ObjectId,
    /// `next_report_date` as read by the cursor.
    pub expected_next_report_date: Option<DateTime<Utc>>,
    pub report: Report,
    pub last_sent_date: Option<DateTime<Utc>>,
    pub next_report_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw sums for one user over a date range, in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub income: i64,
    pub expenses: i64,
    /// Expense totals per category, largest first.
    pub expense_categories: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u64,
    pub page_number: u64,
}

impl Pagination {
    pub fn new(page_size: u64, page_number: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            page_number: page_number.max(1),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page_number - 1) * self.page_size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(20, 1)
    }
}

#[async_trait]
pub trait FinanceStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user(&self, user_id: &ObjectId) -> Result<Option<User>, StoreError>;

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Inserts in order and returns how many were written.
    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError>;

    async fn find_transaction(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Returns false when no transaction with that id and owner exists.
    async fn replace_transaction(&self, transaction: &Transaction) -> Result<bool, StoreError>;

    async fn delete_transactions(
        &self,
        user_id: &ObjectId,
        transaction_ids: &[ObjectId],
    ) -> Result<u64, StoreError>;

    /// Recurring transactions whose `next_recurring_date <= now`.
    async fn due_recurring_transactions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<Transaction>, StoreError>;

    async fn commit_recurrence(
        &self,
        unit: &RecurrenceUnit,
        deadline: Duration,
    ) -> Result<(), StoreError>;

    /// Sums over transactions dated within `[from, to]`.
    async fn period_totals(
        &self,
        user_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PeriodTotals, StoreError>;

    async fn find_report_setting(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<ReportSetting>, StoreError>;

    async fn insert_report_setting(&self, setting: &ReportSetting) -> Result<(), StoreError>;

    async fn replace_report_setting(&self, setting: &ReportSetting) -> Result<bool, StoreError>;

    /// Enabled settings whose `next_report_date <= now`.
    async fn due_report_settings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<ReportSetting>, StoreError>;

    async fn commit_report_outcome(
        &self,
        unit: &ReportOutcomeUnit,
        deadline: Duration,
    ) -> Result<(), StoreError>;

    /// Newest first, with the total number of reports for the user.
    async fn list_reports(
        &self,
        user_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<(Vec<Report>, u64), StoreError>;
}
