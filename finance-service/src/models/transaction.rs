use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::opt_chrono_datetime_as_bson_datetime;

/// Prefix given to the title of every materialised occurrence.
pub const RECURRING_TITLE_PREFIX: &str = "Recurring - ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurringInterval::Daily => write!(f, "DAILY"),
            RecurringInterval::Weekly => write!(f, "WEEKLY"),
            RecurringInterval::Monthly => write!(f, "MONTHLY"),
            RecurringInterval::Yearly => write!(f, "YEARLY"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    MobilePayment,
    AutoDebit,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// A single income or expense entry, or a recurring template when
/// `is_recurring` is set.
///
/// `amount` is held in minor units (cents) and is always positive; the
/// direction comes from `transaction_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
    #[serde(default, with = "opt_chrono_datetime_as_bson_datetime")]
    pub next_recurring_date: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_chrono_datetime_as_bson_datetime")]
    pub last_processed: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Transaction {
    /// A one-off transaction with no recurrence.
    pub fn new(
        user_id: ObjectId,
        title: String,
        amount: i64,
        transaction_type: TransactionType,
        category: String,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            title,
            description: None,
            amount,
            transaction_type,
            category,
            payment_method: PaymentMethod::default(),
            status: TransactionStatus::default(),
            receipt_url: None,
            date,
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
            last_processed: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Turn this transaction into a recurring template.
    pub fn with_recurrence(
        mut self,
        interval: RecurringInterval,
        next_recurring_date: DateTime<Utc>,
    ) -> Self {
        self.is_recurring = true;
        self.recurring_interval = Some(interval);
        self.next_recurring_date = Some(next_recurring_date);
        self
    }

    /// Drop every recurrence field so the transaction can never be picked up
    /// by the recurrence job.
    pub fn clear_recurrence(&mut self) {
        self.is_recurring = false;
        self.recurring_interval = None;
        self.next_recurring_date = None;
        self.last_processed = None;
    }

    /// Recurring templates carry an interval; one-off entries carry no next date.
    pub fn has_consistent_schedule(&self) -> bool {
        if self.is_recurring {
            self.recurring_interval.is_some()
        } else {
            self.next_recurring_date.is_none()
        }
    }

    /// The concrete occurrence of this template dated `occurred_at`.
    pub fn materialize(&self, occurred_at: DateTime<Utc>, now: DateTime<Utc>) -> Transaction {
        let mut instance = self.clone();
        instance.id = ObjectId::new();
        instance.title = format!("{}{}", RECURRING_TITLE_PREFIX, self.title);
        instance.date = occurred_at;
        instance.clear_recurrence();
        instance.created_utc = now;
        instance.updated_utc = now;
        instance
    }

    /// Copy offered to the user as a starting point for a new entry.
    pub fn duplicate(&self, now: DateTime<Utc>) -> Transaction {
        let mut copy = self.clone();
        copy.id = ObjectId::new();
        copy.title = format!("Duplicate - {}", self.title);
        copy.description = Some(match &self.description {
            Some(description) => format!("{} - (Duplicated)", description),
            None => "Duplicated Transaction".to_string(),
        });
        copy.clear_recurrence();
        copy.created_utc = now;
        copy.updated_utc = now;
        copy
    }
}
