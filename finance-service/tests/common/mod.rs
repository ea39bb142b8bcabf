#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use finance_service::config::SchedulerConfig;
use finance_service::models::{RecurringInterval, Transaction, TransactionType, User};
use finance_service::services::{FixedClock, MemoryStore, MockEmailProvider, MockTextProvider};
use finance_service::startup::AppState;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

pub const INSIGHTS_REPLY: &str = "```json\n[\"Rent is your largest expense\"]\n```";

/// Services and processors wired to an in-memory store and mock providers.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub email: Arc<MockEmailProvider>,
    pub text: Arc<MockTextProvider>,
    pub state: AppState,
}

impl TestHarness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_providers(
            now,
            MockTextProvider::replying(INSIGHTS_REPLY),
            MockEmailProvider::new(true),
        )
    }

    pub fn with_providers(
        now: DateTime<Utc>,
        text: MockTextProvider,
        email: MockEmailProvider,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let email = Arc::new(email);
        let text = Arc::new(text);

        let state = AppState::new(
            store.clone(),
            clock.clone(),
            text.clone(),
            email.clone(),
            &SchedulerConfig::default(),
        );

        Self {
            store,
            clock,
            email,
            text,
            state,
        }
    }

    pub fn add_user(&self, name: &str) -> User {
        let user = User {
            id: ObjectId::new(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        };
        self.store.add_user(user.clone());
        user
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn entry(
    user_id: ObjectId,
    transaction_type: TransactionType,
    category: &str,
    amount: i64,
    date: DateTime<Utc>,
) -> Transaction {
    Transaction::new(
        user_id,
        category.to_string(),
        amount,
        transaction_type,
        category.to_string(),
        date,
        date,
    )
}

pub fn recurring(
    user_id: ObjectId,
    title: &str,
    amount: i64,
    interval: RecurringInterval,
    next_recurring_date: DateTime<Utc>,
) -> Transaction {
    Transaction::new(
        user_id,
        title.to_string(),
        amount,
        TransactionType::Expense,
        "bills".to_string(),
        next_recurring_date,
        next_recurring_date,
    )
    .with_recurrence(interval, next_recurring_date)
}
