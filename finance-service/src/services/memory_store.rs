//! In-process `FinanceStore` for tests and local runs without MongoDB.
//!
//! Units of work are applied to a staged copy and swapped in only when every
//! write succeeded, which gives the same all-or-nothing behaviour as a
//! MongoDB session transaction. Faults can be injected per record.

use crate::models::{Report, ReportSetting, Transaction, TransactionType, User};
use crate::services::store::{
    CategoryTotal, FinanceStore, Pagination, PeriodTotals, RecordStream, RecurrenceUnit,
    ReportOutcomeUnit, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mongodb::bson::oid::ObjectId;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const TOP_CATEGORY_LIMIT: usize = 5;

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    transactions: Vec<Transaction>,
    report_settings: Vec<ReportSetting>,
    reports: Vec<Report>,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    failing_transaction_updates: HashSet<ObjectId>,
    failing_setting_updates: HashSet<ObjectId>,
    failing_totals: HashSet<ObjectId>,
    commit_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults().unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    async fn delay_commit(&self) {
        let delay = self.faults().commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn add_user(&self, user: User) {
        self.state().users.push(user);
    }

    pub fn remove_user(&self, user_id: &ObjectId) {
        self.state().users.retain(|u| &u.id != user_id);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().transactions.clone()
    }

    pub fn transaction(&self, id: &ObjectId) -> Option<Transaction> {
        self.state()
            .transactions
            .iter()
            .find(|t| &t.id == id)
            .cloned()
    }

    pub fn report_settings(&self) -> Vec<ReportSetting> {
        self.state().report_settings.clone()
    }

    pub fn report_setting(&self, id: &ObjectId) -> Option<ReportSetting> {
        self.state()
            .report_settings
            .iter()
            .find(|s| &s.id == id)
            .cloned()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state().reports.clone()
    }

    /// Every call fails as if the database could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// The schedule update for this transaction fails inside its unit of work.
    pub fn fail_transaction_update(&self, transaction_id: ObjectId) {
        self.faults().failing_transaction_updates.insert(transaction_id);
    }

    /// The schedule update for this report setting fails inside its unit of work.
    pub fn fail_setting_update(&self, setting_id: ObjectId) {
        self.faults().failing_setting_updates.insert(setting_id);
    }

    /// Period totals for this user fail.
    pub fn fail_totals_for(&self, user_id: ObjectId) {
        self.faults().failing_totals.insert(user_id);
    }

    /// Every commit waits this long before applying its writes.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults().commit_delay = delay;
    }
}

fn snapshot_stream<T: Send + 'static>(items: Vec<T>) -> RecordStream<T> {
    futures::stream::iter(items.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl FinanceStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn find_user(&self, user_id: &ObjectId) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.state().users.iter().find(|u| &u.id == user_id).cloned())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.check_available()?;
        self.state().transactions.push(transaction.clone());
        Ok(())
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError> {
        self.check_available()?;
        self.state()
            .transactions
            .extend(transactions.iter().cloned());
        Ok(transactions.len() as u64)
    }

    async fn find_transaction(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
    ) -> Result<Option<Transaction>, StoreError> {
        self.check_available()?;
        Ok(self
            .state()
            .transactions
            .iter()
            .find(|t| &t.id == transaction_id && &t.user_id == user_id)
            .cloned())
    }

    async fn replace_transaction(&self, transaction: &Transaction) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        match state
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction.id && t.user_id == transaction.user_id)
        {
            Some(existing) => {
                *existing = transaction.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_transactions(
        &self,
        user_id: &ObjectId,
        transaction_ids: &[ObjectId],
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        let before = state.transactions.len();
        state
            .transactions
            .retain(|t| !(&t.user_id == user_id && transaction_ids.contains(&t.id)));
        Ok((before - state.transactions.len()) as u64)
    }

    async fn due_recurring_transactions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<Transaction>, StoreError> {
        self.check_available()?;
        let due: Vec<Transaction> = self
            .state()
            .transactions
            .iter()
            .filter(|t| t.is_recurring && t.next_recurring_date.is_some_and(|next| next <= now))
            .cloned()
            .collect();
        Ok(snapshot_stream(due))
    }

    async fn commit_recurrence(
        &self,
        unit: &RecurrenceUnit,
        _deadline: Duration,
    ) -> Result<(), StoreError> {
        self.delay_commit().await;
        self.check_available()?;
        let update_fails = self
            .faults()
            .failing_transaction_updates
            .contains(&unit.source_id);

        let mut state = self.state();
        let mut staged = state.transactions.clone();
        staged.push(unit.instance.clone());

        if update_fails {
            return Err(StoreError::Unavailable(format!(
                "update of transaction {} rejected",
                unit.source_id
            )));
        }

        let source = staged
            .iter_mut()
            .find(|t| {
                t.id == unit.source_id
                    && t.is_recurring
                    && t.next_recurring_date == Some(unit.expected_next_date)
            })
            .ok_or_else(|| {
                StoreError::StaleRecord(format!(
                    "transaction {} was already advanced",
                    unit.source_id
                ))
            })?;
        source.next_recurring_date = Some(unit.next_recurring_date);
        source.last_processed = Some(unit.processed_at);
        source.updated_utc = unit.processed_at;

        state.transactions = staged;
        Ok(())
    }

    async fn period_totals(
        &self,
        user_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PeriodTotals, StoreError> {
        self.check_available()?;
        if self.faults().failing_totals.contains(user_id) {
            return Err(StoreError::Unavailable(format!(
                "aggregation for user {} rejected",
                user_id
            )));
        }

        let state = self.state();
        let mut totals = PeriodTotals::default();
        for tx in state
            .transactions
            .iter()
            .filter(|t| &t.user_id == user_id && from <= t.date && t.date <= to)
        {
            let amount = tx.amount.abs();
            match tx.transaction_type {
                TransactionType::Income => totals.income += amount,
                TransactionType::Expense => {
                    totals.expenses += amount;
                    match totals
                        .expense_categories
                        .iter_mut()
                        .find(|c| c.category == tx.category)
                    {
                        Some(category) => category.total += amount,
                        None => totals.expense_categories.push(CategoryTotal {
                            category: tx.category.clone(),
                            total: amount,
                        }),
                    }
                }
            }
        }

        // Stable sort: ties keep first-seen order.
        totals
            .expense_categories
            .sort_by(|a, b| b.total.cmp(&a.total));
        totals.expense_categories.truncate(TOP_CATEGORY_LIMIT);
        Ok(totals)
    }

    async fn find_report_setting(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<ReportSetting>, StoreError> {
        self.check_available()?;
        Ok(self
            .state()
            .report_settings
            .iter()
            .find(|s| &s.user_id == user_id)
            .cloned())
    }

    async fn insert_report_setting(&self, setting: &ReportSetting) -> Result<(), StoreError> {
        self.check_available()?;
        self.state().report_settings.push(setting.clone());
        Ok(())
    }

    async fn replace_report_setting(&self, setting: &ReportSetting) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        match state.report_settings.iter_mut().find(|s| s.id == setting.id) {
            Some(existing) => {
                *existing = setting.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn due_report_settings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<ReportSetting>, StoreError> {
        self.check_available()?;
        let due: Vec<ReportSetting> = self
            .state()
            .report_settings
            .iter()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        Ok(snapshot_stream(due))
    }

    async fn commit_report_outcome(
        &self,
        unit: &ReportOutcomeUnit,
        _deadline: Duration,
    ) -> Result<(), StoreError> {
        self.delay_commit().await;
        self.check_available()?;
        let update_fails = self
            .faults()
            .failing_setting_updates
            .contains(&unit.setting_id);

        let mut state = self.state();
        let mut staged_reports = state.reports.clone();
        staged_reports.push(unit.report.clone());

        if update_fails {
            return Err(StoreError::Unavailable(format!(
                "update of report setting {} rejected",
                unit.setting_id
            )));
        }

        let mut staged_settings = state.report_settings.clone();
        let setting = staged_settings
            .iter_mut()
            .find(|s| {
                s.id == unit.setting_id && s.next_report_date == unit.expected_next_report_date
            })
            .ok_or_else(|| {
                StoreError::StaleRecord(format!(
                    "report setting {} was already advanced",
                    unit.setting_id
                ))
            })?;
        setting.last_sent_date = unit.last_sent_date;
        setting.next_report_date = Some(unit.next_report_date);
        setting.updated_utc = unit.updated_at;

        state.reports = staged_reports;
        state.report_settings = staged_settings;
        Ok(())
    }

    async fn list_reports(
        &self,
        user_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<(Vec<Report>, u64), StoreError> {
        self.check_available()?;
        let mut reports: Vec<Report> = self
            .state()
            .reports
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));

        let total = reports.len() as u64;
        let page = reports
            .into_iter()
            .skip(pagination.skip() as usize)
            .take(pagination.page_size as usize)
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurringInterval, ReportStatus};
    use chrono::TimeZone;
    use futures::TryStreamExt;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn expense(user_id: ObjectId, category: &str, amount: i64, date: DateTime<Utc>) -> Transaction {
        Transaction::new(
            user_id,
            category.to_string(),
            amount,
            TransactionType::Expense,
            category.to_string(),
            date,
            date,
        )
    }

    #[tokio::test]
    async fn test_due_recurring_transactions_filters_by_date() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        let now = at(2024, 3, 1);
        let due = expense(user, "rent", 100, at(2024, 2, 1))
            .with_recurrence(RecurringInterval::Monthly, at(2024, 3, 1));
        let later = expense(user, "gym", 100, at(2024, 2, 1))
            .with_recurrence(RecurringInterval::Monthly, at(2024, 3, 2));
        let one_off = expense(user, "food", 100, at(2024, 2, 1));
        store.insert_transactions(&[due.clone(), later, one_off]).await.unwrap();

        let found: Vec<Transaction> = store
            .due_recurring_transactions(now)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(found, vec![due]);
    }

    #[tokio::test]
    async fn test_period_totals_respects_range_and_owner() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        let other = ObjectId::new();
        store
            .insert_transactions(&[
                expense(user, "food", 3_000, at(2024, 2, 10)),
                expense(user, "food", 1_000, at(2024, 2, 11)),
                expense(user, "travel", 2_000, at(2024, 2, 12)),
                expense(user, "food", 9_999, at(2024, 3, 1)),
                expense(other, "food", 9_999, at(2024, 2, 10)),
            ])
            .await
            .unwrap();

        let totals = store
            .period_totals(&user, at(2024, 2, 1), at(2024, 2, 29))
            .await
            .unwrap();

        assert_eq!(totals.income, 0);
        assert_eq!(totals.expenses, 6_000);
        assert_eq!(totals.expense_categories[0].category, "food");
        assert_eq!(totals.expense_categories[0].total, 4_000);
        assert_eq!(totals.expense_categories[1].category, "travel");
    }

    #[tokio::test]
    async fn test_failed_report_unit_leaves_no_report_behind() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        let now = at(2024, 3, 1);
        let setting = ReportSetting::new(user, now, now);
        store.insert_report_setting(&setting).await.unwrap();
        store.fail_setting_update(setting.id);

        let unit = ReportOutcomeUnit {
            setting_id: setting.id,
            expected_next_report_date: setting.next_report_date,
            report: Report::new(user, "February 1 - 29, 2024".to_string(), ReportStatus::Sent, now),
            last_sent_date: Some(now),
            next_report_date: at(2024, 4, 1),
            updated_at: now,
        };

        let result = store.commit_report_outcome(&unit, Duration::from_secs(1)).await;
        assert!(result.is_err());
        assert!(store.reports().is_empty());
        assert_eq!(store.report_setting(&setting.id), Some(setting));
    }

    #[tokio::test]
    async fn test_list_reports_newest_first() {
        let store = MemoryStore::new();
        let user = ObjectId::new();
        {
            let mut state = store.state();
            for month in 1..=3 {
                state.reports.push(Report::new(
                    user,
                    format!("month {}", month),
                    ReportStatus::Sent,
                    at(2024, month, 1),
                ));
            }
        }

        let (page, total) = store.list_reports(&user, Pagination::new(2, 1)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].period, "month 3");
        assert_eq!(page[1].period, "month 2");

        let (page, _) = store.list_reports(&user, Pagination::new(2, 2)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].period, "month 1");
    }
}
