//! Materialises due recurring transactions.
//!
//! Each due template yields exactly one occurrence per run, dated at its
//! current `next_recurring_date`, and its schedule moves forward by one
//! interval. Templates that fell several periods behind catch up one period
//! per run; missed periods are not back-filled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use crate::jobs::dates::next_occurrence;
use crate::jobs::{within_deadline, JobError, JobRunSummary, ScheduledJob};
use crate::models::Transaction;
use crate::services::clock::Clock;
use crate::services::store::{FinanceStore, RecurrenceUnit};

pub const JOB_NAME: &str = "recurring_transactions";

pub struct RecurrenceProcessor {
    store: Arc<dyn FinanceStore>,
    clock: Arc<dyn Clock>,
    commit_timeout: Duration,
}

impl RecurrenceProcessor {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        clock: Arc<dyn Clock>,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            commit_timeout,
        }
    }

    pub async fn run(&self) -> JobRunSummary {
        let summary = self.process_due().await;
        summary.record(JOB_NAME);
        summary
    }

    async fn process_due(&self) -> JobRunSummary {
        let now = self.clock.now();

        let mut due = match self.store.due_recurring_transactions(now).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due recurring transactions");
                return JobRunSummary::aborted(e);
            }
        };

        let mut processed = 0u64;
        let mut failed = 0u64;

        while let Some(next) = due.next().await {
            let transaction = match next {
                Ok(transaction) => transaction,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        processed,
                        failed,
                        "Recurring transaction cursor failed"
                    );
                    return JobRunSummary::aborted(e);
                }
            };

            match self.materialize(&transaction, now).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        transaction_id = %transaction.id,
                        user_id = %transaction.user_id,
                        error = %e,
                        "Failed to process recurring transaction"
                    );
                }
            }
        }

        tracing::info!(processed, failed, "Recurring transactions run finished");
        JobRunSummary::completed(processed, failed)
    }

    async fn materialize(
        &self,
        template: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        let schedule = (template.next_recurring_date, template.recurring_interval);
        let (due_date, interval) = match schedule {
            (Some(due_date), Some(interval)) => (due_date, interval),
            _ => return Err(JobError::MissingSchedule(template.id.to_hex())),
        };
        let next_recurring_date = next_occurrence(due_date, interval)
            .ok_or_else(|| JobError::DateOverflow(format!("{} + {}", due_date, interval)))?;

        let unit = RecurrenceUnit {
            source_id: template.id,
            expected_next_date: due_date,
            instance: template.materialize(due_date, now),
            next_recurring_date,
            processed_at: now,
        };

        within_deadline(
            self.commit_timeout,
            self.store.commit_recurrence(&unit, self.commit_timeout),
        )
        .await?;

        tracing::debug!(
            transaction_id = %template.id,
            instance_id = %unit.instance.id,
            next_recurring_date = %next_recurring_date,
            "Recurring transaction materialised"
        );
        Ok(())
    }
}

#[async_trait]
impl ScheduledJob for RecurrenceProcessor {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> JobRunSummary {
        RecurrenceProcessor::run(self).await
    }
}
