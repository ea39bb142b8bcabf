//! Monthly report delivery.
//!
//! Every due setting gets exactly one audit row per run and its schedule is
//! always moved to the first of the following month, whatever the outcome.
//! A report is only retried when the unit of work itself failed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use crate::jobs::dates::{next_report_date, ReportWindow};
use crate::jobs::{within_deadline, JobError, JobRunSummary, ScheduledJob};
use crate::models::{Report, ReportSetting, ReportStatus};
use crate::services::clock::Clock;
use crate::services::mailer::ReportMailer;
use crate::services::reports::ReportService;
use crate::services::store::{FinanceStore, ReportOutcomeUnit};

pub const JOB_NAME: &str = "monthly_reports";

enum SettingOutcome {
    Recorded(ReportStatus),
    UserMissing,
}

pub struct ReportDeliveryProcessor {
    store: Arc<dyn FinanceStore>,
    clock: Arc<dyn Clock>,
    reports: Arc<ReportService>,
    mailer: Arc<ReportMailer>,
    commit_timeout: Duration,
}

impl ReportDeliveryProcessor {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        clock: Arc<dyn Clock>,
        reports: Arc<ReportService>,
        mailer: Arc<ReportMailer>,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            reports,
            mailer,
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

        let Some(window) = ReportWindow::previous_month(now) else {
            tracing::error!(now = %now, "Cannot compute report window");
            return JobRunSummary::aborted(JobError::DateOverflow(now.to_string()));
        };

        let mut due = match self.store.due_report_settings(now).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due report settings");
                return JobRunSummary::aborted(e);
            }
        };

        let mut processed = 0u64;
        let mut failed = 0u64;

        while let Some(next) = due.next().await {
            let setting = match next {
                Ok(setting) => setting,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        processed,
                        failed,
                        "Report settings cursor failed"
                    );
                    return JobRunSummary::aborted(e);
                }
            };

            match self.deliver(&setting, window, now).await {
                Ok(SettingOutcome::Recorded(status)) => {
                    processed += 1;
                    tracing::info!(
                        setting_id = %setting.id,
                        user_id = %setting.user_id,
                        status = %status,
                        "Report outcome recorded"
                    );
                }
                Ok(SettingOutcome::UserMissing) => {
                    tracing::warn!(
                        setting_id = %setting.id,
                        user_id = %setting.user_id,
                        "Skipping report for missing user"
                    );
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        setting_id = %setting.id,
                        user_id = %setting.user_id,
                        error = %e,
                        "Failed to process report setting"
                    );
                }
            }
        }

        tracing::info!(processed, failed, "Report run finished");
        JobRunSummary::completed(processed, failed)
    }

    async fn deliver(
        &self,
        setting: &ReportSetting,
        window: ReportWindow,
        now: DateTime<Utc>,
    ) -> Result<SettingOutcome, JobError> {
        let Some(user) = self.store.find_user(&setting.user_id).await? else {
            return Ok(SettingOutcome::UserMissing);
        };

        let generated = self
            .reports
            .generate(&user.id, window.from, window.to)
            .await?;

        let (status, period) = match generated {
            Some(report) => {
                let status = match self
                    .mailer
                    .send_report(&user, setting.frequency, &report)
                    .await
                {
                    Ok(_) => ReportStatus::Sent,
                    Err(e) => {
                        tracing::warn!(
                            setting_id = %setting.id,
                            error = %e,
                            "Report email not sent"
                        );
                        ReportStatus::Failed
                    }
                };
                (status, report.period)
            }
            None => (ReportStatus::NoActivity, window.label()),
        };

        let next = next_report_date(None, now)
            .ok_or_else(|| JobError::DateOverflow(now.to_string()))?;

        let unit = ReportOutcomeUnit {
            setting_id: setting.id,
            expected_next_report_date: setting.next_report_date,
            report: Report::new(user.id, period, status, now),
            last_sent_date: (status == ReportStatus::Sent).then_some(now),
            next_report_date: next,
            updated_at: now,
        };

        within_deadline(
            self.commit_timeout,
            self.store.commit_report_outcome(&unit, self.commit_timeout),
        )
        .await?;

        Ok(SettingOutcome::Recorded(status))
    }
}

#[async_trait]
impl ScheduledJob for ReportDeliveryProcessor {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> JobRunSummary {
        ReportDeliveryProcessor::run(self).await
    }
}
