//! Scheduled batch jobs and the calendar arithmetic they share.

pub mod dates;
pub mod recurrence;
pub mod report;
pub mod scheduler;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::services::error::ServiceError;
use crate::services::metrics::{record_job_records, record_job_run};
use crate::services::store::StoreError;

pub use recurrence::RecurrenceProcessor;
pub use report::ReportDeliveryProcessor;
pub use scheduler::Scheduler;

/// Outcome of one batch run. Counts are only meaningful when `success` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunSummary {
    pub success: bool,
    pub processed_count: u64,
    pub failed_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRunSummary {
    pub fn completed(processed_count: u64, failed_count: u64) -> Self {
        Self {
            success: true,
            processed_count,
            failed_count,
            error: None,
        }
    }

    pub fn aborted(error: impl ToString) -> Self {
        Self {
            success: false,
            processed_count: 0,
            failed_count: 0,
            error: Some(error.to_string()),
        }
    }

    pub(crate) fn record(&self, job: &str) {
        if self.success {
            record_job_run(job, "success");
            record_job_records(job, "processed", self.processed_count);
            record_job_records(job, "failed", self.failed_count);
        } else {
            record_job_run(job, "aborted");
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Record has no schedule: {0}")]
    MissingSchedule(String),

    #[error("Date out of range: {0}")]
    DateOverflow(String),

    #[error("Invalid schedule expression: {0}")]
    InvalidSchedule(String),

    #[error("Commit deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// A batch job the scheduler can trigger. `run` never fails; problems are
/// reported through the summary.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> JobRunSummary;
}

/// Run a unit of work under `deadline`.
pub(crate) async fn within_deadline<T, F>(deadline: Duration, unit: F) -> Result<T, JobError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, unit)
        .await
        .map_err(|_| JobError::DeadlineExceeded(deadline))?
        .map_err(JobError::from)
}
