//! Cron-driven trigger for scheduled jobs.
//!
//! Each job runs on its own task. The next fire time is computed only after a
//! run returns, so a job never overlaps with itself; fire times missed while
//! a run was in progress are skipped.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::jobs::{JobError, ScheduledJob};

struct ScheduledEntry {
    schedule: Schedule,
    job: Arc<dyn ScheduledJob>,
}

pub struct Scheduler {
    entries: Vec<ScheduledEntry>,
    shutdown_token: CancellationToken,
}

/// Parse a six-field cron expression (seconds first), evaluated in UTC.
pub fn parse_schedule(expression: &str) -> Result<Schedule, JobError> {
    Schedule::from_str(expression)
        .map_err(|e| JobError::InvalidSchedule(format!("{}: {}", expression, e)))
}

pub fn next_fire_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn add_job(
        &mut self,
        expression: &str,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<(), JobError> {
        let schedule = parse_schedule(expression)?;
        tracing::info!(job = job.name(), schedule = %expression, "Job scheduled");
        self.entries.push(ScheduledEntry { schedule, job });
        Ok(())
    }

    pub fn job_count(&self) -> usize {
        self.entries.len()
    }

    /// Spawn one task per job. Tasks exit once `shutdown` is called.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.entries
            .iter()
            .map(|entry| {
                let schedule = entry.schedule.clone();
                let job = entry.job.clone();
                let shutdown = self.shutdown_token.clone();
                tokio::spawn(run_job_loop(schedule, job, shutdown))
            })
            .collect()
    }

    pub fn shutdown(&self) {
        tracing::info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job_loop(
    schedule: Schedule,
    job: Arc<dyn ScheduledJob>,
    shutdown: CancellationToken,
) {
    loop {
        let now = Utc::now();
        let Some(fire_at) = next_fire_after(&schedule, now) else {
            tracing::warn!(job = job.name(), "Schedule has no upcoming fire time");
            break;
        };
        let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(job = job.name(), "Job loop shutting down");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                tracing::info!(job = job.name(), fire_at = %fire_at, "Job triggered");
                let summary = job.run().await;
                tracing::info!(
                    job = job.name(),
                    success = summary.success,
                    processed = summary.processed_count,
                    failed = summary.failed_count,
                    error = summary.error.as_deref().unwrap_or(""),
                    "Job run completed"
                );
            }
        }
    }
}
