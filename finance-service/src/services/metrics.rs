//! Prometheus metrics for the scheduled jobs.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const JOB_RUNS_TOTAL: &str = "finance_job_runs_total";
const JOB_RECORDS_TOTAL: &str = "finance_job_records_total";

/// Install the global Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);

    metrics::describe_counter!(JOB_RUNS_TOTAL, "Scheduled job runs by job and outcome");
    metrics::describe_counter!(
        JOB_RECORDS_TOTAL,
        "Records handled by scheduled jobs, by job and outcome"
    );
    Ok(())
}

/// Metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// `outcome` is `success` or `aborted`.
pub fn record_job_run(job: &str, outcome: &'static str) {
    metrics::counter!(JOB_RUNS_TOTAL, "job" => job.to_string(), "outcome" => outcome)
        .increment(1);
}

/// `outcome` is `processed` or `failed`.
pub fn record_job_records(job: &str, outcome: &'static str, count: u64) {
    if count == 0 {
        return;
    }
    metrics::counter!(JOB_RECORDS_TOTAL, "job" => job.to_string(), "outcome" => outcome)
        .increment(count);
}
