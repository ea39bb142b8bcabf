use axum::{extract::State, response::IntoResponse, Json};

use crate::startup::AppState;

/// Runs one recurrence pass outside the cron schedule.
pub async fn run_recurrence_job(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.recurrence.run().await)
}

pub async fn run_report_job(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.report_delivery.run().await)
}
