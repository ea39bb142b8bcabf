use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    GenerateReportParams, ReportListParams, ReportListResponse, ReportSettingResponse,
    UpdateReportSettingRequest,
};
use crate::middleware::user_id::UserId;
use crate::services::GeneratedReport;
use crate::startup::AppState;

/// Opts a new user into monthly reports. Rejects a second call.
pub async fn create_report_settings(
    State(state): State<AppState>,
    user: UserId,
) -> Result<impl IntoResponse, AppError> {
    let setting = state
        .report_settings
        .create_default(user.0, state.clock.now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReportSettingResponse::from(setting)),
    ))
}

pub async fn get_report_settings(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ReportSettingResponse>, AppError> {
    let setting = state.report_settings.get(&user.0).await?;
    Ok(Json(setting.into()))
}

pub async fn update_report_settings(
    State(state): State<AppState>,
    user: UserId,
    Json(request): Json<UpdateReportSettingRequest>,
) -> Result<Json<ReportSettingResponse>, AppError> {
    let setting = state
        .report_settings
        .update(&user.0, request.is_enabled, state.clock.now())
        .await?;
    Ok(Json(setting.into()))
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: UserId,
    Query(params): Query<ReportListParams>,
) -> Result<Json<ReportListResponse>, AppError> {
    let page = state.reports.list(&user.0, params.pagination()).await?;
    Ok(Json(page.into()))
}

/// On-demand summary for an arbitrary range. Nothing is sent or recorded.
pub async fn generate_report(
    State(state): State<AppState>,
    user: UserId,
    Query(params): Query<GenerateReportParams>,
) -> Result<Json<Option<GeneratedReport>>, AppError> {
    let report = state
        .reports
        .generate(&user.0, params.from, params.to)
        .await?;
    Ok(Json(report))
}
