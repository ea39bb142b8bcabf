use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use super::parse_object_id;
use crate::dtos::{
    BulkDeleteRequest, BulkDeleteResponse, BulkInsertRequest, BulkInsertResponse,
    TransactionResponse,
};
use crate::middleware::user_id::UserId;
use crate::services::{NewTransaction, UpdateTransaction};
use crate::startup::AppState;

#[tracing::instrument(skip(state, input), fields(user_id = %user.0))]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: UserId,
    Json(input): Json<NewTransaction>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .transactions
        .create(user.0, input, state.clock.now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse::from(transaction)),
    ))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let id = parse_object_id(&id)?;
    let transaction = state.transactions.get(&user.0, &id).await?;
    Ok(Json(transaction.into()))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
    Json(changes): Json<UpdateTransaction>,
) -> Result<Json<TransactionResponse>, AppError> {
    let id = parse_object_id(&id)?;
    let transaction = state
        .transactions
        .update(&user.0, &id, changes, state.clock.now())
        .await?;
    Ok(Json(transaction.into()))
}

pub async fn duplicate_transaction(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_object_id(&id)?;
    let copy = state
        .transactions
        .duplicate(&user.0, &id, state.clock.now())
        .await?;

    Ok((StatusCode::CREATED, Json(TransactionResponse::from(copy))))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_object_id(&id)?;
    state.transactions.delete(&user.0, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_delete_transactions(
    State(state): State<AppState>,
    user: UserId,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    let ids = request
        .transaction_ids
        .iter()
        .map(|id| parse_object_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    let deleted_count = state.transactions.bulk_delete(&user.0, &ids).await?;
    Ok(Json(BulkDeleteResponse { deleted_count }))
}

#[tracing::instrument(skip(state, request), fields(user_id = %user.0))]
pub async fn bulk_insert_transactions(
    State(state): State<AppState>,
    user: UserId,
    Json(request): Json<BulkInsertRequest>,
) -> Result<impl IntoResponse, AppError> {
    let inserted_count = state
        .transactions
        .bulk_insert(user.0, request.transactions, state.clock.now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkInsertResponse { inserted_count }),
    ))
}
