use service_core::error::AppError;
use thiserror::Error;

use crate::services::store::StoreError;

/// Failure of a user-driven service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Store(StoreError::NotFound(msg)) => {
                AppError::NotFound(anyhow::anyhow!(msg))
            }
            ServiceError::Store(StoreError::Unavailable(_)) => AppError::ServiceUnavailable,
            ServiceError::Store(other) => AppError::DatabaseError(anyhow::Error::new(other)),
        }
    }
}
