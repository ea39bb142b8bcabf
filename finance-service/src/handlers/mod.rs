pub mod health;
pub mod jobs;
pub mod reports;
pub mod transactions;

use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

pub(crate) fn parse_object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid id: {}", raw)))
}
