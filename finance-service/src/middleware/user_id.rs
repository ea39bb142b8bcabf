use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

/// Owner of the request, taken from the `X-User-ID` header set by the
/// gateway in front of this service. Every user-facing route is scoped to it.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header")))?;

        let user_id = ObjectId::parse_str(raw)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-User-ID header")))?;

        tracing::Span::current().record("user_id", raw);

        Ok(UserId(user_id))
    }
}
