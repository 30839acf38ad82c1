use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// OwnerId extractor for sales-service.
///
/// Extracts the authenticated user's id from the X-User-ID header supplied
/// by the fronting auth layer. Every company, receipt and invoice query is
/// scoped to this owner; the service itself never handles credentials.
#[derive(Debug, Clone, Copy)]
pub struct OwnerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header"))
            })?;

        let owner_id = raw.parse::<Uuid>().map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("X-User-ID header is not a valid UUID"))
        })?;

        // Add to tracing span for observability
        tracing::Span::current().record("user_id", raw);

        Ok(OwnerId(owner_id))
    }
}
