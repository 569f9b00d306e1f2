//! Tenant context extractor.
//!
//! Every business route is scoped to one tenant. The canonical identifier is
//! a single `tenant_id` UUID, supplied by the authenticating frontend in the
//! `X-Tenant-ID` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Tenant scope for a request.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing X-Tenant-ID header"))
            })?;

        let tenant_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("X-Tenant-ID is not a valid UUID"))
        })?;

        // Add to tracing span for observability
        tracing::Span::current().record("tenant_id", tracing::field::display(tenant_id));

        Ok(TenantContext { tenant_id })
    }
}
