//! Business settings and profile handlers. Both upsert per tenant.

use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{UpsertBusinessSettingsRequest, UpsertProfileRequest},
    middleware::TenantContext,
    models::{BusinessSettings, Profile, UpsertBusinessSettings, UpsertProfile},
    AppState,
};

pub async fn get_business_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<BusinessSettings>, AppError> {
    let settings = state
        .db
        .get_business_settings(tenant.tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Business settings not configured")))?;

    Ok(Json(settings))
}

pub async fn upsert_business_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<UpsertBusinessSettingsRequest>,
) -> Result<Json<BusinessSettings>, AppError> {
    payload.validate()?;

    let input = UpsertBusinessSettings {
        business_name: payload.business_name,
        currency: payload.currency,
        default_tax_rate: payload.default_tax_rate,
        address: payload.address,
        phone: payload.phone,
    };

    let settings = state
        .db
        .upsert_business_settings(tenant.tenant_id, &input)
        .await?;

    Ok(Json(settings))
}

pub async fn get_profile(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .db
        .get_profile(tenant.tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile not found")))?;

    Ok(Json(profile))
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<UpsertProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    payload.validate()?;

    let input = UpsertProfile {
        full_name: payload.full_name,
        email: payload.email,
        phone: payload.phone,
    };

    let profile = state.db.upsert_profile(tenant.tenant_id, &input).await?;

    Ok(Json(profile))
}
