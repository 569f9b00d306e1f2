//! Business settings and user profile models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-tenant business settings. One row per tenant, upsert semantics.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessSettings {
    pub tenant_id: Uuid,
    pub business_name: String,
    pub currency: String,
    pub default_tax_rate: Decimal,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for upserting business settings.
#[derive(Debug, Clone)]
pub struct UpsertBusinessSettings {
    pub business_name: String,
    pub currency: String,
    pub default_tax_rate: Decimal,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Per-tenant user profile. One row per tenant, upsert semantics.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub tenant_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for upserting a profile.
#[derive(Debug, Clone)]
pub struct UpsertProfile {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
