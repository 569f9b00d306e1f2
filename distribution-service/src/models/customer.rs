//! Customer model for distribution-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer (retail shop) row.
///
/// `outstanding_balance` is denormalized bookkeeping, not maintained by any
/// invariant here. The authoritative outstanding figure comes from the
/// analytics queries over invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub tenant_id: Uuid,
    pub shop_name: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub outstanding_balance: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub tenant_id: Uuid,
    pub shop_name: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Input for updating a customer. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub shop_name: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
