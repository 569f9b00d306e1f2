//! Product model for distribution-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Product catalog row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i32,
    pub barcode: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub tenant_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: i32,
    pub barcode: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Input for updating a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub barcode: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Filter parameters for listing products.
#[derive(Debug, Clone, Default)]
pub struct ListProductsFilter {
    /// Matches against name or barcode.
    pub search: Option<String>,
    pub category: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
