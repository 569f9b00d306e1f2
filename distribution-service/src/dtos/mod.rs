//! Request and response types for the HTTP API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, InvoiceItem, Payment, PaymentStatus};

fn default_page_size() -> i32 {
    50
}

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    pub barcode: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub barcode: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Customers
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub shop_name: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub shop_name: Option<String>,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<InvoiceItemRequest>,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub tax_rate_percent: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Invoice with its line items, as returned by create and get.
#[derive(Debug, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Uuid,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub invoice_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Payment together with the reconciled invoice it was applied to.
#[derive(Debug, Serialize)]
pub struct PaymentRecordedResponse {
    pub payment: Payment,
    pub invoice: Invoice,
}

/// Result of deleting a payment: the invoice after recomputation.
#[derive(Debug, Serialize)]
pub struct PaymentDeletedResponse {
    pub invoice: Invoice,
}

// -----------------------------------------------------------------------------
// Settings
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertBusinessSettingsRequest {
    #[validate(length(min = 1, max = 200))]
    pub business_name: String,
    #[validate(length(min = 1, max = 10))]
    pub currency: String,
    #[serde(default)]
    pub default_tax_rate: Decimal,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertProfileRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

// -----------------------------------------------------------------------------
// Analytics
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top_limit")]
    pub limit: i64,
}

fn default_top_limit() -> i64 {
    5
}
