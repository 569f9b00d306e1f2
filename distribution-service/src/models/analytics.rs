//! Read models for the dashboard and analytics endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Headline figures for the dashboard cards.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub total_revenue: Decimal,
    pub total_collected: Decimal,
    pub total_outstanding: Decimal,
    pub invoice_count: i64,
    pub customer_count: i64,
    pub product_count: i64,
    pub low_stock_count: i64,
}

/// One month of revenue, with profit estimated at a fixed 60% cost ratio.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyRevenue {
    pub month: NaiveDate,
    pub revenue: Decimal,
    pub estimated_profit: Decimal,
}

/// Product ranked by quantity sold.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity_sold: Decimal,
    pub revenue: Decimal,
}

/// Customer ranked by invoiced total.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopCustomer {
    pub customer_id: Uuid,
    pub shop_name: String,
    pub invoiced_total: Decimal,
    pub invoice_count: i64,
}
