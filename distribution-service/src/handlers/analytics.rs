//! Analytics handlers backing the dashboard and analytics screens.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::TopQuery,
    middleware::TenantContext,
    models::{AnalyticsSummary, MonthlyRevenue, TopCustomer, TopProduct},
    AppState,
};

pub async fn summary(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let summary = state
        .db
        .analytics_summary(tenant.tenant_id, state.config.analytics.low_stock_threshold)
        .await?;

    Ok(Json(summary))
}

pub async fn revenue_monthly(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<MonthlyRevenue>>, AppError> {
    let months = state.db.revenue_by_month(tenant.tenant_id, 12).await?;

    Ok(Json(months))
}

pub async fn top_products(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<TopProduct>>, AppError> {
    let products = state
        .db
        .top_products(tenant.tenant_id, query.limit.clamp(1, 50))
        .await?;

    Ok(Json(products))
}

pub async fn top_customers(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<TopCustomer>>, AppError> {
    let customers = state
        .db
        .top_customers(tenant.tenant_id, query.limit.clamp(1, 50))
        .await?;

    Ok(Json(customers))
}
