//! Product handlers, scoped to the tenant from the request context.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateProductRequest, ListProductsQuery, UpdateProductRequest},
    middleware::TenantContext,
    models::{CreateProduct, ListProductsFilter, Product, UpdateProduct},
    services::{ChangeEvent, EntityKind},
    AppState,
};

pub async fn create_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    payload.validate()?;

    let input = CreateProduct {
        tenant_id: tenant.tenant_id,
        name: payload.name,
        category: payload.category,
        brand: payload.brand,
        cost_price: payload.cost_price,
        selling_price: payload.selling_price,
        stock_quantity: payload.stock_quantity,
        barcode: payload.barcode,
        expiry_date: payload.expiry_date,
    };

    let product = state.db.create_product(&input).await?;

    state.events.publish(ChangeEvent::inserted(
        tenant.tenant_id,
        EntityKind::Product,
        product.product_id,
        &product,
    ));

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(tenant.tenant_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

pub async fn list_products(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let filter = ListProductsFilter {
        search: query.search,
        category: query.category,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let products = state.db.list_products(tenant.tenant_id, &filter).await?;

    Ok(Json(products))
}

pub async fn update_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;

    let input = UpdateProduct {
        name: payload.name,
        category: payload.category,
        brand: payload.brand,
        cost_price: payload.cost_price,
        selling_price: payload.selling_price,
        stock_quantity: payload.stock_quantity,
        barcode: payload.barcode,
        expiry_date: payload.expiry_date,
    };

    let product = state
        .db
        .update_product(tenant.tenant_id, product_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    state.events.publish(ChangeEvent::updated(
        tenant.tenant_id,
        EntityKind::Product,
        product.product_id,
        &product,
    ));

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_product(tenant.tenant_id, product_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
    }

    state.events.publish(ChangeEvent::deleted(
        tenant.tenant_id,
        EntityKind::Product,
        product_id,
    ));

    Ok(StatusCode::NO_CONTENT)
}
