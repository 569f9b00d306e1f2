//! Customer handlers, scoped to the tenant from the request context.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateCustomerRequest, ListCustomersQuery, UpdateCustomerRequest},
    middleware::TenantContext,
    models::{CreateCustomer, Customer, UpdateCustomer},
    services::{ChangeEvent, EntityKind},
    AppState,
};

pub async fn create_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    payload.validate()?;

    let input = CreateCustomer {
        tenant_id: tenant.tenant_id,
        shop_name: payload.shop_name,
        owner_name: payload.owner_name,
        phone: payload.phone,
        address: payload.address,
        latitude: payload.latitude,
        longitude: payload.longitude,
    };

    let customer = state.db.create_customer(&input).await?;

    state.events.publish(ChangeEvent::inserted(
        tenant.tenant_id,
        EntityKind::Customer,
        customer.customer_id,
        &customer,
    ));

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .db
        .get_customer(tenant.tenant_id, customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

pub async fn list_customers(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = state
        .db
        .list_customers(
            tenant.tenant_id,
            query.search.as_deref(),
            query.page_size,
            query.page_token,
        )
        .await?;

    Ok(Json(customers))
}

pub async fn update_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    payload.validate()?;

    let input = UpdateCustomer {
        shop_name: payload.shop_name,
        owner_name: payload.owner_name,
        phone: payload.phone,
        address: payload.address,
        latitude: payload.latitude,
        longitude: payload.longitude,
    };

    let customer = state
        .db
        .update_customer(tenant.tenant_id, customer_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    state.events.publish(ChangeEvent::updated(
        tenant.tenant_id,
        EntityKind::Customer,
        customer.customer_id,
        &customer,
    ));

    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .db
        .delete_customer(tenant.tenant_id, customer_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
    }

    state.events.publish(ChangeEvent::deleted(
        tenant.tenant_id,
        EntityKind::Customer,
        customer_id,
    ));

    Ok(StatusCode::NO_CONTENT)
}
