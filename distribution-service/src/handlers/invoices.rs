//! Invoice handlers.
//!
//! Creation computes totals server-side and writes the invoice and its line
//! items in one transaction. The status PATCH is the manual override: it does
//! not reconcile and may contradict `paid_amount`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateInvoiceRequest, InvoiceWithItems, ListInvoicesQuery, SetPaymentStatusRequest},
    middleware::TenantContext,
    models::{CreateInvoice, CreateInvoiceItem, Invoice, ListInvoicesFilter},
    services::metrics::INVOICES_TOTAL,
    services::{ChangeEvent, EntityKind},
    AppState,
};

pub async fn create_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithItems>), AppError> {
    payload.validate()?;

    let input = CreateInvoice {
        tenant_id: tenant.tenant_id,
        customer_id: payload.customer_id,
        invoice_date: payload.invoice_date,
        due_date: payload.due_date,
        items: payload
            .items
            .into_iter()
            .map(|item| CreateInvoiceItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        discount_amount: payload.discount_amount,
        tax_rate_percent: payload.tax_rate_percent,
        notes: payload.notes,
    };

    let (invoice, items) = state.db.create_invoice(&input).await?;

    INVOICES_TOTAL
        .with_label_values(&[invoice.payment_status.as_str()])
        .inc();

    state.events.publish(ChangeEvent::inserted(
        tenant.tenant_id,
        EntityKind::Invoice,
        invoice.invoice_id,
        &invoice,
    ));

    Ok((
        StatusCode::CREATED,
        Json(InvoiceWithItems { invoice, items }),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceWithItems>, AppError> {
    let invoice = state
        .db
        .get_invoice(tenant.tenant_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let items = state
        .db
        .get_invoice_items(tenant.tenant_id, invoice_id)
        .await?;

    Ok(Json(InvoiceWithItems { invoice, items }))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = ListInvoicesFilter {
        payment_status: query.payment_status,
        customer_id: query.customer_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let invoices = state.db.list_invoices(tenant.tenant_id, &filter).await?;

    Ok(Json(invoices))
}

pub async fn list_overdue_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let today = Utc::now().date_naive();
    let invoices = state
        .db
        .list_overdue_invoices(tenant.tenant_id, today)
        .await?;

    Ok(Json(invoices))
}

pub async fn set_payment_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<SetPaymentStatusRequest>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .db
        .set_payment_status(tenant.tenant_id, invoice_id, payload.payment_status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    state.events.publish(ChangeEvent::updated(
        tenant.tenant_id,
        EntityKind::Invoice,
        invoice.invoice_id,
        &invoice,
    ));

    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_invoice(tenant.tenant_id, invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    state.events.publish(ChangeEvent::deleted(
        tenant.tenant_id,
        EntityKind::Invoice,
        invoice_id,
    ));

    Ok(StatusCode::NO_CONTENT)
}
