//! Payment handlers.
//!
//! Recording and deleting both reconcile the parent invoice inside the same
//! transaction as the payment write.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ListPaymentsQuery, PaymentDeletedResponse, PaymentRecordedResponse, RecordPaymentRequest},
    middleware::TenantContext,
    models::{CreatePayment, ListPaymentsFilter, Payment},
    services::metrics::PAYMENTS_TOTAL,
    services::{ChangeEvent, EntityKind},
    AppState,
};

pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentRecordedResponse>), AppError> {
    payload.validate()?;

    let input = CreatePayment {
        tenant_id: tenant.tenant_id,
        invoice_id: payload.invoice_id,
        payment_date: payload.payment_date,
        amount: payload.amount,
        payment_method: payload.payment_method,
        notes: payload.notes,
    };

    let (payment, invoice) = state.db.record_payment(&input).await?;

    PAYMENTS_TOTAL
        .with_label_values(&[payment.payment_method.as_deref().unwrap_or("unknown")])
        .inc();

    state.events.publish(ChangeEvent::inserted(
        tenant.tenant_id,
        EntityKind::Payment,
        payment.payment_id,
        &payment,
    ));
    state.events.publish(ChangeEvent::updated(
        tenant.tenant_id,
        EntityKind::Invoice,
        invoice.invoice_id,
        &invoice,
    ));

    Ok((
        StatusCode::CREATED,
        Json(PaymentRecordedResponse { payment, invoice }),
    ))
}

pub async fn list_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let filter = ListPaymentsFilter {
        invoice_id: query.invoice_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let payments = state.db.list_payments(tenant.tenant_id, &filter).await?;

    Ok(Json(payments))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentDeletedResponse>, AppError> {
    let invoice = state
        .db
        .delete_payment(tenant.tenant_id, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    state.events.publish(ChangeEvent::deleted(
        tenant.tenant_id,
        EntityKind::Payment,
        payment_id,
    ));
    state.events.publish(ChangeEvent::updated(
        tenant.tenant_id,
        EntityKind::Invoice,
        invoice.invoice_id,
        &invoice,
    ));

    Ok(Json(PaymentDeletedResponse { invoice }))
}
