//! Invoice and line item models for distribution-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status of an invoice.
///
/// Derived from `paid_amount` by the reconciler, except when overridden
/// manually (which may leave it contradicting `paid_amount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "partial" => PaymentStatus::Partial,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// Invoice row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_status: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }

    /// Remaining balance against which new payments are validated.
    pub fn remaining_balance(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

/// Line item row. Fixed at invoice creation, never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// One line of a new invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Input for creating an invoice with its line items.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<CreateInvoiceItem>,
    pub discount_amount: Decimal,
    pub tax_rate_percent: Decimal,
    pub notes: Option<String>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Generate an invoice number from the creation instant, `INV-<millis>`.
///
/// Timestamp-based, not sequential and not collision-checked.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-{}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn payment_status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Unpaid,
            PaymentStatus::Partial,
            PaymentStatus::Paid,
        ] {
            assert_eq!(PaymentStatus::from_string(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_string_defaults_to_unpaid() {
        assert_eq!(PaymentStatus::from_string("bogus"), PaymentStatus::Unpaid);
    }

    #[test]
    fn invoice_number_uses_millisecond_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            generate_invoice_number(at),
            format!("INV-{}", at.timestamp_millis())
        );
    }
}
