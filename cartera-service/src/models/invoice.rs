//! Invoice model for cartera-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Pending,
        }
    }
}

/// Invoice joined with its supplier and point of sale names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub invoice_id: i64,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub supplier_email: String,
    pub pos_id: i64,
    pub pos_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub confirmed: bool,
    pub confirmed_utc: Option<DateTime<Utc>>,
    pub confirmed_by_email: Option<String>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    /// Outstanding amount; negative only if the invoice was overpaid.
    pub fn balance(&self) -> Decimal {
        self.amount - self.amount_paid
    }

    /// Outstanding amount floored at zero, as shown to suppliers.
    pub fn remaining(&self) -> Decimal {
        self.balance().max(Decimal::ZERO)
    }
}

/// Input for creating an invoice. The point of sale has already been
/// resolved against the caller's scope.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub supplier_id: i64,
    pub pos_id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub status: InvoiceStatus,
    pub created_by: Option<i64>,
}

/// Input for editing an invoice that has no payments yet.
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    pub supplier_id: i64,
    pub pos_id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub status: InvoiceStatus,
}

/// Filter for the pending-invoices board.
#[derive(Debug, Clone, Default)]
pub struct PendingInvoicesFilter {
    pub query: Option<String>,
    pub supplier_id: Option<i64>,
    pub page: i64,
}

/// Filter for the generic invoice listing.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub pos_id: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub supplier_id: Option<i64>,
    pub invoice_date: Option<NaiveDate>,
    pub query: Option<String>,
    pub ordering: Option<String>,
    pub page: i64,
}

impl ListInvoicesFilter {
    pub fn order_sql(&self) -> &'static str {
        match self.ordering.as_deref().map(str::trim) {
            Some("invoice_date") => "i.invoice_date ASC, i.invoice_id ASC",
            Some("amount") => "i.amount ASC, i.invoice_id ASC",
            Some("-amount") => "i.amount DESC, i.invoice_id DESC",
            Some("created_utc") => "i.created_utc ASC, i.invoice_id ASC",
            Some("-created_utc") => "i.created_utc DESC, i.invoice_id DESC",
            _ => "i.invoice_date DESC, i.invoice_id DESC",
        }
    }
}
