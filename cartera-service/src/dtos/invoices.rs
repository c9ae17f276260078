use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{Invoice, Payment};

/// Amounts are stored as NUMERIC(14, 2): at most 12 integer digits and 2
/// decimal places.
const MAX_AMOUNT_EXCLUSIVE: i64 = 1_000_000_000_000;
const AMOUNT_DECIMAL_PLACES: u32 = 2;
const INVOICE_NUMBER_MAX_CHARS: usize = 50;

fn valid_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    if *amount >= Decimal::from(MAX_AMOUNT_EXCLUSIVE) {
        return Err(ValidationError::new("amount_exceeds_14_digits"));
    }
    if amount.normalize().scale() > AMOUNT_DECIMAL_PLACES {
        return Err(ValidationError::new("amount_has_more_than_2_decimals"));
    }
    Ok(())
}

fn invoice_number_present(number: &str) -> Result<(), ValidationError> {
    let chars = number.trim().chars().count();
    if chars == 0 || chars > INVOICE_NUMBER_MAX_CHARS {
        return Err(ValidationError::new("invoice_number_must_be_1_to_50_characters"));
    }
    Ok(())
}

fn known_status(status: &str) -> Result<(), ValidationError> {
    match status.trim().to_lowercase().as_str() {
        "pending" | "paid" => Ok(()),
        _ => Err(ValidationError::new("status_must_be_pending_or_paid")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceRequest {
    pub supplier_id: i64,

    /// Ignored for non-staff users, whose own point of sale is used.
    pub point_of_sale_id: Option<i64>,

    #[validate(custom(function = "invoice_number_present"))]
    pub invoice_number: String,

    pub invoice_date: NaiveDate,

    #[validate(custom(function = "valid_amount"))]
    pub amount: Decimal,

    #[validate(custom(function = "known_status"))]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PendingInvoicesQuery {
    pub q: Option<String>,
    pub supplier_id: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub supplier_id: Option<String>,
    pub point_of_sale_id: Option<String>,
    pub invoice_date: Option<String>,
    pub q: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    pub invoice: Invoice,
    pub balance: Decimal,
    pub payments: Vec<Payment>,
    pub is_cash_payment: bool,
    pub editable: bool,
}

#[derive(Debug, Serialize)]
pub struct PendingInvoicesResponse {
    #[serde(flatten)]
    pub page: crate::services::database::PendingInvoicesPage,
    pub q: String,
    pub supplier_id: Option<i64>,
    pub supplier_name: String,
}
