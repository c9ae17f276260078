use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Invoice, Payment, PaymentBatch};
use crate::services::ReceiptError;

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PayerOptionsQuery {
    pub invoice_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PayerOptionsResponse {
    pub options: Vec<String>,
    pub default: Option<String>,
}

/// Result of a receipt email attempt.
#[derive(Debug, Serialize)]
pub struct ReceiptOutcome {
    pub sent: bool,
    pub message: String,
}

impl ReceiptOutcome {
    pub fn from_result(result: &Result<(), ReceiptError>) -> Self {
        match result {
            Ok(()) => Self {
                sent: true,
                message: "Receipt sent to the supplier".to_string(),
            },
            Err(e) => Self {
                sent: false,
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchPreviewQuery {
    pub ids: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchPreviewResponse {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub invoices: Vec<Invoice>,
    pub ids: String,
    pub total: Decimal,
    pub payment_date: NaiveDate,
    pub payer_options: Vec<String>,
    pub default_payer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchCreatedResponse {
    pub batch: PaymentBatch,
    pub payments: Vec<Payment>,
    pub total: Decimal,
    pub email: ReceiptOutcome,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmationResponse {
    pub supplier_name: String,
    pub invoice_number: String,
    pub amount: Decimal,
    pub confirmed_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmedInvoice {
    pub invoice_number: String,
    pub pos_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BatchConfirmationResponse {
    pub supplier_name: String,
    pub batch_id: i64,
    pub payment_date: NaiveDate,
    pub invoices: Vec<ConfirmedInvoice>,
    pub total: Decimal,
    pub confirmed_utc: DateTime<Utc>,
}
