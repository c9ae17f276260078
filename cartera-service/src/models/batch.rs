//! Payment batches (lotes): one voucher covering several invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentBatch {
    pub batch_id: i64,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub supplier_email: String,
    pub payment_date: NaiveDate,
    pub paid_by: String,
    pub voucher_key: String,
    pub notes: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBatch {
    pub supplier_id: i64,
    pub payment_date: NaiveDate,
    pub paid_by: String,
    pub voucher_key: String,
    pub notes: String,
    /// Invoices settled by the batch, all of the same supplier.
    pub invoice_ids: Vec<i64>,
}

impl CreateBatch {
    pub fn payment_note(batch_id: i64) -> String {
        format!("Pago perteneciente al Lote #{}.", batch_id)
    }
}
