//! Payments and their listing filter.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Marker written into the notes of payments generated when an invoice is
/// registered as already paid in cash at the point of sale.
pub const CASH_PAYMENT_MARKER: &str = "auto-generado";

/// Payment joined with its invoice, supplier and point of sale.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub payment_id: i64,
    pub invoice_id: i64,
    pub invoice_number: String,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub pos_id: i64,
    pub pos_name: String,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub paid_by: String,
    pub voucher_key: Option<String>,
    pub notes: String,
    pub created_utc: DateTime<Utc>,
    pub batch_id: Option<i64>,
}

impl Payment {
    /// Cash payments made at the point of sale never get a receipt email.
    pub fn is_cash(&self) -> bool {
        is_cash_note(&self.notes)
    }

    pub fn has_voucher(&self) -> bool {
        self.voucher_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

pub fn is_cash_note(notes: &str) -> bool {
    notes.to_lowercase().contains(CASH_PAYMENT_MARKER)
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub invoice_id: i64,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub paid_by: String,
    pub voucher_key: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub query: Option<String>,
    pub page: i64,
}

impl ListPaymentsFilter {
    /// An amount to match exactly when the search text is a plain number
    /// once thousands/decimal separators are stripped.
    pub fn amount_query(&self) -> Option<Decimal> {
        let raw = self.query.as_deref()?.trim();
        let digits: String = raw.chars().filter(|c| *c != '.' && *c != ',').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cash_marker_is_case_insensitive() {
        assert!(is_cash_note(
            "Pago AUTO-GENERADO al crear la factura como PAGADA (contado en PDV)."
        ));
        assert!(!is_cash_note("Pago perteneciente al Lote #4."));
    }

    #[test]
    fn amount_query_strips_separators() {
        let filter = ListPaymentsFilter {
            query: Some("1.250.000".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.amount_query(), Some(Decimal::from(1_250_000)));

        let filter = ListPaymentsFilter {
            query: Some("FV-12".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.amount_query(), None);

        let filter = ListPaymentsFilter {
            query: Some(".,".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.amount_query(), None);
    }
}
