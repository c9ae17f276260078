//! Invoice/payment state reconciliation.

use crate::models::{Invoice, InvoiceStatus, PointOfSale};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashSet;
use thiserror::Error;

/// Resulting paid amount and status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub status: InvoiceStatus,
    pub amount_paid: Decimal,
}

/// State of an invoice being created or edited with the requested status.
///
/// Saving as paid settles the full amount; anything else leaves the invoice
/// pending with whatever had already been paid.
pub fn settle_on_save(
    amount: Decimal,
    requested: InvoiceStatus,
    current_paid: Decimal,
) -> Settlement {
    match requested {
        InvoiceStatus::Paid => Settlement {
            status: InvoiceStatus::Paid,
            amount_paid: amount,
        },
        InvoiceStatus::Pending => Settlement {
            status: InvoiceStatus::Pending,
            amount_paid: current_paid,
        },
    }
}

/// State of an invoice after registering a payment against it.
pub fn apply_payment(amount: Decimal, amount_paid: Decimal, payment: Decimal) -> Settlement {
    let amount_paid = amount_paid + payment;
    let status = if amount_paid >= amount {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Pending
    };
    Settlement {
        status,
        amount_paid,
    }
}

/// Where a cash payment was generated from; only changes its note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashOrigin {
    Created,
    Edited,
}

impl CashOrigin {
    pub fn note(&self) -> &'static str {
        match self {
            CashOrigin::Created => {
                "Pago auto-generado al crear la factura como PAGADA (contado en PDV)."
            }
            CashOrigin::Edited => {
                "Pago auto-generado al marcar la factura como PAGADA en edición (contado en PDV)."
            }
        }
    }
}

/// Payment recorded for the full amount of an invoice saved as already paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashPayment {
    pub payment_date: NaiveDate,
    pub paid_by: String,
    pub notes: String,
}

impl CashPayment {
    pub fn new(origin: CashOrigin, today: NaiveDate, pos: &PointOfSale) -> Self {
        Self {
            payment_date: today,
            paid_by: pos.payer_label(),
            notes: origin.note().to_string(),
        }
    }
}

/// Cash payment owed by a save that ends with the given settlement.
pub fn cash_payment_for(
    settlement: &Settlement,
    origin: CashOrigin,
    today: NaiveDate,
    pos: &PointOfSale,
) -> Option<CashPayment> {
    (settlement.status == InvoiceStatus::Paid).then(|| CashPayment::new(origin, today, pos))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchSelectionError {
    #[error("Select at least one invoice")]
    Empty,
    #[error("The selected invoices are not valid for payment")]
    NoneValid,
    #[error("All selected invoices must belong to the same supplier")]
    MixedSuppliers,
}

impl From<BatchSelectionError> for AppError {
    fn from(err: BatchSelectionError) -> Self {
        AppError::bad_request(err)
    }
}

/// Parse a list of invoice ids separated by commas and/or whitespace,
/// ignoring anything that is not a plain number.
pub fn parse_invoice_ids(raw: &str) -> Vec<i64> {
    let mut seen = HashSet::new();
    raw.replace(',', " ")
        .split_whitespace()
        .filter(|chunk| chunk.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|chunk| chunk.parse().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Invoices eligible for one batch payment.
#[derive(Debug, Clone)]
pub struct BatchSelection {
    pub supplier_id: i64,
    pub supplier_name: String,
    pub invoices: Vec<Invoice>,
    pub total: Decimal,
}

/// Check that the eligible invoices can be paid together.
///
/// `eligible` must already be restricted to pending, unpaid, in-scope
/// invoices; this only enforces the single-supplier rule.
pub fn select_batch(eligible: Vec<Invoice>) -> Result<BatchSelection, BatchSelectionError> {
    let first = eligible.first().ok_or(BatchSelectionError::NoneValid)?;
    let supplier_id = first.supplier_id;
    let supplier_name = first.supplier_name.clone();

    if eligible.iter().any(|inv| inv.supplier_id != supplier_id) {
        return Err(BatchSelectionError::MixedSuppliers);
    }

    let total = eligible.iter().map(|inv| inv.amount).sum();
    Ok(BatchSelection {
        supplier_id,
        supplier_name,
        invoices: eligible,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn invoice(id: i64, supplier_id: i64, amount: &str) -> Invoice {
        Invoice {
            invoice_id: id,
            supplier_id,
            supplier_name: format!("Proveedor {}", supplier_id),
            supplier_email: String::new(),
            pos_id: 1,
            pos_name: "Centro".to_string(),
            invoice_number: format!("FV-{}", id),
            invoice_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            amount: dec(amount),
            amount_paid: Decimal::ZERO,
            status: "pending".to_string(),
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
            created_by: None,
            confirmed: false,
            confirmed_utc: None,
            confirmed_by_email: None,
        }
    }

    #[test]
    fn saving_as_paid_settles_full_amount() {
        let s = settle_on_save(dec("350000"), InvoiceStatus::Paid, Decimal::ZERO);
        assert_eq!(s.status, InvoiceStatus::Paid);
        assert_eq!(s.amount_paid, dec("350000"));
    }

    #[test]
    fn saving_as_pending_keeps_paid_amount() {
        let s = settle_on_save(dec("350000"), InvoiceStatus::Pending, dec("1000"));
        assert_eq!(s.status, InvoiceStatus::Pending);
        assert_eq!(s.amount_paid, dec("1000"));
    }

    #[test]
    fn payment_marks_paid_once_total_is_reached() {
        let partial = apply_payment(dec("100"), Decimal::ZERO, dec("40"));
        assert_eq!(partial.status, InvoiceStatus::Pending);
        assert_eq!(partial.amount_paid, dec("40"));

        let full = apply_payment(dec("100"), dec("40"), dec("60"));
        assert_eq!(full.status, InvoiceStatus::Paid);
        assert_eq!(full.amount_paid, dec("100"));
    }

    #[test]
    fn cash_notes_carry_the_cash_marker() {
        assert!(crate::models::payment_is_cash_note(CashOrigin::Created.note()));
        assert!(crate::models::payment_is_cash_note(CashOrigin::Edited.note()));
    }

    #[test]
    fn only_paid_saves_generate_a_cash_payment() {
        let pos = PointOfSale {
            pos_id: 2,
            name: "Norte".to_string(),
            city: String::new(),
            user_id: None,
        };
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();

        let paid = settle_on_save(dec("80"), InvoiceStatus::Paid, Decimal::ZERO);
        let cash = cash_payment_for(&paid, CashOrigin::Edited, today, &pos).unwrap();
        assert_eq!(cash.paid_by, "PDV - Norte");
        assert_eq!(cash.payment_date, today);
        assert_eq!(cash.notes, CashOrigin::Edited.note());

        let pending = settle_on_save(dec("80"), InvoiceStatus::Pending, Decimal::ZERO);
        assert!(cash_payment_for(&pending, CashOrigin::Created, today, &pos).is_none());
    }

    #[test]
    fn invoice_ids_accept_commas_and_spaces() {
        assert_eq!(parse_invoice_ids("1, 2 3,,4"), vec![1, 2, 3, 4]);
        assert_eq!(parse_invoice_ids("5,x,-6,7.5, 8"), vec![5, 8]);
        assert!(parse_invoice_ids("   ").is_empty());
        assert_eq!(parse_invoice_ids("3,1,3"), vec![3, 1]);
    }

    #[test]
    fn batch_requires_a_single_supplier() {
        let err = select_batch(vec![invoice(1, 1, "10"), invoice(2, 2, "20")]).unwrap_err();
        assert_eq!(err, BatchSelectionError::MixedSuppliers);
    }

    #[test]
    fn batch_totals_invoice_amounts() {
        let selection =
            select_batch(vec![invoice(1, 4, "10.50"), invoice(2, 4, "20.25")]).unwrap();
        assert_eq!(selection.supplier_id, 4);
        assert_eq!(selection.total, dec("30.75"));
        assert_eq!(selection.invoices.len(), 2);
    }

    #[test]
    fn empty_selection_is_not_valid() {
        assert_eq!(
            select_batch(Vec::new()).unwrap_err(),
            BatchSelectionError::NoneValid
        );
    }
}
