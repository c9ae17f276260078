//! Public confirmation links followed by suppliers from receipt emails.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::payments::{
    BatchConfirmationResponse, ConfirmedInvoice, PaymentConfirmationResponse,
};
use crate::services::access::ScopeFilter;
use crate::services::metrics::record_confirmation;
use crate::startup::AppState;

/// GET /payments/confirm/:token
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PaymentConfirmationResponse>, AppError> {
    let payment_id = state.tokens.verify_payment(&token).map_err(|e| {
        record_confirmation("payment", "invalid");
        tracing::info!(error = %e, "Rejected payment confirmation link");
        AppError::from(e)
    })?;

    let payment = state
        .db
        .get_payment(payment_id, ScopeFilter::everything())
        .await?
        .ok_or_else(|| {
            record_confirmation("payment", "not_found");
            AppError::not_found("We could not find the payment for this link")
        })?;

    let invoice = state
        .db
        .get_invoice(payment.invoice_id, ScopeFilter::everything())
        .await?
        .ok_or_else(|| AppError::not_found("We could not find the payment for this link"))?;

    let confirmed_utc = state
        .db
        .confirm_invoice(invoice.invoice_id, &invoice.supplier_email)
        .await?;

    record_confirmation("payment", "confirmed");
    tracing::info!(
        payment_id,
        invoice_id = invoice.invoice_id,
        first_time = !invoice.confirmed,
        "Payment confirmed by supplier"
    );

    Ok(Json(PaymentConfirmationResponse {
        supplier_name: invoice.supplier_name,
        invoice_number: invoice.invoice_number,
        amount: invoice.amount,
        confirmed_utc,
    }))
}

/// GET /payments/batch/confirm/:token
pub async fn confirm_batch(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<BatchConfirmationResponse>, AppError> {
    let batch_id = state.tokens.verify_batch(&token).map_err(|e| {
        record_confirmation("batch", "invalid");
        tracing::info!(error = %e, "Rejected batch confirmation link");
        AppError::from(e)
    })?;

    let batch = state.db.get_batch(batch_id).await?.ok_or_else(|| {
        record_confirmation("batch", "not_found");
        AppError::not_found("We could not find the batch for this link")
    })?;

    let confirmed_utc = state
        .db
        .confirm_batch(batch_id, &batch.supplier_email)
        .await?;
    let payments = state.db.list_batch_payments(batch_id).await?;

    record_confirmation("batch", "confirmed");
    tracing::info!(batch_id, invoices = payments.len(), "Batch confirmed by supplier");

    let total = payments.iter().map(|p| p.amount).sum();
    let invoices = payments
        .into_iter()
        .map(|p| ConfirmedInvoice {
            invoice_number: p.invoice_number,
            pos_name: p.pos_name,
            amount: p.amount,
        })
        .collect();

    Ok(Json(BatchConfirmationResponse {
        supplier_name: batch.supplier_name,
        batch_id,
        payment_date: batch.payment_date,
        invoices,
        total,
        confirmed_utc,
    }))
}
