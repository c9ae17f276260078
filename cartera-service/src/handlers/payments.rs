//! Single payments: listing, registration, vouchers and receipt emails.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::payments::{
    ListPaymentsQuery, PayerOptionsQuery, PayerOptionsResponse, ReceiptOutcome,
};
use crate::dtos::Paginated;
use crate::middleware::CurrentUser;
use crate::models::{CreatePayment, ListPaymentsFilter, Payment, PointOfSale};
use crate::services::access::ScopeFilter;
use crate::services::metrics::{record_event, record_receipt};
use crate::services::storage::{content_type_for, display_name, voucher_key};
use crate::services::Viewer;
use crate::startup::AppState;
use crate::utils::{PaymentForm, UploadedFile};

/// Validate an uploaded voucher and store it, returning its key.
pub(crate) async fn store_voucher(
    state: &AppState,
    file: UploadedFile,
) -> Result<String, AppError> {
    let key = voucher_key(
        &file.file_name,
        file.data.len(),
        state.config.media.max_upload_bytes,
    )?;
    state.storage.upload(&key, file.data).await?;
    Ok(key)
}

/// Best-effort removal of a voucher whose database row was never written.
pub(crate) async fn discard_voucher(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete(key).await {
        tracing::warn!(error = %e, key, "Failed to remove orphaned voucher");
    }
}

/// Points of sale a viewer may pick from: every one for staff.
pub(crate) async fn selectable_points_of_sale(
    state: &AppState,
    viewer: &Viewer,
) -> Result<Vec<PointOfSale>, AppError> {
    if viewer.is_staff {
        state.db.list_points_of_sale().await
    } else {
        Ok(viewer.point_of_sale.clone().into_iter().collect())
    }
}

/// GET /payments?q=&page=
pub async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<ListPaymentsQuery>,
) -> Result<Json<Paginated<Payment>>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let filter = ListPaymentsFilter {
        query: params.q.filter(|q| !q.trim().is_empty()),
        page,
    };
    let (payments, total) = state
        .db
        .list_payments(&filter, viewer.scope().filter())
        .await?;
    Ok(Json(Paginated::new(payments, page, total)))
}

/// GET /payments/payer-options?invoice_id=
pub async fn payer_options(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<PayerOptionsQuery>,
) -> Result<Json<PayerOptionsResponse>, AppError> {
    let all_pos = selectable_points_of_sale(&state, &viewer).await?;

    let invoice_pos = match params.invoice_id {
        Some(invoice_id) => {
            let invoice = state
                .db
                .get_invoice(invoice_id, viewer.scope().filter())
                .await?
                .ok_or_else(|| AppError::not_found("Invoice not found"))?;
            all_pos.iter().find(|pos| pos.pos_id == invoice.pos_id).cloned()
        }
        None => None,
    };

    Ok(Json(PayerOptionsResponse {
        options: viewer.payer_options(&all_pos),
        default: viewer.default_payer(invoice_pos.as_ref()),
    }))
}

/// POST /invoices/:id/payments
///
/// Multipart fields: `payment_date` (optional, defaults to today),
/// `paid_by`, `notes` and an optional `voucher` file. The amount is always
/// the invoice amount.
pub async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(invoice_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    if !state.db.list_invoice_payments(invoice_id).await?.is_empty() {
        return Err(AppError::conflict(
            "This invoice already has a payment registered",
        ));
    }

    let mut form = PaymentForm::read(multipart).await?;
    let all_pos = selectable_points_of_sale(&state, &viewer).await?;
    let paid_by = viewer.validate_payer_label(form.required("paid_by")?, &all_pos)?;
    let payment_date = form.date("payment_date")?.unwrap_or_else(|| state.today());
    let notes = form.text("notes").unwrap_or_default().to_string();

    let voucher = match form.voucher.take() {
        Some(file) => Some(store_voucher(&state, file).await?),
        None => None,
    };

    let result = state
        .db
        .create_payment(&CreatePayment {
            invoice_id,
            payment_date,
            amount: invoice.amount,
            paid_by,
            voucher_key: voucher.clone(),
            notes,
        })
        .await;

    let payment = match result {
        Ok(payment) => payment,
        Err(e) => {
            if let Some(key) = &voucher {
                discard_voucher(&state, key).await;
            }
            return Err(e);
        }
    };

    record_event("payment_recorded");
    tracing::info!(
        payment_id = payment.payment_id,
        invoice_id,
        recorded_by = viewer.user_id,
        has_voucher = payment.has_voucher(),
        "Payment registered"
    );

    Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /payments/:id/voucher
pub async fn attach_voucher(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(payment_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;

    if payment.has_voucher() {
        return Err(AppError::conflict("This payment already has a voucher attached"));
    }

    let mut form = PaymentForm::read(multipart).await?;
    let file = form
        .voucher
        .take()
        .ok_or_else(|| AppError::bad_request("Select a file to attach"))?;
    let key = store_voucher(&state, file).await?;

    match state.db.attach_voucher(payment_id, &key).await {
        Ok(true) => {}
        Ok(false) => {
            discard_voucher(&state, &key).await;
            return Err(AppError::conflict("This payment already has a voucher attached"));
        }
        Err(e) => {
            discard_voucher(&state, &key).await;
            return Err(e);
        }
    }

    let payment = state
        .db
        .get_payment(payment_id, ScopeFilter::everything())
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;
    Ok(Json(payment))
}

/// GET /payments/:id/voucher
pub async fn download_voucher(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state
        .db
        .get_payment(payment_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;

    let key = payment
        .voucher_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::not_found("This payment has no voucher"))?;

    let data = state.storage.download(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", display_name(&key)),
            ),
        ],
        data,
    ))
}

/// POST /payments/:id/send-receipt
///
/// Cash payments never get a receipt; other payments need a voucher.
pub async fn send_receipt(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(payment_id): Path<i64>,
) -> Result<Json<ReceiptOutcome>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;

    if payment.is_cash() {
        return Err(AppError::conflict(
            "Cash payment: no confirmation email is sent",
        ));
    }
    if !payment.has_voucher() {
        return Err(AppError::bad_request("This payment has no voucher attached"));
    }

    let invoice = state
        .db
        .get_invoice(payment.invoice_id, ScopeFilter::everything())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let result = state
        .receipts
        .send_payment_receipt(&payment, &invoice)
        .await;

    match &result {
        Ok(()) => {
            record_receipt("payment", "sent");
            tracing::info!(payment_id, "Payment receipt sent");
        }
        Err(e) => {
            record_receipt("payment", "failed");
            tracing::warn!(payment_id, error = %e, "Payment receipt not sent");
        }
    }

    Ok(Json(ReceiptOutcome::from_result(&result)))
}
