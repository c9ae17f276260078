//! Batch payments (lotes): several invoices of one supplier paid with a
//! single voucher and announced with a single email.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::payments::{
    BatchCreatedResponse, BatchPreviewQuery, BatchPreviewResponse, ReceiptOutcome,
};
use crate::handlers::payments::{discard_voucher, selectable_points_of_sale, store_voucher};
use crate::middleware::CurrentUser;
use crate::models::CreateBatch;
use crate::services::metrics::{record_event, record_receipt};
use crate::services::reconciliation::{
    parse_invoice_ids, select_batch, BatchSelection, BatchSelectionError,
};
use crate::services::Viewer;
use crate::startup::AppState;
use crate::utils::PaymentForm;

async fn load_selection(
    state: &AppState,
    viewer: &Viewer,
    raw_ids: &str,
) -> Result<BatchSelection, AppError> {
    let ids = parse_invoice_ids(raw_ids);
    if ids.is_empty() {
        return Err(BatchSelectionError::Empty.into());
    }

    let eligible = state
        .db
        .eligible_batch_invoices(&ids, viewer.scope().filter())
        .await?;
    Ok(select_batch(eligible)?)
}

fn joined_ids(selection: &BatchSelection) -> String {
    selection
        .invoices
        .iter()
        .map(|inv| inv.invoice_id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// GET /payments/batch?ids=1,2,3
pub async fn preview_batch(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<BatchPreviewQuery>,
) -> Result<Json<BatchPreviewResponse>, AppError> {
    let selection = load_selection(&state, &viewer, params.ids.as_deref().unwrap_or("")).await?;

    let all_pos = selectable_points_of_sale(&state, &viewer).await?;
    let first_pos = selection
        .invoices
        .first()
        .and_then(|inv| all_pos.iter().find(|pos| pos.pos_id == inv.pos_id));

    Ok(Json(BatchPreviewResponse {
        ids: joined_ids(&selection),
        payer_options: viewer.payer_options(&all_pos),
        default_payer: viewer.default_payer(first_pos),
        payment_date: state.today(),
        supplier_id: selection.supplier_id,
        supplier_name: selection.supplier_name,
        total: selection.total,
        invoices: selection.invoices,
    }))
}

/// POST /payments/batch
///
/// Multipart fields: `ids`, `payment_date` (optional), `paid_by`, `notes`
/// and the required `voucher`. The batch is kept even when the receipt
/// email fails; the outcome is reported in the response.
pub async fn create_batch(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BatchCreatedResponse>), AppError> {
    let mut form = PaymentForm::read(multipart).await?;
    let selection = load_selection(&state, &viewer, form.text("ids").unwrap_or("")).await?;

    let all_pos = selectable_points_of_sale(&state, &viewer).await?;
    let paid_by = viewer.validate_payer_label(form.required("paid_by")?, &all_pos)?;
    let payment_date = form.date("payment_date")?.unwrap_or_else(|| state.today());
    let notes = form.text("notes").unwrap_or_default().to_string();

    let file = form
        .voucher
        .take()
        .ok_or_else(|| AppError::bad_request("A voucher file is required for a batch payment"))?;
    let voucher = store_voucher(&state, file).await?;

    let input = CreateBatch {
        supplier_id: selection.supplier_id,
        payment_date,
        paid_by,
        voucher_key: voucher.clone(),
        notes,
        invoice_ids: selection.invoices.iter().map(|inv| inv.invoice_id).collect(),
    };

    let (batch, payments) = match state.db.create_batch(&input).await {
        Ok(created) => created,
        Err(e) => {
            discard_voucher(&state, &voucher).await;
            return Err(e);
        }
    };

    record_event("batch_created");
    tracing::info!(
        batch_id = batch.batch_id,
        supplier_id = batch.supplier_id,
        invoices = payments.len(),
        created_by = viewer.user_id,
        "Batch payment created"
    );

    let result = state.receipts.send_batch_receipt(&batch, &payments).await;
    match &result {
        Ok(()) => record_receipt("batch", "sent"),
        Err(e) => {
            record_receipt("batch", "failed");
            tracing::warn!(batch_id = batch.batch_id, error = %e, "Batch receipt not sent");
        }
    }

    let total = payments.iter().map(|p| p.amount).sum();
    Ok((
        StatusCode::CREATED,
        Json(BatchCreatedResponse {
            batch,
            payments,
            total,
            email: ReceiptOutcome::from_result(&result),
        }),
    ))
}
