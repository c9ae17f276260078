//! Invoice handlers: pending board, listing, create/edit/delete and detail.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::dtos::invoices::{
    InvoiceDetailResponse, InvoiceRequest, ListInvoicesQuery, PendingInvoicesQuery,
    PendingInvoicesResponse,
};
use crate::dtos::Paginated;
use crate::middleware::{CurrentUser, StaffUser};
use crate::models::{
    parse_id, CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, PendingInvoicesFilter,
    PointOfSale, UpdateInvoice,
};
use crate::services::metrics::record_event;
use crate::services::reconciliation::{cash_payment_for, settle_on_save, CashOrigin};
use crate::services::Viewer;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// GET /invoices/pending?q=&supplier_id=&page=
pub async fn list_pending_invoices(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<PendingInvoicesQuery>,
) -> Result<Json<PendingInvoicesResponse>, AppError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let supplier_id = parse_id(params.supplier_id.as_deref());

    let filter = PendingInvoicesFilter {
        query: Some(query.clone()).filter(|q| !q.is_empty()),
        supplier_id,
        page: params.page.unwrap_or(1),
    };
    let page = state
        .db
        .list_pending_invoices(&filter, viewer.scope().filter())
        .await?;

    let supplier_name = match supplier_id {
        Some(id) => state
            .db
            .get_supplier(id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default(),
        None => String::new(),
    };

    Ok(Json(PendingInvoicesResponse {
        page,
        q: query,
        supplier_id,
        supplier_name,
    }))
}

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<ListInvoicesQuery>,
) -> Result<Json<Paginated<Invoice>>, AppError> {
    let invoice_date = params
        .invoice_date
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::bad_request("invoice_date must be a YYYY-MM-DD date"))
        })
        .transpose()?;

    let page = params.page.unwrap_or(1).max(1);
    let filter = ListInvoicesFilter {
        pos_id: parse_id(params.point_of_sale_id.as_deref()),
        status: params
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(InvoiceStatus::from_string),
        supplier_id: parse_id(params.supplier_id.as_deref()),
        invoice_date,
        query: params.q.filter(|q| !q.trim().is_empty()),
        ordering: params.ordering,
        page,
    };

    let (invoices, total) = state
        .db
        .list_invoices(&filter, viewer.scope().filter())
        .await?;

    Ok(Json(Paginated::new(invoices, page, total)))
}

/// Point of sale an invoice is booked to: the user's own for non-staff,
/// the requested one for staff.
async fn resolve_point_of_sale(
    state: &AppState,
    viewer: &Viewer,
    requested: Option<i64>,
) -> Result<PointOfSale, AppError> {
    if !viewer.is_staff {
        return viewer.point_of_sale.clone().ok_or_else(|| {
            AppError::bad_request("Your user has no point of sale assigned")
        });
    }

    let pos_id =
        requested.ok_or_else(|| AppError::bad_request("point_of_sale_id is required"))?;
    state
        .db
        .get_point_of_sale(pos_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Unknown point of sale"))
}

async fn ensure_supplier(state: &AppState, supplier_id: i64) -> Result<(), AppError> {
    state
        .db
        .get_supplier(supplier_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("Unknown supplier"))
}

fn requested_status(req: &InvoiceRequest) -> InvoiceStatus {
    req.status
        .as_deref()
        .map(InvoiceStatus::from_string)
        .unwrap_or(InvoiceStatus::Pending)
}

/// POST /invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    ValidatedJson(req): ValidatedJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let pos = resolve_point_of_sale(&state, &viewer, req.point_of_sale_id).await?;
    ensure_supplier(&state, req.supplier_id).await?;

    let settlement = settle_on_save(req.amount, requested_status(&req), Decimal::ZERO);
    let cash = cash_payment_for(&settlement, CashOrigin::Created, state.today(), &pos);

    let invoice = state
        .db
        .create_invoice(
            &CreateInvoice {
                supplier_id: req.supplier_id,
                pos_id: pos.pos_id,
                invoice_number: req.invoice_number.trim().to_uppercase(),
                invoice_date: req.invoice_date,
                amount: req.amount,
                amount_paid: settlement.amount_paid,
                status: settlement.status,
                created_by: Some(viewer.user_id),
            },
            cash.as_ref(),
        )
        .await?;

    record_event("invoice_created");
    tracing::info!(
        invoice_id = invoice.invoice_id,
        pos_id = invoice.pos_id,
        status = %invoice.status,
        "Invoice created"
    );

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let payments = state.db.list_invoice_payments(invoice_id).await?;
    let is_cash_payment = payments.iter().any(|p| p.is_cash());
    let editable = payments.is_empty() && !invoice.confirmed;

    Ok(Json(InvoiceDetailResponse {
        balance: invoice.balance(),
        invoice,
        payments,
        is_cash_payment,
        editable,
    }))
}

/// PUT /invoices/:id
pub async fn update_invoice(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(invoice_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<InvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let current = state
        .db
        .get_invoice(invoice_id, viewer.scope().filter())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;

    let pos = resolve_point_of_sale(&state, &viewer, req.point_of_sale_id).await?;
    ensure_supplier(&state, req.supplier_id).await?;

    let settlement = settle_on_save(req.amount, requested_status(&req), current.amount_paid);
    let cash = cash_payment_for(&settlement, CashOrigin::Edited, state.today(), &pos);

    let invoice = state
        .db
        .update_invoice(
            invoice_id,
            &UpdateInvoice {
                supplier_id: req.supplier_id,
                pos_id: pos.pos_id,
                invoice_number: req.invoice_number.trim().to_uppercase(),
                invoice_date: req.invoice_date,
                amount: req.amount,
                amount_paid: settlement.amount_paid,
                status: settlement.status,
            },
            cash.as_ref(),
        )
        .await?;

    Ok(Json(invoice))
}

/// DELETE /invoices/:id
pub async fn delete_invoice(
    State(state): State<AppState>,
    StaffUser(admin): StaffUser,
    Path(invoice_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_invoice(invoice_id).await? {
        return Err(AppError::not_found("Invoice not found"));
    }
    tracing::info!(invoice_id, deleted_by = admin.user_id, "Invoice deleted by staff");
    Ok(StatusCode::NO_CONTENT)
}
