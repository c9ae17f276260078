use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::suppliers::{SupplierQuery, SupplierRequest};
use crate::middleware::CurrentUser;
use crate::models::{Supplier, SupplierOrdering};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// GET /suppliers?q=&ordering=
pub async fn list_suppliers(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Query(params): Query<SupplierQuery>,
) -> Result<Json<Vec<Supplier>>, AppError> {
    let ordering = SupplierOrdering::parse(params.ordering.as_deref());
    let suppliers = state
        .db
        .list_suppliers(params.q.as_deref(), ordering)
        .await?;
    Ok(Json(suppliers))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    ValidatedJson(req): ValidatedJson<SupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), AppError> {
    let supplier = state.db.create_supplier(&req.into_model()).await?;
    tracing::info!(
        supplier_id = supplier.supplier_id,
        created_by = viewer.user_id,
        "Supplier created"
    );
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(supplier_id): Path<i64>,
) -> Result<Json<Supplier>, AppError> {
    state
        .db
        .get_supplier(supplier_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Supplier not found"))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(supplier_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SupplierRequest>,
) -> Result<Json<Supplier>, AppError> {
    state
        .db
        .update_supplier(supplier_id, &req.into_model())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Supplier not found"))
}

/// DELETE /suppliers/:id
///
/// Suppliers still referenced by invoices or batches cannot be removed.
pub async fn delete_supplier(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(supplier_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_supplier(supplier_id).await? {
        return Err(AppError::not_found("Supplier not found"));
    }
    tracing::info!(supplier_id, "Supplier deleted");
    Ok(StatusCode::NO_CONTENT)
}
