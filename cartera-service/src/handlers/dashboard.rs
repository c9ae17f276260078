use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::reports::AnalyticsQuery;
use crate::middleware::{CurrentUser, StaffUser};
use crate::models::AnalyticsFilter;
use crate::services::database::{AnalyticsReport, DashboardSummary};
use crate::startup::AppState;

/// GET /dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<DashboardSummary>, AppError> {
    let summary = state.db.dashboard_summary(viewer.scope().filter()).await?;
    Ok(Json(summary))
}

/// GET /analytics?pdv=&prov=&d1=&d2=
///
/// Malformed filters fall back to their defaults instead of failing.
pub async fn analytics(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let filter = AnalyticsFilter::from_raw(
        params.pdv.as_deref(),
        params.prov.as_deref(),
        params.d1.as_deref(),
        params.d2.as_deref(),
        state.today(),
    );
    Ok(Json(state.db.analytics(&filter).await?))
}
