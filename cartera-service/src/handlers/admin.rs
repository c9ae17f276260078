//! User and point-of-sale administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use secrecy::Secret;
use service_core::error::AppError;

use crate::dtos::admin::{AssignPointOfSaleRequest, CreatePointOfSaleRequest, CreateUserRequest};
use crate::middleware::{CurrentUser, StaffUser};
use crate::models::{CreatePointOfSale, CreateUser, PointOfSale, User};
use crate::startup::AppState;
use crate::utils::{hash_password, ValidatedJson};

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    StaffUser(admin): StaffUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let password_hash =
        hash_password(&Secret::new(req.password)).map_err(AppError::InternalError)?;

    let user = state
        .db
        .create_user(&CreateUser {
            username: req.username.trim().to_string(),
            email: req.email.unwrap_or_default().trim().to_string(),
            password_hash,
            is_staff: req.is_staff,
        })
        .await?;

    tracing::info!(
        user_id = user.user_id,
        created_by = admin.user_id,
        is_staff = user.is_staff,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db.list_users().await?))
}

/// GET /points-of-sale
///
/// Staff get every point of sale; anyone else only their own.
pub async fn list_points_of_sale(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<Vec<PointOfSale>>, AppError> {
    if viewer.is_staff {
        return Ok(Json(state.db.list_points_of_sale().await?));
    }
    Ok(Json(viewer.point_of_sale.into_iter().collect()))
}

/// POST /points-of-sale
pub async fn create_point_of_sale(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    ValidatedJson(req): ValidatedJson<CreatePointOfSaleRequest>,
) -> Result<(StatusCode, Json<PointOfSale>), AppError> {
    if let Some(user_id) = req.user_id {
        state
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
    }

    let pos = state
        .db
        .create_point_of_sale(&CreatePointOfSale {
            name: req.name.trim().to_string(),
            city: req.city.trim().to_string(),
            user_id: req.user_id,
        })
        .await?;

    tracing::info!(pos_id = pos.pos_id, name = %pos.name, "Point of sale created");

    Ok((StatusCode::CREATED, Json(pos)))
}

/// PUT /users/:id/point-of-sale
///
/// Replaces any previous assignment.
pub async fn assign_point_of_sale(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<AssignPointOfSaleRequest>,
) -> Result<Json<User>, AppError> {
    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    state
        .db
        .get_point_of_sale(req.point_of_sale_id)
        .await?
        .ok_or_else(|| AppError::not_found("Point of sale not found"))?;

    state
        .db
        .assign_point_of_sale(user_id, req.point_of_sale_id)
        .await?;

    tracing::info!(user_id, pos_id = req.point_of_sale_id, "Point of sale assigned");

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(user))
}

/// DELETE /users/:id/point-of-sale
pub async fn unassign_point_of_sale(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.unassign_point_of_sale(user_id).await? {
        return Err(AppError::not_found("User has no point of sale assigned"));
    }
    tracing::info!(user_id, "Point of sale unassigned");
    Ok(StatusCode::NO_CONTENT)
}
