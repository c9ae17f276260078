//! Login and the current-user endpoint.

use axum::{extract::State, Json};
use secrecy::Secret;
use service_core::error::AppError;

use crate::dtos::auth::{LoginRequest, LoginResponse, MeResponse};
use crate::middleware::CurrentUser;
use crate::startup::AppState;
use crate::utils::{verify_password, ValidatedJson};

/// Exchange username and password for a bearer token.
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::AuthError(anyhow::anyhow!("Invalid credentials"));

    let user = state
        .db
        .get_user_by_username(req.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        tracing::warn!(user_id = user.user_id, "Login attempt on inactive account");
        return Err(invalid());
    }

    if !verify_password(&Secret::new(req.password), &user.password_hash) {
        tracing::warn!(user_id = user.user_id, "Login failed: wrong password");
        return Err(invalid());
    }

    let token = state
        .jwt
        .generate_access_token(&user)
        .map_err(AppError::InternalError)?;

    tracing::info!(user_id = user.user_id, is_staff = user.is_staff, "User logged in");

    Ok(Json(LoginResponse {
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
        user,
    }))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .db
        .get_user(viewer.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        scope: viewer.scope(),
        point_of_sale: viewer.point_of_sale,
        user,
    }))
}
