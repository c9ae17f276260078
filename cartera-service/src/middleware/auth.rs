use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::services::Viewer;
use crate::startup::AppState;

/// Middleware to require a valid bearer token from an active user.
///
/// The resolved [`Viewer`] is stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    let user_id = claims.user_id().map_err(AppError::Unauthorized)?;
    let user = state
        .db
        .get_user(user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("User is inactive or unknown")))?;

    let point_of_sale = if user.is_staff {
        None
    } else {
        state.db.user_point_of_sale(user.user_id).await?
    };

    tracing::Span::current().record("user_id", user.user_id);

    req.extensions_mut()
        .insert(Viewer::from_user(&user, point_of_sale));

    Ok(next.run(req).await)
}

/// Extractor for the authenticated user.
pub struct CurrentUser(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let viewer = parts.extensions.get::<Viewer>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Viewer missing from request extensions"))
        })?;

        Ok(CurrentUser(viewer.clone()))
    }
}

/// Extractor for an authenticated staff user; anyone else gets 403.
pub struct StaffUser(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(viewer) = CurrentUser::from_request_parts(parts, state).await?;
        if !viewer.is_staff {
            return Err(AppError::forbidden("Staff access required"));
        }
        Ok(StaffUser(viewer))
    }
}
