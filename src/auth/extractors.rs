use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{errors::AppError, state::AppState, users::repo_types::User};

/// The account resolved from the bearer token, valid for one request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Pulls `<token>` out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Gate for protected routes: verifies the token, loads the user and
/// attaches it to the request as [`CurrentUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let user_id = keys.verify(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AppError::Forbidden("Invalid token".into())
    })?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "token for missing user");
            AppError::Unauthorized("User not found".into())
        })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("User not authenticated".into()))
    }
}
