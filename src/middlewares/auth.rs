use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::{AuthService, Claims};
use crate::state::AppState;

/// The caller, as vouched for by a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Reject requests without a valid bearer token; otherwise stash the caller
/// in the request extensions for [`AuthUser`] to pick up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(AuthService::bearer_token)
    else {
        tracing::debug!(path = %request.uri().path(), "request without bearer token");
        return Err(AppError::Unauthenticated);
    };

    let claims = AuthService::verify_token(token, &state.config).inspect_err(|e| {
        tracing::debug!(path = %request.uri().path(), error = %e, "bearer token rejected");
    })?;
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}
