use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tripbook_core::{CoreError, Principal};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Token payload. `sub` is the account id; `email` and `role` are only
/// informational since the stored account decides both.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("invalid token: {}", e)))?;

    Ok(token_data.claims)
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Decode the bearer token, load the account behind it and attach the
/// caller's `Principal` to the request.
pub async fn authenticate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    // 1. Extract token from Authorization header
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state)
            .await
            .map_err(|_| AppError::AuthenticationError("missing bearer token".to_string()))?;

    // 2. Decode and validate JWT
    let claims = decode_claims(bearer.token(), &state.auth.secret)?;

    // 3. Resolve the live account; deactivated ones are turned away
    let principal = state
        .accounts
        .principal_for(&claims.sub)
        .await
        .map_err(|err| match err {
            CoreError::NotFound(_) => AppError::AuthenticationError("unknown account".to_string()),
            other => AppError::from(other),
        })?;

    // 4. Inject principal into request extensions
    parts.extensions.insert(principal);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

// ============================================================================
// Admin Gate
// ============================================================================

/// Runs after `authenticate`; turns away everyone but admins.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

    if !principal.is_admin() {
        return Err(AppError::AuthorizationError("admin role required".to_string()));
    }

    Ok(next.run(req).await)
}
