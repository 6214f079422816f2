use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use tripbook_core::{NewUser, PasswordChange, Principal, User};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::Path;
use crate::state::AppState;

/// Sign-up, open to anonymous callers.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/users", post(register))
}

/// Mounted behind `authenticate`; the account service enforces the admin role.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me/password", put(change_password))
        .route("/users/{id}", delete(deactivate_user))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(req) = payload?;
    let user = state.accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.accounts.list(&principal, true).await?;
    Ok(Json(users))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<PasswordChange>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = payload?;
    state.accounts.change_password(&principal, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn deactivate_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.accounts.deactivate(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
