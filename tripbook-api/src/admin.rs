use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use tripbook_core::{Principal, Reservation, Trip, User};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::Path;
use crate::reservations::pdf_response;
use crate::state::AppState;

/// Back-office views. Mounted behind `authenticate` and `require_admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_all_trips))
        .route("/trips/{id}/reconcile", post(reconcile_trip))
        .route("/reservations/trip/{trip_id}", get(list_all_reservations))
        .route("/reservations/pdf/{id}", get(reservation_pdf))
        .route("/users", get(list_all_users))
        .route("/users/deactivate/{id}", delete(deactivate_user))
}

async fn list_all_trips(State(state): State<AppState>) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.registry.list(false).await?;
    Ok(Json(trips))
}

async fn list_all_reservations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let reservations = state.ledger.list_for_trip(&principal, trip_id, false).await?;
    Ok(Json(reservations))
}

/// Recompute available spots from live reservations.
async fn reconcile_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.registry.reconcile(&principal, id).await?;
    Ok(Json(trip))
}

async fn reservation_pdf(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    pdf_response(&state, &principal, id).await
}

/// Every account, deactivated ones included.
async fn list_all_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.accounts.list(&principal, false).await?;
    Ok(Json(users))
}

async fn deactivate_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.accounts.deactivate(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
