use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use tripbook_core::{NewTrip, Principal, Trip, TripUpdate};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::Path;
use crate::state::AppState;

/// Catalogue reads, open to anonymous callers.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips))
        .route("/trips/{id}", get(get_trip))
}

/// Catalogue writes. Mounted behind `authenticate`; the registry enforces the admin role.
pub fn manage_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/{id}", put(update_trip).delete(deactivate_trip))
}

async fn list_trips(State(state): State<AppState>) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.registry.list(true).await?;
    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.registry.get(id).await?;
    Ok(Json(trip))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<NewTrip>, JsonRejection>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let Json(req) = payload?;
    let trip = state.registry.create(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn update_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TripUpdate>, JsonRejection>,
) -> Result<Json<Trip>, AppError> {
    let Json(req) = payload?;
    let trip = state.registry.update(&principal, id, req).await?;
    Ok(Json(trip))
}

async fn deactivate_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registry.deactivate(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
