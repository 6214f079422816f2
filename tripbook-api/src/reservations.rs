use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::debug;
use tripbook_core::{NewReservation, Principal, Reservation};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Path, Query};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

fn default_active_only() -> bool {
    true
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/trip/{trip_id}", get(list_for_trip))
        .route("/reservations/{id}", get(get_reservation).delete(cancel_reservation))
        .route("/reservations/{id}/summary", get(download_summary))
        .route("/reservations/{id}/pdf", get(download_pdf))
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<NewReservation>, JsonRejection>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let Json(req) = payload?;
    let reservation = state.ledger.create(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn list_for_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(trip_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let reservations = state
        .ledger
        .list_for_trip(&principal, trip_id, query.active_only)
        .await?;
    Ok(Json(reservations))
}

async fn get_reservation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.ledger.get(id, &principal).await?;
    Ok(Json(reservation))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.ledger.cancel(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download_summary(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.ledger.summary(id, &principal).await?;
    debug!(reservation_id = %id, bytes = document.len(), "summary rendered");

    let disposition = format!("attachment; filename=\"reservation_{}.txt\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    ))
}

async fn download_pdf(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    pdf_response(&state, &principal, id).await
}

/// Render the reservation as a PDF attachment. Shared with the admin route.
pub(crate) async fn pdf_response(state: &AppState, principal: &Principal, id: Uuid) -> Result<Response, AppError> {
    let document = state.ledger.pdf(id, principal).await?;
    debug!(reservation_id = %id, bytes = document.len(), "pdf rendered");

    let disposition = format!("attachment; filename=\"reservation_{}.pdf\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response())
}
