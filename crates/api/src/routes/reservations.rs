//! Reservation read and cancel endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::Reservation;
use serde::Serialize;
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::{AppState, parse_reservation_id};

// -- Response types --

#[derive(Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub account_id: String,
    pub barcode: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id.to_string(),
            account_id: reservation.account_id.to_string(),
            barcode: reservation.barcode.to_string(),
            status: reservation.status.to_string(),
            created_at: reservation.created_at,
        }
    }
}

// -- Handlers --

/// GET /reservations — everything for see-all holders, own holds otherwise.
#[tracing::instrument(skip(state, principal))]
pub async fn list<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let reservations = state
        .reservations
        .list(&principal.capabilities(), principal.account_id)
        .await?;
    Ok(Json(reservations.into_iter().map(Into::into).collect()))
}

/// GET /reservations/{id} — reservation detail, gated by visibility.
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation_id = parse_reservation_id(&id)?;
    let reservation = state
        .reservations
        .get(
            &principal.capabilities(),
            principal.account_id,
            reservation_id,
        )
        .await?;
    Ok(Json(reservation.into()))
}

/// POST /reservations/{id}/cancel — withdraw a hold (owner or staff).
#[tracing::instrument(skip(state, principal))]
pub async fn cancel<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation_id = parse_reservation_id(&id)?;
    let reservation = state
        .reservations
        .cancel(
            &principal.capabilities(),
            principal.account_id,
            reservation_id,
        )
        .await?;
    Ok(Json(reservation.into()))
}
