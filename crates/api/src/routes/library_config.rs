//! Circulation policy endpoints (singleton config record).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::LibraryConfig;
use serde::Deserialize;
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::AppState;

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    pub maximum_book_issue_limit: u32,
    pub maximum_day_limit: u32,
    pub fine_per_late_day: u32,
}

/// GET /config — the current circulation policy.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
) -> Result<Json<LibraryConfig>, ApiError> {
    let config = state
        .store
        .load_config()
        .await
        .map_err(domain::DomainError::from)?;
    Ok(Json(config))
}

/// PUT /config — overwrite the singleton policy record (librarian).
#[tracing::instrument(skip(state, principal, req))]
pub async fn update<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<LibraryConfig>, ApiError> {
    if !principal.is_librarian() {
        return Err(domain::DomainError::Forbidden("policy changes are staff-only").into());
    }
    let config = LibraryConfig {
        maximum_book_issue_limit: req.maximum_book_issue_limit,
        maximum_day_limit: req.maximum_day_limit,
        fine_per_late_day: req.fine_per_late_day,
    };
    state
        .store
        .save_config(config)
        .await
        .map_err(domain::DomainError::from)?;
    Ok(Json(config))
}
