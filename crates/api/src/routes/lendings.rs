//! Lending read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use common::Lending;
use domain::ReturnReceipt;
use serde::Serialize;
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::{AppState, parse_lending_id};

// -- Response types --

#[derive(Serialize)]
pub struct LendingResponse {
    pub id: String,
    pub account_id: String,
    pub barcode: String,
    pub created_on: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_at: Option<NaiveDate>,
}

impl From<Lending> for LendingResponse {
    fn from(lending: Lending) -> Self {
        Self {
            id: lending.id.to_string(),
            account_id: lending.account_id.to_string(),
            barcode: lending.barcode.to_string(),
            created_on: lending.created_on,
            due_date: lending.due_date,
            returned_at: lending.returned_at,
        }
    }
}

#[derive(Serialize)]
pub struct ReturnResponse {
    pub lending: LendingResponse,
    pub fine_amount: u32,
}

impl From<ReturnReceipt> for ReturnResponse {
    fn from(receipt: ReturnReceipt) -> Self {
        Self {
            lending: receipt.lending.into(),
            fine_amount: receipt.fine_amount,
        }
    }
}

#[derive(Serialize)]
pub struct FineResponse {
    pub lending_id: String,
    pub amount: u32,
}

// -- Handlers --

/// GET /lendings — everything for see-all holders, own lendings otherwise.
#[tracing::instrument(skip(state, principal))]
pub async fn list<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<Vec<LendingResponse>>, ApiError> {
    let lendings = state
        .lendings
        .list(&principal.capabilities(), principal.account_id)
        .await?;
    Ok(Json(lendings.into_iter().map(Into::into).collect()))
}

/// GET /lendings/{id} — lending detail, gated by visibility.
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<LendingResponse>, ApiError> {
    let lending_id = parse_lending_id(&id)?;
    let lending = state
        .lendings
        .get(&principal.capabilities(), principal.account_id, lending_id)
        .await?;
    Ok(Json(lending.into()))
}

/// GET /lendings/{id}/fine — the fine a lending incurred, zero when none.
#[tracing::instrument(skip(state, principal))]
pub async fn fine<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<FineResponse>, ApiError> {
    let lending_id = parse_lending_id(&id)?;
    // Visibility first; the fine shares its lending's owner.
    state
        .lendings
        .get(&principal.capabilities(), principal.account_id, lending_id)
        .await?;
    let amount = state.lendings.fine_for(lending_id).await?;
    Ok(Json(FineResponse {
        lending_id: lending_id.to_string(),
        amount,
    }))
}
