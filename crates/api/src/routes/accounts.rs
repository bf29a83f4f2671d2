//! Account registration, status, and ledger reconciliation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Account, AccountId, AccountStatus};
use serde::{Deserialize, Serialize};
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::{AppState, parse_account_id};

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterAccountRequest {
    /// Account id issued by the identity provider; generated when omitted.
    pub account_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub status: String,
    pub issued_book_count: u32,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            status: account.status.to_string(),
            issued_book_count: account.issued_book_count,
        }
    }
}

#[derive(Serialize)]
pub struct RecalculateResponse {
    pub issued_book_count: u32,
}

// -- Handlers --

/// POST /accounts — register a new account (librarian).
#[tracing::instrument(skip(state, principal, req))]
pub async fn register<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account_id = match req.account_id {
        Some(ref id) => parse_account_id(id)?,
        None => AccountId::new(),
    };

    let account = state
        .accounts
        .register(&principal.capabilities(), principal.account_id, account_id)
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /accounts/{id} — account detail (owner or librarian).
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_account_id(&id)?;
    let account = state
        .accounts
        .get(&principal.capabilities(), principal.account_id, account_id)
        .await?;
    Ok(Json(account.into()))
}

/// PUT /accounts/{id}/status — move an account into a soft status (librarian).
#[tracing::instrument(skip(state, principal, req))]
pub async fn set_status<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_account_id(&id)?;
    let status = AccountStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown account status {:?}", req.status)))?;

    let caps = principal.capabilities();
    state
        .accounts
        .set_status(&caps, principal.account_id, account_id, status)
        .await?;
    let account = state
        .accounts
        .get(&caps, principal.account_id, account_id)
        .await?;
    Ok(Json(account.into()))
}

/// GET /accounts/{id}/lendings — one account's lendings (owner or see-all).
#[tracing::instrument(skip(state, principal))]
pub async fn lendings<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Vec<super::lendings::LendingResponse>>, ApiError> {
    let account_id = parse_account_id(&id)?;
    let lendings = state
        .lendings
        .list_for_account(&principal.capabilities(), principal.account_id, account_id)
        .await?;
    Ok(Json(lendings.into_iter().map(Into::into).collect()))
}

/// POST /accounts/{id}/recalculate — recompute the issued-book counter from
/// the lending table (librarian).
#[tracing::instrument(skip(state, principal))]
pub async fn recalculate<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<RecalculateResponse>, ApiError> {
    let account_id = parse_account_id(&id)?;
    let issued_book_count = state
        .accounts
        .recalculate_issued_book_count(&principal.capabilities(), principal.account_id, account_id)
        .await?;
    Ok(Json(RecalculateResponse { issued_book_count }))
}
