//! Book item endpoints: inventory plus the circulation actions.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{Barcode, BookFormat, BookItem, Isbn, ItemStatus};
use serde::{Deserialize, Serialize};
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::lendings::{LendingResponse, ReturnResponse};
use super::reservations::ReservationResponse;
use super::{AppState, parse_account_id};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookItemRequest {
    pub barcode: String,
    pub isbn: String,
    #[serde(default)]
    pub is_reference_only: bool,
    pub format: Option<String>,
    #[serde(default)]
    pub price: u32,
    pub date_of_purchase: NaiveDate,
    #[serde(default)]
    pub placement: String,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub account_id: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub bypass_quota: bool,
}

#[derive(Deserialize, Default)]
pub struct ReturnRequest {
    pub return_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct ReserveRequest {
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub isbn: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct BookItemResponse {
    pub barcode: String,
    pub isbn: String,
    pub is_reference_only: bool,
    pub status: String,
    pub format: String,
    pub price: u32,
    pub borrowed_at: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub date_of_purchase: NaiveDate,
    pub placement: String,
}

impl From<BookItem> for BookItemResponse {
    fn from(item: BookItem) -> Self {
        Self {
            barcode: item.barcode.to_string(),
            isbn: item.isbn.to_string(),
            is_reference_only: item.is_reference_only,
            status: item.status.to_string(),
            format: item.format.to_string(),
            price: item.price,
            borrowed_at: item.borrowed_at,
            due_date: item.due_date,
            date_of_purchase: item.date_of_purchase,
            placement: item.placement,
        }
    }
}

// -- Handlers --

/// POST /book-items — add a physical copy (librarian).
#[tracing::instrument(skip(state, principal, req))]
pub async fn create<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<CreateBookItemRequest>,
) -> Result<(StatusCode, Json<BookItemResponse>), ApiError> {
    let format = match req.format {
        Some(ref raw) => BookFormat::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown format {raw:?}")))?,
        None => BookFormat::default(),
    };
    let item = BookItem {
        barcode: Barcode::new(req.barcode),
        isbn: Isbn::new(req.isbn),
        is_reference_only: req.is_reference_only,
        status: ItemStatus::Available,
        format,
        price: req.price,
        borrowed_at: None,
        due_date: None,
        date_of_purchase: req.date_of_purchase,
        placement: req.placement,
    };
    let item = state
        .catalog
        .add_book_item(&principal.capabilities(), principal.account_id, item)
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// GET /book-items — list copies, optionally one title's.
#[tracing::instrument(skip(state, _principal))]
pub async fn list<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BookItemResponse>>, ApiError> {
    let isbn = query.isbn.map(Isbn::new);
    let items = state.catalog.list_book_items(isbn.as_ref()).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// GET /book-items/{barcode} — copy detail.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
    Path(barcode): Path<String>,
) -> Result<Json<BookItemResponse>, ApiError> {
    let item = state.catalog.get_book_item(&Barcode::new(barcode)).await?;
    Ok(Json(item.into()))
}

/// POST /book-items/{barcode}/checkout — issue the item to an account.
#[tracing::instrument(skip(state, principal, req))]
pub async fn checkout<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(barcode): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<LendingResponse>), ApiError> {
    let account_id = parse_account_id(&req.account_id)?;
    let mut cmd = domain::CheckOut::new(account_id, barcode.as_str());
    cmd.due_date = req.due_date;
    cmd.bypass_quota = req.bypass_quota;

    let lending = state
        .lendings
        .check_out(&principal.capabilities(), principal.account_id, cmd)
        .await?;
    Ok((StatusCode::CREATED, Json(lending.into())))
}

/// POST /book-items/{barcode}/return — return the open lending on the item.
#[tracing::instrument(skip(state, principal, req))]
pub async fn return_item<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(barcode): Path<String>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<ReturnResponse>, ApiError> {
    let mut cmd = domain::ReturnItem::new(barcode.as_str());
    cmd.return_date = req.return_date;
    cmd.note = req.note;

    let receipt = state
        .lendings
        .return_item(&principal.capabilities(), principal.account_id, cmd)
        .await?;
    Ok(Json(receipt.into()))
}

/// POST /book-items/{barcode}/reserve — place a hold on the item.
#[tracing::instrument(skip(state, principal, req))]
pub async fn reserve<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(barcode): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let account_id = parse_account_id(&req.account_id)?;
    let reservation = state
        .reservations
        .reserve(
            &principal.capabilities(),
            principal.account_id,
            domain::Reserve::new(account_id, barcode.as_str()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// POST /book-items/{barcode}/release — put a reserved item with no active
/// hold back into circulation (librarian).
#[tracing::instrument(skip(state, principal))]
pub async fn release<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(barcode): Path<String>,
) -> Result<Json<BookItemResponse>, ApiError> {
    let barcode = Barcode::new(barcode);
    state
        .reservations
        .release(&principal.capabilities(), principal.account_id, &barcode)
        .await?;
    let item = state.catalog.get_book_item(&barcode).await?;
    Ok(Json(item.into()))
}

/// POST /book-items/{barcode}/lost — write the item off (librarian).
#[tracing::instrument(skip(state, principal))]
pub async fn mark_lost<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(barcode): Path<String>,
) -> Result<Json<BookItemResponse>, ApiError> {
    let item = state
        .catalog
        .mark_lost(
            &principal.capabilities(),
            principal.account_id,
            &Barcode::new(barcode),
        )
        .await?;
    Ok(Json(item.into()))
}
