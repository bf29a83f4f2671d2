//! Catalog title endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Book, Isbn};
use serde::{Deserialize, Serialize};
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookRequest {
    pub isbn: String,
    pub title: String,
    pub subject: String,
    pub publisher: String,
    pub language: String,
    pub number_of_pages: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct BookResponse {
    pub isbn: String,
    pub title: String,
    pub subject: String,
    pub publisher: String,
    pub language: String,
    pub number_of_pages: u32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            isbn: book.isbn.to_string(),
            title: book.title,
            subject: book.subject,
            publisher: book.publisher,
            language: book.language,
            number_of_pages: book.number_of_pages,
        }
    }
}

// -- Handlers --

/// POST /books — add a title to the catalog (librarian).
#[tracing::instrument(skip(state, principal, req))]
pub async fn create<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let book = Book {
        isbn: Isbn::new(req.isbn),
        title: req.title,
        subject: req.subject,
        publisher: req.publisher,
        language: req.language,
        number_of_pages: req.number_of_pages,
    };
    let book = state
        .catalog
        .add_book(&principal.capabilities(), principal.account_id, book)
        .await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

/// GET /books — list all titles.
#[tracing::instrument(skip(state, _principal))]
pub async fn list<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = state.catalog.list_books().await?;
    Ok(Json(books.into_iter().map(Into::into).collect()))
}

/// GET /books/{isbn} — title detail.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
    Path(isbn): Path<String>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.catalog.get_book(&Isbn::new(isbn)).await?;
    Ok(Json(book.into()))
}
