//! Catalog administration: titles, physical items, and lost marking.

use common::{AccountId, Barcode, Book, BookItem, Isbn, ItemStatus};
use store::{Guard, LibraryStore, Mutation, WriteBatch};

use crate::capability::CapabilityChecker;
use crate::error::{DomainError, Result};

/// Service for the catalog and inventory.
pub struct CatalogService<S> {
    store: S,
}

impl<S: LibraryStore> CatalogService<S> {
    /// Creates a new catalog service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds a title to the catalog.
    #[tracing::instrument(skip(self, caps, book), fields(isbn = %book.isbn))]
    pub async fn add_book(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        book: Book,
    ) -> Result<Book> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("catalog changes are staff-only"));
        }
        if book.isbn.as_str().is_empty() {
            return Err(DomainError::Validation("isbn must not be empty".to_string()));
        }
        self.store.insert_book(book.clone()).await?;
        Ok(book)
    }

    /// Fetches a title by ISBN.
    pub async fn get_book(&self, isbn: &Isbn) -> Result<Book> {
        self.store
            .get_book(isbn)
            .await?
            .ok_or_else(|| DomainError::not_found("book", isbn))
    }

    /// Lists all titles.
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        self.store.list_books().await.map_err(Into::into)
    }

    /// Adds a physical copy of a catalogued title.
    #[tracing::instrument(skip(self, caps, item), fields(barcode = %item.barcode))]
    pub async fn add_book_item(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        item: BookItem,
    ) -> Result<BookItem> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("catalog changes are staff-only"));
        }
        if item.barcode.as_str().is_empty() {
            return Err(DomainError::Validation(
                "barcode must not be empty".to_string(),
            ));
        }
        self.store.insert_book_item(item.clone()).await?;
        Ok(item)
    }

    /// Fetches a copy by barcode.
    pub async fn get_book_item(&self, barcode: &Barcode) -> Result<BookItem> {
        self.store
            .get_book_item(barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("book item", barcode))
    }

    /// Lists copies, optionally restricted to one title.
    pub async fn list_book_items(&self, isbn: Option<&Isbn>) -> Result<Vec<BookItem>> {
        self.store.list_book_items(isbn).await.map_err(Into::into)
    }

    /// Writes an item off as lost. Administrative: legal from any state.
    ///
    /// An open lending on the item stays open; the desk settles it
    /// separately.
    #[tracing::instrument(skip(self, caps))]
    pub async fn mark_lost(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        barcode: &Barcode,
    ) -> Result<BookItem> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("lost marking is staff-only"));
        }
        let mut item = self.get_book_item(barcode).await?;

        let batch = WriteBatch::new()
            .guard(Guard::ItemStatus {
                barcode: item.barcode.clone(),
                expected: item.status,
            })
            .mutate(Mutation::SetItemState {
                barcode: item.barcode.clone(),
                status: ItemStatus::Lost,
                borrowed_at: item.borrowed_at,
                due_date: item.due_date,
            });
        self.store.apply(batch).await?;

        tracing::warn!(barcode = %item.barcode, "book item written off as lost");
        item.status = ItemStatus::Lost;
        Ok(item)
    }
}
