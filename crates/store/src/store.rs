use async_trait::async_trait;

use common::{
    Account, AccountId, AccountStatus, Barcode, Book, BookItem, Fine, Isbn, Lending, LendingId,
    LibraryConfig, Notification, NotificationId, Reservation, ReservationId,
};

use crate::batch::{Mutation, WriteBatch};
use crate::error::Result;

/// Core trait for library store implementations.
///
/// Reads are plain row lookups; every state change that the circulation
/// workflows perform goes through [`LibraryStore::apply`], which commits a
/// guarded batch atomically. Catalog and account provisioning are simple
/// inserts outside that path. All implementations must be thread-safe.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    // -- accounts --

    /// Inserts a new account. Fails with a conflict if the id is taken.
    async fn insert_account(&self, account: Account) -> Result<()>;

    /// Fetches an account by id.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>>;

    /// Moves an account into a (soft) membership status.
    async fn update_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()>;

    /// Overwrites the denormalized open-lending counter.
    ///
    /// Reconciliation only; workflows adjust the counter through batches.
    async fn set_issued_book_count(&self, id: AccountId, count: u32) -> Result<()>;

    // -- catalog --

    /// Inserts a new book title.
    async fn insert_book(&self, book: Book) -> Result<()>;

    /// Fetches a book by ISBN.
    async fn get_book(&self, isbn: &Isbn) -> Result<Option<Book>>;

    /// Lists all books.
    async fn list_books(&self) -> Result<Vec<Book>>;

    /// Inserts a new physical item.
    async fn insert_book_item(&self, item: BookItem) -> Result<()>;

    /// Fetches an item by barcode.
    async fn get_book_item(&self, barcode: &Barcode) -> Result<Option<BookItem>>;

    /// Lists items, optionally restricted to one title.
    async fn list_book_items(&self, isbn: Option<&Isbn>) -> Result<Vec<BookItem>>;

    // -- lendings --

    /// Fetches a lending by id.
    async fn get_lending(&self, id: LendingId) -> Result<Option<Lending>>;

    /// Finds the open lending for an item, if any.
    ///
    /// At most one lending per item is open at any time.
    async fn find_open_lending(&self, barcode: &Barcode) -> Result<Option<Lending>>;

    /// Lists lendings, all of them or one account's.
    async fn list_lendings(&self, account_id: Option<AccountId>) -> Result<Vec<Lending>>;

    /// Counts an account's open lendings from the authoritative table.
    async fn count_open_lendings(&self, account_id: AccountId) -> Result<u32>;

    // -- reservations --

    /// Fetches a reservation by id.
    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Finds the active (Waiting/Pending) reservation on an item, if any.
    async fn find_active_reservation(&self, barcode: &Barcode) -> Result<Option<Reservation>>;

    /// Lists reservations, all of them or one account's.
    async fn list_reservations(&self, account_id: Option<AccountId>) -> Result<Vec<Reservation>>;

    // -- fines --

    /// Fetches the fine penalizing a lending. Direct relation lookup.
    async fn get_fine(&self, lending_id: LendingId) -> Result<Option<Fine>>;

    // -- notifications --

    /// Fetches a notification by id.
    async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// Lists an account's notifications in append order.
    async fn list_notifications(&self, account_id: AccountId) -> Result<Vec<Notification>>;

    /// Flags a notification as read.
    async fn mark_notification_read(&self, id: NotificationId) -> Result<()>;

    // -- config --

    /// Loads the singleton circulation policy, falling back to defaults when
    /// none has been stored yet.
    async fn load_config(&self) -> Result<LibraryConfig>;

    /// Overwrites the singleton circulation policy.
    async fn save_config(&self, config: LibraryConfig) -> Result<()>;

    // -- atomic write path --

    /// Applies a guarded batch atomically.
    ///
    /// Either every mutation lands or none does. Guards are re-validated
    /// inside the transaction boundary; a failed guard surfaces as
    /// [`crate::StoreError::Conflict`] with no state change.
    async fn apply(&self, batch: WriteBatch) -> Result<()>;
}

/// Extension trait providing convenience methods for library stores.
#[async_trait]
pub trait StoreExt: LibraryStore {
    /// Applies a single unguarded mutation.
    async fn apply_one(&self, mutation: Mutation) -> Result<()> {
        self.apply(WriteBatch::new().mutate(mutation)).await
    }
}

// Blanket implementation for all LibraryStore implementations
impl<T: LibraryStore + ?Sized> StoreExt for T {}
