use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{
    Account, AccountId, AccountStatus, Barcode, Book, BookItem, Fine, Isbn, Lending, LendingId,
    LibraryConfig, Notification, NotificationId, Reservation, ReservationId, ReservationStatus,
};

use crate::{
    Guard, Mutation, Result, StoreError, WriteBatch,
    batch::validate_batch,
    store::LibraryStore,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    books: HashMap<Isbn, Book>,
    items: HashMap<Barcode, BookItem>,
    lendings: HashMap<LendingId, Lending>,
    reservations: HashMap<ReservationId, Reservation>,
    fines: HashMap<LendingId, Fine>,
    notifications: Vec<Notification>,
    config: Option<LibraryConfig>,
}

/// In-memory library store for tests and the default server.
///
/// A single lock spans all tables, so each applied batch is observed
/// atomically — the same contract the PostgreSQL implementation provides
/// through transactions.
#[derive(Clone, Default)]
pub struct InMemoryLibraryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLibraryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.tables.read().await.notifications.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        *tables = Tables::default();
    }
}

fn check_guards(tables: &Tables, guards: &[Guard]) -> Result<()> {
    for guard in guards {
        match guard {
            Guard::ItemStatus { barcode, expected } => {
                let item = tables.items.get(barcode).ok_or(StoreError::NotFound {
                    entity: "book item",
                    key: barcode.to_string(),
                })?;
                if item.status != *expected {
                    return Err(StoreError::Conflict {
                        entity: "book item",
                        key: barcode.to_string(),
                        details: format!("expected status {expected}, found {}", item.status),
                    });
                }
            }
            Guard::IssuedCount {
                account_id,
                expected,
            } => {
                let account = tables.accounts.get(account_id).ok_or(StoreError::NotFound {
                    entity: "account",
                    key: account_id.to_string(),
                })?;
                if account.issued_book_count != *expected {
                    return Err(StoreError::Conflict {
                        entity: "account",
                        key: account_id.to_string(),
                        details: format!(
                            "expected issued count {expected}, found {}",
                            account.issued_book_count
                        ),
                    });
                }
            }
            Guard::LendingOpen { lending_id } => {
                let lending = tables.lendings.get(lending_id).ok_or(StoreError::NotFound {
                    entity: "lending",
                    key: lending_id.to_string(),
                })?;
                if !lending.is_open() {
                    return Err(StoreError::Conflict {
                        entity: "lending",
                        key: lending_id.to_string(),
                        details: "already returned".to_string(),
                    });
                }
            }
            Guard::ReservationActive { reservation_id } => {
                let reservation =
                    tables
                        .reservations
                        .get(reservation_id)
                        .ok_or(StoreError::NotFound {
                            entity: "reservation",
                            key: reservation_id.to_string(),
                        })?;
                if !reservation.is_active() {
                    return Err(StoreError::Conflict {
                        entity: "reservation",
                        key: reservation_id.to_string(),
                        details: format!("no longer active ({})", reservation.status),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Verifies every row a mutation touches exists before anything is written,
/// so the commit below cannot fail halfway through the batch.
fn check_mutations(tables: &Tables, mutations: &[Mutation]) -> Result<()> {
    for mutation in mutations {
        match mutation {
            Mutation::InsertLending(lending) => {
                if tables.lendings.contains_key(&lending.id) {
                    return Err(StoreError::Conflict {
                        entity: "lending",
                        key: lending.id.to_string(),
                        details: "id already exists".to_string(),
                    });
                }
            }
            Mutation::CloseLending { lending_id, .. } => {
                if !tables.lendings.contains_key(lending_id) {
                    return Err(StoreError::NotFound {
                        entity: "lending",
                        key: lending_id.to_string(),
                    });
                }
            }
            Mutation::SetItemState { barcode, .. } => {
                if !tables.items.contains_key(barcode) {
                    return Err(StoreError::NotFound {
                        entity: "book item",
                        key: barcode.to_string(),
                    });
                }
            }
            Mutation::AdjustIssuedCount { account_id, .. } => {
                if !tables.accounts.contains_key(account_id) {
                    return Err(StoreError::NotFound {
                        entity: "account",
                        key: account_id.to_string(),
                    });
                }
            }
            Mutation::InsertReservation(reservation) => {
                if tables.reservations.contains_key(&reservation.id) {
                    return Err(StoreError::Conflict {
                        entity: "reservation",
                        key: reservation.id.to_string(),
                        details: "id already exists".to_string(),
                    });
                }
            }
            Mutation::SetReservationStatus { reservation_id, .. } => {
                if !tables.reservations.contains_key(reservation_id) {
                    return Err(StoreError::NotFound {
                        entity: "reservation",
                        key: reservation_id.to_string(),
                    });
                }
            }
            Mutation::CompleteReservations { .. } => {}
            Mutation::InsertFine(fine) => {
                if tables.fines.contains_key(&fine.lending_id) {
                    return Err(StoreError::Conflict {
                        entity: "fine",
                        key: fine.lending_id.to_string(),
                        details: "lending already fined".to_string(),
                    });
                }
            }
            Mutation::AppendNotification(_) => {}
        }
    }
    Ok(())
}

fn commit(tables: &mut Tables, mutations: Vec<Mutation>) {
    for mutation in mutations {
        match mutation {
            Mutation::InsertLending(lending) => {
                tables.lendings.insert(lending.id, lending);
            }
            Mutation::CloseLending {
                lending_id,
                returned_at,
            } => {
                if let Some(lending) = tables.lendings.get_mut(&lending_id) {
                    lending.returned_at = Some(returned_at);
                }
            }
            Mutation::SetItemState {
                barcode,
                status,
                borrowed_at,
                due_date,
            } => {
                if let Some(item) = tables.items.get_mut(&barcode) {
                    item.status = status;
                    item.borrowed_at = borrowed_at;
                    item.due_date = due_date;
                }
            }
            Mutation::AdjustIssuedCount { account_id, delta } => {
                if let Some(account) = tables.accounts.get_mut(&account_id) {
                    let adjusted = i64::from(account.issued_book_count) + i64::from(delta);
                    if adjusted < 0 {
                        tracing::warn!(
                            account_id = %account_id,
                            delta,
                            "issued book count would go negative, clamping to zero"
                        );
                    }
                    account.issued_book_count = adjusted.max(0) as u32;
                }
            }
            Mutation::InsertReservation(reservation) => {
                tables.reservations.insert(reservation.id, reservation);
            }
            Mutation::SetReservationStatus {
                reservation_id,
                status,
            } => {
                if let Some(reservation) = tables.reservations.get_mut(&reservation_id) {
                    reservation.status = status;
                }
            }
            Mutation::CompleteReservations {
                account_id,
                barcode,
            } => {
                for reservation in tables.reservations.values_mut() {
                    if reservation.account_id == account_id
                        && reservation.barcode == barcode
                        && reservation.is_active()
                    {
                        reservation.status = ReservationStatus::Completed;
                    }
                }
            }
            Mutation::InsertFine(fine) => {
                tables.fines.insert(fine.lending_id, fine);
            }
            Mutation::AppendNotification(notification) => {
                tables.notifications.push(notification);
            }
        }
    }
}

#[async_trait]
impl LibraryStore for InMemoryLibraryStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict {
                entity: "account",
                key: account.id.to_string(),
                details: "id already exists".to_string(),
            });
        }
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn update_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let account = tables.accounts.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "account",
            key: id.to_string(),
        })?;
        account.status = status;
        Ok(())
    }

    async fn set_issued_book_count(&self, id: AccountId, count: u32) -> Result<()> {
        let mut tables = self.tables.write().await;
        let account = tables.accounts.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "account",
            key: id.to_string(),
        })?;
        account.issued_book_count = count;
        Ok(())
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.books.contains_key(&book.isbn) {
            return Err(StoreError::Conflict {
                entity: "book",
                key: book.isbn.to_string(),
                details: "isbn already exists".to_string(),
            });
        }
        tables.books.insert(book.isbn.clone(), book);
        Ok(())
    }

    async fn get_book(&self, isbn: &Isbn) -> Result<Option<Book>> {
        Ok(self.tables.read().await.books.get(isbn).cloned())
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let tables = self.tables.read().await;
        let mut books: Vec<_> = tables.books.values().cloned().collect();
        books.sort_by(|a, b| a.isbn.as_str().cmp(b.isbn.as_str()));
        Ok(books)
    }

    async fn insert_book_item(&self, item: BookItem) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.books.contains_key(&item.isbn) {
            return Err(StoreError::NotFound {
                entity: "book",
                key: item.isbn.to_string(),
            });
        }
        if tables.items.contains_key(&item.barcode) {
            return Err(StoreError::Conflict {
                entity: "book item",
                key: item.barcode.to_string(),
                details: "barcode already exists".to_string(),
            });
        }
        tables.items.insert(item.barcode.clone(), item);
        Ok(())
    }

    async fn get_book_item(&self, barcode: &Barcode) -> Result<Option<BookItem>> {
        Ok(self.tables.read().await.items.get(barcode).cloned())
    }

    async fn list_book_items(&self, isbn: Option<&Isbn>) -> Result<Vec<BookItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|item| isbn.is_none_or(|isbn| &item.isbn == isbn))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.barcode.as_str().cmp(b.barcode.as_str()));
        Ok(items)
    }

    async fn get_lending(&self, id: LendingId) -> Result<Option<Lending>> {
        Ok(self.tables.read().await.lendings.get(&id).cloned())
    }

    async fn find_open_lending(&self, barcode: &Barcode) -> Result<Option<Lending>> {
        let tables = self.tables.read().await;
        Ok(tables
            .lendings
            .values()
            .find(|lending| &lending.barcode == barcode && lending.is_open())
            .cloned())
    }

    async fn list_lendings(&self, account_id: Option<AccountId>) -> Result<Vec<Lending>> {
        let tables = self.tables.read().await;
        let mut lendings: Vec<_> = tables
            .lendings
            .values()
            .filter(|lending| account_id.is_none_or(|id| lending.account_id == id))
            .cloned()
            .collect();
        lendings.sort_by(|a, b| {
            a.created_on
                .cmp(&b.created_on)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });
        Ok(lendings)
    }

    async fn count_open_lendings(&self, account_id: AccountId) -> Result<u32> {
        let tables = self.tables.read().await;
        Ok(tables
            .lendings
            .values()
            .filter(|lending| lending.account_id == account_id && lending.is_open())
            .count() as u32)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.tables.read().await.reservations.get(&id).cloned())
    }

    async fn find_active_reservation(&self, barcode: &Barcode) -> Result<Option<Reservation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reservations
            .values()
            .find(|reservation| &reservation.barcode == barcode && reservation.is_active())
            .cloned())
    }

    async fn list_reservations(&self, account_id: Option<AccountId>) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<_> = tables
            .reservations
            .values()
            .filter(|reservation| account_id.is_none_or(|id| reservation.account_id == id))
            .cloned()
            .collect();
        reservations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });
        Ok(reservations)
    }

    async fn get_fine(&self, lending_id: LendingId) -> Result<Option<Fine>> {
        Ok(self.tables.read().await.fines.get(&lending_id).cloned())
    }

    async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .find(|notification| notification.id == id)
            .cloned())
    }

    async fn list_notifications(&self, account_id: AccountId) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|notification| notification.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|notification| notification.id == id)
            .ok_or(StoreError::NotFound {
                entity: "notification",
                key: id.to_string(),
            })?;
        notification.is_read = true;
        Ok(())
    }

    async fn load_config(&self) -> Result<LibraryConfig> {
        Ok(self.tables.read().await.config.unwrap_or_default())
    }

    async fn save_config(&self, config: LibraryConfig) -> Result<()> {
        self.tables.write().await.config = Some(config);
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;

        let mut tables = self.tables.write().await;
        check_guards(&tables, &batch.guards).inspect_err(|e| {
            if e.is_conflict() {
                metrics::counter!("library_store_conflicts_total").increment(1);
            }
        })?;
        check_mutations(&tables, &batch.mutations)?;
        commit(&mut tables, batch.mutations);

        metrics::counter!("library_store_batches_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use common::{BookFormat, ItemStatus};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_item(store: &InMemoryLibraryStore, barcode: &str) -> Barcode {
        let isbn = Isbn::new("453678754");
        if store.get_book(&isbn).await.unwrap().is_none() {
            store
                .insert_book(Book {
                    isbn: isbn.clone(),
                    title: "Hands on machine learning".to_string(),
                    subject: "Data Science".to_string(),
                    publisher: "Oreally".to_string(),
                    language: "English".to_string(),
                    number_of_pages: 899,
                })
                .await
                .unwrap();
        }
        let barcode = Barcode::new(barcode);
        store
            .insert_book_item(BookItem {
                barcode: barcode.clone(),
                isbn,
                is_reference_only: false,
                status: ItemStatus::Available,
                format: BookFormat::Hardcover,
                price: 100,
                borrowed_at: None,
                due_date: None,
                date_of_purchase: date(2024, 1, 15),
                placement: "R9-RL".to_string(),
            })
            .await
            .unwrap();
        barcode
    }

    fn lending_row(account_id: AccountId, barcode: &Barcode) -> Lending {
        Lending {
            id: LendingId::new(),
            account_id,
            barcode: barcode.clone(),
            created_on: date(2024, 3, 1),
            due_date: date(2024, 3, 11),
            returned_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_account_insert_conflicts() {
        let store = InMemoryLibraryStore::new();
        let account = Account::new(AccountId::new());

        store.insert_account(account.clone()).await.unwrap();
        let result = store.insert_account(account).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn item_status_guard_rejects_stale_state() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();
        let barcode = seed_item(&store, "barcode123").await;

        // First writer wins the Available -> Issued transition.
        store
            .apply(
                WriteBatch::new()
                    .guard(Guard::ItemStatus {
                        barcode: barcode.clone(),
                        expected: ItemStatus::Available,
                    })
                    .mutate(Mutation::SetItemState {
                        barcode: barcode.clone(),
                        status: ItemStatus::Issued,
                        borrowed_at: Some(date(2024, 3, 1)),
                        due_date: Some(date(2024, 3, 11)),
                    }),
            )
            .await
            .unwrap();

        // A second writer that also read Available must conflict.
        let result = store
            .apply(
                WriteBatch::new()
                    .guard(Guard::ItemStatus {
                        barcode: barcode.clone(),
                        expected: ItemStatus::Available,
                    })
                    .mutate(Mutation::SetItemState {
                        barcode: barcode.clone(),
                        status: ItemStatus::Issued,
                        borrowed_at: Some(date(2024, 3, 1)),
                        due_date: Some(date(2024, 3, 11)),
                    }),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let item = store.get_book_item(&barcode).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Issued);
    }

    #[tokio::test]
    async fn failed_guard_leaves_no_partial_writes() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();
        let barcode = seed_item(&store, "barcode123").await;

        let result = store
            .apply(
                WriteBatch::new()
                    .guard(Guard::IssuedCount {
                        account_id,
                        expected: 5,
                    })
                    .mutate(Mutation::InsertLending(lending_row(account_id, &barcode)))
                    .mutate(Mutation::AdjustIssuedCount {
                        account_id,
                        delta: 1,
                    }),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        assert_eq!(store.list_lendings(None).await.unwrap().len(), 0);
        let account = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 0);
    }

    #[tokio::test]
    async fn lending_open_guard_rejects_closed_lending() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();
        let barcode = seed_item(&store, "barcode123").await;

        let mut lending = lending_row(account_id, &barcode);
        lending.returned_at = Some(date(2024, 3, 5));
        let lending_id = lending.id;
        store
            .apply(WriteBatch::new().mutate(Mutation::InsertLending(lending)))
            .await
            .unwrap();

        let result = store
            .apply(
                WriteBatch::new()
                    .guard(Guard::LendingOpen { lending_id })
                    .mutate(Mutation::CloseLending {
                        lending_id,
                        returned_at: date(2024, 3, 6),
                    }),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn adjust_issued_count_clamps_at_zero() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();

        store
            .apply(WriteBatch::new().mutate(Mutation::AdjustIssuedCount {
                account_id,
                delta: -1,
            }))
            .await
            .unwrap();

        let account = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 0);
    }

    #[tokio::test]
    async fn complete_reservations_targets_one_account_and_item() {
        let store = InMemoryLibraryStore::new();
        let holder = AccountId::new();
        let other = AccountId::new();
        store.insert_account(Account::new(holder)).await.unwrap();
        store.insert_account(Account::new(other)).await.unwrap();
        let barcode = seed_item(&store, "barcode-55").await;
        let other_barcode = seed_item(&store, "barcode-89").await;

        for (account_id, barcode) in [
            (holder, barcode.clone()),
            (other, barcode.clone()),
            (holder, other_barcode.clone()),
        ] {
            store
                .apply(
                    WriteBatch::new().mutate(Mutation::InsertReservation(Reservation {
                        id: ReservationId::new(),
                        account_id,
                        barcode,
                        status: ReservationStatus::Waiting,
                        created_at: Utc::now(),
                    })),
                )
                .await
                .unwrap();
        }

        store
            .apply(WriteBatch::new().mutate(Mutation::CompleteReservations {
                account_id: holder,
                barcode: barcode.clone(),
            }))
            .await
            .unwrap();

        let holder_on_item: Vec<_> = store
            .list_reservations(Some(holder))
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.barcode == barcode)
            .collect();
        assert!(
            holder_on_item
                .iter()
                .all(|r| r.status == ReservationStatus::Completed)
        );

        // The other account's hold and the holder's hold on another item
        // stay active.
        assert!(store
            .list_reservations(Some(other))
            .await
            .unwrap()
            .iter()
            .all(Reservation::is_active));
        assert!(store
            .find_active_reservation(&other_barcode)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn notifications_keep_per_account_order() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();

        for content in ["first", "second", "third"] {
            store
                .apply(
                    WriteBatch::new().mutate(Mutation::AppendNotification(Notification::new(
                        account_id, content,
                    ))),
                )
                .await
                .unwrap();
        }

        let contents: Vec<_> = store
            .list_notifications(account_id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.content)
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn config_defaults_until_saved_then_overwrites() {
        let store = InMemoryLibraryStore::new();
        assert_eq!(store.load_config().await.unwrap(), LibraryConfig::default());

        let config = LibraryConfig {
            maximum_book_issue_limit: 5,
            maximum_day_limit: 14,
            fine_per_late_day: 25,
        };
        store.save_config(config).await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), config);

        // Saving again replaces the one record.
        let updated = LibraryConfig {
            fine_per_late_day: 50,
            ..config
        };
        store.save_config(updated).await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn find_open_lending_ignores_returned_rows() {
        let store = InMemoryLibraryStore::new();
        let account_id = AccountId::new();
        store.insert_account(Account::new(account_id)).await.unwrap();
        let barcode = seed_item(&store, "barcode123").await;

        let mut closed = lending_row(account_id, &barcode);
        closed.returned_at = Some(date(2024, 3, 5));
        let open = lending_row(account_id, &barcode);
        let open_id = open.id;

        store
            .apply(
                WriteBatch::new()
                    .mutate(Mutation::InsertLending(closed))
                    .mutate(Mutation::InsertLending(open)),
            )
            .await
            .unwrap();

        let found = store.find_open_lending(&barcode).await.unwrap().unwrap();
        assert_eq!(found.id, open_id);
        assert_eq!(store.count_open_lendings(account_id).await.unwrap(), 1);
    }
}
