//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and therefore need a
//! running Docker daemon; they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use common::{
    Account, AccountId, Barcode, Book, BookFormat, BookItem, Isbn, ItemStatus, Lending, LendingId,
    LibraryConfig,
};
use serial_test::serial;
use store::{Guard, LibraryStore, Mutation, PostgresLibraryStore, StoreError, WriteBatch};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn fresh_store() -> PostgresLibraryStore {
    let info = get_container_info().await;
    let store = PostgresLibraryStore::connect(&info.connection_string)
        .await
        .unwrap();

    // Reset between tests; the shared container outlives each one.
    sqlx::raw_sql(
        "DROP TABLE IF EXISTS notifications, fines, reservations, lendings, book_items, books, \
         accounts, library_config, _sqlx_migrations CASCADE",
    )
    .execute(store.pool())
    .await
    .unwrap();
    store.run_migrations().await.unwrap();
    store
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_item(store: &PostgresLibraryStore, barcode: &str) -> Barcode {
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

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn account_roundtrip() {
    let store = fresh_store().await;
    let account = Account::new(AccountId::new());

    store.insert_account(account.clone()).await.unwrap();
    let fetched = store.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(fetched, account);

    let missing = store.get_account(AccountId::new()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn checkout_batch_commits_atomically() {
    let store = fresh_store().await;
    let account_id = AccountId::new();
    store.insert_account(Account::new(account_id)).await.unwrap();
    let barcode = seed_item(&store, "barcode123").await;

    let lending = Lending {
        id: LendingId::new(),
        account_id,
        barcode: barcode.clone(),
        created_on: date(2024, 3, 1),
        due_date: date(2024, 3, 11),
        returned_at: None,
    };

    store
        .apply(
            WriteBatch::new()
                .guard(Guard::ItemStatus {
                    barcode: barcode.clone(),
                    expected: ItemStatus::Available,
                })
                .guard(Guard::IssuedCount {
                    account_id,
                    expected: 0,
                })
                .mutate(Mutation::InsertLending(lending.clone()))
                .mutate(Mutation::SetItemState {
                    barcode: barcode.clone(),
                    status: ItemStatus::Issued,
                    borrowed_at: Some(lending.created_on),
                    due_date: Some(lending.due_date),
                })
                .mutate(Mutation::AdjustIssuedCount {
                    account_id,
                    delta: 1,
                }),
        )
        .await
        .unwrap();

    let item = store.get_book_item(&barcode).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Issued);
    assert_eq!(item.due_date, Some(date(2024, 3, 11)));

    let account = store.get_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.issued_book_count, 1);

    let open = store.find_open_lending(&barcode).await.unwrap().unwrap();
    assert_eq!(open.id, lending.id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn stale_item_guard_rolls_back_whole_batch() {
    let store = fresh_store().await;
    let account_id = AccountId::new();
    store.insert_account(Account::new(account_id)).await.unwrap();
    let barcode = seed_item(&store, "barcode123").await;

    store
        .apply(WriteBatch::new().mutate(Mutation::SetItemState {
            barcode: barcode.clone(),
            status: ItemStatus::Reserved,
            borrowed_at: None,
            due_date: None,
        }))
        .await
        .unwrap();

    let result = store
        .apply(
            WriteBatch::new()
                .guard(Guard::ItemStatus {
                    barcode: barcode.clone(),
                    expected: ItemStatus::Available,
                })
                .mutate(Mutation::InsertLending(Lending {
                    id: LendingId::new(),
                    account_id,
                    barcode: barcode.clone(),
                    created_on: date(2024, 3, 1),
                    due_date: date(2024, 3, 11),
                    returned_at: None,
                }))
                .mutate(Mutation::AdjustIssuedCount {
                    account_id,
                    delta: 1,
                }),
        )
        .await;
    assert!(matches!(result, Err(StoreError::Conflict { .. })));

    assert!(store.list_lendings(None).await.unwrap().is_empty());
    let account = store.get_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.issued_book_count, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Docker daemon"]
async fn config_singleton_upserts() {
    let store = fresh_store().await;
    assert_eq!(store.load_config().await.unwrap(), LibraryConfig::default());

    let config = LibraryConfig {
        maximum_book_issue_limit: 5,
        maximum_day_limit: 14,
        fine_per_late_day: 25,
    };
    store.save_config(config).await.unwrap();
    store.save_config(config).await.unwrap();
    assert_eq!(store.load_config().await.unwrap(), config);
}
