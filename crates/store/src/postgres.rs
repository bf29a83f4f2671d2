use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use common::{
    Account, AccountId, AccountStatus, Barcode, Book, BookFormat, BookItem, Fine, Isbn, ItemStatus,
    Lending, LendingId, LibraryConfig, Notification, NotificationId, Reservation, ReservationId,
    ReservationStatus,
};

use crate::{
    Guard, Mutation, Result, StoreError, WriteBatch,
    batch::validate_batch,
    store::LibraryStore,
};

/// PostgreSQL-backed library store implementation.
///
/// Batches are applied inside one transaction; guarded rows are locked with
/// `SELECT ... FOR UPDATE` before their state is compared, which serializes
/// concurrent workflows touching the same item or account.
#[derive(Clone)]
pub struct PostgresLibraryStore {
    pool: PgPool,
}

impl PostgresLibraryStore {
    /// Creates a new PostgreSQL library store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn parse_status<T>(
    parse: impl FnOnce(&str) -> Option<T>,
    raw: &str,
    entity: &'static str,
    key: impl ToString,
) -> Result<T> {
    parse(raw).ok_or_else(|| StoreError::Conversion {
        entity,
        key: key.to_string(),
        details: format!("unknown status {raw:?}"),
    })
}

fn row_to_account(row: PgRow) -> Result<Account> {
    let id = AccountId::from_uuid(row.try_get::<Uuid, _>("id")?);
    let status: String = row.try_get("status")?;
    Ok(Account {
        id,
        status: parse_status(AccountStatus::parse, &status, "account", id)?,
        issued_book_count: row.try_get::<i32, _>("issued_book_count")? as u32,
    })
}

fn row_to_book(row: PgRow) -> Result<Book> {
    Ok(Book {
        isbn: Isbn::new(row.try_get::<String, _>("isbn")?),
        title: row.try_get("title")?,
        subject: row.try_get("subject")?,
        publisher: row.try_get("publisher")?,
        language: row.try_get("language")?,
        number_of_pages: row.try_get::<i32, _>("number_of_pages")? as u32,
    })
}

fn row_to_book_item(row: PgRow) -> Result<BookItem> {
    let barcode = Barcode::new(row.try_get::<String, _>("barcode")?);
    let status: String = row.try_get("status")?;
    let format: String = row.try_get("format")?;
    Ok(BookItem {
        status: parse_status(ItemStatus::parse, &status, "book item", &barcode)?,
        format: parse_status(BookFormat::parse, &format, "book item", &barcode)?,
        isbn: Isbn::new(row.try_get::<String, _>("isbn")?),
        is_reference_only: row.try_get("is_reference_only")?,
        price: row.try_get::<i32, _>("price")? as u32,
        borrowed_at: row.try_get("borrowed_at")?,
        due_date: row.try_get("due_date")?,
        date_of_purchase: row.try_get("date_of_purchase")?,
        placement: row.try_get("placement")?,
        barcode,
    })
}

fn row_to_lending(row: PgRow) -> Result<Lending> {
    Ok(Lending {
        id: LendingId::from_uuid(row.try_get::<Uuid, _>("id")?),
        account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
        barcode: Barcode::new(row.try_get::<String, _>("barcode")?),
        created_on: row.try_get("created_on")?,
        due_date: row.try_get("due_date")?,
        returned_at: row.try_get("returned_at")?,
    })
}

fn row_to_reservation(row: PgRow) -> Result<Reservation> {
    let id = ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?);
    let status: String = row.try_get("status")?;
    Ok(Reservation {
        id,
        account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
        barcode: Barcode::new(row.try_get::<String, _>("barcode")?),
        status: parse_status(ReservationStatus::parse, &status, "reservation", id)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_notification(row: PgRow) -> Result<Notification> {
    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
        created_at: row.try_get("created_at")?,
        content: row.try_get("content")?,
        is_read: row.try_get("is_read")?,
    })
}

async fn check_guard(tx: &mut Transaction<'_, Postgres>, guard: &Guard) -> Result<()> {
    match guard {
        Guard::ItemStatus { barcode, expected } => {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM book_items WHERE barcode = $1 FOR UPDATE")
                    .bind(barcode.as_str())
                    .fetch_optional(&mut **tx)
                    .await?;
            let status = status.ok_or(StoreError::NotFound {
                entity: "book item",
                key: barcode.to_string(),
            })?;
            let actual = parse_status(ItemStatus::parse, &status, "book item", barcode)?;
            if actual != *expected {
                return Err(StoreError::Conflict {
                    entity: "book item",
                    key: barcode.to_string(),
                    details: format!("expected status {expected}, found {actual}"),
                });
            }
        }
        Guard::IssuedCount {
            account_id,
            expected,
        } => {
            let count: Option<i32> = sqlx::query_scalar(
                "SELECT issued_book_count FROM accounts WHERE id = $1 FOR UPDATE",
            )
            .bind(account_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
            let count = count.ok_or(StoreError::NotFound {
                entity: "account",
                key: account_id.to_string(),
            })?;
            if count as u32 != *expected {
                return Err(StoreError::Conflict {
                    entity: "account",
                    key: account_id.to_string(),
                    details: format!("expected issued count {expected}, found {count}"),
                });
            }
        }
        Guard::LendingOpen { lending_id } => {
            let returned_at: Option<Option<NaiveDate>> =
                sqlx::query_scalar("SELECT returned_at FROM lendings WHERE id = $1 FOR UPDATE")
                    .bind(lending_id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await?;
            let returned_at = returned_at.ok_or(StoreError::NotFound {
                entity: "lending",
                key: lending_id.to_string(),
            })?;
            if returned_at.is_some() {
                return Err(StoreError::Conflict {
                    entity: "lending",
                    key: lending_id.to_string(),
                    details: "already returned".to_string(),
                });
            }
        }
        Guard::ReservationActive { reservation_id } => {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1 FOR UPDATE")
                    .bind(reservation_id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await?;
            let status = status.ok_or(StoreError::NotFound {
                entity: "reservation",
                key: reservation_id.to_string(),
            })?;
            let actual = parse_status(ReservationStatus::parse, &status, "reservation", reservation_id)?;
            if !actual.is_active() {
                return Err(StoreError::Conflict {
                    entity: "reservation",
                    key: reservation_id.to_string(),
                    details: format!("no longer active ({actual})"),
                });
            }
        }
    }
    Ok(())
}

async fn apply_mutation(tx: &mut Transaction<'_, Postgres>, mutation: Mutation) -> Result<()> {
    match mutation {
        Mutation::InsertLending(lending) => {
            sqlx::query(
                r#"
                INSERT INTO lendings (id, account_id, barcode, created_on, due_date, returned_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(lending.id.as_uuid())
            .bind(lending.account_id.as_uuid())
            .bind(lending.barcode.as_str())
            .bind(lending.created_on)
            .bind(lending.due_date)
            .bind(lending.returned_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                // The partial unique index on open lendings doubles as a
                // safety net under concurrent checkouts.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("one_open_lending_per_item")
                {
                    return StoreError::Conflict {
                        entity: "book item",
                        key: lending.barcode.to_string(),
                        details: "item already has an open lending".to_string(),
                    };
                }
                StoreError::Database(e)
            })?;
        }
        Mutation::CloseLending {
            lending_id,
            returned_at,
        } => {
            let result = sqlx::query("UPDATE lendings SET returned_at = $2 WHERE id = $1")
                .bind(lending_id.as_uuid())
                .bind(returned_at)
                .execute(&mut **tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "lending",
                    key: lending_id.to_string(),
                });
            }
        }
        Mutation::SetItemState {
            barcode,
            status,
            borrowed_at,
            due_date,
        } => {
            let result = sqlx::query(
                "UPDATE book_items SET status = $2, borrowed_at = $3, due_date = $4 WHERE barcode = $1",
            )
            .bind(barcode.as_str())
            .bind(status.as_str())
            .bind(borrowed_at)
            .bind(due_date)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "book item",
                    key: barcode.to_string(),
                });
            }
        }
        Mutation::AdjustIssuedCount { account_id, delta } => {
            let count: Option<i32> = sqlx::query_scalar(
                "SELECT issued_book_count FROM accounts WHERE id = $1 FOR UPDATE",
            )
            .bind(account_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
            let count = count.ok_or(StoreError::NotFound {
                entity: "account",
                key: account_id.to_string(),
            })?;
            let adjusted = i64::from(count) + i64::from(delta);
            if adjusted < 0 {
                tracing::warn!(
                    account_id = %account_id,
                    delta,
                    "issued book count would go negative, clamping to zero"
                );
            }
            sqlx::query("UPDATE accounts SET issued_book_count = $2 WHERE id = $1")
                .bind(account_id.as_uuid())
                .bind(adjusted.max(0) as i32)
                .execute(&mut **tx)
                .await?;
        }
        Mutation::InsertReservation(reservation) => {
            sqlx::query(
                r#"
                INSERT INTO reservations (id, account_id, barcode, status, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(reservation.id.as_uuid())
            .bind(reservation.account_id.as_uuid())
            .bind(reservation.barcode.as_str())
            .bind(reservation.status.as_str())
            .bind(reservation.created_at)
            .execute(&mut **tx)
            .await?;
        }
        Mutation::SetReservationStatus {
            reservation_id,
            status,
        } => {
            let result = sqlx::query("UPDATE reservations SET status = $2 WHERE id = $1")
                .bind(reservation_id.as_uuid())
                .bind(status.as_str())
                .execute(&mut **tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "reservation",
                    key: reservation_id.to_string(),
                });
            }
        }
        Mutation::CompleteReservations {
            account_id,
            barcode,
        } => {
            sqlx::query(
                r#"
                UPDATE reservations
                SET status = 'Completed'
                WHERE account_id = $1 AND barcode = $2 AND status IN ('Waiting', 'Pending')
                "#,
            )
            .bind(account_id.as_uuid())
            .bind(barcode.as_str())
            .execute(&mut **tx)
            .await?;
        }
        Mutation::InsertFine(fine) => {
            sqlx::query("INSERT INTO fines (lending_id, amount) VALUES ($1, $2)")
                .bind(fine.lending_id.as_uuid())
                .bind(fine.amount as i32)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("fines_pkey")
                    {
                        return StoreError::Conflict {
                            entity: "fine",
                            key: fine.lending_id.to_string(),
                            details: "lending already fined".to_string(),
                        };
                    }
                    StoreError::Database(e)
                })?;
        }
        Mutation::AppendNotification(notification) => {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, account_id, created_at, content, is_read)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(notification.id.as_uuid())
            .bind(notification.account_id.as_uuid())
            .bind(notification.created_at)
            .bind(&notification.content)
            .bind(notification.is_read)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl LibraryStore for PostgresLibraryStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        sqlx::query("INSERT INTO accounts (id, status, issued_book_count) VALUES ($1, $2, $3)")
            .bind(account.id.as_uuid())
            .bind(account.status.as_str())
            .bind(account.issued_book_count as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("accounts_pkey")
                {
                    return StoreError::Conflict {
                        entity: "account",
                        key: account.id.to_string(),
                        details: "id already exists".to_string(),
                    };
                }
                StoreError::Database(e)
            })?;
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, status, issued_book_count FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_account).transpose()
    }

    async fn update_account_status(&self, id: AccountId, status: AccountStatus) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_issued_book_count(&self, id: AccountId, count: u32) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET issued_book_count = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(count as i32)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (isbn, title, subject, publisher, language, number_of_pages)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.isbn.as_str())
        .bind(&book.title)
        .bind(&book.subject)
        .bind(&book.publisher)
        .bind(&book.language)
        .bind(book.number_of_pages as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("books_pkey")
            {
                return StoreError::Conflict {
                    entity: "book",
                    key: book.isbn.to_string(),
                    details: "isbn already exists".to_string(),
                };
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_book(&self, isbn: &Isbn) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT isbn, title, subject, publisher, language, number_of_pages FROM books WHERE isbn = $1",
        )
        .bind(isbn.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_book).transpose()
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            "SELECT isbn, title, subject, publisher, language, number_of_pages FROM books ORDER BY isbn",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_book).collect()
    }

    async fn insert_book_item(&self, item: BookItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO book_items
                (barcode, isbn, is_reference_only, status, format, price,
                 borrowed_at, due_date, date_of_purchase, placement)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.barcode.as_str())
        .bind(item.isbn.as_str())
        .bind(item.is_reference_only)
        .bind(item.status.as_str())
        .bind(item.format.as_str())
        .bind(item.price as i32)
        .bind(item.borrowed_at)
        .bind(item.due_date)
        .bind(item.date_of_purchase)
        .bind(&item.placement)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("book_items_pkey") {
                    return StoreError::Conflict {
                        entity: "book item",
                        key: item.barcode.to_string(),
                        details: "barcode already exists".to_string(),
                    };
                }
                if db_err.constraint() == Some("book_items_isbn_fkey") {
                    return StoreError::NotFound {
                        entity: "book",
                        key: item.isbn.to_string(),
                    };
                }
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_book_item(&self, barcode: &Barcode) -> Result<Option<BookItem>> {
        let row = sqlx::query("SELECT * FROM book_items WHERE barcode = $1")
            .bind(barcode.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_book_item).transpose()
    }

    async fn list_book_items(&self, isbn: Option<&Isbn>) -> Result<Vec<BookItem>> {
        let rows = match isbn {
            Some(isbn) => {
                sqlx::query("SELECT * FROM book_items WHERE isbn = $1 ORDER BY barcode")
                    .bind(isbn.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM book_items ORDER BY barcode")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(row_to_book_item).collect()
    }

    async fn get_lending(&self, id: LendingId) -> Result<Option<Lending>> {
        let row = sqlx::query("SELECT * FROM lendings WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_lending).transpose()
    }

    async fn find_open_lending(&self, barcode: &Barcode) -> Result<Option<Lending>> {
        let row = sqlx::query("SELECT * FROM lendings WHERE barcode = $1 AND returned_at IS NULL")
            .bind(barcode.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_lending).transpose()
    }

    async fn list_lendings(&self, account_id: Option<AccountId>) -> Result<Vec<Lending>> {
        let rows = match account_id {
            Some(id) => {
                sqlx::query(
                    "SELECT * FROM lendings WHERE account_id = $1 ORDER BY created_on, id",
                )
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM lendings ORDER BY created_on, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(row_to_lending).collect()
    }

    async fn count_open_lendings(&self, account_id: AccountId) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lendings WHERE account_id = $1 AND returned_at IS NULL",
        )
        .bind(account_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_reservation).transpose()
    }

    async fn find_active_reservation(&self, barcode: &Barcode) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM reservations
            WHERE barcode = $1 AND status IN ('Waiting', 'Pending')
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(barcode.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_reservation).transpose()
    }

    async fn list_reservations(&self, account_id: Option<AccountId>) -> Result<Vec<Reservation>> {
        let rows = match account_id {
            Some(id) => {
                sqlx::query(
                    "SELECT * FROM reservations WHERE account_id = $1 ORDER BY created_at, id",
                )
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM reservations ORDER BY created_at, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn get_fine(&self, lending_id: LendingId) -> Result<Option<Fine>> {
        let amount: Option<i32> =
            sqlx::query_scalar("SELECT amount FROM fines WHERE lending_id = $1")
                .bind(lending_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(amount.map(|amount| Fine {
            lending_id,
            amount: amount as u32,
        }))
    }

    async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        let row = sqlx::query(
            "SELECT id, account_id, created_at, content, is_read FROM notifications WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_notification).transpose()
    }

    async fn list_notifications(&self, account_id: AccountId) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, created_at, content, is_read
            FROM notifications
            WHERE account_id = $1
            ORDER BY seq
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_notification).collect()
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "notification",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn load_config(&self) -> Result<LibraryConfig> {
        let row = sqlx::query(
            "SELECT maximum_book_issue_limit, maximum_day_limit, fine_per_late_day FROM library_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(LibraryConfig {
                maximum_book_issue_limit: row.try_get::<i32, _>("maximum_book_issue_limit")? as u32,
                maximum_day_limit: row.try_get::<i32, _>("maximum_day_limit")? as u32,
                fine_per_late_day: row.try_get::<i32, _>("fine_per_late_day")? as u32,
            }),
            None => Ok(LibraryConfig::default()),
        }
    }

    async fn save_config(&self, config: LibraryConfig) -> Result<()> {
        // The fixed key pins the table to a single row.
        sqlx::query(
            r#"
            INSERT INTO library_config (id, maximum_book_issue_limit, maximum_day_limit, fine_per_late_day)
            VALUES (1, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                maximum_book_issue_limit = EXCLUDED.maximum_book_issue_limit,
                maximum_day_limit = EXCLUDED.maximum_day_limit,
                fine_per_late_day = EXCLUDED.fine_per_late_day
            "#,
        )
        .bind(config.maximum_book_issue_limit as i32)
        .bind(config.maximum_day_limit as i32)
        .bind(config.fine_per_late_day as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;

        for guard in &batch.guards {
            check_guard(&mut tx, guard).await.inspect_err(|e| {
                if e.is_conflict() {
                    metrics::counter!("library_store_conflicts_total").increment(1);
                }
            })?;
        }
        for mutation in batch.mutations {
            apply_mutation(&mut tx, mutation).await?;
        }

        tx.commit().await?;
        metrics::counter!("library_store_batches_total").increment(1);
        Ok(())
    }
}
