//! Integration tests for the circulation workflows.
//!
//! These exercise checkout, return, reservation, and the ledger against the
//! in-memory store, including the concurrency and reconciliation properties
//! the workflows guarantee.

use chrono::{Duration, NaiveDate, Utc};
use common::{
    Account, AccountId, AccountStatus, Barcode, Book, BookFormat, BookItem, Isbn, ItemStatus,
    LibraryConfig, ReservationStatus,
};
use domain::{
    AccountService, CheckOut, DomainError, LendingError, LendingService, NotificationService,
    Reserve, ReservationError, ReservationService, ReturnItem, StaticCapabilities,
};
use store::{InMemoryLibraryStore, LibraryStore};

struct Fixture {
    store: InMemoryLibraryStore,
    lendings: LendingService<InMemoryLibraryStore>,
    reservations: ReservationService<InMemoryLibraryStore>,
    accounts: AccountService<InMemoryLibraryStore>,
    notifications: NotificationService<InMemoryLibraryStore>,
    librarian: AccountId,
    patron: AccountId,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn add_item(store: &InMemoryLibraryStore, barcode: &str, reference_only: bool) {
    store
        .insert_book_item(BookItem {
            barcode: Barcode::new(barcode),
            isbn: Isbn::new("453678754"),
            is_reference_only: reference_only,
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
}

async fn fixture() -> Fixture {
    let store = InMemoryLibraryStore::new();

    store
        .save_config(LibraryConfig {
            maximum_book_issue_limit: 3,
            maximum_day_limit: 10,
            fine_per_late_day: 10,
        })
        .await
        .unwrap();

    let librarian = AccountId::new();
    let patron = AccountId::new();
    store.insert_account(Account::new(librarian)).await.unwrap();
    store.insert_account(Account::new(patron)).await.unwrap();

    store
        .insert_book(Book {
            isbn: Isbn::new("453678754"),
            title: "Hands on machine learning".to_string(),
            subject: "Data Science".to_string(),
            publisher: "Oreally".to_string(),
            language: "English".to_string(),
            number_of_pages: 899,
        })
        .await
        .unwrap();
    add_item(&store, "barcode123", false).await;
    add_item(&store, "barcode123-1", true).await;
    add_item(&store, "barcode-55", false).await;

    Fixture {
        lendings: LendingService::new(store.clone()),
        reservations: ReservationService::new(store.clone()),
        accounts: AccountService::new(store.clone()),
        notifications: NotificationService::new(store.clone()),
        store,
        librarian,
        patron,
    }
}

mod lending_cycle {
    use super::*;

    #[tokio::test]
    async fn checkout_then_return_restores_available() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        let lending = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        assert!(lending.is_open());

        let item = f
            .store
            .get_book_item(&Barcode::new("barcode123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Issued);
        assert_eq!(item.borrowed_at, Some(lending.created_on));
        assert_eq!(item.due_date, Some(lending.due_date));

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 1);

        let receipt = f
            .lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode123"))
            .await
            .unwrap();
        assert_eq!(receipt.fine_amount, 0);
        assert!(!receipt.lending.is_open());

        let item = f
            .store
            .get_book_item(&Barcode::new("barcode123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Available);
        assert_eq!(item.borrowed_at, None);
        assert_eq!(item.due_date, None);

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 0);
    }

    #[tokio::test]
    async fn omitted_due_date_uses_loan_period() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        let lending = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        assert_eq!(lending.due_date, lending.created_on + Duration::days(10));
    }

    #[tokio::test]
    async fn late_return_is_fined_per_day() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        // Due today, returned five days late, at 10 per day.
        let lending = f
            .lendings
            .check_out(
                &staff,
                f.librarian,
                CheckOut::new(f.patron, "barcode123").due(today()),
            )
            .await
            .unwrap();

        let receipt = f
            .lendings
            .return_item(
                &staff,
                f.librarian,
                ReturnItem::new("barcode123").on(today() + Duration::days(5)),
            )
            .await
            .unwrap();
        assert_eq!(receipt.fine_amount, 50);

        // Fine lookup is a direct relation read.
        assert_eq!(f.lendings.fine_for(lending.id).await.unwrap(), 50);
        let fine = f.store.get_fine(lending.id).await.unwrap().unwrap();
        assert_eq!(fine.amount, 50);
    }

    #[tokio::test]
    async fn on_time_return_creates_no_fine_row() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        let lending = f
            .lendings
            .check_out(
                &staff,
                f.librarian,
                CheckOut::new(f.patron, "barcode123").due(today()),
            )
            .await
            .unwrap();
        let receipt = f
            .lendings
            .return_item(
                &staff,
                f.librarian,
                ReturnItem::new("barcode123").on(today()),
            )
            .await
            .unwrap();

        assert_eq!(receipt.fine_amount, 0);
        assert!(f.store.get_fine(lending.id).await.unwrap().is_none());
        assert_eq!(f.lendings.fine_for(lending.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn quota_blocks_checkout_unless_bypassed() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        // Account already at the limit of 3.
        f.store.set_issued_book_count(f.patron, 3).await.unwrap();

        let result = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::QuotaExceeded { .. }))
        ));

        let lending = f
            .lendings
            .check_out(
                &staff,
                f.librarian,
                CheckOut::new(f.patron, "barcode123").bypassing_quota(),
            )
            .await
            .unwrap();
        assert!(lending.is_open());

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 4);
    }

    #[tokio::test]
    async fn reference_only_items_are_never_issuable() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        let result = f
            .lendings
            .check_out(
                &staff,
                f.librarian,
                CheckOut::new(f.patron, "barcode123-1").bypassing_quota(),
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::ItemNotIssuable { .. }))
        ));
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_borrow() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        f.store
            .update_account_status(f.patron, AccountStatus::Blacklisted)
            .await
            .unwrap();

        let result = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::AccountInactive { .. }))
        ));
    }

    #[tokio::test]
    async fn checkout_requires_staff_capability() {
        let f = fixture().await;
        let patron_caps = StaticCapabilities::patron();

        let result = f
            .lendings
            .check_out(&patron_caps, f.patron, CheckOut::new(f.patron, "barcode123"))
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn returning_twice_fails_without_double_decrement() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        f.lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode123"))
            .await
            .unwrap();

        let result = f
            .lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode123"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::AlreadyReturned { .. }))
        ));

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 0);
    }

    #[tokio::test]
    async fn return_by_id_guards_closed_lendings() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        let lending = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        f.lendings
            .return_lending(&staff, f.librarian, lending.id, None)
            .await
            .unwrap();

        let result = f
            .lendings
            .return_lending(&staff, f.librarian, lending.id, None)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::AlreadyReturned { .. }))
        ));
    }

    #[tokio::test]
    async fn concurrent_checkouts_of_one_item_admit_exactly_one() {
        let f = fixture().await;
        let second_patron = AccountId::new();
        f.store
            .insert_account(Account::new(second_patron))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for account_id in [f.patron, second_patron] {
            let store = f.store.clone();
            let librarian = f.librarian;
            handles.push(tokio::spawn(async move {
                let service = LendingService::new(store);
                service
                    .check_out(
                        &StaticCapabilities::librarian(),
                        librarian,
                        CheckOut::new(account_id, "barcode123"),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(e.is_conflict(), "loser must see a conflict, got {e}"),
            }
        }
        assert_eq!(successes, 1);

        // Exactly one open lending and one counted issue across both
        // accounts.
        let open = f
            .store
            .find_open_lending(&Barcode::new("barcode123"))
            .await
            .unwrap();
        assert!(open.is_some());
        let total: u32 = f.store.count_open_lendings(f.patron).await.unwrap()
            + f.store.count_open_lendings(second_patron).await.unwrap();
        assert_eq!(total, 1);
    }
}

mod reservation_cycle {
    use super::*;

    #[tokio::test]
    async fn checkout_completes_the_holders_reservation() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();

        let reservation = f
            .reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Waiting);

        let item = f
            .store
            .get_book_item(&Barcode::new("barcode-55"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Reserved);

        // The reserving account checks the item out; the hold completes.
        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode-55"))
            .await
            .unwrap();

        let reservation = f
            .store
            .get_reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn reserved_items_refuse_other_accounts() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();
        let other = AccountId::new();
        f.store.insert_account(Account::new(other)).await.unwrap();

        f.reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();

        let result = f
            .lendings
            .check_out(&staff, f.librarian, CheckOut::new(other, "barcode-55"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Lending(LendingError::ItemReserved { .. }))
        ));

        let result = f
            .reservations
            .reserve(&staff, f.librarian, Reserve::new(other, "barcode-55"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Reservation(ReservationError::NotReservable { .. }))
        ));
    }

    #[tokio::test]
    async fn reserving_for_others_requires_capability() {
        let f = fixture().await;
        let patron_caps = StaticCapabilities::patron();
        let other = AccountId::new();
        f.store.insert_account(Account::new(other)).await.unwrap();

        let result = f
            .reservations
            .reserve(&patron_caps, f.patron, Reserve::new(other, "barcode-55"))
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));

        let staff = StaticCapabilities::librarian();
        let reservation = f
            .reservations
            .reserve(&staff, f.librarian, Reserve::new(other, "barcode-55"))
            .await
            .unwrap();
        assert_eq!(reservation.account_id, other);
    }

    #[tokio::test]
    async fn issued_and_reference_only_items_are_not_reservable() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();

        let result = f
            .reservations
            .reserve(
                &patron_caps,
                f.patron,
                Reserve::new(f.patron, "barcode123-1"),
            )
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Reservation(ReservationError::NotReservable { .. }))
        ));

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        let result = f
            .reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode123"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Reservation(ReservationError::NotReservable { .. }))
        ));
    }

    #[tokio::test]
    async fn cancel_keeps_item_reserved_until_released() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();

        let reservation = f
            .reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();

        let canceled = f
            .reservations
            .cancel(&patron_caps, f.patron, reservation.id)
            .await
            .unwrap();
        assert_eq!(canceled.status, ReservationStatus::Canceled);

        // Canceling does not reopen the item; release does.
        let item = f
            .store
            .get_book_item(&Barcode::new("barcode-55"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Reserved);

        f.reservations
            .release(&staff, f.librarian, &Barcode::new("barcode-55"))
            .await
            .unwrap();
        let item = f
            .store
            .get_book_item(&Barcode::new("barcode-55"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn release_refuses_while_a_hold_is_active() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();

        f.reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();

        let result = f
            .reservations
            .release(&staff, f.librarian, &Barcode::new("barcode-55"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Reservation(ReservationError::StillHeld { .. }))
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_cancel_or_see_a_reservation() {
        let f = fixture().await;
        let patron_caps = StaticCapabilities::patron();
        let other = AccountId::new();
        f.store.insert_account(Account::new(other)).await.unwrap();

        let reservation = f
            .reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();

        let result = f
            .reservations
            .cancel(&patron_caps, other, reservation.id)
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));

        let result = f.reservations.get(&patron_caps, other, reservation.id).await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));

        // The owner and the staff both see it.
        assert!(
            f.reservations
                .get(&patron_caps, f.patron, reservation.id)
                .await
                .is_ok()
        );
        assert!(
            f.reservations
                .get(&StaticCapabilities::librarian(), f.librarian, reservation.id)
                .await
                .is_ok()
        );
    }
}

mod ledger {
    use super::*;

    #[tokio::test]
    async fn counter_matches_recount_after_mixed_operations() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode-55"))
            .await
            .unwrap();
        f.lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode123"))
            .await
            .unwrap();

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        let recount = f.store.count_open_lendings(f.patron).await.unwrap();
        assert_eq!(account.issued_book_count, recount);
        assert_eq!(recount, 1);
    }

    #[tokio::test]
    async fn item_is_issued_iff_exactly_one_open_lending() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode-55"))
            .await
            .unwrap();
        f.lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode-55"))
            .await
            .unwrap();

        for item in f.store.list_book_items(None).await.unwrap() {
            let open: Vec<_> = f
                .store
                .list_lendings(None)
                .await
                .unwrap()
                .into_iter()
                .filter(|l| l.barcode == item.barcode && l.is_open())
                .collect();
            if item.status == ItemStatus::Issued {
                assert_eq!(open.len(), 1, "{} must have one open lending", item.barcode);
            } else {
                assert!(open.is_empty(), "{} must have none", item.barcode);
            }
        }
    }

    #[tokio::test]
    async fn reconciliation_repairs_a_corrupted_counter() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();

        // Corrupt the cached counter out of band.
        f.store.set_issued_book_count(f.patron, 7).await.unwrap();

        let count = f
            .accounts
            .recalculate_issued_book_count(&staff, f.librarian, f.patron)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let account = f.store.get_account(f.patron).await.unwrap().unwrap();
        assert_eq!(account.issued_book_count, 1);
    }

    #[tokio::test]
    async fn lending_lists_are_scoped_by_capability() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();
        let other = AccountId::new();
        f.store.insert_account(Account::new(other)).await.unwrap();

        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode123"))
            .await
            .unwrap();
        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(other, "barcode-55"))
            .await
            .unwrap();

        assert_eq!(f.lendings.list(&staff, f.librarian).await.unwrap().len(), 2);
        assert_eq!(f.lendings.list(&patron_caps, f.patron).await.unwrap().len(), 1);

        let result = f
            .lendings
            .list_for_account(&patron_caps, f.patron, other)
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }
}

mod notifications {
    use super::*;

    #[tokio::test]
    async fn workflow_messages_arrive_in_order() {
        let f = fixture().await;
        let staff = StaticCapabilities::librarian();
        let patron_caps = StaticCapabilities::patron();

        f.reservations
            .reserve(&patron_caps, f.patron, Reserve::new(f.patron, "barcode-55"))
            .await
            .unwrap();
        f.lendings
            .check_out(&staff, f.librarian, CheckOut::new(f.patron, "barcode-55"))
            .await
            .unwrap();
        f.lendings
            .return_item(&staff, f.librarian, ReturnItem::new("barcode-55"))
            .await
            .unwrap();

        let inbox = f.notifications.list_for(f.patron).await.unwrap();
        let contents: Vec<_> = inbox.iter().map(|n| n.content.clone()).collect();
        assert_eq!(
            contents,
            vec![
                "Book with barcode barcode-55 reserved successfully.".to_string(),
                format!(
                    "Book with barcode=barcode-55 is issued to you, due on {}",
                    today() + Duration::days(10)
                ),
                "Book with barcode=barcode-55 is returned".to_string(),
            ]
        );
        assert!(inbox.iter().all(|n| !n.is_read));
    }

    #[tokio::test]
    async fn only_the_owner_marks_notifications_read() {
        let f = fixture().await;
        let notification = f.notifications.emit(f.patron, "fees waived").await.unwrap();

        let result = f.notifications.mark_read(f.librarian, notification.id).await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));

        let read = f
            .notifications
            .mark_read(f.patron, notification.id)
            .await
            .unwrap();
        assert!(read.is_read);

        let inbox = f.notifications.list_for(f.patron).await.unwrap();
        assert!(inbox.iter().any(|n| n.id == notification.id && n.is_read));
    }
}
