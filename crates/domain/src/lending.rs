//! Checkout and return workflows.
//!
//! `check_out` and `return_item` are the two halves of the item state
//! machine: `Available → Issued → Available` for the normal cycle and
//! `Available → Reserved → Issued` when a hold is fulfilled. Every
//! precondition is checked before any mutation, and the mutations of one
//! operation travel in a single guarded [`WriteBatch`], so concurrent
//! operations on the same item or account serialize at the store.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use common::{
    AccountId, AccountStatus, Barcode, Fine, ItemStatus, Lending, LendingId, Notification,
};
use store::{Guard, LibraryStore, Mutation, WriteBatch};

use crate::capability::CapabilityChecker;
use crate::error::{DomainError, Result};
use crate::ledger::can_see_lending;

/// Errors that can occur during checkout and return.
#[derive(Debug, Error)]
pub enum LendingError {
    /// The borrowing account is not in the `Active` status.
    #[error("Account {account_id} is not active ({status})")]
    AccountInactive {
        account_id: AccountId,
        status: AccountStatus,
    },

    /// The account has no issue quota left and no bypass was granted.
    #[error("Account {account_id} reached the issue limit of {limit}")]
    QuotaExceeded { account_id: AccountId, limit: u32 },

    /// The item is reference-only, already issued, or lost.
    #[error("Book item {barcode} cannot be issued")]
    ItemNotIssuable { barcode: Barcode },

    /// The item is held by a different account.
    #[error("Book item {barcode} is reserved by another account")]
    ItemReserved { barcode: Barcode },

    /// There is nothing outstanding to return on this item.
    #[error("No open lending for book item {barcode}")]
    AlreadyReturned { barcode: Barcode },
}

/// Command to check a book item out to an account.
#[derive(Debug, Clone)]
pub struct CheckOut {
    /// The borrowing account.
    pub account_id: AccountId,

    /// The item being checked out.
    pub barcode: Barcode,

    /// Due date; defaults to the configured loan period when omitted.
    pub due_date: Option<NaiveDate>,

    /// Issue even when the account's quota is exhausted (librarians only).
    pub bypass_quota: bool,
}

impl CheckOut {
    /// Creates a new CheckOut command with the default due date.
    pub fn new(account_id: AccountId, barcode: impl Into<Barcode>) -> Self {
        Self {
            account_id,
            barcode: barcode.into(),
            due_date: None,
            bypass_quota: false,
        }
    }

    /// Sets an explicit due date.
    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Requests a quota bypass.
    pub fn bypassing_quota(mut self) -> Self {
        self.bypass_quota = true;
        self
    }
}

/// Command to return a checked-out item.
#[derive(Debug, Clone)]
pub struct ReturnItem {
    /// The item being returned.
    pub barcode: Barcode,

    /// Return date; defaults to today when omitted.
    pub return_date: Option<NaiveDate>,

    /// Overrides the default return notification content.
    pub note: Option<String>,
}

impl ReturnItem {
    /// Creates a new ReturnItem command dated today.
    pub fn new(barcode: impl Into<Barcode>) -> Self {
        Self {
            barcode: barcode.into(),
            return_date: None,
            note: None,
        }
    }

    /// Sets an explicit return date.
    pub fn on(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    /// Sets the notification content.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A completed return: the closed lending and the fine it incurred.
#[derive(Debug, Clone)]
pub struct ReturnReceipt {
    pub lending: Lending,
    pub fine_amount: u32,
}

/// Fine for a return, pure arithmetic.
///
/// Zero when returned on or before the due date, then strictly increasing
/// with slope `fine_per_late_day`.
pub fn calculate_fine(due_date: NaiveDate, return_date: NaiveDate, fine_per_late_day: u32) -> u32 {
    let late_days = (return_date - due_date).num_days().max(0) as u32;
    late_days * fine_per_late_day
}

/// Service for checkouts, returns, and fine lookups.
pub struct LendingService<S> {
    store: S,
}

impl<S: LibraryStore> LendingService<S> {
    /// Creates a new lending service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Checks a book item out to an account.
    #[tracing::instrument(skip(self, caps))]
    pub async fn check_out(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        cmd: CheckOut,
    ) -> Result<Lending> {
        if !caps.can_checkout(actor) {
            return Err(DomainError::Forbidden("checkout requires staff capability"));
        }

        let account = self
            .store
            .get_account(cmd.account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", cmd.account_id))?;
        if !account.is_active() {
            return Err(LendingError::AccountInactive {
                account_id: account.id,
                status: account.status,
            }
            .into());
        }

        let config = self.store.load_config().await?;
        if account.remaining_issue_count(&config) <= 0
            && !(cmd.bypass_quota && caps.is_librarian(actor))
        {
            return Err(LendingError::QuotaExceeded {
                account_id: account.id,
                limit: config.maximum_book_issue_limit,
            }
            .into());
        }

        let item = self
            .store
            .get_book_item(&cmd.barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("book item", &cmd.barcode))?;
        if item.is_reference_only {
            return Err(LendingError::ItemNotIssuable {
                barcode: item.barcode,
            }
            .into());
        }
        match item.status {
            ItemStatus::Available => {}
            ItemStatus::Reserved => {
                // Only the account holding the active reservation may take
                // the item; a Reserved item with no active hold is reserved
                // by no one.
                if let Some(holder) = self.store.find_active_reservation(&cmd.barcode).await?
                    && holder.account_id != cmd.account_id
                {
                    return Err(LendingError::ItemReserved {
                        barcode: item.barcode,
                    }
                    .into());
                }
            }
            ItemStatus::Issued | ItemStatus::Lost => {
                return Err(LendingError::ItemNotIssuable {
                    barcode: item.barcode,
                }
                .into());
            }
        }

        let created_on = Utc::now().date_naive();
        let due_date = cmd
            .due_date
            .unwrap_or_else(|| config.default_due_date(created_on));
        let lending = Lending {
            id: LendingId::new(),
            account_id: account.id,
            barcode: item.barcode.clone(),
            created_on,
            due_date,
            returned_at: None,
        };

        let batch = WriteBatch::new()
            .guard(Guard::ItemStatus {
                barcode: item.barcode.clone(),
                expected: item.status,
            })
            .guard(Guard::IssuedCount {
                account_id: account.id,
                expected: account.issued_book_count,
            })
            .mutate(Mutation::InsertLending(lending.clone()))
            .mutate(Mutation::SetItemState {
                barcode: item.barcode.clone(),
                status: ItemStatus::Issued,
                borrowed_at: Some(created_on),
                due_date: Some(due_date),
            })
            .mutate(Mutation::AdjustIssuedCount {
                account_id: account.id,
                delta: 1,
            })
            .mutate(Mutation::CompleteReservations {
                account_id: account.id,
                barcode: item.barcode.clone(),
            })
            .mutate(Mutation::AppendNotification(Notification::new(
                account.id,
                format!(
                    "Book with barcode={} is issued to you, due on {}",
                    item.barcode, due_date
                ),
            )));
        self.store.apply(batch).await?;

        metrics::counter!("library_checkouts_total").increment(1);
        tracing::info!(lending_id = %lending.id, barcode = %lending.barcode, "book item issued");
        Ok(lending)
    }

    /// Returns the open lending on a book item.
    #[tracing::instrument(skip(self, caps))]
    pub async fn return_item(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        cmd: ReturnItem,
    ) -> Result<ReturnReceipt> {
        if !caps.can_return(actor) {
            return Err(DomainError::Forbidden("return requires staff capability"));
        }

        // Unknown barcodes are not-found; a known item with no open lending
        // has nothing outstanding.
        let item = self
            .store
            .get_book_item(&cmd.barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("book item", &cmd.barcode))?;
        let lending = self
            .store
            .find_open_lending(&cmd.barcode)
            .await?
            .ok_or(LendingError::AlreadyReturned {
                barcode: item.barcode,
            })?;

        self.finish_return(lending, cmd.return_date, cmd.note).await
    }

    /// Returns a lending by id. Fails when the lending is already closed.
    #[tracing::instrument(skip(self, caps))]
    pub async fn return_lending(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        lending_id: LendingId,
        return_date: Option<NaiveDate>,
    ) -> Result<ReturnReceipt> {
        if !caps.can_return(actor) {
            return Err(DomainError::Forbidden("return requires staff capability"));
        }

        let lending = self
            .store
            .get_lending(lending_id)
            .await?
            .ok_or_else(|| DomainError::not_found("lending", lending_id))?;
        if !lending.is_open() {
            return Err(LendingError::AlreadyReturned {
                barcode: lending.barcode,
            }
            .into());
        }

        self.finish_return(lending, return_date, None).await
    }

    async fn finish_return(
        &self,
        mut lending: Lending,
        return_date: Option<NaiveDate>,
        note: Option<String>,
    ) -> Result<ReturnReceipt> {
        let return_date = return_date.unwrap_or_else(|| Utc::now().date_naive());
        let config = self.store.load_config().await?;
        let fine_amount = calculate_fine(lending.due_date, return_date, config.fine_per_late_day);

        let mut batch = WriteBatch::new()
            .guard(Guard::LendingOpen {
                lending_id: lending.id,
            })
            .mutate(Mutation::CloseLending {
                lending_id: lending.id,
                returned_at: return_date,
            })
            .mutate(Mutation::AdjustIssuedCount {
                account_id: lending.account_id,
                delta: -1,
            })
            .mutate(Mutation::SetItemState {
                barcode: lending.barcode.clone(),
                status: ItemStatus::Available,
                borrowed_at: None,
                due_date: None,
            });
        if fine_amount > 0 {
            batch = batch.mutate(Mutation::InsertFine(Fine {
                lending_id: lending.id,
                amount: fine_amount,
            }));
        }
        let content = note
            .unwrap_or_else(|| format!("Book with barcode={} is returned", lending.barcode));
        batch = batch.mutate(Mutation::AppendNotification(Notification::new(
            lending.account_id,
            content,
        )));
        self.store.apply(batch).await?;

        metrics::counter!("library_returns_total").increment(1);
        if fine_amount > 0 {
            metrics::counter!("library_fines_assessed_total").increment(u64::from(fine_amount));
            tracing::info!(lending_id = %lending.id, fine_amount, "late return fined");
        }

        lending.returned_at = Some(return_date);
        Ok(ReturnReceipt {
            lending,
            fine_amount,
        })
    }

    /// Fine incurred by a lending; zero when none was assessed.
    ///
    /// Direct relation lookup, never a recomputation.
    pub async fn fine_for(&self, lending_id: LendingId) -> Result<u32> {
        Ok(self
            .store
            .get_fine(lending_id)
            .await?
            .map(|fine| fine.amount)
            .unwrap_or(0))
    }

    /// Fetches a lending the actor is allowed to see.
    pub async fn get(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        lending_id: LendingId,
    ) -> Result<Lending> {
        let lending = self
            .store
            .get_lending(lending_id)
            .await?
            .ok_or_else(|| DomainError::not_found("lending", lending_id))?;
        if !can_see_lending(actor, &lending, caps) {
            return Err(DomainError::Forbidden("not your lending"));
        }
        Ok(lending)
    }

    /// Lists the lendings the actor is allowed to see: everything for
    /// see-all holders, their own otherwise.
    pub async fn list(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
    ) -> Result<Vec<Lending>> {
        if caps.can_see_all_lendings(actor) {
            self.store.list_lendings(None).await.map_err(Into::into)
        } else {
            self.store
                .list_lendings(Some(actor))
                .await
                .map_err(Into::into)
        }
    }

    /// Lists another account's lendings, gated like the detail view.
    pub async fn list_for_account(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        account_id: AccountId,
    ) -> Result<Vec<Lending>> {
        if account_id != actor && !caps.can_see_all_lendings(actor) {
            return Err(DomainError::Forbidden("not your lendings"));
        }
        self.store
            .list_lendings(Some(account_id))
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fine_is_zero_on_or_before_due_date() {
        let due = date(2024, 3, 1);
        assert_eq!(calculate_fine(due, due, 10), 0);
        assert_eq!(calculate_fine(due, date(2024, 2, 20), 10), 0);
    }

    #[test]
    fn fine_grows_linearly_with_late_days() {
        let due = date(2024, 3, 1);
        let mut previous = 0;
        for days in 1..=30 {
            let returned = due + chrono::Duration::days(days);
            let fine = calculate_fine(due, returned, 10);
            assert_eq!(fine, days as u32 * 10);
            assert!(fine > previous);
            previous = fine;
        }
    }

    #[test]
    fn fine_slope_is_the_configured_rate() {
        let due = date(2024, 3, 1);
        let one_late = calculate_fine(due, date(2024, 3, 2), 25);
        let two_late = calculate_fine(due, date(2024, 3, 3), 25);
        assert_eq!(two_late - one_late, 25);
    }
}
