//! Account ledger: registration, membership status, counter reconciliation,
//! and the visibility rules for circulation records.

use common::{Account, AccountId, AccountStatus, Lending, Reservation};
use store::LibraryStore;

use crate::capability::CapabilityChecker;
use crate::error::{DomainError, Result};

/// Returns true if the actor may see this lending: its owner, or a holder
/// of the see-all-lendings capability.
pub fn can_see_lending(actor: AccountId, lending: &Lending, caps: &dyn CapabilityChecker) -> bool {
    lending.account_id == actor || caps.can_see_all_lendings(actor)
}

/// Symmetric visibility rule for reservations.
pub fn can_see_reservation(
    actor: AccountId,
    reservation: &Reservation,
    caps: &dyn CapabilityChecker,
) -> bool {
    reservation.account_id == actor || caps.can_see_all_reservations(actor)
}

/// Service for account records and the issued-count ledger.
pub struct AccountService<S> {
    store: S,
}

impl<S: LibraryStore> AccountService<S> {
    /// Creates a new account service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new active account.
    #[tracing::instrument(skip(self, caps))]
    pub async fn register(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        account_id: AccountId,
    ) -> Result<Account> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("account registration is staff-only"));
        }
        let account = Account::new(account_id);
        self.store.insert_account(account.clone()).await?;
        Ok(account)
    }

    /// Fetches an account: its owner or a librarian.
    pub async fn get(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        account_id: AccountId,
    ) -> Result<Account> {
        if account_id != actor && !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("not your account"));
        }
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", account_id))
    }

    /// Moves an account into a (soft) membership status.
    #[tracing::instrument(skip(self, caps))]
    pub async fn set_status(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<()> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("account status is staff-only"));
        }
        self.store
            .update_account_status(account_id, status)
            .await
            .map_err(Into::into)
    }

    /// Recomputes the issued-book counter from the lending table and
    /// persists it.
    ///
    /// Repair path only: the workflows maintain the counter themselves, and
    /// the lending table stays authoritative.
    #[tracing::instrument(skip(self, caps))]
    pub async fn recalculate_issued_book_count(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        account_id: AccountId,
    ) -> Result<u32> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("reconciliation is staff-only"));
        }
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", account_id))?;
        let count = self.store.count_open_lendings(account_id).await?;
        if count != account.issued_book_count {
            tracing::warn!(
                account_id = %account_id,
                cached = account.issued_book_count,
                actual = count,
                "issued book count was desynchronized"
            );
        }
        self.store.set_issued_book_count(account_id, count).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use common::{Barcode, LendingId};

    use crate::capability::StaticCapabilities;

    use super::*;

    fn lending_for(account_id: AccountId) -> Lending {
        let due = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        Lending {
            id: LendingId::new(),
            account_id,
            barcode: Barcode::new("barcode123"),
            created_on: due,
            due_date: due,
            returned_at: None,
        }
    }

    #[test]
    fn owners_see_their_own_lendings() {
        let owner = AccountId::new();
        let lending = lending_for(owner);
        let caps = StaticCapabilities::patron();
        assert!(can_see_lending(owner, &lending, &caps));
        assert!(!can_see_lending(AccountId::new(), &lending, &caps));
    }

    #[test]
    fn see_all_capability_opens_every_lending() {
        let lending = lending_for(AccountId::new());
        let caps = StaticCapabilities::librarian();
        assert!(can_see_lending(AccountId::new(), &lending, &caps));
    }
}
