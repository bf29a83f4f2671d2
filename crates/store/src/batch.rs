//! Guarded atomic write batches.
//!
//! A [`WriteBatch`] is the unit in which workflows mutate the store: a list
//! of [`Guard`]s that must still hold inside the transaction, followed by the
//! [`Mutation`]s to commit. The guards carry the state the workflow observed
//! when it checked its preconditions; if any row changed in between, the
//! whole batch fails with a conflict and nothing is written.

use chrono::NaiveDate;

use common::{
    AccountId, Barcode, Fine, ItemStatus, Lending, LendingId, Notification, Reservation,
    ReservationId, ReservationStatus,
};

use crate::error::StoreError;

/// A precondition re-checked inside the store's transaction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The item must still be in the status the workflow read.
    ItemStatus { barcode: Barcode, expected: ItemStatus },

    /// The account's denormalized open-lending counter must be unchanged.
    IssuedCount { account_id: AccountId, expected: u32 },

    /// The lending must still be open (no return date set).
    LendingOpen { lending_id: LendingId },

    /// The reservation must still be active (Waiting or Pending).
    ReservationActive { reservation_id: ReservationId },
}

/// A single row mutation within an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a new lending row.
    InsertLending(Lending),

    /// Stamp the return date on an open lending.
    CloseLending {
        lending_id: LendingId,
        returned_at: NaiveDate,
    },

    /// Move an item to a new status, replacing its borrowed/due dates.
    SetItemState {
        barcode: Barcode,
        status: ItemStatus,
        borrowed_at: Option<NaiveDate>,
        due_date: Option<NaiveDate>,
    },

    /// Adjust the account's open-lending counter by `delta`.
    ///
    /// The counter never goes below zero: a decrement past zero is clamped
    /// and logged as a reconciliation bug, not treated as fatal.
    AdjustIssuedCount { account_id: AccountId, delta: i32 },

    /// Insert a new reservation row.
    InsertReservation(Reservation),

    /// Move a reservation to a new status.
    SetReservationStatus {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    /// Mark every active reservation this account holds on this item as
    /// completed. A no-op when the account holds none.
    CompleteReservations {
        account_id: AccountId,
        barcode: Barcode,
    },

    /// Insert the fine penalizing a lending.
    InsertFine(Fine),

    /// Append a notification for an account.
    AppendNotification(Notification),
}

/// An atomic unit of guarded mutations.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub guards: Vec<Guard>,
    pub mutations: Vec<Mutation>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a guard to the batch.
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Adds a mutation to the batch.
    pub fn mutate(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }
}

/// Validates a batch before it is applied.
pub fn validate_batch(batch: &WriteBatch) -> Result<(), StoreError> {
    if batch.mutations.is_empty() {
        return Err(StoreError::InvalidBatch(
            "batch contains no mutations".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_rejected() {
        let batch = WriteBatch::new().guard(Guard::LendingOpen {
            lending_id: LendingId::new(),
        });
        assert!(matches!(
            validate_batch(&batch),
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn batch_builder_accumulates() {
        let account_id = AccountId::new();
        let batch = WriteBatch::new()
            .guard(Guard::IssuedCount {
                account_id,
                expected: 0,
            })
            .mutate(Mutation::AdjustIssuedCount {
                account_id,
                delta: 1,
            })
            .mutate(Mutation::AppendNotification(Notification::new(
                account_id, "issued",
            )));

        assert_eq!(batch.guards.len(), 1);
        assert_eq!(batch.mutations.len(), 2);
        assert!(validate_batch(&batch).is_ok());
    }
}
