//! Reservation workflow: placing, canceling, and releasing holds.
//!
//! Canceling a hold deliberately leaves the item `Reserved` — the desk
//! decides when the copy goes back into circulation via [`release`]. Both
//! operations are exposed so callers choose the policy.
//!
//! [`release`]: ReservationService::release

use chrono::Utc;
use thiserror::Error;

use common::{
    AccountId, AccountStatus, Barcode, ItemStatus, Notification, Reservation, ReservationId,
    ReservationStatus, ReserveRefusal,
};
use store::{Guard, LibraryStore, Mutation, WriteBatch};

use crate::capability::CapabilityChecker;
use crate::error::{DomainError, Result};
use crate::ledger::can_see_reservation;

/// Errors that can occur during reservation operations.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The item refuses holds in its current state.
    #[error("Book item {barcode} cannot be reserved: {refusal}")]
    NotReservable {
        barcode: Barcode,
        refusal: ReserveRefusal,
    },

    /// A self-reservation by a non-active account.
    #[error("Account {account_id} is not active ({status})")]
    AccountInactive {
        account_id: AccountId,
        status: AccountStatus,
    },

    /// The reservation already reached a terminal status.
    #[error("Reservation {reservation_id} is no longer active ({status})")]
    NotActive {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    /// Release on an item that is not reserved.
    #[error("Book item {barcode} is not reserved")]
    NotReserved { barcode: Barcode },

    /// Release while a hold still binds the item.
    #[error("Book item {barcode} still has an active hold")]
    StillHeld { barcode: Barcode },
}

/// Command to place a hold on a book item.
#[derive(Debug, Clone)]
pub struct Reserve {
    /// The account the hold is for.
    pub account_id: AccountId,

    /// The item to hold.
    pub barcode: Barcode,
}

impl Reserve {
    /// Creates a new Reserve command.
    pub fn new(account_id: AccountId, barcode: impl Into<Barcode>) -> Self {
        Self {
            account_id,
            barcode: barcode.into(),
        }
    }
}

/// Returns true if the actor may edit this reservation: its owner, or a
/// holder of the change-reservation capability.
pub fn is_editable_by(
    actor: AccountId,
    reservation: &Reservation,
    caps: &dyn CapabilityChecker,
) -> bool {
    reservation.account_id == actor || caps.can_change_reservation(actor)
}

/// Service for placing, canceling, and releasing holds.
pub struct ReservationService<S> {
    store: S,
}

impl<S: LibraryStore> ReservationService<S> {
    /// Creates a new reservation service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places a hold on a book item.
    #[tracing::instrument(skip(self, caps))]
    pub async fn reserve(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        cmd: Reserve,
    ) -> Result<Reservation> {
        if cmd.account_id != actor && !caps.can_reserve_for_others(actor) {
            return Err(DomainError::Forbidden(
                "reserving for another account requires staff capability",
            ));
        }

        let account = self
            .store
            .get_account(cmd.account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", cmd.account_id))?;
        if cmd.account_id == actor && !account.is_active() {
            return Err(ReservationError::AccountInactive {
                account_id: account.id,
                status: account.status,
            }
            .into());
        }

        let item = self
            .store
            .get_book_item(&cmd.barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("book item", &cmd.barcode))?;
        item.can_be_reserved()
            .map_err(|refusal| ReservationError::NotReservable {
                barcode: item.barcode.clone(),
                refusal,
            })?;

        let reservation = Reservation {
            id: ReservationId::new(),
            account_id: account.id,
            barcode: item.barcode.clone(),
            status: ReservationStatus::Waiting,
            created_at: Utc::now(),
        };

        let batch = WriteBatch::new()
            .guard(Guard::ItemStatus {
                barcode: item.barcode.clone(),
                expected: ItemStatus::Available,
            })
            .mutate(Mutation::SetItemState {
                barcode: item.barcode.clone(),
                status: ItemStatus::Reserved,
                borrowed_at: None,
                due_date: None,
            })
            .mutate(Mutation::InsertReservation(reservation.clone()))
            .mutate(Mutation::AppendNotification(Notification::new(
                account.id,
                format!("Book with barcode {} reserved successfully.", item.barcode),
            )));
        self.store.apply(batch).await?;

        metrics::counter!("library_reservations_total").increment(1);
        tracing::info!(reservation_id = %reservation.id, barcode = %reservation.barcode, "hold placed");
        Ok(reservation)
    }

    /// Cancels a hold. The item stays `Reserved` until released.
    #[tracing::instrument(skip(self, caps))]
    pub async fn cancel(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        reservation_id: ReservationId,
    ) -> Result<Reservation> {
        let mut reservation = self
            .store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("reservation", reservation_id))?;
        if !is_editable_by(actor, &reservation, caps) {
            return Err(DomainError::Forbidden("not your reservation"));
        }
        if !reservation.is_active() {
            return Err(ReservationError::NotActive {
                reservation_id,
                status: reservation.status,
            }
            .into());
        }

        let batch = WriteBatch::new()
            .guard(Guard::ReservationActive { reservation_id })
            .mutate(Mutation::SetReservationStatus {
                reservation_id,
                status: ReservationStatus::Canceled,
            })
            .mutate(Mutation::AppendNotification(Notification::new(
                reservation.account_id,
                format!(
                    "Reservation for Book with barcode {} has been canceled.",
                    reservation.barcode
                ),
            )));
        self.store.apply(batch).await?;

        reservation.status = ReservationStatus::Canceled;
        Ok(reservation)
    }

    /// Puts a reserved item with no remaining active hold back into
    /// circulation (`Reserved → Available`).
    #[tracing::instrument(skip(self, caps))]
    pub async fn release(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        barcode: &Barcode,
    ) -> Result<()> {
        if !caps.is_librarian(actor) {
            return Err(DomainError::Forbidden("release is staff-only"));
        }

        let item = self
            .store
            .get_book_item(barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("book item", barcode))?;
        if item.status != ItemStatus::Reserved {
            return Err(ReservationError::NotReserved {
                barcode: item.barcode,
            }
            .into());
        }
        if self.store.find_active_reservation(barcode).await?.is_some() {
            return Err(ReservationError::StillHeld {
                barcode: item.barcode,
            }
            .into());
        }

        let batch = WriteBatch::new()
            .guard(Guard::ItemStatus {
                barcode: item.barcode.clone(),
                expected: ItemStatus::Reserved,
            })
            .mutate(Mutation::SetItemState {
                barcode: item.barcode,
                status: ItemStatus::Available,
                borrowed_at: None,
                due_date: None,
            });
        self.store.apply(batch).await.map_err(Into::into)
    }

    /// Fetches a reservation the actor is allowed to see.
    pub async fn get(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
        reservation_id: ReservationId,
    ) -> Result<Reservation> {
        let reservation = self
            .store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("reservation", reservation_id))?;
        if !can_see_reservation(actor, &reservation, caps) {
            return Err(DomainError::Forbidden("not your reservation"));
        }
        Ok(reservation)
    }

    /// Lists the reservations the actor is allowed to see.
    pub async fn list(
        &self,
        caps: &dyn CapabilityChecker,
        actor: AccountId,
    ) -> Result<Vec<Reservation>> {
        if caps.can_see_all_reservations(actor) {
            self.store.list_reservations(None).await.map_err(Into::into)
        } else {
            self.store
                .list_reservations(Some(actor))
                .await
                .map_err(Into::into)
        }
    }
}
