//! Circulation workflows for the library system.
//!
//! This crate provides the core services:
//! - [`LendingService`] — the checkout/return state machine and fines
//! - [`ReservationService`] — placing, canceling, and releasing holds
//! - [`AccountService`] — the account ledger and counter reconciliation
//! - [`CatalogService`] — titles, physical items, lost marking
//! - [`NotificationService`] — the append-only notification sink
//!
//! Services are generic over the injected [`store::LibraryStore`]; every
//! workflow commits its mutations as one guarded atomic batch. Permission
//! checks go through the injected [`CapabilityChecker`].

pub mod capability;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod lending;
pub mod notification;
pub mod reservation;

pub use capability::{Capability, CapabilityChecker, Role, StaticCapabilities};
pub use catalog::CatalogService;
pub use error::{DomainError, Result};
pub use ledger::{AccountService, can_see_lending, can_see_reservation};
pub use lending::{
    CheckOut, LendingError, LendingService, ReturnItem, ReturnReceipt, calculate_fine,
};
pub use notification::NotificationService;
pub use reservation::{Reserve, ReservationError, ReservationService, is_editable_by};
