//! Shared vocabulary for the library circulation system.
//!
//! This crate holds the typed identifiers, the entity records persisted by
//! the store, and the pure state predicates the workflows decide on. It has
//! no behavior beyond that: workflow logic lives in `domain`, persistence in
//! `store`.

pub mod account;
pub mod book;
pub mod config;
pub mod lending;
pub mod notification;
pub mod reservation;
pub mod types;

pub use account::{Account, AccountStatus};
pub use book::{Book, BookFormat, BookItem, ItemStatus, ReserveRefusal};
pub use config::LibraryConfig;
pub use lending::{Fine, Lending};
pub use notification::Notification;
pub use reservation::{Reservation, ReservationStatus};
pub use types::{AccountId, Barcode, Isbn, LendingId, NotificationId, ReservationId};
