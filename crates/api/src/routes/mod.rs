//! Route handlers and shared application state.

pub mod accounts;
pub mod books;
pub mod health;
pub mod items;
pub mod lendings;
pub mod library_config;
pub mod metrics;
pub mod notifications;
pub mod reservations;

use common::{AccountId, LendingId, NotificationId, ReservationId};
use domain::{
    AccountService, CatalogService, LendingService, NotificationService, ReservationService,
};
use store::LibraryStore;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: LibraryStore> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub lendings: LendingService<S>,
    pub reservations: ReservationService<S>,
    pub notifications: NotificationService<S>,
    pub store: S,
}

fn parse_uuid(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

pub(crate) fn parse_account_id(id: &str) -> Result<AccountId, ApiError> {
    parse_uuid(id).map(AccountId::from_uuid)
}

pub(crate) fn parse_lending_id(id: &str) -> Result<LendingId, ApiError> {
    parse_uuid(id).map(LendingId::from_uuid)
}

pub(crate) fn parse_reservation_id(id: &str) -> Result<ReservationId, ApiError> {
    parse_uuid(id).map(ReservationId::from_uuid)
}

pub(crate) fn parse_notification_id(id: &str) -> Result<NotificationId, ApiError> {
    parse_uuid(id).map(NotificationId::from_uuid)
}
