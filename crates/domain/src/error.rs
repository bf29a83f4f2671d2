//! Domain error taxonomy.

use store::StoreError;
use thiserror::Error;

use crate::lending::LendingError;
use crate::reservation::ReservationError;

/// Errors that can occur during circulation operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The actor lacks the capability or ownership the operation requires.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// A lending workflow precondition was violated.
    #[error(transparent)]
    Lending(#[from] LendingError),

    /// A reservation workflow precondition was violated.
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    /// Internal inconsistency that must be logged and reconciled, never
    /// silently swallowed.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns true for state conflicts the caller may resolve by re-reading
    /// and retrying: violated workflow preconditions and store-level
    /// concurrency conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Lending(_)
                | DomainError::Reservation(_)
                | DomainError::Store(StoreError::Conflict { .. })
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
