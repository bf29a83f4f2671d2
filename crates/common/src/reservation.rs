//! Reservation (hold) record and its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Barcode, ReservationId};

/// Status of a hold placed on a book item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// Hold placed, item not yet picked up.
    #[default]
    Waiting,

    /// Item set aside at the desk, waiting for pickup.
    Pending,

    /// Fulfilled by a checkout (terminal).
    Completed,

    /// Withdrawn by the holder or a librarian (terminal).
    Canceled,
}

impl ReservationStatus {
    /// Returns true while the hold still binds the item.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Waiting | ReservationStatus::Pending)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Canceled
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Waiting => "Waiting",
            ReservationStatus::Pending => "Pending",
            ReservationStatus::Completed => "Completed",
            ReservationStatus::Canceled => "Canceled",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Waiting" => Some(ReservationStatus::Waiting),
            "Pending" => Some(ReservationStatus::Pending),
            "Completed" => Some(ReservationStatus::Completed),
            "Canceled" => Some(ReservationStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hold placed on a specific book item prior to checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub account_id: AccountId,
    pub barcode: Barcode,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Returns true while the hold still binds the item.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_and_pending_are_active() {
        assert!(ReservationStatus::Waiting.is_active());
        assert!(ReservationStatus::Pending.is_active());
        assert!(!ReservationStatus::Completed.is_active());
        assert!(!ReservationStatus::Canceled.is_active());
    }

    #[test]
    fn terminal_states() {
        assert!(!ReservationStatus::Waiting.is_terminal());
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(ReservationStatus::Completed.is_terminal());
        assert!(ReservationStatus::Canceled.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(ReservationStatus::Waiting.to_string(), "Waiting");
        assert_eq!(ReservationStatus::Canceled.to_string(), "Canceled");
    }
}
