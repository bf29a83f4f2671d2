//! Lending (checkout) and fine records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Barcode, LendingId};

/// A checkout record. Open while `returned_at` is `None`.
///
/// For a given book item at most one lending may be open at any time; this
/// mirrors the item's `Issued` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lending {
    pub id: LendingId,
    pub account_id: AccountId,
    pub barcode: Barcode,
    pub created_on: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_at: Option<NaiveDate>,
}

impl Lending {
    /// Returns true if the item has not been returned yet.
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// How many days past due the lending is on the given date, zero when on
    /// time.
    pub fn days_late(&self, on: NaiveDate) -> u32 {
        (on - self.due_date).num_days().max(0) as u32
    }
}

/// Monetary penalty for a late return, one-to-one with its lending.
///
/// Created only when the computed amount is positive; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    pub lending_id: LendingId,
    pub amount: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lending(due: NaiveDate) -> Lending {
        Lending {
            id: LendingId::new(),
            account_id: AccountId::new(),
            barcode: Barcode::new("barcode123"),
            created_on: due,
            due_date: due,
            returned_at: None,
        }
    }

    #[test]
    fn lending_is_open_until_returned() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut lending = lending(due);
        assert!(lending.is_open());

        lending.returned_at = Some(due);
        assert!(!lending.is_open());
    }

    #[test]
    fn days_late_is_zero_on_or_before_due_date() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let lending = lending(due);
        assert_eq!(lending.days_late(due), 0);
        assert_eq!(lending.days_late(due.pred_opt().unwrap()), 0);
    }

    #[test]
    fn days_late_counts_past_due_days() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let lending = lending(due);
        let five_late = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert_eq!(lending.days_late(five_late), 5);
    }
}
