//! Library-wide circulation policy.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Circulation policy, stored as a singleton record.
///
/// Exactly one instance exists; saving always overwrites that one record and
/// loading falls back to these defaults when none has been stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Maximum number of simultaneously open lendings per account.
    pub maximum_book_issue_limit: u32,
    /// Loan period in days, used when no due date is given at checkout.
    pub maximum_day_limit: u32,
    /// Fine charged per day past the due date.
    pub fine_per_late_day: u32,
}

impl LibraryConfig {
    /// Due date for a checkout created on `from` with no explicit due date.
    pub fn default_due_date(&self, from: NaiveDate) -> NaiveDate {
        from.checked_add_days(Days::new(u64::from(self.maximum_day_limit)))
            .unwrap_or(from)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            maximum_book_issue_limit: 3,
            maximum_day_limit: 10,
            fine_per_late_day: 10,
        }
    }
}
