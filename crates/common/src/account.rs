//! Patron/librarian account record and membership status.

use serde::{Deserialize, Serialize};

use crate::config::LibraryConfig;
use crate::types::AccountId;

/// Membership status of an account.
///
/// Accounts are never deleted; they move into one of the soft closed states
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccountStatus {
    /// The account may borrow and reserve items.
    #[default]
    Active,

    /// Membership ended normally.
    Closed,

    /// Membership was canceled by the library.
    Canceled,

    /// The account is barred from all circulation operations.
    Blacklisted,
}

impl AccountStatus {
    /// Returns true if circulation operations are allowed in this status.
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Closed => "Closed",
            AccountStatus::Canceled => "Canceled",
            AccountStatus::Blacklisted => "Blacklisted",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(AccountStatus::Active),
            "Closed" => Some(AccountStatus::Closed),
            "Canceled" => Some(AccountStatus::Canceled),
            "Blacklisted" => Some(AccountStatus::Blacklisted),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A library account.
///
/// `issued_book_count` is a denormalized counter of the account's open
/// lendings. The lending table is authoritative; the ledger service owns
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub status: AccountStatus,
    pub issued_book_count: u32,
}

impl Account {
    /// Creates a new active account with no open lendings.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            status: AccountStatus::Active,
            issued_book_count: 0,
        }
    }

    /// Returns true if the account may borrow and reserve items.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// How many more items the account may have out simultaneously.
    ///
    /// May be negative after a quota bypass; a non-positive value means
    /// "no quota left".
    pub fn remaining_issue_count(&self, config: &LibraryConfig) -> i64 {
        i64::from(config.maximum_book_issue_limit) - i64::from(self.issued_book_count)
    }
}
