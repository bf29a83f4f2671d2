//! Injected permission checks.
//!
//! Permission storage lives outside this system; the workflows depend only
//! on the [`CapabilityChecker`] interface. [`StaticCapabilities`] is the
//! packaged implementation used by the HTTP layer (capability set derived
//! from the proxy-supplied role) and by tests.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use common::AccountId;

/// A single named permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Check items out to accounts.
    Checkout,
    /// Accept returned items.
    Return,
    /// Place holds on behalf of other accounts.
    ReserveForOthers,
    /// Edit reservations regardless of ownership.
    ChangeReservation,
    /// View every account's lendings.
    SeeAllLendings,
    /// View every account's reservations.
    SeeAllReservations,
}

/// Capability checks for an acting account.
pub trait CapabilityChecker: Send + Sync {
    /// Returns true if the actor holds the given capability.
    fn has(&self, actor: AccountId, capability: Capability) -> bool;

    /// Returns true for librarian actors, who additionally administer the
    /// catalog, accounts, and the circulation policy.
    fn is_librarian(&self, actor: AccountId) -> bool;

    fn can_checkout(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::Checkout)
    }

    fn can_return(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::Return)
    }

    fn can_reserve_for_others(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::ReserveForOthers)
    }

    fn can_change_reservation(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::ChangeReservation)
    }

    fn can_see_all_lendings(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::SeeAllLendings)
    }

    fn can_see_all_reservations(&self, actor: AccountId) -> bool {
        self.has(actor, Capability::SeeAllReservations)
    }
}

/// The two packaged capability profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patron,
    Librarian,
}

impl Role {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patron => "patron",
            Role::Librarian => "librarian",
        }
    }

    /// Parses a role from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patron" => Some(Role::Patron),
            "librarian" => Some(Role::Librarian),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fixed capability set, independent of which account is acting.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    granted: HashSet<Capability>,
    librarian: bool,
}

impl StaticCapabilities {
    /// No capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// The patron profile: no staff capabilities.
    pub fn patron() -> Self {
        Self::default()
    }

    /// The librarian profile: every capability.
    pub fn librarian() -> Self {
        Self {
            granted: HashSet::from([
                Capability::Checkout,
                Capability::Return,
                Capability::ReserveForOthers,
                Capability::ChangeReservation,
                Capability::SeeAllLendings,
                Capability::SeeAllReservations,
            ]),
            librarian: true,
        }
    }

    /// The profile for a role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Patron => Self::patron(),
            Role::Librarian => Self::librarian(),
        }
    }

    /// Grants one extra capability.
    pub fn grant(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }
}

impl CapabilityChecker for StaticCapabilities {
    fn has(&self, _actor: AccountId, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    fn is_librarian(&self, _actor: AccountId) -> bool {
        self.librarian
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patrons_hold_no_staff_capabilities() {
        let caps = StaticCapabilities::patron();
        let actor = AccountId::new();
        assert!(!caps.can_checkout(actor));
        assert!(!caps.can_reserve_for_others(actor));
        assert!(!caps.can_see_all_lendings(actor));
        assert!(!caps.is_librarian(actor));
    }

    #[test]
    fn librarians_hold_every_capability() {
        let caps = StaticCapabilities::librarian();
        let actor = AccountId::new();
        assert!(caps.can_checkout(actor));
        assert!(caps.can_return(actor));
        assert!(caps.can_reserve_for_others(actor));
        assert!(caps.can_change_reservation(actor));
        assert!(caps.can_see_all_lendings(actor));
        assert!(caps.can_see_all_reservations(actor));
        assert!(caps.is_librarian(actor));
    }

    #[test]
    fn grant_adds_a_single_capability() {
        let caps = StaticCapabilities::patron().grant(Capability::ReserveForOthers);
        let actor = AccountId::new();
        assert!(caps.can_reserve_for_others(actor));
        assert!(!caps.can_checkout(actor));
    }

    #[test]
    fn role_parse_roundtrip() {
        assert_eq!(Role::parse("patron"), Some(Role::Patron));
        assert_eq!(Role::parse("librarian"), Some(Role::Librarian));
        assert_eq!(Role::parse("admin"), None);
    }
}
