use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a UUID-backed identifier type.
///
/// Wrapping the UUID provides type safety and prevents mixing up, say, an
/// account identifier with a lending identifier.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a patron or librarian account.
    AccountId
}

uuid_id! {
    /// Unique identifier for a lending (checkout record).
    LendingId
}

uuid_id! {
    /// Unique identifier for a reservation (hold).
    ReservationId
}

uuid_id! {
    /// Unique identifier for a notification.
    NotificationId
}

/// Barcode of a physical book item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    /// Creates a new barcode from a string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the barcode as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Barcode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Barcode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// ISBN of a catalogued book title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Creates a new ISBN from a string.
    pub fn new(isbn: impl Into<String>) -> Self {
        Self(isbn.into())
    }

    /// Returns the ISBN as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Isbn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Isbn {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_new_creates_unique_ids() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn account_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn lending_id_serialization_roundtrip() {
        let id = LendingId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: LendingId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn barcode_string_conversion() {
        let barcode = Barcode::new("barcode123");
        assert_eq!(barcode.as_str(), "barcode123");

        let other: Barcode = "barcode-55".into();
        assert_eq!(other.as_str(), "barcode-55");
    }

    #[test]
    fn isbn_display() {
        let isbn = Isbn::new("453678754");
        assert_eq!(isbn.to_string(), "453678754");
    }
}
