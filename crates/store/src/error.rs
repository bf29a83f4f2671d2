use thiserror::Error;

/// Errors that can occur when interacting with the library store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A guarded write observed state that no longer matches what the caller
    /// read. The caller should re-read and retry.
    #[error("State conflict on {entity} {key}: {details}")]
    Conflict {
        entity: &'static str,
        key: String,
        details: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The write batch was malformed (e.g. no mutations).
    #[error("Invalid write batch: {0}")]
    InvalidBatch(String),

    /// A stored value could not be converted back into its entity type.
    #[error("Corrupt row for {entity} {key}: {details}")]
    Conversion {
        entity: &'static str,
        key: String,
        details: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for conflicts that a caller may resolve by re-reading
    /// and retrying the operation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
