//! Account-facing notification record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, NotificationId};

/// An append-only message addressed to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub is_read: bool,
}

impl Notification {
    /// Creates a new unread notification stamped with the current time.
    pub fn new(account_id: AccountId, content: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(),
            account_id,
            created_at: Utc::now(),
            content: content.into(),
            is_read: false,
        }
    }
}
