//! Notification sink: append-only writer plus the thin read side.
//!
//! Workflow notifications ride inside the workflows' own write batches; this
//! service covers out-of-band messages and the per-account inbox.

use common::{AccountId, Notification, NotificationId};
use store::{LibraryStore, Mutation, StoreExt};

use crate::error::{DomainError, Result};

/// Service for the notification inbox.
pub struct NotificationService<S> {
    store: S,
}

impl<S: LibraryStore> NotificationService<S> {
    /// Creates a new notification service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Appends a message to an account's inbox.
    #[tracing::instrument(skip(self, content))]
    pub async fn emit(
        &self,
        account_id: AccountId,
        content: impl Into<String>,
    ) -> Result<Notification> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", account_id))?;
        let notification = Notification::new(account_id, content);
        self.store
            .apply_one(Mutation::AppendNotification(notification.clone()))
            .await?;
        Ok(notification)
    }

    /// Lists the actor's own notifications in append order.
    pub async fn list_for(&self, actor: AccountId) -> Result<Vec<Notification>> {
        self.store
            .list_notifications(actor)
            .await
            .map_err(Into::into)
    }

    /// Flags one of the actor's notifications as read.
    pub async fn mark_read(
        &self,
        actor: AccountId,
        notification_id: NotificationId,
    ) -> Result<Notification> {
        let mut notification = self
            .store
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| DomainError::not_found("notification", notification_id))?;
        if notification.account_id != actor {
            return Err(DomainError::Forbidden("not your notification"));
        }
        self.store.mark_notification_read(notification_id).await?;
        notification.is_read = true;
        Ok(notification)
    }
}
