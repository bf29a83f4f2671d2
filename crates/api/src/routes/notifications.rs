//! Notification inbox endpoints (self only).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::Notification;
use serde::Serialize;
use store::LibraryStore;

use crate::error::ApiError;
use crate::extractor::Principal;

use super::{AppState, parse_notification_id};

// -- Response types --

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub is_read: bool,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            created_at: notification.created_at,
            content: notification.content,
            is_read: notification.is_read,
        }
    }
}

// -- Handlers --

/// GET /notifications — the principal's inbox in append order.
#[tracing::instrument(skip(state, principal))]
pub async fn list<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let notifications = state.notifications.list_for(principal.account_id).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

/// POST /notifications/{id}/read — mark one of the principal's
/// notifications as read.
#[tracing::instrument(skip(state, principal))]
pub async fn mark_read<S: LibraryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification_id = parse_notification_id(&id)?;
    let notification = state
        .notifications
        .mark_read(principal.account_id, notification_id)
        .await?;
    Ok(Json(notification.into()))
}
