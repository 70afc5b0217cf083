//! Axum route handlers for the notification feed.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{require, Action, Actor};
use crate::errors::AppError;
use crate::models::notification::NotificationRow;
use crate::response::success;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub unread: Option<bool>,
}

/// GET /notifications
///
/// The caller's own feed, newest first; `?unread=true` filters to unread.
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<FeedQuery>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadNotifications)?;

    let notifications = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND ($2::bool IS NOT TRUE OR is_read = false)
        ORDER BY created_at DESC
        "#,
    )
    .bind(actor.user_id)
    .bind(params.unread)
    .fetch_all(&state.db)
    .await?;

    Ok(success(notifications))
}

/// PUT /notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::MarkNotificationRead)?;

    // Scoped to the caller so a foreign id reads as absent.
    let updated = sqlx::query_as::<_, NotificationRow>(
        r#"
        UPDATE notifications SET is_read = true
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(notification_id)
    .bind(actor.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Notification {notification_id} not found")))?;

    Ok(success(updated))
}

/// PUT /notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::MarkNotificationRead)?;

    let updated = sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND is_read = false")
        .bind(actor.user_id)
        .execute(&state.db)
        .await?
        .rows_affected();

    Ok(success(json!({ "marked": updated })))
}
