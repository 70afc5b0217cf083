//! Fire-and-forget notification emission.
//!
//! One append per call, `is_read = false`, no batching and no retries.
//! Callers that treat delivery as best-effort (the approval workflow) log
//! a failure and continue; losing a notification is tolerable, losing the
//! state transition that triggered it is not.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::notification::OriginKind;

pub struct NewNotification {
    pub user_id: Uuid,
    pub message: String,
    pub link: Option<String>,
    pub kind: &'static str,
    pub origin_kind: OriginKind,
    pub origin_id: Uuid,
}

pub async fn emit(pool: &PgPool, notification: NewNotification) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, message, link, kind, origin_kind, origin_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(notification.user_id)
    .bind(&notification.message)
    .bind(&notification.link)
    .bind(notification.kind)
    .bind(notification.origin_kind)
    .bind(notification.origin_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Best-effort wrapper: logs and swallows the failure.
pub async fn emit_best_effort(pool: &PgPool, notification: NewNotification) {
    let target = notification.user_id;
    if let Err(e) = emit(pool, notification).await {
        tracing::warn!("Failed to emit notification to user {target}: {e}");
    }
}
