use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The closed set of resources a notification can originate from.
/// Tagged union instead of a dynamically-typed reference, so every valid
/// origin is known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "origin_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Allocation,
    ResourceRequest,
    Project,
    User,
}

/// Fire-and-forget feed record. Mutated only to flip `is_read`;
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub link: Option<String>,
    pub kind: String,
    pub origin_kind: OriginKind,
    pub origin_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
