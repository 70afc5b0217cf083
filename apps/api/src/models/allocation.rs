use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An actual assignment of a user to a project. `end_date = None` means
/// the allocation is open-ended (ongoing forever for overlap purposes).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: String,
    pub percentage: i16,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
