use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a resource request. Transitions leave `pending` exactly
/// once; `approved` and `rejected` are terminal and immutable.
/// `cancelled` is defined but no transition produces it in this slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// A manager's ask to allocate a specific user to a specific project,
/// subject to admin/HR approval.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequestRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub requested_user_id: Uuid,
    pub requested_by: Uuid,
    pub role: String,
    pub percentage: i16,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub approver_notes: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
