use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SkillRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// One user↔skill association. At most one row exists per (user, skill);
/// a row with neither flag set is deleted, never persisted. Proficiency is
/// present only while `is_current` is true.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSkillRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub is_current: bool,
    pub is_desired: bool,
    pub proficiency: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical read-back shape: the association joined with the skill's
/// name and category.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSkillView {
    pub skill_id: Uuid,
    pub name: String,
    pub category: String,
    pub is_current: bool,
    pub is_desired: bool,
    pub proficiency: Option<i16>,
}
