//! Axum route handlers for skills and per-user skill associations.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::{require, Action, Actor, Role};
use crate::errors::AppError;
use crate::models::skill::SkillRow;
use crate::response::success;
use crate::skills::reconcile::{self, Association, CurrentSkill};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSkillRequest {
    pub name: String,
    pub category: String,
}

/// Skill ids arrive as strings so a malformed id is rejected with a
/// readable validation error instead of a deserializer failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSkillEntry {
    pub skill_id: String,
    pub proficiency: i16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    /// Admin/HR may reconcile on behalf of another user.
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub current_skills: Vec<CurrentSkillEntry>,
    #[serde(default)]
    pub desired_skill_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSkillsQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, serde::Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct SkillDistributionRow {
    skill_id: Uuid,
    name: String,
    category: String,
    current_count: i64,
    desired_count: i64,
}

#[derive(Debug, serde::Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct CategoryDistributionRow {
    category: String,
    current_count: i64,
    desired_count: i64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /skills
pub async fn handle_create_skill(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateSkillRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::CreateSkill)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Skill name cannot be empty".into()));
    }
    if req.category.trim().is_empty() {
        return Err(AppError::Validation("Skill category cannot be empty".into()));
    }

    let duplicate: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM skills WHERE lower(name) = lower($1)")
            .bind(name)
            .fetch_optional(&state.db)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!(
            "A skill named '{name}' already exists"
        )));
    }

    let skill = sqlx::query_as::<_, SkillRow>(
        "INSERT INTO skills (name, category) VALUES ($1, $2) RETURNING *",
    )
    .bind(name)
    .bind(req.category.trim())
    .fetch_one(&state.db)
    .await?;

    Ok(success(skill))
}

/// GET /skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ListSkills)?;

    let skills =
        sqlx::query_as::<_, SkillRow>("SELECT * FROM skills ORDER BY category, name")
            .fetch_all(&state.db)
            .await?;

    Ok(success(skills))
}

/// DELETE /skills/:id
///
/// Removes the skill and every user association referencing it, in one
/// transaction — either the whole cascade applies or none of it does.
pub async fn handle_delete_skill(
    State(state): State<AppState>,
    actor: Actor,
    Path(skill_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::DeleteSkill)?;

    let mut tx = state.db.begin().await?;

    let associations = sqlx::query("DELETE FROM user_skills WHERE skill_id = $1")
        .bind(skill_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM skills WHERE id = $1")
        .bind(skill_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        // Dropping tx rolls the cascade back.
        return Err(AppError::NotFound(format!("Skill {skill_id} not found")));
    }

    tx.commit().await?;

    tracing::info!("Deleted skill {skill_id} and {associations} user associations");
    Ok(success(json!({ "deletedAssociations": associations })))
}

/// GET /skills/distribution
///
/// Aggregate current/desired counts per skill and per category.
pub async fn handle_skill_distribution(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ViewSkillDistribution)?;

    let skills = sqlx::query_as::<_, SkillDistributionRow>(
        r#"
        SELECT s.id AS skill_id, s.name, s.category,
               COUNT(us.id) FILTER (WHERE us.is_current) AS current_count,
               COUNT(us.id) FILTER (WHERE us.is_desired) AS desired_count
        FROM skills s
        LEFT JOIN user_skills us ON us.skill_id = s.id
        GROUP BY s.id, s.name, s.category
        ORDER BY s.category, s.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let categories = sqlx::query_as::<_, CategoryDistributionRow>(
        r#"
        SELECT s.category,
               COUNT(us.id) FILTER (WHERE us.is_current) AS current_count,
               COUNT(us.id) FILTER (WHERE us.is_desired) AS desired_count
        FROM skills s
        LEFT JOIN user_skills us ON us.skill_id = s.id
        GROUP BY s.category
        ORDER BY s.category
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(success(json!({
        "skills": skills,
        "categories": categories
    })))
}

/// PUT /userskills
///
/// Reconciles the caller's current/desired skill facets against stored
/// state and returns the canonical association set.
pub async fn handle_reconcile_user_skills(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReconcileSkills)?;
    let target_user = resolve_target_user(&actor, req.user_id)?;

    let current = parse_current_facet(&req.current_skills)?;
    let desired = parse_skill_ids(&req.desired_skill_ids)?;

    let mut referenced: Vec<Uuid> = current.iter().map(|c| c.skill_id).collect();
    referenced.extend(&desired);
    ensure_skills_exist(&state, &referenced).await?;
    ensure_user_exists(&state, target_user).await?;

    let existing = load_associations(&state, target_user).await?;
    let ops = reconcile::plan(&existing, &current, &desired);

    if !ops.is_empty() {
        let mut tx = state.db.begin().await?;
        reconcile::apply(&mut tx, target_user, &ops).await?;
        tx.commit().await?;
        tracing::info!(
            "Reconciled skills for user {target_user}: {} operation(s)",
            ops.len()
        );
    }

    let associations = reconcile::read_associations(&state.db, target_user).await?;
    Ok(success(associations))
}

/// GET /userskills
pub async fn handle_get_user_skills(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<UserSkillsQuery>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadUserSkills)?;
    let target_user = resolve_target_user(&actor, params.user_id)?;

    let associations = reconcile::read_associations(&state.db, target_user).await?;
    Ok(success(associations))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Everyone acts on their own associations; admin/HR may name another user.
fn resolve_target_user(actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    match requested {
        None => Ok(actor.user_id),
        Some(id) if id == actor.user_id => Ok(id),
        Some(id) if matches!(actor.role, Role::Admin | Role::Hr) => Ok(id),
        Some(_) => Err(AppError::Forbidden),
    }
}

fn parse_current_facet(entries: &[CurrentSkillEntry]) -> Result<Vec<CurrentSkill>, AppError> {
    entries
        .iter()
        .map(|e| {
            let skill_id = parse_skill_id(&e.skill_id)?;
            if !(1..=5).contains(&e.proficiency) {
                return Err(AppError::Validation(format!(
                    "Proficiency must be between 1 and 5, got {}",
                    e.proficiency
                )));
            }
            Ok(CurrentSkill {
                skill_id,
                proficiency: e.proficiency,
            })
        })
        .collect()
}

fn parse_skill_ids(ids: &[String]) -> Result<Vec<Uuid>, AppError> {
    ids.iter().map(|id| parse_skill_id(id)).collect()
}

fn parse_skill_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation(format!("Invalid skill id: '{id}'")))
}

async fn ensure_skills_exist(state: &AppState, skill_ids: &[Uuid]) -> Result<(), AppError> {
    if skill_ids.is_empty() {
        return Ok(());
    }
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM skills WHERE id = ANY($1)")
        .bind(skill_ids)
        .fetch_all(&state.db)
        .await?;
    for id in skill_ids {
        if !found.iter().any(|(f,)| f == id) {
            return Err(AppError::NotFound(format!("Skill {id} not found")));
        }
    }
    Ok(())
}

async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

async fn load_associations(state: &AppState, user_id: Uuid) -> Result<Vec<Association>, AppError> {
    #[derive(FromRow)]
    struct Row {
        skill_id: Uuid,
        is_current: bool,
        is_desired: bool,
        proficiency: Option<i16>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT skill_id, is_current, is_desired, proficiency FROM user_skills WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Association {
            skill_id: r.skill_id,
            is_current: r.is_current,
            is_desired: r.is_desired,
            proficiency: r.proficiency,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_skill_id_is_a_validation_error() {
        let err = parse_skill_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_proficiency_out_of_range_rejected() {
        for bad in [0, 6, -1] {
            let entries = vec![CurrentSkillEntry {
                skill_id: Uuid::new_v4().to_string(),
                proficiency: bad,
            }];
            assert!(matches!(
                parse_current_facet(&entries),
                Err(AppError::Validation(_))
            ));
        }
        let ok = vec![CurrentSkillEntry {
            skill_id: Uuid::new_v4().to_string(),
            proficiency: 5,
        }];
        assert!(parse_current_facet(&ok).is_ok());
    }

    #[test]
    fn test_only_admin_hr_reconcile_for_others() {
        let actor_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let pm = Actor {
            user_id: actor_id,
            role: Role::Pm,
        };
        assert!(matches!(
            resolve_target_user(&pm, Some(other)),
            Err(AppError::Forbidden)
        ));
        assert_eq!(resolve_target_user(&pm, Some(actor_id)).unwrap(), actor_id);
        assert_eq!(resolve_target_user(&pm, None).unwrap(), actor_id);

        let hr = Actor {
            user_id: actor_id,
            role: Role::Hr,
        };
        assert_eq!(resolve_target_user(&hr, Some(other)).unwrap(), other);
    }
}
