//! Axum route handlers for allocations.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::allocations::overlap::{describe_range, find_conflict};
use crate::allocations::ALLOCATION_ROLES;
use crate::auth::{require, Action, Actor, Role};
use crate::errors::AppError;
use crate::models::allocation::AllocationRow;
use crate::response::success;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocationRequest {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: String,
    pub percentage: i16,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// All fields optional: unnamed fields keep their stored values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllocationRequest {
    pub role: Option<String>,
    pub percentage: Option<i16>,
    pub start_date: Option<NaiveDate>,
    /// `Some(None)` clears the end date (back to open-ended).
    #[serde(default, deserialize_with = "crate::patch::double_option")]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAllocationsQuery {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /allocations
pub async fn handle_create_allocation(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateAllocationRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::CreateAllocation)?;

    if req.role.trim().is_empty() {
        return Err(AppError::Validation("Role cannot be empty".into()));
    }
    validate_create_percentage(req.percentage)?;
    validate_date_order(req.start_date, req.end_date)?;

    ensure_user_exists(&state, req.user_id).await?;
    ensure_project_exists(&state, req.project_id).await?;

    if let Some(clash) = find_conflict(
        &state.db,
        req.user_id,
        req.project_id,
        req.start_date,
        req.end_date,
        None,
    )
    .await?
    {
        return Err(AppError::Conflict(format!(
            "User already allocated to this project from {}",
            describe_range(clash.start_date, clash.end_date)
        )));
    }

    let allocation = sqlx::query_as::<_, AllocationRow>(
        r#"
        INSERT INTO allocations (user_id, project_id, role, percentage, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(req.project_id)
    .bind(req.role.trim())
    .bind(req.percentage)
    .bind(req.start_date)
    .bind(req.end_date)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        "Created allocation {} (user {} on project {})",
        allocation.id,
        allocation.user_id,
        allocation.project_id
    );
    Ok(success(allocation))
}

/// PUT /allocations/:id
pub async fn handle_update_allocation(
    State(state): State<AppState>,
    actor: Actor,
    Path(allocation_id): Path<Uuid>,
    Json(req): Json<UpdateAllocationRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::UpdateAllocation)?;

    let existing = sqlx::query_as::<_, AllocationRow>("SELECT * FROM allocations WHERE id = $1")
        .bind(allocation_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Allocation {allocation_id} not found")))?;

    let role = match req.role {
        Some(role) => {
            validate_allocation_role(&role)?;
            role
        }
        None => existing.role,
    };
    let percentage = req.percentage.unwrap_or(existing.percentage);
    validate_update_percentage(percentage)?;
    let start_date = req.start_date.unwrap_or(existing.start_date);
    let end_date = req.end_date.unwrap_or(existing.end_date);
    validate_date_order(start_date, end_date)?;

    if let Some(clash) = find_conflict(
        &state.db,
        existing.user_id,
        existing.project_id,
        start_date,
        end_date,
        Some(allocation_id),
    )
    .await?
    {
        return Err(AppError::Conflict(format!(
            "User already allocated to this project from {}",
            describe_range(clash.start_date, clash.end_date)
        )));
    }

    let allocation = sqlx::query_as::<_, AllocationRow>(
        r#"
        UPDATE allocations
        SET role = $2, percentage = $3, start_date = $4, end_date = $5, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(allocation_id)
    .bind(&role)
    .bind(percentage)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(&state.db)
    .await?;

    Ok(success(allocation))
}

/// GET /allocations
///
/// Visibility is role-scoped: admin/HR see everything (with optional
/// filters), PMs see allocations on projects they manage plus their own,
/// employees see only their own.
pub async fn handle_list_allocations(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListAllocationsQuery>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ListAllocations)?;

    let allocations = match actor.role {
        Role::Admin | Role::Hr => {
            sqlx::query_as::<_, AllocationRow>(
                r#"
                SELECT * FROM allocations
                WHERE ($1::uuid IS NULL OR user_id = $1)
                  AND ($2::uuid IS NULL OR project_id = $2)
                ORDER BY start_date DESC
                "#,
            )
            .bind(params.user_id)
            .bind(params.project_id)
            .fetch_all(&state.db)
            .await?
        }
        Role::Pm => {
            sqlx::query_as::<_, AllocationRow>(
                r#"
                SELECT a.* FROM allocations a
                JOIN projects p ON p.id = a.project_id
                WHERE p.manager_id = $1 OR a.user_id = $1
                ORDER BY a.start_date DESC
                "#,
            )
            .bind(actor.user_id)
            .fetch_all(&state.db)
            .await?
        }
        Role::Employee => {
            sqlx::query_as::<_, AllocationRow>(
                "SELECT * FROM allocations WHERE user_id = $1 ORDER BY start_date DESC",
            )
            .bind(actor.user_id)
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(success(allocations))
}

/// DELETE /allocations/:id
pub async fn handle_delete_allocation(
    State(state): State<AppState>,
    actor: Actor,
    Path(allocation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::DeleteAllocation)?;

    let deleted = sqlx::query("DELETE FROM allocations WHERE id = $1")
        .bind(allocation_id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound(format!(
            "Allocation {allocation_id} not found"
        )));
    }

    Ok(success(serde_json::json!({ "deleted": true })))
}

// ────────────────────────────────────────────────────────────────────────────
// Validation helpers
// ────────────────────────────────────────────────────────────────────────────

/// Creation requires a working percentage (1–100); updates may zero an
/// allocation out (0–100). Observed contract asymmetry, kept as-is.
fn validate_create_percentage(percentage: i16) -> Result<(), AppError> {
    if (1..=100).contains(&percentage) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Percentage must be between 1 and 100, got {percentage}"
        )))
    }
}

fn validate_update_percentage(percentage: i16) -> Result<(), AppError> {
    if (0..=100).contains(&percentage) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Percentage must be between 0 and 100, got {percentage}"
        )))
    }
}

fn validate_date_order(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    if let Some(end) = end {
        if end < start {
            return Err(AppError::Validation(format!(
                "End date {end} is before start date {start}"
            )));
        }
    }
    Ok(())
}

fn validate_allocation_role(role: &str) -> Result<(), AppError> {
    if ALLOCATION_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Unknown allocation role '{role}' (expected one of: {})",
            ALLOCATION_ROLES.join(", ")
        )))
    }
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

async fn ensure_project_exists(state: &AppState, project_id: Uuid) -> Result<(), AppError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&state.db)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_nonzero_percentage() {
        assert!(validate_create_percentage(0).is_err());
        assert!(validate_create_percentage(1).is_ok());
        assert!(validate_create_percentage(100).is_ok());
        assert!(validate_create_percentage(101).is_err());
    }

    #[test]
    fn test_update_allows_zero_percentage() {
        assert!(validate_update_percentage(0).is_ok());
        assert!(validate_update_percentage(100).is_ok());
        assert!(validate_update_percentage(-1).is_err());
        assert!(validate_update_percentage(101).is_err());
    }

    #[test]
    fn test_date_order() {
        let start: NaiveDate = "2024-03-01".parse().unwrap();
        assert!(validate_date_order(start, None).is_ok());
        assert!(validate_date_order(start, Some("2024-03-01".parse().unwrap())).is_ok());
        assert!(validate_date_order(start, Some("2024-02-28".parse().unwrap())).is_err());
    }

    #[test]
    fn test_update_role_must_be_canonical() {
        assert!(validate_allocation_role("developer").is_ok());
        assert!(validate_allocation_role("qa").is_ok());
        assert!(validate_allocation_role("wizard").is_err());
        assert!(validate_allocation_role("Developer").is_err());
    }
}
