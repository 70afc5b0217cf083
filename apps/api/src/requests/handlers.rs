//! Axum route handlers for resource requests.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{require, Action, Actor, Role};
use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::models::resource_request::ResourceRequestRow;
use crate::requests::workflow::{process_transition, validate_transition};
use crate::response::success;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub percentage: i16,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub status: String,
    pub approver_notes: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /resourcerequests
pub async fn handle_create_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateRequestBody>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::CreateResourceRequest)?;

    if req.role.trim().is_empty() {
        return Err(AppError::Validation("Role cannot be empty".into()));
    }
    if !(1..=100).contains(&req.percentage) {
        return Err(AppError::Validation(format!(
            "Percentage must be between 1 and 100, got {}",
            req.percentage
        )));
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err(AppError::Validation(format!(
                "End date {end} is before start date {start}"
            )));
        }
    }

    let project = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
        .bind(req.project_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", req.project_id)))?;

    let target: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(req.user_id)
        .fetch_optional(&state.db)
        .await?;
    if target.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", req.user_id)));
    }

    // PMs may only request resources for projects they manage.
    if actor.role == Role::Pm && project.manager_id != actor.user_id {
        return Err(AppError::Forbidden);
    }

    let duplicate: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM resource_requests
        WHERE project_id = $1 AND requested_user_id = $2
          AND status IN ('pending', 'approved')
        LIMIT 1
        "#,
    )
    .bind(req.project_id)
    .bind(req.user_id)
    .fetch_optional(&state.db)
    .await?;
    ensure_no_open_request(duplicate.map(|(id,)| id))?;

    let request = sqlx::query_as::<_, ResourceRequestRow>(
        r#"
        INSERT INTO resource_requests
            (project_id, requested_user_id, requested_by, role, percentage,
             start_date, end_date, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(req.project_id)
    .bind(req.user_id)
    .bind(actor.user_id)
    .bind(req.role.trim())
    .bind(req.percentage)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(&req.notes)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        "Created resource request {} (user {} on project {}) by {}",
        request.id,
        request.requested_user_id,
        request.project_id,
        actor.user_id
    );
    Ok(success(request))
}

/// PUT /resourcerequests/:id
///
/// Approve or reject a pending request. The status transition commits
/// first; allocation materialization and notifications follow best-effort.
pub async fn handle_transition_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ProcessResourceRequest)?;

    let decision = validate_transition(&body.status)?;
    let outcome = process_transition(
        &state.db,
        request_id,
        decision,
        actor.user_id,
        body.approver_notes,
    )
    .await?;

    Ok(success(json!({
        "request": outcome.request,
        "allocation": outcome.allocation
    })))
}

/// A (project, user) pair carries at most one open (pending or approved)
/// request; a second one is a conflict.
fn ensure_no_open_request(existing: Option<Uuid>) -> Result<(), AppError> {
    match existing {
        Some(_) => Err(AppError::Conflict(
            "A pending or approved request for this user and project already exists".into(),
        )),
        None => Ok(()),
    }
}

/// GET /resourcerequests
///
/// Admin/HR see every request; PMs only the ones they created.
pub async fn handle_list_requests(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ListResourceRequests)?;

    let requests = match actor.role {
        Role::Admin | Role::Hr => {
            sqlx::query_as::<_, ResourceRequestRow>(
                "SELECT * FROM resource_requests ORDER BY created_at DESC",
            )
            .fetch_all(&state.db)
            .await?
        }
        _ => {
            sqlx::query_as::<_, ResourceRequestRow>(
                "SELECT * FROM resource_requests WHERE requested_by = $1 ORDER BY created_at DESC",
            )
            .bind(actor.user_id)
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(success(requests))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_request_for_the_pair_is_a_conflict() {
        assert!(ensure_no_open_request(None).is_ok());
        assert!(matches!(
            ensure_no_open_request(Some(Uuid::new_v4())),
            Err(AppError::Conflict(_))
        ));
    }
}
