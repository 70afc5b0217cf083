//! Axum route handlers for the project directory.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{require, Action, Actor, Role};
use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::response::success;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    /// Admin/HR may name a manager; a PM always becomes the manager.
    pub manager_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, deserialize_with = "crate::patch::double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    /// `Some(None)` clears the end date (back to open-ended).
    #[serde(default, deserialize_with = "crate::patch::double_option")]
    pub end_date: Option<Option<NaiveDate>>,
}

/// POST /projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::CreateProject)?;

    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Project name cannot be empty".into()));
    }
    if let Some(end) = req.end_date {
        if end < req.start_date {
            return Err(AppError::Validation(format!(
                "End date {end} is before start date {}",
                req.start_date
            )));
        }
    }

    let manager_id = match actor.role {
        Role::Pm => actor.user_id,
        _ => req.manager_id.unwrap_or(actor.user_id),
    };

    let manager: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(manager_id)
        .fetch_optional(&state.db)
        .await?;
    if manager.is_none() {
        return Err(AppError::NotFound(format!("User {manager_id} not found")));
    }

    let project = sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects (name, description, manager_id, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(manager_id)
    .bind(req.start_date)
    .bind(req.end_date)
    .fetch_one(&state.db)
    .await?;

    Ok(success(project))
}

/// GET /projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadProjects)?;

    let projects =
        sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects ORDER BY start_date DESC")
            .fetch_all(&state.db)
            .await?;

    Ok(success(projects))
}

/// GET /projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadProjects)?;

    let project = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;

    Ok(success(project))
}

/// PUT /projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::UpdateProject)?;

    let existing = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;

    // A PM may only edit projects they manage.
    if actor.role == Role::Pm && existing.manager_id != actor.user_id {
        return Err(AppError::Forbidden);
    }

    let name = req.name.unwrap_or(existing.name);
    if name.trim().is_empty() {
        return Err(AppError::Validation("Project name cannot be empty".into()));
    }
    let description = req.description.unwrap_or(existing.description);
    let status = req.status.unwrap_or(existing.status);
    let end_date = req.end_date.unwrap_or(existing.end_date);
    if let Some(end) = end_date {
        if end < existing.start_date {
            return Err(AppError::Validation(format!(
                "End date {end} is before start date {}",
                existing.start_date
            )));
        }
    }

    let project = sqlx::query_as::<_, ProjectRow>(
        r#"
        UPDATE projects
        SET name = $2, description = $3, status = $4, end_date = $5, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(name.trim())
    .bind(&description)
    .bind(&status)
    .bind(end_date)
    .fetch_one(&state.db)
    .await?;

    Ok(success(project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_body_distinguishes_absent_keys_from_explicit_null() {
        let body: UpdateProjectRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.description, None);
        assert_eq!(body.end_date, None);

        let body: UpdateProjectRequest =
            serde_json::from_str(r#"{"description": null, "endDate": null}"#).unwrap();
        assert_eq!(body.description, Some(None));
        assert_eq!(body.end_date, Some(None));

        let body: UpdateProjectRequest =
            serde_json::from_str(r#"{"description": "revamp", "endDate": "2025-06-30"}"#).unwrap();
        assert_eq!(body.description, Some(Some("revamp".to_string())));
        assert_eq!(body.end_date, Some(Some("2025-06-30".parse().unwrap())));
    }
}
