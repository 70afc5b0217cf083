//! Axum route handlers for the user directory.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{require, Action, Actor, Role};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::response::success;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// POST /users
pub async fn handle_create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::CreateUser)?;
    validate_name_email(&req.name, &req.email)?;

    let duplicate: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE lower(email) = lower($1)")
            .bind(req.email.trim())
            .fetch_optional(&state.db)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(format!(
            "A user with email '{}' already exists",
            req.email.trim()
        )));
    }

    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(req.name.trim())
    .bind(req.email.trim())
    .bind(req.role)
    .fetch_one(&state.db)
    .await?;

    Ok(success(user))
}

/// GET /users
pub async fn handle_list_users(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadUsers)?;

    let users = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(success(users))
}

/// GET /users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ReadUsers)?;

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    Ok(success(user))
}

/// PUT /users/:id
pub async fn handle_update_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::UpdateUser)?;

    let existing = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    let name = req.name.unwrap_or(existing.name);
    let email = req.email.unwrap_or(existing.email);
    let role = req.role.unwrap_or(existing.role);
    validate_name_email(&name, &email)?;

    let user = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET name = $2, email = $3, role = $4 WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(name.trim())
    .bind(email.trim())
    .bind(role)
    .fetch_one(&state.db)
    .await?;

    Ok(success(user))
}

fn validate_name_email(name: &str, email: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name cannot be empty".into()));
    }
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation(format!("Invalid email: '{email}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_email_validation() {
        assert!(validate_name_email("Dana", "dana@example.com").is_ok());
        assert!(validate_name_email("", "dana@example.com").is_err());
        assert!(validate_name_email("Dana", "not-an-email").is_err());
        assert!(validate_name_email("Dana", "  ").is_err());
    }
}
