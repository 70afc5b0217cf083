//! Axum route handlers for the NLP proxy endpoints.

use axum::{extract::State, Json};
use serde_json::Value;

use crate::auth::{require, Action, Actor};
use crate::errors::AppError;
use crate::nlp_client::{EXTRACT_SKILLS_PATH, RECOMMEND_USERS_PATH};
use crate::response::success;
use crate::state::AppState;

/// POST /nlp/extract-skills
pub async fn handle_extract_skills(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::ExtractSkills)?;

    let data = state.nlp.forward(EXTRACT_SKILLS_PATH, &body).await?;
    Ok(success(data))
}

/// POST /nlp/recommend-users
pub async fn handle_recommend_users(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Action::RecommendUsers)?;

    let data = state.nlp.forward(RECOMMEND_USERS_PATH, &body).await?;
    Ok(success(data))
}
