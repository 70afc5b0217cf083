pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::allocations::handlers as allocations;
use crate::nlp_client::handlers as nlp;
use crate::notifications::handlers as notifications;
use crate::projects::handlers as projects;
use crate::requests::handlers as requests;
use crate::skills::handlers as skills;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Allocations
        .route(
            "/allocations",
            post(allocations::handle_create_allocation)
                .get(allocations::handle_list_allocations),
        )
        .route(
            "/allocations/:id",
            put(allocations::handle_update_allocation)
                .delete(allocations::handle_delete_allocation),
        )
        // User skill associations
        .route(
            "/userskills",
            put(skills::handle_reconcile_user_skills).get(skills::handle_get_user_skills),
        )
        // Resource requests
        .route(
            "/resourcerequests",
            post(requests::handle_create_request).get(requests::handle_list_requests),
        )
        .route("/resourcerequests/:id", put(requests::handle_transition_request))
        // Skills
        .route(
            "/skills",
            post(skills::handle_create_skill).get(skills::handle_list_skills),
        )
        .route("/skills/distribution", get(skills::handle_skill_distribution))
        .route("/skills/:id", delete(skills::handle_delete_skill))
        // Projects
        .route(
            "/projects",
            post(projects::handle_create_project).get(projects::handle_list_projects),
        )
        .route(
            "/projects/:id",
            get(projects::handle_get_project).put(projects::handle_update_project),
        )
        // Users
        .route(
            "/users",
            post(users::handle_create_user).get(users::handle_list_users),
        )
        .route(
            "/users/:id",
            get(users::handle_get_user).put(users::handle_update_user),
        )
        // Notifications
        .route("/notifications", get(notifications::handle_list_notifications))
        .route("/notifications/read-all", put(notifications::handle_mark_all_read))
        .route("/notifications/:id/read", put(notifications::handle_mark_read))
        // NLP proxy
        .route("/nlp/extract-skills", post(nlp::handle_extract_skills))
        .route("/nlp/recommend-users", post(nlp::handle_recommend_users))
        .with_state(state)
}
