//! Gateway identity and the central authorization policy.
//!
//! Authentication is terminated upstream: the gateway verifies the caller's
//! token and injects `x-user-id` and `x-user-role` headers on every request.
//! This module only reads those headers and answers "may this role perform
//! this action" in one place, instead of scattering role-array checks across
//! handlers. Ownership checks (a PM managing a specific project) stay in the
//! handlers, layered on top of the role gate.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
    Pm,
    Employee,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "pm" => Ok(Role::Pm),
            "employee" => Ok(Role::Employee),
            _ => Err(()),
        }
    }
}

/// The authenticated caller, extracted from the gateway identity headers.
/// Missing or malformed headers reject with 401 before the handler runs.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(AppError::Unauthorized)?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Role>().ok())
            .ok_or(AppError::Unauthorized)?;

        Ok(Actor { user_id, role })
    }
}

/// Every role-gated operation the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateAllocation,
    UpdateAllocation,
    DeleteAllocation,
    ListAllocations,
    ReconcileSkills,
    ReadUserSkills,
    CreateResourceRequest,
    ProcessResourceRequest,
    ListResourceRequests,
    CreateSkill,
    ListSkills,
    DeleteSkill,
    ViewSkillDistribution,
    CreateProject,
    ReadProjects,
    UpdateProject,
    CreateUser,
    ReadUsers,
    UpdateUser,
    ReadNotifications,
    MarkNotificationRead,
    ExtractSkills,
    RecommendUsers,
}

/// The single policy table. Handlers never hand-roll role checks.
pub fn is_allowed(role: Role, action: Action) -> bool {
    use Action::*;
    use Role::*;

    match action {
        CreateAllocation | UpdateAllocation | DeleteAllocation => matches!(role, Admin | Hr),
        ListAllocations => true,
        ReconcileSkills | ReadUserSkills => true,
        CreateResourceRequest => matches!(role, Admin | Hr | Pm),
        ProcessResourceRequest => matches!(role, Admin | Hr),
        ListResourceRequests => matches!(role, Admin | Hr | Pm),
        CreateSkill => matches!(role, Admin | Hr),
        ListSkills => true,
        DeleteSkill => matches!(role, Admin),
        ViewSkillDistribution => matches!(role, Admin | Hr),
        CreateProject => matches!(role, Admin | Hr | Pm),
        ReadProjects => true,
        UpdateProject => matches!(role, Admin | Hr | Pm),
        CreateUser | UpdateUser => matches!(role, Admin),
        ReadUsers => matches!(role, Admin | Hr | Pm),
        ReadNotifications | MarkNotificationRead => true,
        ExtractSkills => true,
        RecommendUsers => matches!(role, Admin | Hr | Pm),
    }
}

/// Role gate used at the top of every handler.
pub fn require(actor: &Actor, action: Action) -> Result<(), AppError> {
    if is_allowed(actor.role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_deletes_skills() {
        assert!(is_allowed(Role::Admin, Action::DeleteSkill));
        assert!(!is_allowed(Role::Hr, Action::DeleteSkill));
        assert!(!is_allowed(Role::Pm, Action::DeleteSkill));
        assert!(!is_allowed(Role::Employee, Action::DeleteSkill));
    }

    #[test]
    fn test_employee_cannot_touch_allocations_or_requests() {
        assert!(!is_allowed(Role::Employee, Action::CreateAllocation));
        assert!(!is_allowed(Role::Employee, Action::UpdateAllocation));
        assert!(!is_allowed(Role::Employee, Action::CreateResourceRequest));
        assert!(!is_allowed(Role::Employee, Action::ProcessResourceRequest));
    }

    #[test]
    fn test_pm_creates_but_never_processes_requests() {
        assert!(is_allowed(Role::Pm, Action::CreateResourceRequest));
        assert!(!is_allowed(Role::Pm, Action::ProcessResourceRequest));
        assert!(is_allowed(Role::Hr, Action::ProcessResourceRequest));
        assert!(is_allowed(Role::Admin, Action::ProcessResourceRequest));
    }

    #[test]
    fn test_distribution_is_admin_hr_only() {
        assert!(is_allowed(Role::Admin, Action::ViewSkillDistribution));
        assert!(is_allowed(Role::Hr, Action::ViewSkillDistribution));
        assert!(!is_allowed(Role::Pm, Action::ViewSkillDistribution));
        assert!(!is_allowed(Role::Employee, Action::ViewSkillDistribution));
    }

    #[test]
    fn test_everyone_reconciles_own_skills_and_reads_notifications() {
        for role in [Role::Admin, Role::Hr, Role::Pm, Role::Employee] {
            assert!(is_allowed(role, Action::ReconcileSkills));
            assert!(is_allowed(role, Action::ReadNotifications));
        }
    }

    #[test]
    fn test_role_parses_from_header_values() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("hr".parse::<Role>(), Ok(Role::Hr));
        assert_eq!("pm".parse::<Role>(), Ok(Role::Pm));
        assert_eq!("employee".parse::<Role>(), Ok(Role::Employee));
        assert!("manager".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }
}
