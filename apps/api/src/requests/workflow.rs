//! Resource-request approval workflow.
//!
//! A request leaves `pending` exactly once, to `approved` or `rejected`.
//! The transition is committed first via a conditional update keyed on the
//! prior status, then side effects run with log-and-continue semantics:
//! allocation materialization (skipped when one already exists for the
//! (user, project) pair) and notifications to the requesting manager and,
//! when an allocation was actually created, to the allocated user.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::allocation::AllocationRow;
use crate::models::notification::OriginKind;
use crate::models::resource_request::{RequestStatus, ResourceRequestRow};
use crate::notifications::emit::{emit_best_effort, NewNotification};

/// Outcome of processing a transition, returned to the handler.
pub struct TransitionOutcome {
    pub request: ResourceRequestRow,
    pub allocation: Option<AllocationRow>,
}

/// Parses and gates the requested transition. Only the two terminal
/// decision states are reachable from the API; `cancelled` is defined in
/// the lifecycle but nothing produces it here.
pub fn validate_transition(status: &str) -> Result<RequestStatus, AppError> {
    match status {
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(AppError::Validation(format!(
            "Status must be 'approved' or 'rejected', got '{other}'"
        ))),
    }
}

pub fn approval_message(project_name: &str, user_name: &str, allocated: bool) -> String {
    if allocated {
        format!("Your request to allocate {user_name} to '{project_name}' was approved")
    } else {
        format!(
            "Your request to allocate {user_name} to '{project_name}' was approved \
             (an allocation for this user and project already exists)"
        )
    }
}

pub fn rejection_message(project_name: &str, user_name: &str, notes: Option<&str>) -> String {
    match notes {
        Some(notes) if !notes.trim().is_empty() => format!(
            "Your request to allocate {user_name} to '{project_name}' was rejected: {}",
            notes.trim()
        ),
        _ => format!("Your request to allocate {user_name} to '{project_name}' was rejected"),
    }
}

pub fn allocated_message(project_name: &str, role: &str) -> String {
    format!("You have been allocated to '{project_name}' as {role}")
}

/// Applies a decision to a pending request.
///
/// The status change is a single conditional update (`WHERE status =
/// 'pending'`), so concurrent approvers cannot both win; the loser's
/// no-op re-reads the row to tell 404 from 409.
pub async fn process_transition(
    pool: &PgPool,
    request_id: Uuid,
    decision: RequestStatus,
    approver_id: Uuid,
    approver_notes: Option<String>,
) -> Result<TransitionOutcome, AppError> {
    let request = sqlx::query_as::<_, ResourceRequestRow>(
        r#"
        UPDATE resource_requests
        SET status = $2, approver_notes = $3, processed_by = $4, processed_at = now()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(decision)
    .bind(&approver_notes)
    .bind(approver_id)
    .fetch_optional(pool)
    .await?;

    let request = match request {
        Some(row) => row,
        None => {
            let existing: Option<(RequestStatus,)> =
                sqlx::query_as("SELECT status FROM resource_requests WHERE id = $1")
                    .bind(request_id)
                    .fetch_optional(pool)
                    .await?;
            return Err(classify_noop(request_id, existing.map(|(status,)| status)));
        }
    };

    info!(
        "Resource request {} transitioned to {:?} by {}",
        request.id, request.status, approver_id
    );

    // Status is committed. Everything below is best-effort.
    let allocation = match decision {
        RequestStatus::Approved => materialize_allocation(pool, &request).await,
        _ => None,
    };

    let (project_name, user_name) = lookup_names(pool, &request).await;
    for notification in
        notification_plan(&request, decision, allocation.as_ref(), &project_name, &user_name)
    {
        emit_best_effort(pool, notification).await;
    }

    Ok(TransitionOutcome {
        request,
        allocation,
    })
}

/// Classifies a no-op conditional update: either the request does not
/// exist, or it has already left `pending`.
pub fn classify_noop(request_id: Uuid, current: Option<RequestStatus>) -> AppError {
    match current {
        None => AppError::NotFound(format!("Resource request {request_id} not found")),
        Some(_) => AppError::Conflict(format!(
            "Resource request {request_id} has already been processed"
        )),
    }
}

/// Builds the notifications a committed decision implies. Rejection
/// notifies only the requesting manager; approval notifies the manager
/// and, when an allocation was actually created, the allocated user.
pub fn notification_plan(
    request: &ResourceRequestRow,
    decision: RequestStatus,
    allocation: Option<&AllocationRow>,
    project_name: &str,
    user_name: &str,
) -> Vec<NewNotification> {
    let mut plan = Vec::new();
    match decision {
        RequestStatus::Approved => {
            plan.push(NewNotification {
                user_id: request.requested_by,
                message: approval_message(project_name, user_name, allocation.is_some()),
                link: Some(format!("/resourcerequests/{}", request.id)),
                kind: "request_approved",
                origin_kind: OriginKind::ResourceRequest,
                origin_id: request.id,
            });
            if let Some(allocation) = allocation {
                plan.push(NewNotification {
                    user_id: request.requested_user_id,
                    message: allocated_message(project_name, &request.role),
                    link: Some(format!("/allocations/{}", allocation.id)),
                    kind: "allocated",
                    origin_kind: OriginKind::Allocation,
                    origin_id: allocation.id,
                });
            }
        }
        RequestStatus::Rejected => {
            plan.push(NewNotification {
                user_id: request.requested_by,
                message: rejection_message(project_name, user_name, request.approver_notes.as_deref()),
                link: Some(format!("/resourcerequests/{}", request.id)),
                kind: "request_rejected",
                origin_kind: OriginKind::ResourceRequest,
                origin_id: request.id,
            });
        }
        _ => {}
    }
    plan
}

/// Creates the allocation an approval implies, unless one already exists
/// for the (user, project) pair — no date filter — in which case creation
/// is skipped and only logged (the request still ends approved).
async fn materialize_allocation(
    pool: &PgPool,
    request: &ResourceRequestRow,
) -> Option<AllocationRow> {
    let existing: Result<Option<(Uuid,)>, sqlx::Error> = sqlx::query_as(
        "SELECT id FROM allocations WHERE user_id = $1 AND project_id = $2 LIMIT 1",
    )
    .bind(request.requested_user_id)
    .bind(request.project_id)
    .fetch_optional(pool)
    .await;

    match existing {
        Ok(Some((id,))) => {
            info!(
                "Request {} approved without allocation: allocation {id} already covers user {} on project {}",
                request.id, request.requested_user_id, request.project_id
            );
            return None;
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Allocation lookup failed for request {}: {e}", request.id);
            return None;
        }
    }

    let start_date = request
        .start_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let inserted = sqlx::query_as::<_, AllocationRow>(
        r#"
        INSERT INTO allocations (user_id, project_id, role, percentage, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.requested_user_id)
    .bind(request.project_id)
    .bind(&request.role)
    .bind(request.percentage)
    .bind(start_date)
    .bind(request.end_date)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(allocation) => {
            info!(
                "Materialized allocation {} from request {}",
                allocation.id, request.id
            );
            Some(allocation)
        }
        Err(e) => {
            warn!("Failed to materialize allocation for request {}: {e}", request.id);
            None
        }
    }
}

/// Names for notification text; falls back to ids if the lookups fail
/// (notifications are best-effort, so a degraded message beats none).
async fn lookup_names(pool: &PgPool, request: &ResourceRequestRow) -> (String, String) {
    let project_name: Option<(String,)> =
        sqlx::query_as("SELECT name FROM projects WHERE id = $1")
            .bind(request.project_id)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();
    let user_name: Option<(String,)> = sqlx::query_as("SELECT name FROM users WHERE id = $1")
        .bind(request.requested_user_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten();

    (
        project_name.map_or_else(|| request.project_id.to_string(), |(n,)| n),
        user_name.map_or_else(|| request.requested_user_id.to_string(), |(n,)| n),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_fixture() -> ResourceRequestRow {
        ResourceRequestRow {
            id: Uuid::from_u128(1),
            project_id: Uuid::from_u128(2),
            requested_user_id: Uuid::from_u128(3),
            requested_by: Uuid::from_u128(4),
            role: "developer".to_string(),
            percentage: 50,
            start_date: None,
            end_date: None,
            status: RequestStatus::Approved,
            notes: None,
            approver_notes: None,
            processed_by: Some(Uuid::from_u128(5)),
            processed_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn allocation_fixture(request: &ResourceRequestRow) -> AllocationRow {
        AllocationRow {
            id: Uuid::from_u128(9),
            user_id: request.requested_user_id,
            project_id: request.project_id,
            role: request.role.clone(),
            percentage: request.percentage,
            start_date: Utc::now().date_naive(),
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_noop_update_classifies_missing_vs_already_processed() {
        let id = Uuid::from_u128(7);
        assert!(matches!(classify_noop(id, None), AppError::NotFound(_)));
        for status in [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            assert!(matches!(
                classify_noop(id, Some(status)),
                AppError::Conflict(_)
            ));
        }
    }

    #[test]
    fn test_rejection_notifies_only_the_requesting_manager() {
        let mut request = request_fixture();
        request.status = RequestStatus::Rejected;
        request.approver_notes = Some("over budget".to_string());

        let plan = notification_plan(&request, RequestStatus::Rejected, None, "Apollo", "Dana");

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].user_id, request.requested_by);
        assert_eq!(plan[0].kind, "request_rejected");
        assert!(plan[0].message.contains("over budget"));
    }

    #[test]
    fn test_approval_with_new_allocation_notifies_both_parties() {
        let request = request_fixture();
        let allocation = allocation_fixture(&request);

        let plan = notification_plan(
            &request,
            RequestStatus::Approved,
            Some(&allocation),
            "Apollo",
            "Dana",
        );

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].user_id, request.requested_by);
        assert_eq!(plan[0].kind, "request_approved");
        assert_eq!(plan[1].user_id, request.requested_user_id);
        assert_eq!(plan[1].kind, "allocated");
        assert_eq!(plan[1].origin_id, allocation.id);
    }

    #[test]
    fn test_approval_with_existing_allocation_skips_the_user_notification() {
        let request = request_fixture();

        let plan = notification_plan(&request, RequestStatus::Approved, None, "Apollo", "Dana");

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].user_id, request.requested_by);
        assert!(plan[0].message.contains("already exists"));
    }

    #[test]
    fn test_only_decision_states_are_accepted() {
        assert_eq!(
            validate_transition("approved").unwrap(),
            RequestStatus::Approved
        );
        assert_eq!(
            validate_transition("rejected").unwrap(),
            RequestStatus::Rejected
        );
        for bad in ["pending", "cancelled", "Approved", ""] {
            assert!(matches!(
                validate_transition(bad),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_approval_message_mentions_existing_allocation_skip() {
        let fresh = approval_message("Apollo", "Dana", true);
        assert!(fresh.contains("approved"));
        assert!(!fresh.contains("already exists"));

        let skipped = approval_message("Apollo", "Dana", false);
        assert!(skipped.contains("already exists"));
    }

    #[test]
    fn test_rejection_message_includes_notes_when_present() {
        let with = rejection_message("Apollo", "Dana", Some("over budget"));
        assert!(with.ends_with("rejected: over budget"));

        let without = rejection_message("Apollo", "Dana", None);
        assert!(without.ends_with("rejected"));

        let blank = rejection_message("Apollo", "Dana", Some("   "));
        assert!(blank.ends_with("rejected"));
    }
}
