//! Allocation overlap validation.
//!
//! For a given (user, project) pair no two allocations may have overlapping
//! active date ranges. The check runs at write time; it is a read-then-write
//! guard with no locking, so concurrent writers can race past it (documented
//! weakness, not a guarantee).

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::allocation::AllocationRow;

/// True when the two date ranges intersect. A missing end date means the
/// allocation is ongoing forever.
pub fn ranges_conflict(
    start_a: NaiveDate,
    end_a: Option<NaiveDate>,
    start_b: NaiveDate,
    end_b: Option<NaiveDate>,
) -> bool {
    let a_starts_in_b = match end_b {
        Some(end) => start_a <= end,
        None => true,
    };
    let b_starts_in_a = match end_a {
        Some(end) => start_b <= end,
        None => true,
    };
    a_starts_in_b && b_starts_in_a
}

/// Returns the first stored allocation for (user, project) whose range
/// conflicts with the candidate, skipping `exclude` for edit-in-place.
pub async fn find_conflict(
    pool: &PgPool,
    user_id: Uuid,
    project_id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    exclude: Option<Uuid>,
) -> Result<Option<AllocationRow>, sqlx::Error> {
    let others = sqlx::query_as::<_, AllocationRow>(
        r#"
        SELECT * FROM allocations
        WHERE user_id = $1 AND project_id = $2 AND ($3::uuid IS NULL OR id <> $3)
        ORDER BY start_date
        "#,
    )
    .bind(user_id)
    .bind(project_id)
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    Ok(others
        .into_iter()
        .find(|a| ranges_conflict(start_date, end_date, a.start_date, a.end_date)))
}

/// Human-readable description of a range, for conflict messages.
pub fn describe_range(start: NaiveDate, end: Option<NaiveDate>) -> String {
    match end {
        Some(end) => format!("{start} to {end}"),
        None => format!("{start} onward"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_partial_overlap_conflicts() {
        // Jan 1–Mar 31 vs Mar 1–Jun 30
        assert!(ranges_conflict(
            d("2024-01-01"),
            Some(d("2024-03-31")),
            d("2024-03-01"),
            Some(d("2024-06-30"))
        ));
    }

    #[test]
    fn test_sequential_ranges_do_not_conflict() {
        // Jan 1–Feb 28 vs Mar 1–Jun 30
        assert!(!ranges_conflict(
            d("2024-01-01"),
            Some(d("2024-02-28")),
            d("2024-03-01"),
            Some(d("2024-06-30"))
        ));
    }

    #[test]
    fn test_open_ended_conflicts_with_any_later_start() {
        // Existing allocation is ongoing; any later-starting candidate clashes.
        assert!(ranges_conflict(
            d("2025-01-01"),
            Some(d("2025-06-30")),
            d("2024-01-01"),
            None
        ));
        assert!(ranges_conflict(d("2025-01-01"), None, d("2024-01-01"), None));
    }

    #[test]
    fn test_open_ended_candidate_before_closed_range() {
        // Ongoing candidate starting before a closed range still intersects it.
        assert!(ranges_conflict(
            d("2023-01-01"),
            None,
            d("2024-01-01"),
            Some(d("2024-06-30"))
        ));
    }

    #[test]
    fn test_touching_boundary_conflicts() {
        // Shared single day counts as overlap (inclusive comparison).
        assert!(ranges_conflict(
            d("2024-01-01"),
            Some(d("2024-03-01")),
            d("2024-03-01"),
            Some(d("2024-06-30"))
        ));
    }

    #[test]
    fn test_describe_range() {
        assert_eq!(
            describe_range(d("2024-01-01"), Some(d("2024-03-31"))),
            "2024-01-01 to 2024-03-31"
        );
        assert_eq!(describe_range(d("2024-01-01"), None), "2024-01-01 onward");
    }
}
