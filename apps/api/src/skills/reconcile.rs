//! Skill reconciliation engine.
//!
//! The caller submits a complete desired end-state for one or both facets of
//! a user's skill associations: "current skills" (with proficiency 1–5) and
//! "desired skills". `plan` diffs that end-state against the stored rows and
//! produces the minimal set of insert/update/delete operations; `apply`
//! executes the whole plan inside one transaction so no partial state is
//! ever visible.
//!
//! Contract quirk, preserved on purpose: an omitted OR EMPTY facet means
//! "no change requested for that facet" — an empty array does not clear it.

use std::collections::BTreeMap;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::skill::UserSkillView;

/// One entry of the submitted current-skills facet.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSkill {
    pub skill_id: Uuid,
    pub proficiency: i16,
}

/// A stored association, reduced to the fields the planner cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub skill_id: Uuid,
    pub is_current: bool,
    pub is_desired: bool,
    pub proficiency: Option<i16>,
}

/// A single write the planner decided on. `Update` and `Insert` carry the
/// full target row; ordering within the plan is deterministic (by skill id
/// within each kind) so repeated runs produce identical plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillOp {
    Insert {
        skill_id: Uuid,
        is_current: bool,
        is_desired: bool,
        proficiency: Option<i16>,
    },
    Update {
        skill_id: Uuid,
        is_current: bool,
        is_desired: bool,
        proficiency: Option<i16>,
    },
    Delete {
        skill_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    is_current: bool,
    is_desired: bool,
    proficiency: Option<i16>,
}

/// Computes the write plan for one user.
///
/// Both facets are applied to an in-memory target state, current facet
/// first, and the result is diffed against the stored rows. Applying to a
/// shared target (rather than running each facet against the original rows)
/// is what upholds the invariant that a row with neither flag set is
/// deleted, never persisted, when a single call touches both facets.
pub fn plan(
    existing: &[Association],
    current: &[CurrentSkill],
    desired: &[Uuid],
) -> Vec<SkillOp> {
    let stored: BTreeMap<Uuid, Target> = existing
        .iter()
        .map(|a| {
            (
                a.skill_id,
                Target {
                    is_current: a.is_current,
                    is_desired: a.is_desired,
                    proficiency: a.proficiency,
                },
            )
        })
        .collect();

    let mut target = stored.clone();

    // Current facet. Empty submission = no change.
    if !current.is_empty() {
        for c in current {
            let entry = target.entry(c.skill_id).or_insert(Target {
                is_current: false,
                is_desired: false,
                proficiency: None,
            });
            entry.is_current = true;
            entry.proficiency = Some(c.proficiency);
        }
        let submitted: Vec<Uuid> = current.iter().map(|c| c.skill_id).collect();
        for (skill_id, t) in target.iter_mut() {
            if t.is_current && !submitted.contains(skill_id) {
                // Demote to desired-only, or drop via the flagless sweep below.
                t.is_current = false;
                t.proficiency = None;
            }
        }
    }

    // Desired facet, same pattern without proficiency.
    if !desired.is_empty() {
        for skill_id in desired {
            let entry = target.entry(*skill_id).or_insert(Target {
                is_current: false,
                is_desired: false,
                proficiency: None,
            });
            entry.is_desired = true;
        }
        for (skill_id, t) in target.iter_mut() {
            if t.is_desired && !desired.contains(skill_id) {
                t.is_desired = false;
            }
        }
    }

    // A row with neither flag set is never persisted.
    target.retain(|_, t| t.is_current || t.is_desired);

    let mut ops = Vec::new();
    for (skill_id, t) in &target {
        match stored.get(skill_id) {
            None => ops.push(SkillOp::Insert {
                skill_id: *skill_id,
                is_current: t.is_current,
                is_desired: t.is_desired,
                proficiency: t.proficiency,
            }),
            Some(prev) if prev != t => ops.push(SkillOp::Update {
                skill_id: *skill_id,
                is_current: t.is_current,
                is_desired: t.is_desired,
                proficiency: t.proficiency,
            }),
            Some(_) => {}
        }
    }
    for skill_id in stored.keys() {
        if !target.contains_key(skill_id) {
            ops.push(SkillOp::Delete {
                skill_id: *skill_id,
            });
        }
    }

    ops
}

/// Executes a plan inside the caller's transaction. Either every operation
/// applies or, when the transaction is rolled back, none do.
pub async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    ops: &[SkillOp],
) -> Result<(), sqlx::Error> {
    for op in ops {
        match op {
            SkillOp::Insert {
                skill_id,
                is_current,
                is_desired,
                proficiency,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_skills
                        (user_id, skill_id, is_current, is_desired, proficiency)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(user_id)
                .bind(skill_id)
                .bind(is_current)
                .bind(is_desired)
                .bind(proficiency)
                .execute(&mut **tx)
                .await?;
            }
            SkillOp::Update {
                skill_id,
                is_current,
                is_desired,
                proficiency,
            } => {
                sqlx::query(
                    r#"
                    UPDATE user_skills
                    SET is_current = $3, is_desired = $4, proficiency = $5, updated_at = now()
                    WHERE user_id = $1 AND skill_id = $2
                    "#,
                )
                .bind(user_id)
                .bind(skill_id)
                .bind(is_current)
                .bind(is_desired)
                .bind(proficiency)
                .execute(&mut **tx)
                .await?;
            }
            SkillOp::Delete { skill_id } => {
                sqlx::query("DELETE FROM user_skills WHERE user_id = $1 AND skill_id = $2")
                    .bind(user_id)
                    .bind(skill_id)
                    .execute(&mut **tx)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Re-reads the user's full association set with skill name/category joined
/// in — the canonical truth returned after every reconciliation.
pub async fn read_associations(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<UserSkillView>, sqlx::Error> {
    sqlx::query_as::<_, UserSkillView>(
        r#"
        SELECT us.skill_id, s.name, s.category, us.is_current, us.is_desired, us.proficiency
        FROM user_skills us
        JOIN skills s ON s.id = us.skill_id
        WHERE us.user_id = $1
        ORDER BY s.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn current(skill_id: Uuid, proficiency: i16) -> CurrentSkill {
        CurrentSkill {
            skill_id,
            proficiency,
        }
    }

    /// Replays a plan against the starting state, for end-state assertions.
    fn replay(existing: &[Association], ops: &[SkillOp]) -> Vec<Association> {
        let mut state: BTreeMap<Uuid, Association> =
            existing.iter().map(|a| (a.skill_id, *a)).collect();
        for op in ops {
            match *op {
                SkillOp::Insert {
                    skill_id,
                    is_current,
                    is_desired,
                    proficiency,
                } => {
                    assert!(
                        state.insert(
                            skill_id,
                            Association {
                                skill_id,
                                is_current,
                                is_desired,
                                proficiency,
                            },
                        )
                        .is_none(),
                        "insert over existing row"
                    );
                }
                SkillOp::Update {
                    skill_id,
                    is_current,
                    is_desired,
                    proficiency,
                } => {
                    let row = state.get_mut(&skill_id).expect("update of missing row");
                    row.is_current = is_current;
                    row.is_desired = is_desired;
                    row.proficiency = proficiency;
                }
                SkillOp::Delete { skill_id } => {
                    assert!(state.remove(&skill_id).is_some(), "delete of missing row");
                }
            }
        }
        state.into_values().collect()
    }

    #[test]
    fn test_submitted_current_skills_end_up_current_with_proficiency() {
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: true,
            is_desired: false,
            proficiency: Some(2),
        }];
        let ops = plan(&existing, &[current(sid(1), 4), current(sid(2), 3)], &[]);
        let state = replay(&existing, &ops);

        assert_eq!(state.len(), 2);
        for a in &state {
            assert!(a.is_current);
        }
        assert_eq!(state[0].proficiency, Some(4));
        assert_eq!(state[1].proficiency, Some(3));
    }

    #[test]
    fn test_omitted_current_skill_demotes_to_desired_only() {
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: true,
            is_desired: true,
            proficiency: Some(5),
        }];
        let ops = plan(&existing, &[current(sid(2), 3)], &[]);
        let state = replay(&existing, &ops);

        let survivor = state.iter().find(|a| a.skill_id == sid(1)).unwrap();
        assert!(!survivor.is_current);
        assert!(survivor.is_desired);
        assert_eq!(survivor.proficiency, None);
    }

    #[test]
    fn test_omitted_current_not_desired_skill_is_deleted() {
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: true,
            is_desired: false,
            proficiency: Some(3),
        }];
        let ops = plan(&existing, &[current(sid(2), 3)], &[]);
        let state = replay(&existing, &ops);

        assert!(state.iter().all(|a| a.skill_id != sid(1)));
    }

    #[test]
    fn test_empty_facets_mean_no_change_not_clear_all() {
        let existing = vec![
            Association {
                skill_id: sid(1),
                is_current: true,
                is_desired: false,
                proficiency: Some(3),
            },
            Association {
                skill_id: sid(2),
                is_current: false,
                is_desired: true,
                proficiency: None,
            },
        ];
        assert!(plan(&existing, &[], &[]).is_empty());
    }

    #[test]
    fn test_desired_facet_inserts_and_prunes_independently() {
        let existing = vec![
            Association {
                skill_id: sid(1),
                is_current: false,
                is_desired: true,
                proficiency: None,
            },
            Association {
                skill_id: sid(2),
                is_current: true,
                is_desired: true,
                proficiency: Some(4),
            },
        ];
        // Keep nothing desired except a brand-new skill 3.
        let ops = plan(&existing, &[], &[sid(3)]);
        let state = replay(&existing, &ops);

        // 1 was desired-only: deleted. 2 stays current, loses desired.
        assert!(state.iter().all(|a| a.skill_id != sid(1)));
        let two = state.iter().find(|a| a.skill_id == sid(2)).unwrap();
        assert!(two.is_current && !two.is_desired);
        assert_eq!(two.proficiency, Some(4));
        let three = state.iter().find(|a| a.skill_id == sid(3)).unwrap();
        assert!(!three.is_current && three.is_desired);
        assert_eq!(three.proficiency, None);
    }

    #[test]
    fn test_both_facets_demotion_plus_desired_removal_leaves_no_flagless_row() {
        // Skill 1 is current+desired; this call drops it from the current set
        // AND from the desired set. A flagless row must never survive.
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: true,
            is_desired: true,
            proficiency: Some(2),
        }];
        let ops = plan(&existing, &[current(sid(2), 3)], &[sid(3)]);
        let state = replay(&existing, &ops);

        assert!(state.iter().all(|a| a.skill_id != sid(1)));
        assert!(state.iter().all(|a| a.is_current || a.is_desired));
    }

    #[test]
    fn test_idempotent_second_plan_is_empty() {
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: true,
            is_desired: true,
            proficiency: Some(2),
        }];
        let submitted_current = [current(sid(1), 4), current(sid(2), 3)];
        let submitted_desired = [sid(1), sid(4)];

        let ops = plan(&existing, &submitted_current, &submitted_desired);
        let after_first = replay(&existing, &ops);

        let second = plan(&after_first, &submitted_current, &submitted_desired);
        assert!(second.is_empty(), "second plan was {second:?}");
    }

    #[test]
    fn test_unchanged_rows_produce_no_ops() {
        let existing = vec![
            Association {
                skill_id: sid(1),
                is_current: true,
                is_desired: false,
                proficiency: Some(3),
            },
            Association {
                skill_id: sid(2),
                is_current: false,
                is_desired: true,
                proficiency: None,
            },
        ];
        let ops = plan(&existing, &[current(sid(1), 3)], &[sid(2)]);
        assert!(ops.is_empty(), "plan was {ops:?}");
    }

    #[test]
    fn test_promoting_a_desired_skill_keeps_its_desired_flag() {
        let existing = vec![Association {
            skill_id: sid(1),
            is_current: false,
            is_desired: true,
            proficiency: None,
        }];
        let ops = plan(&existing, &[current(sid(1), 5)], &[]);
        let state = replay(&existing, &ops);

        let a = &state[0];
        assert!(a.is_current && a.is_desired);
        assert_eq!(a.proficiency, Some(5));
    }
}
