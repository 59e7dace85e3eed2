//! Merge specialist-reported updates and commit them onto a goal.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::error::DialogueError;
use crate::core::types::{GoalStatus, SessionState, StateUpdates};

/// Merge the updates of two dispatch passes; `later` is the second pass.
///
/// Slot patches overlay with `later` winning per key. Scalar fields keep the
/// non-empty value, `later` winning when both are set. `mark_done` is OR-ed.
pub fn merge_state_updates(earlier: &StateUpdates, later: &StateUpdates) -> StateUpdates {
    let mut slots_patch = earlier.slots_patch.clone();
    slots_patch.extend(
        later
            .slots_patch
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    let missing = if !later.missing.is_empty() {
        later.missing.clone()
    } else {
        earlier.missing.clone()
    };

    StateUpdates {
        slots_patch,
        set_status: non_empty_later(&earlier.set_status, &later.set_status),
        missing,
        next_question: non_empty_later(&earlier.next_question, &later.next_question),
        memory_update: non_empty_later(&earlier.memory_update, &later.memory_update),
        mark_done: earlier.mark_done || later.mark_done,
    }
}

fn non_empty_later(earlier: &str, later: &str) -> String {
    let later = later.trim();
    if !later.is_empty() {
        return later.to_string();
    }
    earlier.trim().to_string()
}

/// Commit `updates` onto goal `goal_id`.
///
/// `set_status = done` is treated as `mark_done`. Completing the focused goal
/// resumes the previous goal on the stack.
pub fn apply_state_updates(
    session: &mut SessionState,
    goal_id: &str,
    updates: &StateUpdates,
    now: DateTime<Utc>,
) -> Result<(), DialogueError> {
    if goal_id.trim().is_empty() {
        return Err(DialogueError::validation("goal id is empty"));
    }
    let goal = session
        .goal_mut(goal_id)
        .ok_or_else(|| DialogueError::not_found(format!("goal id={goal_id}")))?;

    for (key, value) in &updates.slots_patch {
        goal.set_slot(key.clone(), value.clone());
    }

    let next_question = updates.next_question.trim();
    if !updates.missing.is_empty() || !next_question.is_empty() {
        goal.set_missing(updates.missing.clone(), next_question);
    }

    let mut mark_done = updates.mark_done;
    let set_status = updates.set_status.trim();
    if !set_status.is_empty() {
        let status = GoalStatus::parse(set_status).ok_or_else(|| {
            DialogueError::validation(format!("invalid set_status={set_status:?}"))
        })?;
        match status {
            GoalStatus::Active | GoalStatus::Suspended => goal.status = status,
            GoalStatus::Blocked => {
                if !goal.satisfies_blocked_invariant() {
                    return Err(DialogueError::state(
                        "blocked status requires missing+next_question",
                    ));
                }
                goal.status = GoalStatus::Blocked;
            }
            GoalStatus::Done => mark_done = true,
        }
    }

    if mark_done {
        debug!(goal_id, "marking goal done");
        return session.mark_goal_done(goal_id, now);
    }

    goal.updated_at = now;
    session.touch(now);
    Ok(())
}
