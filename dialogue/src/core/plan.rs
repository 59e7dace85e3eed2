//! Reconcile a planner [`GoalPatch`] against the session's goals.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::error::DialogueError;
use crate::core::policy::{default_priority, should_interleave};
use crate::core::types::{AgentKind, Goal, GoalPatch, SessionState};

/// Apply a planner patch and return the id of the goal now in focus.
///
/// The target goal is an existing goal named by the patch, else the focused
/// goal when it has the same type and is still open, else a new goal. Focus
/// moves to the target when it is new, when nothing is focused, or when the
/// interleave policy prefers it.
pub fn apply_plan(
    session: &mut SessionState,
    patch: &GoalPatch,
    now: DateTime<Utc>,
) -> Result<String, DialogueError> {
    let goal_type = patch.goal_type.trim();
    if AgentKind::from_goal_type(goal_type).is_none() {
        return Err(DialogueError::validation(format!(
            "unsupported goal type={goal_type:?}"
        )));
    }

    let (target_id, created) = find_or_create_goal(session, patch, goal_type, now)?;

    let target = session
        .goal_mut(&target_id)
        .ok_or_else(|| DialogueError::not_found(format!("goal id={target_id}")))?;
    if patch.priority > 0 {
        target.priority = patch.priority;
    } else if target.priority <= 0 {
        target.priority = default_priority(goal_type);
    }
    target.goal_type = goal_type.to_string();
    for (key, value) in &patch.slots_patch {
        target.set_slot(key.clone(), value.clone());
    }
    target.set_missing(patch.missing.clone(), patch.next_question.clone());
    target.updated_at = now;

    let switch_focus = created
        || session.active_goal().is_none()
        || should_interleave(session.active_goal(), session.goal(&target_id));
    if switch_focus {
        debug!(goal_id = %target_id, created, "moving focus to planned goal");
        session.suspend_and_activate(&target_id, now)?;
    }

    session.touch(now);
    session
        .active_goal_id
        .clone()
        .ok_or(DialogueError::NoActiveGoal)
}

fn find_or_create_goal(
    session: &mut SessionState,
    patch: &GoalPatch,
    goal_type: &str,
    now: DateTime<Utc>,
) -> Result<(String, bool), DialogueError> {
    let requested_id = patch.goal_id.trim();
    if !requested_id.is_empty() && session.goals.contains_key(requested_id) {
        return Ok((requested_id.to_string(), false));
    }

    if let Some(active) = session.active_goal()
        && active.goal_type == goal_type
        && !active.is_done()
    {
        return Ok((active.id.clone(), false));
    }

    let goal_id = if requested_id.is_empty() {
        new_goal_id(session, goal_type, now)
    } else {
        requested_id.to_string()
    };
    let priority = if patch.priority > 0 {
        patch.priority
    } else {
        default_priority(goal_type)
    };
    debug!(goal_id = %goal_id, goal_type, priority, "creating goal");
    session.add_goal(Goal::new(goal_id.clone(), goal_type, priority, now))?;
    Ok((goal_id, true))
}

/// `sales.recommend_item` at t → `sales_recommend_item_<unix nanos>`.
///
/// Bumps the suffix until the id is unused within the session.
fn new_goal_id(session: &SessionState, goal_type: &str, now: DateTime<Utc>) -> String {
    let mut safe_type = goal_type.trim().replace('.', "_");
    if safe_type.is_empty() {
        safe_type = "goal".to_string();
    }
    let mut suffix = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros());
    loop {
        let candidate = format!("{safe_type}_{suffix}");
        if !session.goals.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
