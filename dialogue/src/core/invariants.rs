//! Whole-session invariants checked before every save.

use crate::core::error::DialogueError;
use crate::core::types::{GoalStatus, SessionState};

/// Check cross-reference and status invariants:
/// - `active_goal_id` names an existing goal
/// - every `goal_stack` entry names an existing goal
/// - every `blocked` goal has `missing` and `next_question`
///
/// Returns stable error messages in deterministic order (empty on success).
pub fn validate_invariants(session: &SessionState) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(active_id) = session.active_goal_id.as_deref()
        && !session.goals.contains_key(active_id)
    {
        errors.push(format!("goal not found: active_goal_id={active_id}"));
    }

    for (index, goal_id) in session.goal_stack.iter().enumerate() {
        if !session.goals.contains_key(goal_id) {
            errors.push(format!(
                "goal stack corrupt: stack[{index}] has missing goal_id={goal_id}"
            ));
        }
    }

    for goal in session.goals.values() {
        if goal.status == GoalStatus::Blocked && !goal.satisfies_blocked_invariant() {
            errors.push(format!(
                "blocked goal {} must have missing and next_question",
                goal.id
            ));
        }
    }

    errors
}

/// [`validate_invariants`] as a single state error.
pub fn check_session(session: &SessionState) -> Result<(), DialogueError> {
    let errors = validate_invariants(session);
    if errors.is_empty() {
        return Ok(());
    }
    Err(DialogueError::state(format!(
        "session invariants failed: {}",
        errors.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{goal, session_with_goals};

    #[test]
    fn consistent_session_passes() {
        let mut st = session_with_goals(vec![goal("a", "sales.x", GoalStatus::Active, 50)]);
        st.active_goal_id = Some("a".to_string());
        st.goal_stack = vec!["a".to_string()];
        assert!(validate_invariants(&st).is_empty());
        assert!(check_session(&st).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let mut st = session_with_goals(vec![goal("b", "support.x", GoalStatus::Blocked, 100)]);
        st.active_goal_id = Some("ghost".to_string());
        st.goal_stack = vec!["b".to_string(), "lost".to_string()];

        let errors = validate_invariants(&st);

        assert_eq!(
            errors,
            vec![
                "goal not found: active_goal_id=ghost".to_string(),
                "goal stack corrupt: stack[1] has missing goal_id=lost".to_string(),
                "blocked goal b must have missing and next_question".to_string(),
            ]
        );
        let err = check_session(&st).expect_err("invalid");
        assert!(matches!(err, DialogueError::State(_)));
        assert!(err.to_string().contains("goal stack corrupt"));
    }

    #[test]
    fn blocked_goal_with_question_is_valid() {
        let mut blocked = goal("b", "support.x", GoalStatus::Blocked, 100);
        blocked.missing = vec!["device".to_string()];
        blocked.next_question = "Which device?".to_string();
        let st = session_with_goals(vec![blocked]);
        assert!(validate_invariants(&st).is_empty());
    }
}
