//! Focus policy: which goal should hold focus, and default priorities.

use crate::core::types::{AgentKind, Goal};

/// Priority for `support.*` goals when the planner gives none.
pub const SUPPORT_PRIORITY: i64 = 100;
/// Priority for `sales.*` goals when the planner gives none.
pub const SALES_PRIORITY: i64 = 50;
/// Priority for any other namespace.
pub const FALLBACK_PRIORITY: i64 = 10;

/// Decide whether `candidate` should take focus from `current`.
///
/// Only a strictly higher priority preempts; ties keep the current focus.
pub fn should_interleave(current: Option<&Goal>, candidate: Option<&Goal>) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    let Some(current) = current else {
        return true;
    };
    if current.id == candidate.id {
        return false;
    }
    candidate.priority > current.priority
}

/// Default priority for a goal type. Support outranks sales.
pub fn default_priority(goal_type: &str) -> i64 {
    match AgentKind::from_goal_type(goal_type) {
        Some(AgentKind::Support) => SUPPORT_PRIORITY,
        Some(AgentKind::Sales) => SALES_PRIORITY,
        None => FALLBACK_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GoalStatus;
    use crate::test_support::goal;

    #[test]
    fn no_candidate_never_interleaves() {
        let current = goal("a", "sales.x", GoalStatus::Active, 50);
        assert!(!should_interleave(Some(&current), None));
        assert!(!should_interleave(None, None));
    }

    #[test]
    fn missing_focus_always_interleaves() {
        let candidate = goal("a", "sales.x", GoalStatus::Active, 1);
        assert!(should_interleave(None, Some(&candidate)));
    }

    #[test]
    fn same_goal_never_interleaves() {
        let current = goal("a", "sales.x", GoalStatus::Active, 50);
        let mut candidate = current.clone();
        candidate.priority = 500;
        assert!(!should_interleave(Some(&current), Some(&candidate)));
    }

    #[test]
    fn only_strictly_higher_priority_preempts() {
        let current = goal("a", "sales.x", GoalStatus::Active, 50);
        let tie = goal("b", "sales.y", GoalStatus::Active, 50);
        let lower = goal("c", "sales.z", GoalStatus::Active, 49);
        let higher = goal("d", "support.x", GoalStatus::Active, 51);
        assert!(!should_interleave(Some(&current), Some(&tie)));
        assert!(!should_interleave(Some(&current), Some(&lower)));
        assert!(should_interleave(Some(&current), Some(&higher)));
    }

    #[test]
    fn default_priorities_rank_support_over_sales() {
        assert_eq!(default_priority("support.troubleshoot"), 100);
        assert_eq!(default_priority("sales.recommend_item"), 50);
        assert_eq!(default_priority("billing.refund"), 10);
        assert_eq!(default_priority(""), 10);
    }
}
