//! Goal and session mutation helpers.
//!
//! Focus moves only through [`SessionState::suspend_and_activate`] and
//! [`SessionState::resume_previous`]; both keep `active_goal_id` and the
//! goal stack pointing at existing goals.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::error::DialogueError;
use crate::core::types::{Goal, GoalStatus, SessionDefaults, SessionState, Slots};

impl Goal {
    /// Create an `active` goal with no slots.
    pub fn new(
        id: impl Into<String>,
        goal_type: impl Into<String>,
        priority: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            goal_type: goal_type.into(),
            status: GoalStatus::Active,
            priority,
            slots: Slots::new(),
            missing: Vec::new(),
            next_question: String::new(),
            updated_at: now,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == GoalStatus::Blocked
    }

    pub fn is_done(&self) -> bool {
        self.status == GoalStatus::Done
    }

    /// True when the goal carries what a `blocked` goal must carry.
    pub fn satisfies_blocked_invariant(&self) -> bool {
        !self.missing.is_empty() && !self.next_question.trim().is_empty()
    }

    pub fn set_slot(&mut self, key: impl Into<String>, value: Value) {
        self.slots.insert(key.into(), value);
    }

    /// Record outstanding slots and the question that elicits the next one.
    ///
    /// `done` and `suspended` goals only get bookkeeping updates; their status
    /// is never reopened here. For other goals an empty `missing` unblocks and
    /// a non-empty one blocks. `next_question` is stored verbatim, even when
    /// empty.
    pub fn set_missing(&mut self, missing: Vec<String>, next_question: impl Into<String>) {
        let next_question = next_question.into();
        let has_missing = !missing.is_empty();
        self.missing = missing;

        if matches!(self.status, GoalStatus::Done | GoalStatus::Suspended) {
            self.next_question = if has_missing {
                next_question
            } else {
                String::new()
            };
            return;
        }

        if has_missing {
            self.status = GoalStatus::Blocked;
            self.next_question = next_question;
        } else {
            if self.status == GoalStatus::Blocked {
                self.status = GoalStatus::Active;
            }
            self.next_question.clear();
        }
    }
}

impl SessionState {
    /// Fresh state for a session with no persisted history.
    pub fn new(session_id: impl Into<String>, defaults: &SessionDefaults, now: DateTime<Utc>) -> Self {
        let defaults = defaults.normalized();
        Self {
            session_id: session_id.into(),
            workspace_id: defaults.workspace_id,
            customer_id: defaults.customer_id,
            channel_type: defaults.channel_type,
            active_goal_id: None,
            goal_stack: Vec::new(),
            goals: Default::default(),
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// The focused goal, if the focus pointer resolves.
    pub fn active_goal(&self) -> Option<&Goal> {
        self.active_goal_id
            .as_deref()
            .and_then(|id| self.goals.get(id))
    }

    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.get(goal_id)
    }

    pub fn goal_mut(&mut self, goal_id: &str) -> Option<&mut Goal> {
        self.goals.get_mut(goal_id)
    }

    /// Insert or replace a goal keyed by its id.
    pub fn add_goal(&mut self, goal: Goal) -> Result<(), DialogueError> {
        if goal.id.trim().is_empty() {
            return Err(DialogueError::validation("goal id is empty"));
        }
        self.goals.insert(goal.id.clone(), goal);
        Ok(())
    }

    pub fn push_goal(&mut self, goal_id: impl Into<String>) {
        self.goal_stack.push(goal_id.into());
    }

    pub fn peek_goal(&self) -> Option<&str> {
        self.goal_stack.last().map(String::as_str)
    }

    pub fn pop_goal(&mut self) -> Option<String> {
        self.goal_stack.pop()
    }

    /// Point focus at `goal_id` without touching any goal's status.
    ///
    /// Seeds the stack when it is empty and aligns its top otherwise; the top
    /// is never duplicated.
    pub fn set_active_goal(&mut self, goal_id: &str, now: DateTime<Utc>) -> Result<(), DialogueError> {
        if !self.goals.contains_key(goal_id) {
            return Err(DialogueError::not_found(format!("goal id={goal_id}")));
        }
        if self.peek_goal() != Some(goal_id) {
            self.push_goal(goal_id);
        }
        self.active_goal_id = Some(goal_id.to_string());
        self.touch(now);
        Ok(())
    }

    /// Interleaving transition: suspend the current focus and focus `goal_id`.
    ///
    /// A blocked target keeps its status; it is focused and blocked at once.
    pub fn suspend_and_activate(
        &mut self,
        goal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DialogueError> {
        if goal_id.trim().is_empty() {
            return Err(DialogueError::validation("goal id is empty"));
        }
        let target_status = self
            .goals
            .get(goal_id)
            .map(|goal| goal.status)
            .ok_or_else(|| DialogueError::not_found(format!("goal id={goal_id}")))?;
        if target_status == GoalStatus::Done {
            return Err(DialogueError::state(format!(
                "cannot activate done goal {goal_id}"
            )));
        }

        if let Some(current_id) = self.active_goal_id.clone()
            && current_id != goal_id
            && let Some(current) = self.goals.get_mut(&current_id)
            && current.status != GoalStatus::Done
        {
            debug!(goal_id = %current_id, "suspending focused goal");
            current.status = GoalStatus::Suspended;
            current.updated_at = now;
        }

        if let Some(target) = self.goals.get_mut(goal_id) {
            if target.status == GoalStatus::Suspended {
                target.status = GoalStatus::Active;
            }
            target.updated_at = now;
        }

        if self.peek_goal() != Some(goal_id) {
            self.push_goal(goal_id);
        }
        self.active_goal_id = Some(goal_id.to_string());
        self.touch(now);
        Ok(())
    }

    /// Hand focus back to the goal below the current one on the stack.
    ///
    /// Returns the resumed goal id, or `None` when nothing is left to resume.
    /// A stack entry naming a missing goal clears focus instead of failing.
    pub fn resume_previous(&mut self, now: DateTime<Utc>) -> Option<String> {
        if self.goal_stack.is_empty() {
            return None;
        }

        if self.active_goal_id.is_some() && self.peek_goal() == self.active_goal_id.as_deref() {
            self.pop_goal();
        }

        let Some(previous_id) = self.peek_goal().map(str::to_string) else {
            self.active_goal_id = None;
            self.touch(now);
            return None;
        };

        let Some(previous) = self.goals.get_mut(&previous_id) else {
            warn!(goal_id = %previous_id, "goal stack references missing goal; clearing focus");
            self.active_goal_id = None;
            self.touch(now);
            return None;
        };

        if previous.status == GoalStatus::Suspended {
            previous.status = GoalStatus::Active;
        }
        previous.updated_at = now;

        debug!(goal_id = %previous_id, "resumed previous goal");
        self.active_goal_id = Some(previous_id.clone());
        self.touch(now);
        Some(previous_id)
    }

    /// Complete a goal; a focused goal hands focus back via [`Self::resume_previous`].
    pub fn mark_goal_done(&mut self, goal_id: &str, now: DateTime<Utc>) -> Result<(), DialogueError> {
        if goal_id.trim().is_empty() {
            return Err(DialogueError::validation("goal id is empty"));
        }
        let goal = self
            .goals
            .get_mut(goal_id)
            .ok_or_else(|| DialogueError::not_found(format!("goal id={goal_id}")))?;
        goal.status = GoalStatus::Done;
        goal.missing.clear();
        goal.next_question.clear();
        goal.updated_at = now;

        if self.active_goal_id.as_deref() == Some(goal_id) {
            // Completing the last goal on the stack leaves no focus; that is fine.
            let _ = self.resume_previous(now);
        }
        self.touch(now);
        Ok(())
    }
}
