//! Structural checks on planner and specialist output.
//!
//! Anything failing here is a [`DialogueError::SchemaViolation`]: the model
//! produced output the core cannot act on.

use crate::core::error::DialogueError;
use crate::core::types::{AgentKind, GoalPatch, GoalStatus, SpecialistResponse};

/// Validate a finalize-shaped specialist response.
///
/// Trims the message, requires it non-empty, requires `next_question` when
/// `missing` is set, and turns a case-insensitive `set_status = done` into
/// `mark_done`.
pub fn validate_final_response(
    mut response: SpecialistResponse,
) -> Result<SpecialistResponse, DialogueError> {
    response.message = response.message.trim().to_string();
    if response.message.is_empty() {
        return Err(DialogueError::schema("specialist message is empty"));
    }

    let updates = &mut response.state_updates;
    if !updates.missing.is_empty() && updates.next_question.trim().is_empty() {
        return Err(DialogueError::schema(
            "next_question required when missing is set",
        ));
    }
    if updates
        .set_status
        .trim()
        .eq_ignore_ascii_case(GoalStatus::Done.as_str())
    {
        updates.mark_done = true;
    }
    Ok(response)
}

/// Minimum contract the turn pipeline enforces on any planner.
pub fn validate_plan_contract(patch: &GoalPatch) -> Result<(), DialogueError> {
    let goal_type = patch.goal_type.trim();
    if AgentKind::from_goal_type(goal_type).is_none() {
        return Err(DialogueError::schema(format!(
            "unsupported goal_type={goal_type:?}"
        )));
    }
    if patch.priority <= 0 {
        return Err(DialogueError::schema("priority must be > 0"));
    }
    Ok(())
}

/// Full check for model-produced plans: the pipeline contract plus a
/// question for every blocked goal. Normalizes slot and question fields.
pub fn validate_goal_patch(mut patch: GoalPatch) -> Result<GoalPatch, DialogueError> {
    patch.goal_id = patch.goal_id.trim().to_string();
    patch.goal_type = patch.goal_type.trim().to_string();
    patch.next_question = patch.next_question.trim().to_string();
    validate_plan_contract(&patch)?;
    if !patch.missing.is_empty() && patch.next_question.is_empty() {
        return Err(DialogueError::schema(
            "blocked goal must include next_question",
        ));
    }
    Ok(patch)
}
