//! Two-pass specialist dispatch.
//!
//! Pass 1 asks the specialist for the focused goal. If it requests tools, the
//! gateway runs them in order and pass 2 finalizes with the results attached.
//! A second round of tool requests is a schema violation; there is no pass 3.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::agents::SpecialistRegistry;
use crate::core::error::DialogueError;
use crate::core::response_validator::validate_final_response;
use crate::core::state_update::merge_state_updates;
use crate::core::types::{Goal, SpecialistRequest, StateUpdates};
use crate::tools::ToolGateway;

/// Message and merged updates produced by one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub message: String,
    pub updates: StateUpdates,
}

#[instrument(skip_all, fields(goal_id = %active_goal.id, goal_type = %active_goal.goal_type))]
pub fn dispatch_specialist<G: ToolGateway>(
    registry: &SpecialistRegistry<'_>,
    tools: &G,
    user_message: &str,
    memory_summary: &str,
    active_goal: &Goal,
) -> Result<DispatchOutcome> {
    let (agent, specialist) = registry.resolve(&active_goal.goal_type)?;

    let mut request = SpecialistRequest {
        user_message,
        memory_summary,
        active_goal,
        tool_results: &[],
    };
    let first = specialist.run(&request)?;
    if first.tool_requests.is_empty() {
        let first = validate_final_response(first)?;
        debug!("specialist finished in one pass");
        return Ok(DispatchOutcome {
            message: first.message,
            updates: first.state_updates,
        });
    }

    debug!(count = first.tool_requests.len(), agent = %agent, "executing tool requests");
    let mut results = tools.execute(agent, &first.tool_requests)?;
    for (result, tool_request) in results.iter_mut().zip(&first.tool_requests) {
        if result.tool.trim().is_empty() {
            result.tool = tool_request.tool.clone();
        }
    }

    request.tool_results = &results;
    let second = specialist.run(&request)?;
    if !second.tool_requests.is_empty() {
        return Err(DialogueError::schema("specialist requested tools in pass 2").into());
    }
    let second = validate_final_response(second)?;

    Ok(DispatchOutcome {
        message: second.message,
        updates: merge_state_updates(&first.state_updates, &second.state_updates),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorKind, classify};
    use crate::core::types::{AgentKind, GoalStatus, SpecialistResponse};
    use crate::test_support::{RecordingTools, ScriptedSpecialist, goal, reply, tool_call};
    use serde_json::json;

    fn sales_goal() -> Goal {
        goal("g1", "sales.recommend_item", GoalStatus::Active, 50)
    }

    #[test]
    fn single_pass_returns_trimmed_message() {
        let sales = ScriptedSpecialist::new(vec![reply("  try model A  ")]);
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);
        let tools = RecordingTools::default();

        let outcome = dispatch_specialist(&registry, &tools, "hi", "", &sales_goal()).expect("dispatch");

        assert_eq!(outcome.message, "try model A");
        assert!(tools.calls.borrow().is_empty());
        assert_eq!(sales.calls.borrow().len(), 1);
    }

    #[test]
    fn tool_pass_runs_gateway_then_finalizes_with_results() {
        let mut first = tool_call(&["inventory.query", "math.evaluate"]);
        first.state_updates.slots_patch.insert("budget".to_string(), json!(1500));
        let mut second = reply("model A fits your budget");
        second.state_updates.set_status = "done".to_string();
        let sales = ScriptedSpecialist::new(vec![first, second]);
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);
        let tools = RecordingTools::default();

        let outcome = dispatch_specialist(&registry, &tools, "hi", "", &sales_goal()).expect("dispatch");

        assert_eq!(outcome.message, "model A fits your budget");
        assert!(outcome.updates.mark_done);
        assert_eq!(outcome.updates.slots_patch.get("budget"), Some(&json!(1500)));

        let calls = tools.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, AgentKind::Sales);
        let requested: Vec<&str> = calls[0].1.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(requested, vec!["inventory.query", "math.evaluate"]);

        let specialist_calls = sales.calls.borrow();
        assert_eq!(specialist_calls.len(), 2);
        assert!(specialist_calls[0].tool_results.is_empty());
        let names: Vec<&str> = specialist_calls[1]
            .tool_results
            .iter()
            .map(|r| r.tool.as_str())
            .collect();
        assert_eq!(names, vec!["inventory.query", "math.evaluate"]);
    }

    #[test]
    fn second_round_of_tool_requests_is_rejected() {
        let sales = ScriptedSpecialist::new(vec![
            tool_call(&["inventory.query"]),
            tool_call(&["inventory.query"]),
        ]);
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);

        let err = dispatch_specialist(&registry, &RecordingTools::default(), "hi", "", &sales_goal())
            .expect_err("pass 2 tools");

        assert_eq!(classify(&err), Some(ErrorKind::SchemaViolation));
        assert!(err.to_string().contains("pass 2"));
    }

    #[test]
    fn missing_without_question_is_rejected() {
        let mut response = reply("ok");
        response.state_updates.missing = vec!["budget".to_string()];
        let sales = ScriptedSpecialist::new(vec![response]);
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);

        let err = dispatch_specialist(&registry, &RecordingTools::default(), "hi", "", &sales_goal())
            .expect_err("question");

        assert!(err.to_string().contains("next_question required"));
    }

    #[test]
    fn empty_message_is_rejected() {
        let sales = ScriptedSpecialist::new(vec![SpecialistResponse::default()]);
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);
        let err = dispatch_specialist(&registry, &RecordingTools::default(), "hi", "", &sales_goal())
            .expect_err("empty");
        assert_eq!(classify(&err), Some(ErrorKind::SchemaViolation));
    }

    #[test]
    fn unregistered_namespace_is_validation_error() {
        let sales = ScriptedSpecialist::default();
        let registry = SpecialistRegistry::new().with(AgentKind::Sales, &sales);
        let support_goal = goal("g2", "support.troubleshoot", GoalStatus::Active, 100);

        let err = dispatch_specialist(&registry, &RecordingTools::default(), "hi", "", &support_goal)
            .expect_err("unregistered");

        assert_eq!(classify(&err), Some(ErrorKind::Validation));
        assert!(sales.calls.borrow().is_empty());
    }
}
