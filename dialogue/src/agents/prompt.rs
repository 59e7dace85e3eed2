//! Prompt rendering for the planner and specialists.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::{AgentKind, Goal, PlannerRequest, SessionState, SpecialistRequest};
use crate::io::model::{ModelMode, ToolSpec};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const SPECIALIST_TEMPLATE: &str = include_str!("prompts/specialist.md");

/// Session view handed to the planner: focus, stack and goals, no identity.
#[derive(Debug, Serialize)]
struct SessionSummary<'a> {
    active_goal_id: Option<&'a str>,
    goal_stack: &'a [String],
    goals: Vec<&'a Goal>,
}

impl<'a> SessionSummary<'a> {
    fn from_session(session: &'a SessionState) -> Self {
        Self {
            active_goal_id: session.active_goal_id.as_deref(),
            goal_stack: &session.goal_stack,
            goals: session.goals.values().collect(),
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("specialist", SPECIALIST_TEMPLATE)
            .context("load specialist template")?;
        Ok(Self { env })
    }

    pub fn render_planner(&self, request: &PlannerRequest<'_>) -> Result<String> {
        let summary = SessionSummary::from_session(request.session);
        let session_json =
            serde_json::to_string_pretty(&summary).context("serialize session summary")?;
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            user_message => request.user_message.trim(),
            memory_summary => non_empty(request.memory_summary),
            session_json => session_json,
        })?;
        Ok(rendered)
    }

    pub fn render_specialist(
        &self,
        agent: AgentKind,
        mode: ModelMode,
        request: &SpecialistRequest<'_>,
        tools: &[ToolSpec],
    ) -> Result<String> {
        let goal_json =
            serde_json::to_string_pretty(request.active_goal).context("serialize active goal")?;
        let tool_results_json = if request.tool_results.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string_pretty(request.tool_results)
                    .context("serialize tool results")?,
            )
        };
        let template = self.env.get_template("specialist")?;
        let rendered = template.render(context! {
            agent => agent.as_str(),
            mode => mode.as_str(),
            tools => tools,
            user_message => request.user_message.trim(),
            memory_summary => non_empty(request.memory_summary),
            goal_json => goal_json,
            tool_results_json => tool_results_json,
        })?;
        Ok(rendered)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|s| !s.is_empty())
}
