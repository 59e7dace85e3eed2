//! Model-driven specialist with an exploratory tool phase and a finalize phase.
//!
//! A goal that is blocked, or that arrives with tool results, goes straight to
//! the finalize phase (mode `ask` or `finalize`) and never requests tools.
//! Anything else runs the `act` phase, which yields tool requests or a
//! best-effort message. When the `act` output already has the finalize shape
//! it is validated and returned as the finished response.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::agents::Specialist;
use crate::agents::prompt::PromptEngine;
use crate::core::error::DialogueError;
use crate::core::response_validator::validate_final_response;
use crate::core::types::{
    AgentKind, SpecialistRequest, SpecialistResponse, StateUpdates, ToolRequest,
};
use crate::io::model::{ModelBackend, ModelMode, ModelRequest, ToolCall, ToolSpec, parse_model_json};
use crate::tools::ToolCatalog;

/// Model output in the finalize shape.
#[derive(Debug, Deserialize)]
struct FinalizeOutput {
    message: String,
    #[serde(default)]
    state_updates: StateUpdates,
}

impl From<FinalizeOutput> for SpecialistResponse {
    fn from(output: FinalizeOutput) -> Self {
        SpecialistResponse {
            message: output.message,
            tool_requests: Vec::new(),
            state_updates: output.state_updates,
        }
    }
}

pub struct LayeredSpecialist<M> {
    agent: AgentKind,
    model: M,
    prompts: PromptEngine,
    catalog: ToolCatalog,
    tools: Vec<ToolSpec>,
}

impl<M: ModelBackend> LayeredSpecialist<M> {
    /// Specialist for `agent` advertising that namespace's catalog tools.
    pub fn new(agent: AgentKind, model: M, catalog: &ToolCatalog) -> Result<Self> {
        Ok(Self {
            agent,
            model,
            prompts: PromptEngine::new()?,
            catalog: *catalog,
            tools: catalog.specs_for(agent),
        })
    }

    fn finalize(&self, request: &SpecialistRequest<'_>, mode: ModelMode) -> Result<SpecialistResponse> {
        let prompt = self
            .prompts
            .render_specialist(self.agent, mode, request, &[])?;
        let reply = self
            .model
            .complete(&ModelRequest {
                prompt,
                mode,
                tools: Vec::new(),
            })
            .with_context(|| format!("{} specialist {mode} call", self.agent))?;
        let output: FinalizeOutput = parse_model_json(&reply.content)?;
        Ok(validate_final_response(output.into())?)
    }

    fn act(&self, request: &SpecialistRequest<'_>) -> Result<SpecialistResponse> {
        let prompt = self
            .prompts
            .render_specialist(self.agent, ModelMode::Act, request, &self.tools)?;
        let reply = self
            .model
            .complete(&ModelRequest {
                prompt,
                mode: ModelMode::Act,
                tools: self.tools.clone(),
            })
            .with_context(|| format!("{} specialist act call", self.agent))?;

        let tool_requests = self.to_tool_requests(&reply.tool_calls)?;
        if !tool_requests.is_empty() {
            debug!(count = tool_requests.len(), "specialist requested tools");
            return Ok(SpecialistResponse {
                tool_requests,
                ..SpecialistResponse::default()
            });
        }

        let content = reply.content.trim();
        if content.is_empty() {
            return Err(DialogueError::schema("act mode requires tool requests or a message").into());
        }
        if let Ok(output) = parse_model_json::<FinalizeOutput>(content) {
            debug!("act output already final");
            return Ok(validate_final_response(output.into())?);
        }
        Ok(SpecialistResponse {
            message: content.to_string(),
            ..SpecialistResponse::default()
        })
    }

    fn to_tool_requests(&self, calls: &[ToolCall]) -> Result<Vec<ToolRequest>, DialogueError> {
        calls
            .iter()
            .map(|call| {
                let tool = call.name.trim();
                if tool.is_empty() {
                    return Err(DialogueError::schema("tool call name is empty"));
                }
                if !self.catalog.allows(self.agent, tool) {
                    return Err(DialogueError::schema(format!(
                        "tool={tool} is not allowed for agent={}",
                        self.agent
                    )));
                }
                let raw = call.arguments.trim();
                let args = if raw.is_empty() {
                    Map::new()
                } else {
                    serde_json::from_str::<Map<String, Value>>(raw).map_err(|err| {
                        DialogueError::schema(format!("invalid tool args for tool={tool}: {err}"))
                    })?
                };
                Ok(ToolRequest {
                    tool: tool.to_string(),
                    args,
                })
            })
            .collect()
    }
}

impl<M: ModelBackend> Specialist for LayeredSpecialist<M> {
    #[instrument(skip_all, fields(agent = %self.agent, goal_id = %request.active_goal.id))]
    fn run(&self, request: &SpecialistRequest<'_>) -> Result<SpecialistResponse> {
        let goal = request.active_goal;
        if goal.goal_type.trim().is_empty() {
            return Err(DialogueError::validation("active goal type is required").into());
        }
        let blocked = goal.is_blocked() || !goal.missing.is_empty();
        if blocked {
            return self.finalize(request, ModelMode::Ask);
        }
        if !request.tool_results.is_empty() {
            return self.finalize(request, ModelMode::Finalize);
        }
        self.act(request)
    }
}
