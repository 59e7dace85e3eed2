//! Model-driven planner.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::agents::Planner;
use crate::agents::prompt::PromptEngine;
use crate::core::error::DialogueError;
use crate::core::response_validator::validate_goal_patch;
use crate::core::types::{GoalPatch, PlannerRequest};
use crate::io::model::{ModelBackend, ModelMode, ModelRequest, parse_model_json};

/// Planner that asks a model for one [`GoalPatch`] per turn.
pub struct ModelPlanner<M> {
    model: M,
    prompts: PromptEngine,
}

impl<M: ModelBackend> ModelPlanner<M> {
    pub fn new(model: M) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptEngine::new()?,
        })
    }
}

impl<M: ModelBackend> Planner for ModelPlanner<M> {
    #[instrument(skip_all, fields(session_id = %request.session.session_id))]
    fn plan(&self, request: &PlannerRequest<'_>) -> Result<GoalPatch> {
        if request.user_message.trim().is_empty() {
            return Err(DialogueError::validation("user message is required").into());
        }
        let prompt = self.prompts.render_planner(request)?;
        let reply = self
            .model
            .complete(&ModelRequest {
                prompt,
                mode: ModelMode::Plan,
                tools: Vec::new(),
            })
            .context("planner model call")?;

        let patch: GoalPatch = parse_model_json(&reply.content)?;
        let mut patch = validate_goal_patch(patch)?;
        if patch.missing.is_empty() {
            patch.next_question.clear();
        }
        debug!(goal_type = %patch.goal_type, priority = patch.priority, "planned goal");
        Ok(patch)
    }
}
