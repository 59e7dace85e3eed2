//! Language-model backend abstraction.
//!
//! The [`ModelBackend`] trait decouples the planner and specialists from any
//! concrete model client. [`ScriptedModel`] replays canned replies and backs
//! both the `replay` command and the tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::error::DialogueError;

/// What the caller expects the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// Planner: one goal patch as JSON.
    Plan,
    /// Specialist exploratory phase: tool calls or a message.
    Act,
    /// Specialist on a blocked goal: ask for the missing input.
    Ask,
    /// Specialist after tools ran: final message plus state updates.
    Finalize,
}

impl ModelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelMode::Plan => "plan",
            ModelMode::Act => "act",
            ModelMode::Ask => "ask",
            ModelMode::Finalize => "finalize",
        }
    }
}

impl fmt::Display for ModelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub prompt: String,
    pub mode: ModelMode,
    /// Empty unless the model may call tools.
    pub tools: Vec<ToolSpec>,
}

/// Tool invocation emitted by the model; `arguments` is raw JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelReply {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Abstraction over model backends.
pub trait ModelBackend {
    fn complete(&self, request: &ModelRequest) -> Result<ModelReply>;
}

impl<M: ModelBackend + ?Sized> ModelBackend for &M {
    fn complete(&self, request: &ModelRequest) -> Result<ModelReply> {
        (**self).complete(request)
    }
}

/// Backend that returns queued replies in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: RefCell<VecDeque<ModelReply>>,
    requests: RefCell<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.borrow().clone()
    }
}

impl ModelBackend for ScriptedModel {
    fn complete(&self, request: &ModelRequest) -> Result<ModelReply> {
        self.requests.borrow_mut().push(request.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model has no reply left for mode={}", request.mode))?;
        debug!(mode = %request.mode, tool_calls = reply.tool_calls.len(), "scripted reply");
        Ok(reply)
    }
}

/// Parse model content as JSON of type `T`.
///
/// Tolerates a surrounding markdown code fence. Malformed output is a
/// [`DialogueError::SchemaViolation`].
pub fn parse_model_json<T: DeserializeOwned>(content: &str) -> Result<T, DialogueError> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err(DialogueError::schema("model reply is empty"));
    }
    serde_json::from_str(body)
        .map_err(|err| DialogueError::schema(format!("model reply is not valid JSON: {err}")))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
