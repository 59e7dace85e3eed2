//! Shared deterministic types for the dialogue core.
//!
//! These types define the stable contracts between the session model, the
//! planner, the specialists and the tool gateway. Field names double as the
//! persisted/wire format, so renames here are format changes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collected goal parameters, keyed by slot name.
pub type Slots = BTreeMap<String, Value>;

/// Lifecycle status of a goal. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Blocked,
    Suspended,
    Done,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Blocked => "blocked",
            GoalStatus::Suspended => "suspended",
            GoalStatus::Done => "done",
        }
    }

    /// Parse a status label, ignoring surrounding whitespace and ASCII case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(GoalStatus::Active),
            "blocked" => Some(GoalStatus::Blocked),
            "suspended" => Some(GoalStatus::Suspended),
            "done" => Some(GoalStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goal-type namespace that owns a specialist and a tool catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Sales,
    Support,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::Sales, AgentKind::Support];

    /// Resolve the namespace of a goal type such as `sales.recommend_item`.
    pub fn from_goal_type(goal_type: &str) -> Option<Self> {
        let goal_type = goal_type.trim();
        if goal_type.starts_with("sales.") {
            Some(AgentKind::Sales)
        } else if goal_type.starts_with("support.") {
            Some(AgentKind::Support)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Sales => "sales",
            AgentKind::Support => "support",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked customer intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    /// Namespaced goal type, e.g. `support.troubleshoot`.
    #[serde(rename = "type")]
    pub goal_type: String,
    pub status: GoalStatus,
    /// Higher wins when deciding focus.
    pub priority: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: Slots,
    /// Outstanding slot names, in the order they should be asked for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_question: String,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields stamped onto a freshly created session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub workspace_id: String,
    pub customer_id: String,
    pub channel_type: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            workspace_id: "default-workspace".to_string(),
            customer_id: "default-customer".to_string(),
            channel_type: "chat".to_string(),
        }
    }
}

impl SessionDefaults {
    /// Replace blank fields with the built-in defaults.
    pub fn normalized(&self) -> Self {
        let fallback = Self::default();
        let pick = |value: &str, fallback: String| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                fallback
            } else {
                trimmed.to_string()
            }
        };
        Self {
            workspace_id: pick(&self.workspace_id, fallback.workspace_id),
            customer_id: pick(&self.customer_id, fallback.customer_id),
            channel_type: pick(&self.channel_type, fallback.channel_type),
        }
    }
}

/// Durable per-conversation state.
///
/// Goals reference each other only by id: `active_goal_id` and every
/// `goal_stack` entry must name a key of `goals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub workspace_id: String,
    pub customer_id: String,
    pub channel_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_goal_id: Option<String>,
    /// LIFO stack of goal ids; the top is the most recently focused goal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goal_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub goals: BTreeMap<String, Goal>,
    pub updated_at: DateTime<Utc>,
}

/// Planner proposal for which goal should exist or advance this turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalPatch {
    /// Targets an existing goal when non-empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub goal_id: String,
    pub goal_type: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub slots_patch: Slots,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_question: String,
}

/// Goal changes reported by a specialist. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateUpdates {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub slots_patch: Slots,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub set_status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_question: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub memory_update: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mark_done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub args: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool: impl Into<String>, result: Value) -> Self {
        Self {
            tool: tool.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Input handed to the planner once per turn.
#[derive(Debug, Clone, Serialize)]
pub struct PlannerRequest<'a> {
    pub user_message: &'a str,
    pub memory_summary: &'a str,
    pub session: &'a SessionState,
    pub now: DateTime<Utc>,
}

/// Input handed to a specialist for each dispatch pass.
#[derive(Debug, Clone, Serialize)]
pub struct SpecialistRequest<'a> {
    pub user_message: &'a str,
    pub memory_summary: &'a str,
    pub active_goal: &'a Goal,
    /// Non-empty only on the finalize pass that follows tool execution.
    pub tool_results: &'a [ToolResult],
}

/// Specialist output: either tool requests, or a message plus updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialistResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolRequest>,
    pub state_updates: StateUpdates,
}
