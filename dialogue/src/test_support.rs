//! Test-only builders and scripted collaborators.
//!
//! Compiled for unit tests and behind the `test-support` feature so the
//! integration tests in `tests/` can drive the [`crate::turn::Orchestrator`]
//! without touching disk or a model.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::agents::{Planner, Specialist};
use crate::core::types::{
    AgentKind, Goal, GoalPatch, GoalStatus, PlannerRequest, SessionDefaults, SessionState,
    SpecialistRequest, SpecialistResponse, ToolRequest, ToolResult,
};
use crate::io::memory::MemoryStore;
use crate::io::store::SessionStore;
use crate::tools::ToolGateway;

/// Fixed instant used as "now" by most tests.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_722_000, 0).expect("valid t0")
}

/// One minute after [`t0`].
pub fn t1() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_722_060, 0).expect("valid t1")
}

/// Create a deterministic goal with no slots, stamped at [`t0`].
pub fn goal(id: &str, goal_type: &str, status: GoalStatus, priority: i64) -> Goal {
    let mut goal = Goal::new(id, goal_type, priority, t0());
    goal.status = status;
    goal
}

/// Session `s1` with default identity holding `goals` and no focus.
pub fn session_with_goals(goals: Vec<Goal>) -> SessionState {
    let mut session = SessionState::new("s1", &SessionDefaults::default(), t0());
    for goal in goals {
        session.goals.insert(goal.id.clone(), goal);
    }
    session
}

pub fn patch(goal_type: &str, priority: i64) -> GoalPatch {
    GoalPatch {
        goal_type: goal_type.to_string(),
        priority,
        ..GoalPatch::default()
    }
}

/// Specialist response carrying only a message.
pub fn reply(message: &str) -> SpecialistResponse {
    SpecialistResponse {
        message: message.to_string(),
        ..SpecialistResponse::default()
    }
}

/// Specialist response requesting the named tools with empty args.
pub fn tool_call(tools: &[&str]) -> SpecialistResponse {
    SpecialistResponse {
        tool_requests: tools
            .iter()
            .map(|tool| ToolRequest {
                tool: tool.to_string(),
                args: serde_json::Map::new(),
            })
            .collect(),
        ..SpecialistResponse::default()
    }
}

/// In-memory session store that counts saves and can be told to fail them.
#[derive(Default)]
pub struct RecordingStore {
    pub sessions: RefCell<BTreeMap<String, SessionState>>,
    pub saves: Cell<usize>,
    pub fail_save: Option<String>,
    pub fail_load: Option<String>,
}

impl RecordingStore {
    pub fn failing_load(message: &str) -> Self {
        Self {
            fail_load: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_save(message: &str) -> Self {
        Self {
            fail_save: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_session(session: SessionState) -> Self {
        let store = Self::default();
        store
            .sessions
            .borrow_mut()
            .insert(session.session_id.clone(), session);
        store
    }

    pub fn session(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.borrow().get(session_id).cloned()
    }
}

impl SessionStore for RecordingStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        if let Some(message) = &self.fail_load {
            return Err(anyhow!("{message}"));
        }
        Ok(self.sessions.borrow().get(session_id).cloned())
    }

    fn save(&self, session: &SessionState) -> Result<()> {
        if let Some(message) = &self.fail_save {
            return Err(anyhow!("{message}"));
        }
        self.saves.set(self.saves.get() + 1);
        self.sessions
            .borrow_mut()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.borrow_mut().remove(session_id);
        Ok(())
    }
}

/// Memory store that serves fixed summaries and records every write.
#[derive(Default)]
pub struct RecordingMemory {
    pub summaries: BTreeMap<String, String>,
    pub reads: RefCell<Vec<String>>,
    pub writes: RefCell<Vec<(String, String)>>,
    pub fail_read: Option<String>,
    pub fail_write: Option<String>,
}

impl RecordingMemory {
    pub fn failing_read(message: &str) -> Self {
        Self {
            fail_read: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_write(message: &str) -> Self {
        Self {
            fail_write: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_summary(customer_id: &str, summary: &str) -> Self {
        let mut summaries = BTreeMap::new();
        summaries.insert(customer_id.to_string(), summary.to_string());
        Self {
            summaries,
            ..Self::default()
        }
    }
}

impl MemoryStore for RecordingMemory {
    fn read_summary(&self, customer_id: &str) -> Result<String> {
        self.reads.borrow_mut().push(customer_id.to_string());
        if let Some(message) = &self.fail_read {
            return Err(anyhow!("{message}"));
        }
        Ok(self.summaries.get(customer_id).cloned().unwrap_or_default())
    }

    fn write_summary(&self, customer_id: &str, text: &str) -> Result<()> {
        if let Some(message) = &self.fail_write {
            return Err(anyhow!("{message}"));
        }
        self.writes
            .borrow_mut()
            .push((customer_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Planner returning queued patches in order.
#[derive(Default)]
pub struct ScriptedPlanner {
    pub patches: RefCell<VecDeque<GoalPatch>>,
    /// User messages seen, one per call.
    pub messages: RefCell<Vec<String>>,
    /// Memory summaries seen, one per call.
    pub summaries: RefCell<Vec<String>>,
}

impl ScriptedPlanner {
    pub fn new(patches: Vec<GoalPatch>) -> Self {
        Self {
            patches: RefCell::new(patches.into()),
            ..Self::default()
        }
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&self, request: &PlannerRequest<'_>) -> Result<GoalPatch> {
        self.messages
            .borrow_mut()
            .push(request.user_message.to_string());
        self.summaries
            .borrow_mut()
            .push(request.memory_summary.to_string());
        self.patches
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted planner exhausted"))
    }
}

/// What a [`ScriptedSpecialist`] was asked, per pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialistCall {
    pub goal_id: String,
    pub goal_status: GoalStatus,
    pub tool_results: Vec<ToolResult>,
}

/// Specialist returning queued responses in order.
#[derive(Default)]
pub struct ScriptedSpecialist {
    pub responses: RefCell<VecDeque<SpecialistResponse>>,
    pub calls: RefCell<Vec<SpecialistCall>>,
}

impl ScriptedSpecialist {
    pub fn new(responses: Vec<SpecialistResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl Specialist for ScriptedSpecialist {
    fn run(&self, request: &SpecialistRequest<'_>) -> Result<SpecialistResponse> {
        self.calls.borrow_mut().push(SpecialistCall {
            goal_id: request.active_goal.id.clone(),
            goal_status: request.active_goal.status,
            tool_results: request.tool_results.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted specialist exhausted"))
    }
}

/// Tool gateway that records calls and answers each request with
/// `{"ok": true}` and an empty tool name.
#[derive(Default)]
pub struct RecordingTools {
    pub calls: RefCell<Vec<(AgentKind, Vec<ToolRequest>)>>,
}

impl ToolGateway for RecordingTools {
    fn execute(&self, agent: AgentKind, requests: &[ToolRequest]) -> Result<Vec<ToolResult>> {
        self.calls.borrow_mut().push((agent, requests.to_vec()));
        Ok(requests
            .iter()
            .map(|_| ToolResult::ok("", json!({ "ok": true })))
            .collect())
    }
}
