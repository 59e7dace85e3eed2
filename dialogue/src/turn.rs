//! Turn pipeline: one user message in, one reply out.
//!
//! Stages run strictly in order and any error aborts the turn:
//!
//! 1. validate request
//! 2. load or create session
//! 3. read memory
//! 4. plan
//! 5. apply plan
//! 6. dispatch specialist
//! 7. apply state updates
//! 8. validate and persist (the single commit point)
//! 9. write memory
//! 10. finalize reply
//!
//! Nothing is persisted before stage 8, and a failed save skips stage 9.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::agents::dispatch::{DispatchOutcome, dispatch_specialist};
use crate::agents::{Planner, SpecialistRegistry};
use crate::core::error::DialogueError;
use crate::core::invariants::check_session;
use crate::core::plan::apply_plan;
use crate::core::response_validator::validate_plan_contract;
use crate::core::state_update::apply_state_updates;
use crate::core::types::{PlannerRequest, SessionDefaults, SessionState};
use crate::io::memory::MemoryStore;
use crate::io::store::SessionStore;
use crate::tools::ToolGateway;

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub session_id: String,
    /// Focus after the turn; `None` once every goal on the stack is done.
    pub active_goal_id: Option<String>,
}

/// Validated turn input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnRequest<'a> {
    session_id: &'a str,
    text: &'a str,
    now: DateTime<Utc>,
}

fn validate_request<'a>(session_id: &'a str, text: &'a str, now: DateTime<Utc>) -> Result<TurnRequest<'a>, DialogueError> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(DialogueError::validation("session id is empty"));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(DialogueError::validation("message is empty"));
    }
    Ok(TurnRequest {
        session_id,
        text,
        now,
    })
}

/// Drives the turn pipeline over its collaborators.
pub struct Orchestrator<'a, S, M, P, T> {
    store: S,
    memory: M,
    planner: P,
    specialists: SpecialistRegistry<'a>,
    tools: T,
    defaults: SessionDefaults,
    clock: Box<dyn Fn() -> DateTime<Utc> + 'a>,
}

impl<'a, S, M, P, T> Orchestrator<'a, S, M, P, T>
where
    S: SessionStore,
    M: MemoryStore,
    P: Planner,
    T: ToolGateway,
{
    /// Blank identity fields in `defaults` fall back to the built-in defaults.
    pub fn new(
        store: S,
        memory: M,
        planner: P,
        specialists: SpecialistRegistry<'a>,
        tools: T,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            store,
            memory,
            planner,
            specialists,
            tools,
            defaults: defaults.normalized(),
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Process one user message for `session_id`.
    #[instrument(skip_all, fields(session_id = %session_id.trim()))]
    pub fn handle_message(&self, session_id: &str, text: &str) -> Result<TurnOutcome> {
        let request = validate_request(session_id, text, (self.clock)())?;

        let mut session = self.load_or_create(&request)?;
        let memory_summary = self.read_memory(&session)?;

        let planned_goal_id = self.plan(&request, &memory_summary, &mut session)?;
        debug!(goal_id = %planned_goal_id, "plan applied");

        let active_goal_id = session
            .active_goal_id
            .clone()
            .ok_or(DialogueError::NoActiveGoal)?;
        let outcome = self.dispatch(&request, &memory_summary, &session)?;
        apply_state_updates(&mut session, &active_goal_id, &outcome.updates, request.now)?;

        self.persist(&mut session, request.now)?;
        self.write_memory(&session, &outcome.updates.memory_update)?;

        let reply = finalize_reply(&outcome)?;
        info!(
            goal_id = %active_goal_id,
            focus = ?session.active_goal_id,
            "turn complete"
        );
        Ok(TurnOutcome {
            reply,
            session_id: session.session_id,
            active_goal_id: session.active_goal_id,
        })
    }

    #[instrument(skip_all)]
    fn load_or_create(&self, request: &TurnRequest<'_>) -> Result<SessionState> {
        let loaded = self
            .store
            .load(request.session_id)
            .with_context(|| format!("load session {}", request.session_id))?;
        match loaded {
            Some(session) => {
                debug!(goals = session.goals.len(), "loaded session");
                Ok(session)
            }
            None => {
                debug!("creating session");
                Ok(SessionState::new(request.session_id, &self.defaults, request.now))
            }
        }
    }

    #[instrument(skip_all, fields(customer_id = %session.customer_id))]
    fn read_memory(&self, session: &SessionState) -> Result<String> {
        self.memory
            .read_summary(&session.customer_id)
            .context("read memory")
    }

    /// Stages 4 and 5. Returns the focused goal id.
    #[instrument(skip_all)]
    fn plan(&self, request: &TurnRequest<'_>, memory_summary: &str, session: &mut SessionState) -> Result<String> {
        let patch = self
            .planner
            .plan(&PlannerRequest {
                user_message: request.text,
                memory_summary,
                session: &*session,
                now: request.now,
            })
            .context("plan turn")?;
        validate_plan_contract(&patch)?;
        debug!(goal_type = %patch.goal_type, priority = patch.priority, "planner proposed goal");
        Ok(apply_plan(session, &patch, request.now)?)
    }

    #[instrument(skip_all)]
    fn dispatch(&self, request: &TurnRequest<'_>, memory_summary: &str, session: &SessionState) -> Result<DispatchOutcome> {
        let active_goal = session.active_goal().ok_or(DialogueError::NoActiveGoal)?;
        dispatch_specialist(
            &self.specialists,
            &self.tools,
            request.text,
            memory_summary,
            active_goal,
        )
    }

    #[instrument(skip_all)]
    fn persist(&self, session: &mut SessionState, now: DateTime<Utc>) -> Result<()> {
        session.touch(now);
        check_session(session)?;
        self.store.save(session).context("save session")
    }

    #[instrument(skip_all, fields(customer_id = %session.customer_id))]
    fn write_memory(&self, session: &SessionState, memory_update: &str) -> Result<()> {
        self.memory
            .write_summary(&session.customer_id, memory_update)
            .context("write memory")
    }
}

fn finalize_reply(outcome: &DispatchOutcome) -> Result<String, DialogueError> {
    let reply = outcome.message.trim();
    if reply.is_empty() {
        return Err(DialogueError::validation("specialist returned empty message"));
    }
    Ok(reply.to_string())
}
