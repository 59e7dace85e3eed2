//! Goal-stack dialogue orchestrator.
//!
//! Each user message runs one turn: a planner proposes the goal the message
//! is about, the goal stack interleaves or resumes work, a specialist for the
//! goal's namespace answers (optionally after one round of tool calls), and
//! the updated session is persisted as the turn's single commit point.
//!
//! - **[`core`]**: Pure goal-stack logic, invariants and response validation.
//!   No I/O; time is passed in.
//! - **[`io`]**: Session store, customer memory, config and model backends.
//! - **[`agents`]** and **[`tools`]**: Planner, specialists and the tool gateway.
//!
//! [`turn`] wires them into the per-turn pipeline; [`replay`] drives it from
//! a script for the CLI.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod replay;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
pub mod turn;
