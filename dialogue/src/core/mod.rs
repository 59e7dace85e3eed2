//! Deterministic, pure logic for goal tracking.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! session state and return deterministic outputs suitable for tests; time is
//! always passed in by the caller.

pub mod error;
pub mod invariants;
pub mod plan;
pub mod policy;
pub mod response_validator;
pub mod session;
pub mod state_update;
pub mod types;
