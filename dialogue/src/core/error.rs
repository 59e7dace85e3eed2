//! Error taxonomy for turn processing.

use thiserror::Error;

/// Classified failure raised by the dialogue core.
///
/// Collaborator failures (store, memory, model, tools) are not wrapped here;
/// they travel as `anyhow::Error` and the pipeline surfaces them unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    /// Bad caller input: empty session id or message, unsupported namespace.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A planner or specialist produced structurally invalid output.
    #[error("model response violates schema: {0}")]
    SchemaViolation(String),
    /// A referenced goal or session is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid status transition, stack corruption or blocked-invariant violation.
    #[error("invalid goal state: {0}")]
    State(String),
    #[error("active goal is missing")]
    NoActiveGoal,
}

/// Coarse classification of a [`DialogueError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    SchemaViolation,
    NotFound,
    State,
}

impl DialogueError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaViolation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DialogueError::Validation(_) => ErrorKind::Validation,
            DialogueError::SchemaViolation(_) => ErrorKind::SchemaViolation,
            DialogueError::NotFound(_) => ErrorKind::NotFound,
            DialogueError::State(_) | DialogueError::NoActiveGoal => ErrorKind::State,
        }
    }
}

/// Classify an `anyhow` error produced anywhere in a turn.
///
/// Returns `None` for collaborator failures that carry no dialogue error.
pub fn classify(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<DialogueError>().map(DialogueError::kind)
}
