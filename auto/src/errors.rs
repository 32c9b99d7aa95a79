//! Pipeline error taxonomy
//!
//! Component-internal errors are translated into typed results before they
//! reach the main loop; only state corruption and abort conditions
//! terminate the process.

use thiserror::Error;

use crate::llm::LlmError;
use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fatal: the state artifact is unreadable
    #[error("state corrupt: {0}")]
    StateCorrupt(#[from] statestore::StoreError),

    /// Model servers unreachable after the whole fallback list
    #[error("remote model failure: {0}")]
    TransientRemote(#[from] LlmError),

    #[error("invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("syntax rejected for {file}")]
    SyntaxRejected { file: String },

    /// Non-fatal; triggers forced transitions until it becomes a meta-loop
    #[error("loop detected: {reason}")]
    LoopDetected { reason: String },

    /// Forced transitions themselves looping with no human response
    #[error("unrecoverable loop: {reason}")]
    UnrecoverableLoop { reason: String },

    #[error("user abort")]
    UserAbort,

    #[error("task too complex: {task_id}")]
    TaskTooComplex { task_id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit code for the CLI surface
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::UserAbort => 3,
            PipelineError::UnrecoverableLoop { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(PipelineError::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(PipelineError::UserAbort.exit_code(), 3);
        assert_eq!(
            PipelineError::UnrecoverableLoop {
                reason: "spin".to_string()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            PipelineError::InvalidToolCall("x".to_string()).exit_code(),
            1
        );
    }
}
