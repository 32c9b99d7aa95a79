//! Autonomy - autonomous software-development pipeline
//!
//! Given a target source tree and a high-level objective, the pipeline
//! drives specialist language models through a cyclic graph of phases
//! (planning, coding, QA, debugging, refactoring, documentation, and the
//! rest) until the objectives are satisfied or a human is asked to step
//! in. Patches are applied to disk through a sanitizing, archiving write
//! layer; the program under test runs supervised in its own process group.
//!
//! # Modules
//!
//! - [`orchestrator`] - scheduler: tactical decision tree + polytopic fallback
//! - [`phases`] - the phase graph and the shared execution kernel
//! - [`tools`] - typed, side-effecting operations the models invoke
//! - [`llm`] - model client with fallback hosts
//! - [`bus`] - in-process pub/sub with bounded history
//! - [`state`] - the persistent aggregate and its store
//! - [`patch`] - entity sanitation, syntax gate, atomic writes, patch archive
//! - [`supervisor`] - process-group supervision of the program under test

pub mod analysis;
pub mod bus;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod ipc;
pub mod lifecycle;
pub mod llm;
pub mod loopdetect;
pub mod orchestrator;
pub mod patch;
pub mod phases;
pub mod reports;
pub mod state;
pub mod supervisor;
pub mod tools;

// Re-export commonly used types
pub use bus::{BusMessage, MessageBus, MessageFilter, MessagePriority, MessageType};
pub use config::{Config, LlmConfig, ThresholdConfig};
pub use domain::{Objective, ObjectiveLevel, ObjectiveStatus, Priority, Task, TaskCategory, TaskStatus};
pub use errors::PipelineError;
pub use lifecycle::LifecycleStage;
pub use llm::{ChatRequest, ChatResponse, LlmClient, LlmError, MockLlmClient, ModelRole, ToolCall, ToolDefinition};
pub use orchestrator::{Decision, Orchestrator, PipelineMetrics, RunOptions};
pub use phases::{DimensionalProfile, PhaseKernel, PhaseKind, PhaseOutcome, SituationVector};
pub use state::{PipelineState, StateStore};
pub use supervisor::{ChildStatus, MonitorVerdict, RunMode, Supervisor, WaitOutcome};
pub use tools::{Tool, ToolCategory, ToolOutcome, ToolRegistry};
