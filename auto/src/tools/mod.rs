//! Tool system - the only way phases produce effects
//!
//! Tools are named, typed, side-effecting operations. The registry owns the
//! definitions, filters them per phase, validates arguments against each
//! tool's schema, and repairs malformed calls where it can.

pub mod builtin;
mod context;
mod registry;
mod traits;

pub use context::ToolCtx;
pub use registry::{ToolRegistry, infer_tool_name};
pub use traits::{Tool, ToolCategory, ToolOutcome};
