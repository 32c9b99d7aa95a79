//! Tool trait and execution outcome

use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolCtx;

/// Permission grouping; phases are granted categories, not single tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    FileOps,
    TaskOps,
    Analysis,
    Validation,
    Reporting,
    Meta,
}

/// A named, typed, side-effecting operation
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as the model calls it
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn category(&self) -> ToolCategory;

    /// JSON Schema for the arguments
    fn schema(&self) -> Value;

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome;
}

/// Structured result of one tool execution
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,

    pub success: bool,

    /// Whether the call had an observable effect (file write, task
    /// creation, state mutation); drives the no-update counter
    pub effect: bool,

    pub details: Value,

    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(tool: impl Into<String>, details: Value) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            effect: false,
            details,
            error: None,
        }
    }

    pub fn failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            effect: false,
            details: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn with_effect(mut self) -> Self {
        self.effect = true;
        self
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        if !self.details.is_object() {
            self.details = serde_json::json!({});
        }
        self.details[key] = value;
        self
    }

    /// Rendering fed back into the conversation as the tool result
    pub fn render(&self) -> String {
        match &self.error {
            Some(error) => format!("{}: FAILED: {}", self.tool, error),
            None => format!("{}: ok {}", self.tool, self.details),
        }
    }
}
