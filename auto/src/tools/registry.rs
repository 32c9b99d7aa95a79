//! ToolRegistry - definitions, per-phase filtering, validation, repair
//!
//! Unknown tools come back as failed outcomes with a diagnostic, never a
//! panic and never a silent drop. A call with an empty name gets a
//! best-effort name inferred from its argument shape before being given
//! up on; malformed model output must not be able to stall the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ToolCall, ToolDefinition};
use crate::phases::PhaseKind;

use super::builtin;
use super::context::ToolCtx;
use super::traits::{Tool, ToolCategory, ToolOutcome};

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the full built-in tool set
    pub fn standard() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };
        for tool in builtin::all() {
            registry.add(tool);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tool categories each phase is permitted to call
    pub fn categories_for_phase(phase: PhaseKind) -> &'static [ToolCategory] {
        use ToolCategory::*;
        match phase {
            PhaseKind::Planning => &[TaskOps, Analysis, Reporting],
            PhaseKind::Coding => &[FileOps, TaskOps, Analysis, Validation],
            PhaseKind::Qa => &[FileOps, TaskOps, Analysis, Validation, Reporting],
            PhaseKind::Debugging => &[FileOps, TaskOps, Validation, Analysis, Reporting],
            PhaseKind::Investigation => &[FileOps, Analysis, Reporting],
            PhaseKind::ApplicationTroubleshooting => &[FileOps, TaskOps, Analysis, Reporting],
            PhaseKind::Documentation => &[FileOps, TaskOps],
            PhaseKind::ProjectPlanning => &[TaskOps, Analysis, Reporting],
            PhaseKind::Refactoring => &[FileOps, TaskOps, Analysis, Validation, Reporting],
            PhaseKind::PromptDesign
            | PhaseKind::PromptImprovement
            | PhaseKind::RoleDesign
            | PhaseKind::RoleImprovement
            | PhaseKind::ToolDesign
            | PhaseKind::ToolEvaluation => &[Meta, Reporting],
        }
    }

    /// Definitions the given phase may call, alphabetical for determinism
    pub fn definitions_for_phase(&self, phase: PhaseKind) -> Vec<ToolDefinition> {
        let categories = Self::categories_for_phase(phase);
        let mut tools: Vec<&Arc<dyn Tool>> = self
            .tools
            .values()
            .filter(|t| categories.contains(&t.category()))
            .collect();
        tools.sort_by_key(|t| t.name());
        tools
            .into_iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.schema()))
            .collect()
    }

    /// Validate args against the tool's schema: required fields present,
    /// declared types respected
    fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
        let object = match args {
            Value::Object(map) => map,
            Value::Null => {
                return match schema["required"].as_array() {
                    Some(required) if !required.is_empty() => {
                        Err(format!("missing required argument '{}'", required[0].as_str().unwrap_or("?")))
                    }
                    _ => Ok(()),
                };
            }
            _ => return Err("arguments must be a JSON object".to_string()),
        };

        if let Some(required) = schema["required"].as_array() {
            for field in required {
                let name = field.as_str().unwrap_or_default();
                if !object.contains_key(name) {
                    return Err(format!("missing required argument '{}'", name));
                }
            }
        }

        if let Some(props) = schema["properties"].as_object() {
            for (name, spec) in props {
                let Some(value) = object.get(name) else { continue };
                let Some(expected) = spec["type"].as_str() else { continue };
                let ok = match expected {
                    "string" => value.is_string(),
                    "integer" => value.is_i64() || value.is_u64(),
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    "array" => value.is_array(),
                    "object" => value.is_object(),
                    _ => true,
                };
                if !ok {
                    return Err(format!("argument '{}' must be a {}", name, expected));
                }
            }
        }

        Ok(())
    }

    /// Execute one call; every failure mode is a failed outcome, not an error
    pub async fn execute(&self, call: &ToolCall, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let mut name = call.name.trim().to_string();
        let mut inferred = false;

        if name.is_empty() {
            match infer_tool_name(&call.arguments) {
                Some(guess) => {
                    warn!(guess = %guess, args = %call.arguments, "empty tool name; inferred from argument shape");
                    name = guess.to_string();
                    inferred = true;
                }
                None => {
                    return ToolOutcome::failed(
                        "(unnamed)",
                        "tool call had an empty name and no inferable argument shape",
                    );
                }
            }
        }

        let Some(tool) = self.tools.get(&name) else {
            return ToolOutcome::failed(name.clone(), format!("unknown tool '{}'", name));
        };

        if let Err(reason) = Self::validate_args(&tool.schema(), &call.arguments) {
            return ToolOutcome::failed(name, reason);
        }

        debug!(tool = %name, phase = %ctx.phase, "executing tool");
        let mut outcome = tool.execute(&call.arguments, ctx).await;
        if inferred {
            outcome = outcome.with_detail("inferred_name", Value::Bool(true));
        }
        outcome
    }

    /// Execute calls in the order the model returned them
    pub async fn execute_all(&self, calls: &[ToolCall], ctx: &mut ToolCtx<'_>) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute(call, ctx).await);
        }
        outcomes
    }
}

/// Guess a tool name from argument shape; used only for empty-name repair
///
/// The heuristics mirror how the specialist models actually misbehave: a
/// bare file path is an approval, a path plus issue text is a QA report, a
/// path plus content is a file write, a description is a task proposal.
pub fn infer_tool_name(args: &Value) -> Option<&'static str> {
    let object = args.as_object()?;
    let has = |keys: &[&str]| keys.iter().any(|k| object.contains_key(*k));

    let has_path = has(&["filepath", "file_path", "path", "target_file"]);
    let has_issue = has(&["issue", "issues", "error", "errors", "severity", "problem"]);
    let has_content = has(&["content", "source", "code"]);
    let has_description = has(&["description"]);

    if has_path && has_content {
        Some("create_file")
    } else if has_path && has_issue {
        Some("report_qa_issue")
    } else if has_description && !has_path {
        Some("create_task")
    } else if has_path {
        // A lone file path with no issue fields reads as an approval
        Some("approve_code")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BasicAnalyzer, BasicSyntaxChecker};
    use crate::bus::MessageBus;
    use crate::patch::PatchLayer;
    use crate::state::PipelineState;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _temp: TempDir,
        patcher: PatchLayer,
        bus: MessageBus,
        state: PipelineState,
        analyzer: BasicAnalyzer,
        project_root: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let project_root = temp.path().to_path_buf();
        let patcher = PatchLayer::new(
            &project_root,
            temp.path().join("patches"),
            std::sync::Arc::new(BasicSyntaxChecker),
        )
        .unwrap();
        Fixture {
            _temp: temp,
            patcher,
            bus: MessageBus::new(50),
            state: PipelineState::default(),
            analyzer: BasicAnalyzer::default(),
            project_root,
        }
    }

    impl Fixture {
        fn ctx(&mut self) -> ToolCtx<'_> {
            ToolCtx {
                state: &mut self.state,
                bus: &self.bus,
                patcher: &self.patcher,
                analyzer: &self.analyzer,
                checker: &BasicSyntaxChecker,
                project_root: &self.project_root,
                reports_dir: &self.project_root,
                phase: PhaseKind::Coding,
                known_tools: vec![],
            }
        }
    }

    #[test]
    fn test_standard_registry_has_required_tools() {
        let registry = ToolRegistry::standard();
        for name in [
            "create_file",
            "modify_file",
            "append_file",
            "delete_file",
            "read_file",
            "list_files",
            "create_task",
            "update_task",
            "complete_task",
            "create_refactoring_task",
            "update_refactoring_task",
            "list_refactoring_tasks",
            "refactoring_progress",
            "detect_duplicates",
            "compare_files",
            "find_dead_code",
            "find_integration_gaps",
            "build_call_graph",
            "measure_complexity",
            "check_architecture",
            "validate_syntax",
            "validate_references",
            "validate_tool_handlers",
            "create_issue_report",
            "request_developer_review",
            "approve_code",
            "report_qa_issue",
            "propose_design",
            "evaluate_design",
        ] {
            assert!(registry.has_tool(name), "missing tool {}", name);
        }
    }

    #[test]
    fn test_phase_filtering() {
        let registry = ToolRegistry::standard();

        let planning = registry.definitions_for_phase(PhaseKind::Planning);
        assert!(planning.iter().any(|d| d.name == "create_task"));
        assert!(planning.iter().all(|d| d.name != "create_file"));

        let coding = registry.definitions_for_phase(PhaseKind::Coding);
        assert!(coding.iter().any(|d| d.name == "create_file"));

        let meta = registry.definitions_for_phase(PhaseKind::ToolDesign);
        assert!(meta.iter().any(|d| d.name == "propose_design"));
        assert!(meta.iter().all(|d| d.name != "create_file"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_panicking() {
        let registry = ToolRegistry::standard();
        let mut fx = fixture();
        let mut ctx = fx.ctx();

        let call = ToolCall::new("summon_demon", serde_json::json!({}));
        let outcome = registry.execute(&call, &mut ctx).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_missing_required_arg_fails_cleanly() {
        let registry = ToolRegistry::standard();
        let mut fx = fixture();
        let mut ctx = fx.ctx();

        let call = ToolCall::new("create_file", serde_json::json!({"filepath": "x.py"}));
        let outcome = registry.execute(&call, &mut ctx).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("content"));
    }

    #[tokio::test]
    async fn test_wrong_arg_type_fails_cleanly() {
        let registry = ToolRegistry::standard();
        let mut fx = fixture();
        let mut ctx = fx.ctx();

        let call = ToolCall::new("create_file", serde_json::json!({"filepath": 42, "content": "x"}));
        let outcome = registry.execute(&call, &mut ctx).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("filepath"));
    }

    #[test]
    fn test_infer_name_shapes() {
        // Bare path, no issue fields: approval (the Scenario D shape)
        assert_eq!(
            infer_tool_name(&serde_json::json!({"filepath": "src/ui.py"})),
            Some("approve_code")
        );
        assert_eq!(
            infer_tool_name(&serde_json::json!({"filepath": "x.py", "content": "pass"})),
            Some("create_file")
        );
        assert_eq!(
            infer_tool_name(&serde_json::json!({"filepath": "x.py", "error": "boom"})),
            Some("report_qa_issue")
        );
        assert_eq!(
            infer_tool_name(&serde_json::json!({"description": "do the thing"})),
            Some("create_task")
        );
        assert_eq!(infer_tool_name(&serde_json::json!({"whatever": 1})), None);
        assert_eq!(infer_tool_name(&serde_json::json!("not an object")), None);
    }

    #[tokio::test]
    async fn test_empty_name_infers_approve_code() {
        let registry = ToolRegistry::standard();
        let mut fx = fixture();
        let mut ctx = fx.ctx();

        let call = ToolCall::new("", serde_json::json!({"filepath": "src/ui.py"}));
        let outcome = registry.execute(&call, &mut ctx).await;

        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.tool, "approve_code");
        assert_eq!(outcome.details["inferred_name"], true);
    }

    #[tokio::test]
    async fn test_empty_name_uninferable_fails_but_continues() {
        let registry = ToolRegistry::standard();
        let mut fx = fixture();
        let mut ctx = fx.ctx();

        let calls = vec![
            ToolCall::new("", serde_json::json!({"nonsense": true})),
            ToolCall::new("read_file", serde_json::json!({"filepath": "missing.py"})),
        ];
        let outcomes = registry.execute_all(&calls, &mut ctx).await;

        // First call failed, second still ran
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
    }
}
