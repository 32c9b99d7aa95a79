//! Analysis tools - thin adapters over the Analyzer seam

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

pub struct DetectDuplicatesTool;

#[async_trait]
impl Tool for DetectDuplicatesTool {
    fn name(&self) -> &'static str {
        "detect_duplicates"
    }

    fn description(&self) -> &'static str {
        "Find files that look like copies or parallel versions of each other."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let groups = ctx.analyzer.detect_duplicates(ctx.project_root);
        let count = groups.len();
        ToolOutcome::ok(self.name(), serde_json::json!({"groups": groups, "count": count}))
    }
}

pub struct CompareFilesTool;

#[async_trait]
impl Tool for CompareFilesTool {
    fn name(&self) -> &'static str {
        "compare_files"
    }

    fn description(&self) -> &'static str {
        "Compare two files and report similarity."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_a": { "type": "string" },
                "file_b": { "type": "string" }
            },
            "required": ["file_a", "file_b"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let (Some(a), Some(b)) = (args["file_a"].as_str(), args["file_b"].as_str()) else {
            return ToolOutcome::failed(self.name(), "file_a and file_b are required");
        };

        match ctx.analyzer.compare_files(&ctx.resolve(a), &ctx.resolve(b)) {
            Ok(cmp) => ToolOutcome::ok(self.name(), serde_json::to_value(cmp).unwrap_or_default()),
            Err(e) => ToolOutcome::failed(self.name(), format!("compare failed: {}", e)),
        }
    }
}

pub struct FindDeadCodeTool;

#[async_trait]
impl Tool for FindDeadCodeTool {
    fn name(&self) -> &'static str {
        "find_dead_code"
    }

    fn description(&self) -> &'static str {
        "Find functions that appear unused anywhere in the project."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let findings = ctx.analyzer.dead_code(ctx.project_root);
        let count = findings.len();
        ToolOutcome::ok(self.name(), serde_json::json!({"findings": findings, "count": count}))
    }
}

pub struct FindIntegrationGapsTool;

#[async_trait]
impl Tool for FindIntegrationGapsTool {
    fn name(&self) -> &'static str {
        "find_integration_gaps"
    }

    fn description(&self) -> &'static str {
        "Find stub bodies and unimplemented seams."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let findings = ctx.analyzer.integration_gaps(ctx.project_root);
        let count = findings.len();
        ToolOutcome::ok(self.name(), serde_json::json!({"findings": findings, "count": count}))
    }
}

pub struct BuildCallGraphTool;

#[async_trait]
impl Tool for BuildCallGraphTool {
    fn name(&self) -> &'static str {
        "build_call_graph"
    }

    fn description(&self) -> &'static str {
        "Build a coarse cross-file call graph."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let graph = ctx.analyzer.call_graph(ctx.project_root);
        ToolOutcome::ok(self.name(), serde_json::to_value(graph).unwrap_or_default())
    }
}

pub struct MeasureComplexityTool;

#[async_trait]
impl Tool for MeasureComplexityTool {
    fn name(&self) -> &'static str {
        "measure_complexity"
    }

    fn description(&self) -> &'static str {
        "Measure branch complexity of a file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string" }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(filepath) = args["filepath"].as_str() else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };

        match std::fs::read_to_string(ctx.resolve(filepath)) {
            Ok(source) => {
                let report = ctx.analyzer.complexity(&source);
                ToolOutcome::ok(self.name(), serde_json::to_value(report).unwrap_or_default())
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("read failed: {}", e)),
        }
    }
}

pub struct CheckArchitectureTool;

#[async_trait]
impl Tool for CheckArchitectureTool {
    fn name(&self) -> &'static str {
        "check_architecture"
    }

    fn description(&self) -> &'static str {
        "Check the tree for naming drift and architectural inconsistency."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "proposed_file": { "type": "string", "description": "Optionally check a proposed new file name for conflicts" }
            }
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        if let Some(proposed) = args["proposed_file"].as_str() {
            return match ctx.analyzer.name_conflict(ctx.project_root, proposed) {
                Some(existing) => ToolOutcome::ok(
                    self.name(),
                    serde_json::json!({"conflict": true, "existing": existing, "proposed": proposed}),
                ),
                None => ToolOutcome::ok(self.name(), serde_json::json!({"conflict": false, "proposed": proposed})),
            };
        }

        let findings = ctx.analyzer.architecture_consistency(ctx.project_root);
        let count = findings.len();
        ToolOutcome::ok(self.name(), serde_json::json!({"findings": findings, "count": count}))
    }
}
