//! File operation tools
//!
//! All source writes route through the patch layer: sanitation, syntax
//! gate, atomic replace, archive. A syntax-rejected payload is still
//! written and the outcome carries `file_saved` + `needs_debugging` so the
//! orchestrator routes the file to debugging.

use async_trait::async_trait;
use serde_json::Value;

use crate::patch::WriteReport;
use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

fn filepath_arg(args: &Value) -> Option<&str> {
    args["filepath"]
        .as_str()
        .or_else(|| args["file_path"].as_str())
        .or_else(|| args["path"].as_str())
}

/// Shared outcome shaping for the writing tools
fn write_outcome(tool: &'static str, filepath: &str, report: WriteReport, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
    if report.needs_debugging {
        ctx.flag_needs_debugging(filepath, &report.issues);
        let mut outcome = ToolOutcome::failed(tool, format!("syntax check failed: {}", report.issues.join("; ")));
        outcome.effect = true; // the file did change on disk
        outcome
            .with_detail("file_saved", Value::Bool(true))
            .with_detail("needs_debugging", Value::Bool(true))
            .with_detail("filepath", Value::String(filepath.to_string()))
    } else {
        ToolOutcome::ok(
            tool,
            serde_json::json!({
                "filepath": filepath,
                "file_saved": true,
                "sanitized": report.sanitized,
            }),
        )
        .with_effect()
    }
}

pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &'static str {
        "create_file"
    }

    fn description(&self) -> &'static str {
        "Create a source file with the given content. Content must use standard JSON string escaping."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string", "description": "Path relative to the project root" },
                "content": { "type": "string", "description": "Complete file content" }
            },
            "required": ["filepath", "content"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(filepath) = filepath_arg(args) else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };
        let filepath = filepath.to_string();
        let content = args["content"].as_str().unwrap_or_default();

        match ctx.patcher.apply(&filepath, content) {
            Ok(report) => write_outcome(self.name(), &filepath, report, ctx),
            Err(e) => ToolOutcome::failed(self.name(), format!("write failed: {}", e)),
        }
    }
}

pub struct ModifyFileTool;

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &'static str {
        "modify_file"
    }

    fn description(&self) -> &'static str {
        "Replace the content of an existing source file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["filepath", "content"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(filepath) = filepath_arg(args) else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };
        let filepath = filepath.to_string();
        if !ctx.resolve(&filepath).exists() {
            return ToolOutcome::failed(self.name(), format!("{} does not exist; use create_file", filepath));
        }
        let content = args["content"].as_str().unwrap_or_default();

        match ctx.patcher.apply(&filepath, content) {
            Ok(report) => write_outcome(self.name(), &filepath, report, ctx),
            Err(e) => ToolOutcome::failed(self.name(), format!("write failed: {}", e)),
        }
    }
}

pub struct AppendFileTool;

#[async_trait]
impl Tool for AppendFileTool {
    fn name(&self) -> &'static str {
        "append_file"
    }

    fn description(&self) -> &'static str {
        "Append content to a file, creating it when absent."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["filepath", "content"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(filepath) = filepath_arg(args) else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };
        let filepath = filepath.to_string();
        let content = args["content"].as_str().unwrap_or_default();

        match ctx.patcher.append(&filepath, content) {
            Ok(report) => write_outcome(self.name(), &filepath, report, ctx),
            Err(e) => ToolOutcome::failed(self.name(), format!("append failed: {}", e)),
        }
    }
}

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn description(&self) -> &'static str {
        "Delete a source file. The removal is archived as a patch."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
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
        let Some(filepath) = filepath_arg(args) else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };

        match ctx.patcher.delete(filepath) {
            Ok(Some(_)) => ToolOutcome::ok(self.name(), serde_json::json!({"deleted": filepath})).with_effect(),
            Ok(None) => ToolOutcome::failed(self.name(), format!("{} does not exist", filepath)),
            Err(e) => ToolOutcome::failed(self.name(), format!("delete failed: {}", e)),
        }
    }
}

/// Read cap keeps a single tool result from flooding the conversation
const READ_CAP: usize = 16 * 1024;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a source file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
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
        let Some(filepath) = filepath_arg(args) else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };

        match std::fs::read_to_string(ctx.resolve(filepath)) {
            Ok(mut content) => {
                let truncated = content.len() > READ_CAP;
                if truncated {
                    content.truncate(READ_CAP);
                }
                ToolOutcome::ok(
                    self.name(),
                    serde_json::json!({
                        "filepath": filepath,
                        "content": content,
                        "truncated": truncated,
                    }),
                )
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("read failed: {}", e)),
        }
    }
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List project files matching a glob pattern (default: all files)."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::FileOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern relative to the project root" }
            }
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let pattern = args["pattern"].as_str().unwrap_or("**/*");
        let full_pattern = ctx.project_root.join(pattern).display().to_string();

        match glob::glob(&full_pattern) {
            Ok(paths) => {
                let files: Vec<String> = paths
                    .filter_map(|p| p.ok())
                    .filter(|p| p.is_file())
                    .filter_map(|p| {
                        p.strip_prefix(ctx.project_root)
                            .map(|r| r.display().to_string())
                            .ok()
                    })
                    .collect();
                ToolOutcome::ok(self.name(), serde_json::json!({"files": files, "count": files.len()}))
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("bad pattern: {}", e)),
        }
    }
}
