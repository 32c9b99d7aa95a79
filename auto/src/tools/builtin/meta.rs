//! Meta tools - proposing and evaluating new tools, prompts, and roles
//!
//! Only reachable from the meta phases, which ship disabled. Proposals are
//! recorded as documents for the developer; nothing is self-modifying.

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{BusMessage, MessageType};
use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

const DESIGN_KINDS: [&str; 3] = ["tool", "prompt", "role"];

fn proposal_path(reports_dir: &std::path::Path, kind: &str, name: &str) -> std::path::PathBuf {
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    reports_dir.join(format!("PROPOSAL_{}_{}.md", kind, safe))
}

pub struct ProposeDesignTool;

#[async_trait]
impl Tool for ProposeDesignTool {
    fn name(&self) -> &'static str {
        "propose_design"
    }

    fn description(&self) -> &'static str {
        "Propose a new tool, prompt, or role design for developer review."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Meta
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "description": "tool|prompt|role" },
                "name": { "type": "string" },
                "rationale": { "type": "string" },
                "draft": { "type": "string" }
            },
            "required": ["kind", "name", "rationale"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let (Some(kind), Some(name), Some(rationale)) = (
            args["kind"].as_str(),
            args["name"].as_str(),
            args["rationale"].as_str(),
        ) else {
            return ToolOutcome::failed(self.name(), "kind, name, and rationale are required");
        };
        if !DESIGN_KINDS.contains(&kind) {
            return ToolOutcome::failed(self.name(), format!("kind must be one of {:?}", DESIGN_KINDS));
        }

        let path = proposal_path(ctx.reports_dir, kind, name);
        let mut content = format!("# {} proposal: {}\n\n## Rationale\n\n{}\n", kind, name, rationale);
        if let Some(draft) = args["draft"].as_str() {
            content.push_str("\n## Draft\n\n");
            content.push_str(draft);
            content.push('\n');
        }

        if let Err(e) = std::fs::create_dir_all(ctx.reports_dir).and_then(|_| std::fs::write(&path, content)) {
            return ToolOutcome::failed(self.name(), format!("proposal write failed: {}", e));
        }

        ctx.bus.publish(
            BusMessage::broadcast(ctx.phase.name(), MessageType::Info)
                .with_payload(serde_json::json!({"proposal": path.display().to_string()})),
        );

        ToolOutcome::ok(
            self.name(),
            serde_json::json!({"kind": kind, "name": name, "proposal": path.display().to_string()}),
        )
        .with_effect()
    }
}

pub struct EvaluateDesignTool;

#[async_trait]
impl Tool for EvaluateDesignTool {
    fn name(&self) -> &'static str {
        "evaluate_design"
    }

    fn description(&self) -> &'static str {
        "Record an evaluation verdict against an existing design proposal."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Meta
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string" },
                "name": { "type": "string" },
                "verdict": { "type": "string", "description": "accept|revise|reject" },
                "notes": { "type": "string" }
            },
            "required": ["kind", "name", "verdict"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let (Some(kind), Some(name), Some(verdict)) = (
            args["kind"].as_str(),
            args["name"].as_str(),
            args["verdict"].as_str(),
        ) else {
            return ToolOutcome::failed(self.name(), "kind, name, and verdict are required");
        };

        let path = proposal_path(ctx.reports_dir, kind, name);
        if !path.exists() {
            return ToolOutcome::failed(self.name(), format!("no proposal on file for {} '{}'", kind, name));
        }

        let mut addendum = format!(
            "\n## Evaluation ({})\n\nVerdict: {}\n",
            chrono::Utc::now().to_rfc3339(),
            verdict
        );
        if let Some(notes) = args["notes"].as_str() {
            addendum.push_str(notes);
            addendum.push('\n');
        }

        let mut existing = std::fs::read_to_string(&path).unwrap_or_default();
        existing.push_str(&addendum);
        if let Err(e) = std::fs::write(&path, existing) {
            return ToolOutcome::failed(self.name(), format!("evaluation write failed: {}", e));
        }

        ToolOutcome::ok(
            self.name(),
            serde_json::json!({"kind": kind, "name": name, "verdict": verdict}),
        )
        .with_effect()
    }
}
