//! Validation tools - syntax, reference, and handler-presence checks

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

pub struct ValidateSyntaxTool;

#[async_trait]
impl Tool for ValidateSyntaxTool {
    fn name(&self) -> &'static str {
        "validate_syntax"
    }

    fn description(&self) -> &'static str {
        "Run the language-aware syntax check on a file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Validation
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
        let path = ctx.resolve(filepath);

        match std::fs::read_to_string(&path) {
            Ok(source) => {
                let report = ctx.checker.check(&path, &source);
                ToolOutcome::ok(
                    self.name(),
                    serde_json::json!({
                        "filepath": filepath,
                        "ok": report.ok,
                        "language": report.language,
                        "issues": report.issues,
                    }),
                )
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("read failed: {}", e)),
        }
    }
}

/// Attribute/dict/method existence heuristics over a single file
pub struct ValidateReferencesTool;

impl ValidateReferencesTool {
    fn check_source(source: &str) -> Vec<String> {
        let mut issues = Vec::new();

        // Names defined in this file: functions, methods, assignments
        let def_re = Regex::new(r"(?m)^\s*(?:def|fn|function)\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static regex");
        let attr_assign_re = Regex::new(r"self\.([A-Za-z_][A-Za-z0-9_]*)\s*=").expect("static regex");
        let defined: HashSet<String> = def_re
            .captures_iter(source)
            .map(|c| c[1].to_string())
            .chain(attr_assign_re.captures_iter(source).map(|c| c[1].to_string()))
            .collect();

        // self.X() method calls should resolve to a def or an assigned attribute
        let self_call_re = Regex::new(r"self\.([A-Za-z_][A-Za-z0-9_]*)\(").expect("static regex");
        for capture in self_call_re.captures_iter(source) {
            let name = &capture[1];
            if !defined.contains(name) {
                issues.push(format!("method 'self.{}' is called but never defined here", name));
            }
        }

        // dict["key"] access against dict literals defined in-file is too
        // noisy to resolve reliably; flag only the empty-key smell
        if source.contains("[\"\"]") || source.contains("['']") {
            issues.push("dict access with empty string key".to_string());
        }

        issues.sort();
        issues.dedup();
        issues
    }
}

#[async_trait]
impl Tool for ValidateReferencesTool {
    fn name(&self) -> &'static str {
        "validate_references"
    }

    fn description(&self) -> &'static str {
        "Check attribute access and method existence within a file."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Validation
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
                let issues = Self::check_source(&source);
                ToolOutcome::ok(
                    self.name(),
                    serde_json::json!({
                        "filepath": filepath,
                        "ok": issues.is_empty(),
                        "issues": issues,
                    }),
                )
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("read failed: {}", e)),
        }
    }
}

/// Checks that named tools actually resolve in the running registry
pub struct ValidateToolHandlersTool;

#[async_trait]
impl Tool for ValidateToolHandlersTool {
    fn name(&self) -> &'static str {
        "validate_tool_handlers"
    }

    fn description(&self) -> &'static str {
        "Check that the named tools have registered handlers."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Validation
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tools": { "type": "array", "description": "Tool names to check" }
            },
            "required": ["tools"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(names) = args["tools"].as_array() else {
            return ToolOutcome::failed(self.name(), "tools must be an array of names");
        };

        let missing: Vec<String> = names
            .iter()
            .filter_map(|n| n.as_str())
            .filter(|n| !ctx.known_tools.iter().any(|k| k == n))
            .map(|n| n.to_string())
            .collect();

        ToolOutcome::ok(
            self.name(),
            serde_json::json!({
                "ok": missing.is_empty(),
                "missing": missing,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_flags_undefined_method() {
        let source = "class A:\n    def known(self):\n        self.unknown()\n";
        let issues = ValidateReferencesTool::check_source(source);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("unknown"));
    }

    #[test]
    fn test_references_accepts_defined_and_assigned() {
        let source = "class A:\n    def setup(self):\n        self.handler = make()\n        self.handler()\n        self.setup()\n";
        let issues = ValidateReferencesTool::check_source(source);
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }
}
