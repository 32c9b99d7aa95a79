//! Reporting tools - issue reports, review requests, approvals

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{BusMessage, MessagePriority, MessageType};
use crate::domain::{Priority, Task, TaskStatus};
use crate::reports;
use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

pub struct CreateIssueReportTool;

#[async_trait]
impl Tool for CreateIssueReportTool {
    fn name(&self) -> &'static str {
        "create_issue_report"
    }

    fn description(&self) -> &'static str {
        "Write a human-readable issue report under reports/."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Reporting
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "body": { "type": "string" },
                "filepath": { "type": "string" }
            },
            "required": ["title", "body"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let (Some(title), Some(body)) = (args["title"].as_str(), args["body"].as_str()) else {
            return ToolOutcome::failed(self.name(), "title and body are required");
        };
        let filepath = args["filepath"].as_str();

        let issue_id = uuid::Uuid::now_v7().to_string();
        match reports::write_issue_report(ctx.reports_dir, &issue_id, title, body, filepath) {
            Ok(path) => {
                let mut msg = BusMessage::broadcast(ctx.phase.name(), MessageType::IssueReported)
                    .with_payload(serde_json::json!({"title": title, "report": path.display().to_string()}));
                msg.issue_id = Some(issue_id.clone());
                if let Some(file) = filepath {
                    msg.file_path = Some(file.to_string());
                }
                ctx.bus.publish(msg);

                ToolOutcome::ok(
                    self.name(),
                    serde_json::json!({"issue_id": issue_id, "report": path.display().to_string()}),
                )
                .with_effect()
            }
            Err(e) => ToolOutcome::failed(self.name(), format!("report write failed: {}", e)),
        }
    }
}

pub struct RequestDeveloperReviewTool;

#[async_trait]
impl Tool for RequestDeveloperReviewTool {
    fn name(&self) -> &'static str {
        "request_developer_review"
    }

    fn description(&self) -> &'static str {
        "Block a task pending developer review and raise a critical notice."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Reporting
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string" },
                "reason": { "type": "string" }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(reason) = args["reason"].as_str() else {
            return ToolOutcome::failed(self.name(), "reason is required");
        };
        let task_id = args["task_id"].as_str();

        if let Some(id) = task_id {
            match ctx.state.tasks.get_mut(id) {
                Some(task) => {
                    task.advance_status(TaskStatus::Blocked);
                }
                None => return ToolOutcome::failed(self.name(), format!("unknown task '{}'", id)),
            }
        }

        let mut msg = BusMessage::broadcast(ctx.phase.name(), MessageType::UserInputRequired)
            .with_priority(MessagePriority::Critical)
            .with_payload(serde_json::json!({"reason": reason}));
        if let Some(id) = task_id {
            msg.task_id = Some(id.to_string());
        }
        ctx.bus.publish(msg);

        ToolOutcome::ok(self.name(), serde_json::json!({"blocked_task": task_id, "reason": reason})).with_effect()
    }
}

pub struct ApproveCodeTool;

#[async_trait]
impl Tool for ApproveCodeTool {
    fn name(&self) -> &'static str {
        "approve_code"
    }

    fn description(&self) -> &'static str {
        "Approve a file under review; completes its QA_PENDING task if one exists."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Reporting
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
        let Some(filepath) = args["filepath"]
            .as_str()
            .or_else(|| args["file_path"].as_str())
            .or_else(|| args["path"].as_str())
        else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };

        let mut completed_task = None;
        for task in ctx.state.tasks.values_mut() {
            if task.status == TaskStatus::QaPending && task.target_file.as_deref() == Some(filepath) {
                task.advance_status(TaskStatus::Completed);
                completed_task = Some(task.id.clone());
                break;
            }
        }
        if completed_task.is_some() {
            ctx.state.refresh_objective_completion();
        }

        ctx.bus.publish(
            BusMessage::broadcast(ctx.phase.name(), MessageType::QaApproval)
                .with_file(filepath.to_string())
                .with_payload(serde_json::json!({"approved": true})),
        );

        ToolOutcome::ok(
            self.name(),
            serde_json::json!({"filepath": filepath, "completed_task": completed_task}),
        )
        .with_effect()
    }
}

pub struct ReportQaIssueTool;

#[async_trait]
impl Tool for ReportQaIssueTool {
    fn name(&self) -> &'static str {
        "report_qa_issue"
    }

    fn description(&self) -> &'static str {
        "Report a concrete defect in a file; opens a NEEDS_FIXES task routed to debugging."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Reporting
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": { "type": "string" },
                "description": { "type": "string" },
                "severity": { "type": "string", "description": "CRITICAL|HIGH|MEDIUM|LOW" }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(filepath) = args["filepath"]
            .as_str()
            .or_else(|| args["file_path"].as_str())
        else {
            return ToolOutcome::failed(self.name(), "filepath is required");
        };
        let description = args["description"]
            .as_str()
            .or_else(|| args["error"].as_str())
            .unwrap_or("QA reported an unspecified defect");
        let priority = args["severity"]
            .as_str()
            .and_then(|s| s.parse::<Priority>().ok())
            .unwrap_or(Priority::High);

        let mut task = Task::new(
            format!("Fix QA issue in {}: {}", filepath, description),
            Some(filepath.to_string()),
            None,
        )
        .with_priority(priority);
        task.status = TaskStatus::NeedsFixes;
        let task_id = task.id.clone();
        let created = ctx.state.upsert_task(task);

        ctx.bus.publish(
            BusMessage::to_phase(ctx.phase.name(), "debugging", MessageType::IssueReported)
                .with_priority(MessagePriority::High)
                .with_task(task_id.clone())
                .with_file(filepath.to_string())
                .with_payload(serde_json::json!({"description": description})),
        );

        let outcome = ToolOutcome::ok(
            self.name(),
            serde_json::json!({"task_id": task_id, "filepath": filepath, "created": created}),
        );
        if created { outcome.with_effect() } else { outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BasicAnalyzer, BasicSyntaxChecker};
    use crate::bus::{MessageBus, MessageFilter};
    use crate::patch::PatchLayer;
    use crate::phases::PhaseKind;
    use crate::state::PipelineState;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        temp: TempDir,
        patcher: PatchLayer,
        bus: MessageBus,
        state: PipelineState,
        analyzer: BasicAnalyzer,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let patcher =
            PatchLayer::new(temp.path(), temp.path().join("patches"), Arc::new(BasicSyntaxChecker)).unwrap();
        Fixture {
            temp,
            patcher,
            bus: MessageBus::new(50),
            state: PipelineState::default(),
            analyzer: BasicAnalyzer::default(),
        }
    }

    macro_rules! ctx {
        ($fx:ident) => {
            ToolCtx {
                state: &mut $fx.state,
                bus: &$fx.bus,
                patcher: &$fx.patcher,
                analyzer: &$fx.analyzer,
                checker: &BasicSyntaxChecker,
                project_root: $fx.temp.path(),
                reports_dir: $fx.temp.path(),
                phase: PhaseKind::Qa,
                known_tools: vec![],
            }
        };
    }

    #[tokio::test]
    async fn test_approve_code_completes_qa_pending_task() {
        let mut fx = fixture();
        let mut task = Task::new("review ui", Some("src/ui.py".to_string()), None);
        task.status = TaskStatus::QaPending;
        let id = task.id.clone();
        fx.state.upsert_task(task);

        let mut ctx = ctx!(fx);
        let outcome = ApproveCodeTool
            .execute(&serde_json::json!({"filepath": "src/ui.py"}), &mut ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.details["completed_task"], serde_json::json!(id));
        assert_eq!(fx.state.tasks[&id].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_report_qa_issue_opens_needs_fixes() {
        let mut fx = fixture();
        let mut ctx = ctx!(fx);

        let outcome = ReportQaIssueTool
            .execute(
                &serde_json::json!({"filepath": "src/app.py", "description": "crash on start", "severity": "CRITICAL"}),
                &mut ctx,
            )
            .await;

        assert!(outcome.success);
        let needs_fixes = fx.state.tasks_with_status(TaskStatus::NeedsFixes);
        assert_eq!(needs_fixes.len(), 1);
        assert_eq!(needs_fixes[0].priority, Priority::Critical);

        let routed = fx.bus.get_messages("debugging", &MessageFilter::default());
        assert_eq!(routed.len(), 1);
    }

    #[tokio::test]
    async fn test_request_developer_review_blocks_task() {
        let mut fx = fixture();
        let task = Task::new("tricky work", None, None);
        let id = task.id.clone();
        fx.state.upsert_task(task);

        let mut ctx = ctx!(fx);
        let outcome = RequestDeveloperReviewTool
            .execute(&serde_json::json!({"task_id": id, "reason": "repeated failures"}), &mut ctx)
            .await;

        assert!(outcome.success);
        assert_eq!(fx.state.tasks[&id].status, TaskStatus::Blocked);

        let critical = fx.bus.search(&MessageFilter {
            min_priority: Some(MessagePriority::Critical),
            ..Default::default()
        });
        assert_eq!(critical.len(), 1);
    }

    #[tokio::test]
    async fn test_create_issue_report_writes_file() {
        let mut fx = fixture();
        let mut ctx = ctx!(fx);

        let outcome = CreateIssueReportTool
            .execute(
                &serde_json::json!({"title": "Import cycle", "body": "a imports b imports a"}),
                &mut ctx,
            )
            .await;

        assert!(outcome.success);
        let report = outcome.details["report"].as_str().unwrap().to_string();
        assert!(std::path::Path::new(&report).exists());
    }
}
