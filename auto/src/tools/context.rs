//! ToolCtx - execution context handed to every tool
//!
//! Tools borrow the pipeline state mutably for the duration of one call;
//! the main loop awaits the execution, so there is exactly one writer.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::analysis::{Analyzer, SyntaxChecker};
use crate::bus::{BusMessage, MessageBus, MessagePriority, MessageType};
use crate::domain::{Priority, Task, TaskStatus};
use crate::patch::PatchLayer;
use crate::phases::PhaseKind;
use crate::state::PipelineState;

pub struct ToolCtx<'a> {
    pub state: &'a mut PipelineState,
    pub bus: &'a MessageBus,
    pub patcher: &'a PatchLayer,
    pub analyzer: &'a dyn Analyzer,
    pub checker: &'a dyn SyntaxChecker,
    pub project_root: &'a Path,
    pub reports_dir: &'a Path,
    pub phase: PhaseKind,
    /// Names registered in the executing registry, for handler-presence checks
    pub known_tools: Vec<String>,
}

impl ToolCtx<'_> {
    /// Resolve a model-supplied path against the project root
    pub fn resolve(&self, rel: &str) -> PathBuf {
        let path = Path::new(rel);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// File failed its syntax gate: open a NEEDS_FIXES task and tell the
    /// bus so debugging picks it up next
    pub fn flag_needs_debugging(&mut self, filepath: &str, issues: &[String]) {
        let mut task = Task::new(
            format!("Fix syntax errors in {}", filepath),
            Some(filepath.to_string()),
            None,
        )
        .with_priority(Priority::High);
        task.status = TaskStatus::NeedsFixes;
        let task_id = task.id.clone();

        if self.state.upsert_task(task) {
            warn!(file = %filepath, "syntax rejected; NEEDS_FIXES task opened");
        }

        self.bus.publish(
            BusMessage::to_phase(self.phase.name(), PhaseKind::Debugging.name(), MessageType::IssueReported)
                .with_priority(MessagePriority::High)
                .with_task(task_id)
                .with_file(filepath.to_string())
                .with_payload(serde_json::json!({ "issues": issues })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BasicAnalyzer, BasicSyntaxChecker};
    use crate::bus::MessageFilter;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_flag_needs_debugging_creates_task_and_message() {
        let temp = tempdir().unwrap();
        let patcher = PatchLayer::new(temp.path(), temp.path().join("patches"), Arc::new(BasicSyntaxChecker)).unwrap();
        let bus = MessageBus::new(10);
        let mut state = PipelineState::default();
        let analyzer = BasicAnalyzer::default();

        let mut ctx = ToolCtx {
            state: &mut state,
            bus: &bus,
            patcher: &patcher,
            analyzer: &analyzer,
            checker: &BasicSyntaxChecker,
            project_root: temp.path(),
            reports_dir: temp.path(),
            phase: PhaseKind::Coding,
            known_tools: vec![],
        };

        ctx.flag_needs_debugging("app.py", &["unclosed '('".to_string()]);

        assert_eq!(state.tasks_with_status(TaskStatus::NeedsFixes).len(), 1);
        let inbox = bus.get_messages(PhaseKind::Debugging.name(), &MessageFilter::default());
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].file_path.as_deref(), Some("app.py"));
    }
}
