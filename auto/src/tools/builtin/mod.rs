//! Built-in tool set

mod analyze;
mod files;
mod meta;
mod report;
mod tasks;
mod validate;

use std::sync::Arc;

use super::traits::Tool;

pub use analyze::{
    BuildCallGraphTool, CheckArchitectureTool, CompareFilesTool, DetectDuplicatesTool, FindDeadCodeTool,
    FindIntegrationGapsTool, MeasureComplexityTool,
};
pub use files::{AppendFileTool, CreateFileTool, DeleteFileTool, ListFilesTool, ModifyFileTool, ReadFileTool};
pub use meta::{EvaluateDesignTool, ProposeDesignTool};
pub use report::{ApproveCodeTool, CreateIssueReportTool, ReportQaIssueTool, RequestDeveloperReviewTool};
pub use tasks::{
    CompleteTaskTool, CreateRefactoringTaskTool, CreateTaskTool, ListRefactoringTasksTool, RefactoringProgressTool,
    UpdateRefactoringTaskTool, UpdateTaskTool,
};
pub use validate::{ValidateReferencesTool, ValidateSyntaxTool, ValidateToolHandlersTool};

/// Every built-in tool, for registry construction
pub fn all() -> Vec<Arc<dyn Tool>> {
    vec![
        // File operations
        Arc::new(CreateFileTool),
        Arc::new(ModifyFileTool),
        Arc::new(AppendFileTool),
        Arc::new(DeleteFileTool),
        Arc::new(ReadFileTool),
        Arc::new(ListFilesTool),
        // Task operations
        Arc::new(CreateTaskTool),
        Arc::new(UpdateTaskTool),
        Arc::new(CompleteTaskTool),
        Arc::new(CreateRefactoringTaskTool),
        Arc::new(UpdateRefactoringTaskTool),
        Arc::new(ListRefactoringTasksTool),
        Arc::new(RefactoringProgressTool),
        // Analysis
        Arc::new(DetectDuplicatesTool),
        Arc::new(CompareFilesTool),
        Arc::new(FindDeadCodeTool),
        Arc::new(FindIntegrationGapsTool),
        Arc::new(BuildCallGraphTool),
        Arc::new(MeasureComplexityTool),
        Arc::new(CheckArchitectureTool),
        // Validation
        Arc::new(ValidateSyntaxTool),
        Arc::new(ValidateReferencesTool),
        Arc::new(ValidateToolHandlersTool),
        // Reporting
        Arc::new(CreateIssueReportTool),
        Arc::new(RequestDeveloperReviewTool),
        Arc::new(ApproveCodeTool),
        Arc::new(ReportQaIssueTool),
        // Meta
        Arc::new(ProposeDesignTool),
        Arc::new(EvaluateDesignTool),
    ]
}
