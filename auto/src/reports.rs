//! Human-readable report emission
//!
//! Reports land under the pipeline's `reports/` directory. They are for
//! the developer, never fed back to the models.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};

use crate::domain::Task;

/// Write `ISSUE_<id>.md`; returns the path
pub fn write_issue_report(
    reports_dir: &Path,
    issue_id: &str,
    title: &str,
    body: &str,
    file_path: Option<&str>,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir).context("Failed to create reports directory")?;

    let safe_id: String = issue_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let path = reports_dir.join(format!("ISSUE_{}.md", safe_id));

    let mut content = format!("# Issue: {}\n\n", title);
    content.push_str(&format!("- id: `{}`\n", issue_id));
    content.push_str(&format!("- reported: {}\n", chrono::Utc::now().to_rfc3339()));
    if let Some(file) = file_path {
        content.push_str(&format!("- file: `{}`\n", file));
    }
    content.push_str("\n## Details\n\n");
    content.push_str(body);
    content.push('\n');

    fs::write(&path, content).context("Failed to write issue report")?;
    Ok(path)
}

/// Write `REFACTORING_REPORT.md` summarizing the backlog state; emitted
/// when only blocked-needs-review tasks remain
pub fn write_refactoring_report(reports_dir: &Path, tasks: &[&Task]) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir).context("Failed to create reports directory")?;
    let path = reports_dir.join("REFACTORING_REPORT.md");

    let mut content = String::from("# Refactoring Report\n\n");
    content.push_str(&format!("Generated: {}\n\n", chrono::Utc::now().to_rfc3339()));

    if tasks.is_empty() {
        content.push_str("No refactoring tasks outstanding.\n");
    } else {
        content.push_str("| id | status | priority | description |\n");
        content.push_str("|---|---|---|---|\n");
        for task in tasks {
            content.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                task.id,
                task.status,
                task.priority,
                task.description.replace('|', "\\|")
            ));
        }
        content.push_str("\nTasks marked BLOCKED need developer review before work can continue.\n");
    }

    fs::write(&path, content).context("Failed to write refactoring report")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use tempfile::tempdir;

    #[test]
    fn test_issue_report_written() {
        let temp = tempdir().unwrap();
        let path = write_issue_report(temp.path(), "abc-123", "Broken import", "details here", Some("src/x.py")).unwrap();

        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("ISSUE_"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Broken import"));
        assert!(content.contains("src/x.py"));
    }

    #[test]
    fn test_issue_id_sanitized_for_filename() {
        let temp = tempdir().unwrap();
        let path = write_issue_report(temp.path(), "../evil", "t", "b", None).unwrap();
        assert!(path.starts_with(temp.path()));
        assert!(!path.to_str().unwrap().contains(".."));
    }

    #[test]
    fn test_refactoring_report_lists_tasks() {
        let temp = tempdir().unwrap();
        let mut task = Task::new("extract duplicate parser", None, None);
        task.status = TaskStatus::Blocked;

        let path = write_refactoring_report(temp.path(), &[&task]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("extract duplicate parser"));
        assert!(content.contains("BLOCKED"));
    }
}
