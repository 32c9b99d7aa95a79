//! Patch/FS layer - every source write goes through here
//!
//! Responsibilities, in order: entity sanitation, language-aware syntax
//! check, atomic write (temp + fsync + rename), and a numbered unified-diff
//! archive of every accepted change. A payload that fails the syntax check
//! is still written so a later debugging phase can see and fix it; the
//! report flags it instead.

mod sanitize;

pub use sanitize::{aggressive_decode, sanitize, strict_decode};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use similar::TextDiff;
use tracing::{debug, warn};

use crate::analysis::SyntaxChecker;

/// Result of a routed write
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub path: PathBuf,
    pub file_saved: bool,
    pub syntax_ok: bool,
    /// Set when the file was written despite failing the syntax gate
    pub needs_debugging: bool,
    pub sanitized: bool,
    pub patch_file: Option<PathBuf>,
    pub issues: Vec<String>,
}

/// Sanitizing, archiving writer for the project tree
pub struct PatchLayer {
    project_root: PathBuf,
    archive_dir: PathBuf,
    seq: AtomicU64,
    checker: Arc<dyn SyntaxChecker>,
}

impl PatchLayer {
    /// `archive_dir` is the conventional `patches/` directory under the
    /// pipeline state directory; the sequence continues from what is there
    pub fn new(
        project_root: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        checker: Arc<dyn SyntaxChecker>,
    ) -> std::io::Result<Self> {
        let archive_dir = archive_dir.into();
        fs::create_dir_all(&archive_dir)?;

        let next_seq = fs::read_dir(&archive_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| name.split('-').next().map(|s| s.to_string()))
            })
            .filter_map(|prefix| prefix.parse::<u64>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(1);

        Ok(Self {
            project_root: project_root.into(),
            archive_dir,
            seq: AtomicU64::new(next_seq),
            checker,
        })
    }

    fn resolve(&self, rel_path: &str) -> PathBuf {
        let path = Path::new(rel_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Write a complete payload to `rel_path` under the project root
    pub fn apply(&self, rel_path: &str, payload: &str) -> std::io::Result<WriteReport> {
        let path = self.resolve(rel_path);
        let (clean, sanitized) = sanitize(payload);
        if sanitized {
            warn!(path = %path.display(), "payload required entity sanitation");
        }

        let report = self.checker.check(&path, &clean);
        if !report.ok {
            warn!(path = %path.display(), issues = ?report.issues, "syntax check failed; writing anyway");
        }

        let old = fs::read_to_string(&path).unwrap_or_default();
        self.atomic_write(&path, &clean)?;
        let patch_file = self.archive(rel_path, &old, &clean)?;

        Ok(WriteReport {
            path,
            file_saved: true,
            syntax_ok: report.ok,
            needs_debugging: !report.ok,
            sanitized,
            patch_file,
            issues: report.issues,
        })
    }

    /// Append to an existing file (creating it when absent)
    pub fn append(&self, rel_path: &str, payload: &str) -> std::io::Result<WriteReport> {
        let path = self.resolve(rel_path);
        let mut combined = fs::read_to_string(&path).unwrap_or_default();
        combined.push_str(payload);
        self.apply(rel_path, &combined)
    }

    /// Delete a file, archiving the removal as a patch
    pub fn delete(&self, rel_path: &str) -> std::io::Result<Option<PathBuf>> {
        let path = self.resolve(rel_path);
        if !path.exists() {
            return Ok(None);
        }
        let old = fs::read_to_string(&path).unwrap_or_default();
        let patch_file = self.archive(rel_path, &old, "")?;
        fs::remove_file(&path)?;
        Ok(patch_file)
    }

    fn atomic_write(&self, path: &Path, payload: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("wtmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(payload.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), bytes = payload.len(), "file replaced");
        Ok(())
    }

    /// Store the unified diff under `NNNN-timestamp.patch`; no-change
    /// writes produce no archive entry
    fn archive(&self, rel_path: &str, old: &str, new: &str) -> std::io::Result<Option<PathBuf>> {
        if old == new {
            return Ok(None);
        }

        let diff = TextDiff::from_lines(old, new);
        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", rel_path), &format!("b/{}", rel_path))
            .to_string();

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let patch_path = self.archive_dir.join(format!("{:04}-{}.patch", seq, stamp));

        fs::write(&patch_path, unified)?;
        Ok(Some(patch_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BasicSyntaxChecker;
    use tempfile::tempdir;

    fn layer(project: &Path, archive: &Path) -> PatchLayer {
        PatchLayer::new(project, archive, Arc::new(BasicSyntaxChecker)).unwrap()
    }

    #[test]
    fn test_apply_writes_and_archives() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        let report = layer.apply("src/app.py", "def f(a):\n    return a\n").unwrap();
        assert!(report.file_saved);
        assert!(report.syntax_ok);
        assert!(!report.needs_debugging);
        assert!(report.patch_file.is_some());

        let on_disk = fs::read_to_string(temp.path().join("proj/src/app.py")).unwrap();
        assert_eq!(on_disk, "def f(a):\n    return a\n");
    }

    #[test]
    fn test_syntax_failure_still_writes() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        let report = layer.apply("app.py", "def f( :\n").unwrap();
        assert!(report.file_saved);
        assert!(!report.syntax_ok);
        assert!(report.needs_debugging);

        // The broken payload is on disk for debugging to find
        assert!(temp.path().join("proj/app.py").exists());
    }

    #[test]
    fn test_entity_payload_decoded_before_write() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        let report = layer.apply("x.py", "print(&quot;hi&quot;)\n").unwrap();
        assert!(report.sanitized);

        let on_disk = fs::read_to_string(temp.path().join("proj/x.py")).unwrap();
        assert_eq!(on_disk, "print(\"hi\")\n");
    }

    #[test]
    fn test_accepted_patch_round_trips_bytes() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        let payload = "def g():\n    return \"exact\"\n";
        layer.apply("g.py", payload).unwrap();
        let on_disk = fs::read_to_string(temp.path().join("proj/g.py")).unwrap();
        assert_eq!(on_disk.as_bytes(), payload.as_bytes());
    }

    #[test]
    fn test_patch_numbering_is_sequential() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("patches");
        let layer = layer(&temp.path().join("proj"), &archive);

        layer.apply("a.py", "x = 1\n").unwrap();
        layer.apply("a.py", "x = 2\n").unwrap();

        let mut names: Vec<String> = fs::read_dir(&archive)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("0001-"));
        assert!(names[1].starts_with("0002-"));
        assert!(names[1].ends_with(".patch"));
    }

    #[test]
    fn test_sequence_continues_across_instances() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("patches");

        layer(&temp.path().join("proj"), &archive).apply("a.py", "x = 1\n").unwrap();
        layer(&temp.path().join("proj"), &archive).apply("a.py", "x = 2\n").unwrap();

        let mut names: Vec<String> = fs::read_dir(&archive)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert!(names[1].starts_with("0002-"));
    }

    #[test]
    fn test_no_change_write_archives_nothing() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        layer.apply("a.py", "x = 1\n").unwrap();
        let report = layer.apply("a.py", "x = 1\n").unwrap();
        assert!(report.patch_file.is_none());
    }

    #[test]
    fn test_append_and_delete() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        layer.apply("log.py", "a = 1\n").unwrap();
        layer.append("log.py", "b = 2\n").unwrap();
        let on_disk = fs::read_to_string(temp.path().join("proj/log.py")).unwrap();
        assert_eq!(on_disk, "a = 1\nb = 2\n");

        let patch = layer.delete("log.py").unwrap();
        assert!(patch.is_some());
        assert!(!temp.path().join("proj/log.py").exists());

        // Deleting a missing file is a quiet no-op
        assert!(layer.delete("log.py").unwrap().is_none());
    }

    #[test]
    fn test_patch_content_is_unified_diff() {
        let temp = tempdir().unwrap();
        let layer = layer(&temp.path().join("proj"), &temp.path().join("patches"));

        layer.apply("d.py", "one\n").unwrap();
        let report = layer.apply("d.py", "two\n").unwrap();

        let patch = fs::read_to_string(report.patch_file.unwrap()).unwrap();
        assert!(patch.contains("a/d.py"));
        assert!(patch.contains("b/d.py"));
        assert!(patch.contains("-one"));
        assert!(patch.contains("+two"));
    }
}
