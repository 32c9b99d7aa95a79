//! IPC documents - durable cross-phase hand-offs
//!
//! Phases exchange structured hints through plain text files under `ipc/`.
//! Reads are best-effort (missing file reads as empty); writes replace the
//! whole file.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};

use crate::phases::PhaseKind;

/// The three conventional documents each phase owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcDoc {
    /// What the phase should read before acting
    Read,
    /// What the phase wrote for others
    Write,
    /// The phase's current status line
    Status,
}

impl IpcDoc {
    fn suffix(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Status => "STATUS",
        }
    }
}

fn doc_path(ipc_dir: &Path, phase: PhaseKind, doc: IpcDoc) -> PathBuf {
    ipc_dir.join(format!("{}_{}.md", phase.name(), doc.suffix()))
}

/// Best-effort read; a missing document is empty content
pub fn read_doc(ipc_dir: &Path, phase: PhaseKind, doc: IpcDoc) -> String {
    fs::read_to_string(doc_path(ipc_dir, phase, doc)).unwrap_or_default()
}

/// Whole-file replacement write
pub fn write_doc(ipc_dir: &Path, phase: PhaseKind, doc: IpcDoc, content: &str) -> Result<()> {
    fs::create_dir_all(ipc_dir).context("Failed to create ipc directory")?;
    fs::write(doc_path(ipc_dir, phase, doc), content).context("Failed to write ipc document")?;
    Ok(())
}
