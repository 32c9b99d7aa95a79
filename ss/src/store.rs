//! DocStore - one JSON document, atomically replaced on save

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors from document persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store {path} is locked by another writer")]
    Locked { path: PathBuf },

    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A single JSON document on disk with atomic replace semantics
///
/// The document may be absent (fresh store); `load` then returns `Ok(None)`.
/// A present-but-unparseable document is a loud [`StoreError::Corrupt`],
/// never a silently empty result.
pub struct DocStore {
    path: PathBuf,
    /// Held for the lifetime of the store; released on drop
    _lock: Option<File>,
}

impl DocStore {
    /// Open a store for the given document path, taking the writer lock
    ///
    /// Parent directories are created. Fails with [`StoreError::Locked`] if
    /// another live `DocStore` holds the same document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        debug!(path = %path.display(), "DocStore::open");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;

        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked { path });
        }

        Ok(Self {
            path,
            _lock: Some(lock),
        })
    }

    /// Open without taking the writer lock (read-only inspection)
    pub fn open_unlocked(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _lock: None,
        }
    }

    /// Document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, `Ok(None)` when the file does not exist yet
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "DocStore::load: no document yet");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let value = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(value))
    }

    /// Atomically replace the document: write temp, fsync, rename
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
            tmp.write_all(raw.as_bytes()).map_err(|e| StoreError::io(&tmp_path, e))?;
            tmp.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = raw.len(), "DocStore::save: document replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp = tempdir().unwrap();
        let store = DocStore::open(temp.path().join("state.json")).unwrap();

        let loaded: Option<Doc> = store.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp = tempdir().unwrap();
        let store = DocStore::open(temp.path().join("state.json")).unwrap();

        let doc = Doc {
            name: "pipeline".to_string(),
            count: 7,
        };
        store.save(&doc).unwrap();

        let loaded: Doc = store.load().unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        let store = DocStore::open(&path).unwrap();

        store
            .save(&Doc {
                name: "x".to_string(),
                count: 1,
            })
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_document_fails_loudly() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = DocStore::open(&path).unwrap();
        let result: Result<Option<Doc>, _> = store.load();

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_second_writer_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");

        let _first = DocStore::open(&path).unwrap();
        let second = DocStore::open(&path);

        assert!(matches!(second, Err(StoreError::Locked { .. })));
    }

    #[test]
    fn test_unknown_fields_survive_value_round_trip() {
        // Forward-compat contract: loading into serde_json::Value and saving
        // back must preserve fields this version knows nothing about.
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, r#"{"name":"x","count":1,"future_field":[1,2,3]}"#).unwrap();

        let store = DocStore::open(&path).unwrap();
        let value: serde_json::Value = store.load().unwrap().unwrap();
        store.save(&value).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("future_field"));
    }
}
