//! Session name index persistence.
//!
//! The index maps human-chosen session names to durable session ids. It is
//! append-only: mappings are never renamed or removed through this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use mnemos_rs_memory::SessionId;
use mnemos_rs_memory::lock::FileLock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persisted name to id mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMapping {
    pub session_name: String,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Errors returned by session index stores.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("session name already mapped: {0}")]
    NameTaken(String),
    #[error("session id already mapped: {0}")]
    IdTaken(SessionId),
    #[error("corrupt session index: {0}")]
    Corrupt(String),
}

/// Storage collaborator for the session name index.
///
/// `insert_mapping` must be atomic with respect to other inserts: when two
/// callers race on the same name exactly one succeeds and the other receives
/// `StateError::NameTaken`.
#[async_trait]
pub trait SessionIndexStore: Send + Sync {
    /// Look up a mapping by session name.
    async fn find_by_name(&self, name: &str) -> Result<Option<SessionMapping>, StateError>;
    /// Look up a mapping by session id.
    async fn find_by_id(&self, session_id: SessionId)
    -> Result<Option<SessionMapping>, StateError>;
    /// Record a new mapping in both directions.
    async fn insert_mapping(
        &self,
        name: &str,
        session_id: SessionId,
    ) -> Result<SessionMapping, StateError>;
}

const INDEX_FILE: &str = "session_names.jsonl";
const LOCK_FILE: &str = "session_names.lock";

/// JSONL-backed session index.
///
/// Inserts hold an exclusive advisory lock on `session_names.lock` from the
/// uniqueness check until the appended line is synced, so separate instances
/// and processes sharing a root agree on every name.
pub struct JsonlSessionIndex {
    /// Root directory for the index file.
    root: PathBuf,
    /// Serialize check-and-append within this instance.
    write_lock: Mutex<()>,
}

impl JsonlSessionIndex {
    /// Create a new index under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StateError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL session index (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Read every mapping under a shared lock.
    fn read_locked(&self) -> Result<Vec<SessionMapping>, StateError> {
        let _shared = FileLock::shared(&self.lock_path())?;
        self.read_mappings()
    }

    /// Read every mapping from disk. Callers hold the lock file.
    fn read_mappings(&self) -> Result<Vec<SessionMapping>, StateError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let reader = BufReader::new(file);
        let mut mappings = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            mappings.push(serde_json::from_str(&line)?);
        }
        Ok(mappings)
    }
}

#[async_trait]
impl SessionIndexStore for JsonlSessionIndex {
    async fn find_by_name(&self, name: &str) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .read_locked()?
            .into_iter()
            .find(|mapping| mapping.session_name == name))
    }

    async fn find_by_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .read_locked()?
            .into_iter()
            .find(|mapping| mapping.session_id == session_id))
    }

    async fn insert_mapping(
        &self,
        name: &str,
        session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        let _guard = self.write_lock.lock();
        let _file_lock = FileLock::exclusive(&self.lock_path())?;
        let existing = self.read_mappings()?;
        if existing.iter().any(|mapping| mapping.session_name == name) {
            return Err(StateError::NameTaken(name.to_string()));
        }
        if existing.iter().any(|mapping| mapping.session_id == session_id) {
            return Err(StateError::IdTaken(session_id));
        }
        let mapping = SessionMapping {
            session_name: name.to_string(),
            session_id,
            created_at: Utc::now(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path())?;
        let line = serde_json::to_string(&mapping)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        debug!(
            "appended session mapping (session_name={}, session_id={})",
            name, session_id
        );
        Ok(mapping)
    }
}
