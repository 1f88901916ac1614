use async_trait::async_trait;
use chrono::Utc;
use mnemos_rs_core::{SessionIndexStore, SessionMapping, StateError};
use mnemos_rs_memory::SessionId;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Session index held in memory.
#[derive(Default)]
pub struct InMemorySessionIndex {
    mappings: Mutex<Vec<SessionMapping>>,
    inserts: AtomicUsize,
}

impl InMemorySessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mappings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.lock().is_empty()
    }

    /// Number of successful inserts.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionIndexStore for InMemorySessionIndex {
    async fn find_by_name(&self, name: &str) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .mappings
            .lock()
            .iter()
            .find(|mapping| mapping.session_name == name)
            .cloned())
    }

    async fn find_by_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .mappings
            .lock()
            .iter()
            .find(|mapping| mapping.session_id == session_id)
            .cloned())
    }

    async fn insert_mapping(
        &self,
        name: &str,
        session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        let mut mappings = self.mappings.lock();
        if mappings.iter().any(|mapping| mapping.session_name == name) {
            return Err(StateError::NameTaken(name.to_string()));
        }
        if mappings.iter().any(|mapping| mapping.session_id == session_id) {
            return Err(StateError::IdTaken(session_id));
        }
        let mapping = SessionMapping {
            session_name: name.to_string(),
            session_id,
            created_at: Utc::now(),
        };
        mappings.push(mapping.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(mapping)
    }
}

/// Session index whose every call fails with an IO error.
#[derive(Default)]
pub struct FailingSessionIndex;

impl FailingSessionIndex {
    fn unavailable() -> StateError {
        StateError::Io(io::Error::other("session index unavailable"))
    }
}

#[async_trait]
impl SessionIndexStore for FailingSessionIndex {
    async fn find_by_name(&self, _name: &str) -> Result<Option<SessionMapping>, StateError> {
        Err(Self::unavailable())
    }

    async fn find_by_id(
        &self,
        _session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        Err(Self::unavailable())
    }

    async fn insert_mapping(
        &self,
        _name: &str,
        _session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        Err(Self::unavailable())
    }
}

/// Lookups miss and every insert fails, as when the index file is
/// read-only. Counts calls so tests can see whether the store was consulted.
#[derive(Default)]
pub struct InsertFailingSessionIndex {
    lookups: AtomicUsize,
    inserts: AtomicUsize,
}

impl InsertFailingSessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn insert_attempts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionIndexStore for InsertFailingSessionIndex {
    async fn find_by_name(&self, _name: &str) -> Result<Option<SessionMapping>, StateError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn find_by_id(
        &self,
        _session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        Ok(None)
    }

    async fn insert_mapping(
        &self,
        _name: &str,
        _session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(StateError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "session index is read-only",
        )))
    }
}

/// Simulates another process claiming a name between lookup and insert.
///
/// Lookups miss until the first insert attempt, which loses to `winner` and
/// returns `NameTaken`. Later lookups see the winner.
pub struct RacingSessionIndex {
    name: String,
    winner: SessionId,
    claimed: Mutex<Option<SessionMapping>>,
}

impl RacingSessionIndex {
    pub fn new(name: impl Into<String>, winner: SessionId) -> Self {
        Self {
            name: name.into(),
            winner,
            claimed: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionIndexStore for RacingSessionIndex {
    async fn find_by_name(&self, name: &str) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .claimed
            .lock()
            .clone()
            .filter(|mapping| mapping.session_name == name))
    }

    async fn find_by_id(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionMapping>, StateError> {
        Ok(self
            .claimed
            .lock()
            .clone()
            .filter(|mapping| mapping.session_id == session_id))
    }

    async fn insert_mapping(
        &self,
        name: &str,
        session_id: SessionId,
    ) -> Result<SessionMapping, StateError> {
        if name != self.name {
            return Ok(SessionMapping {
                session_name: name.to_string(),
                session_id,
                created_at: Utc::now(),
            });
        }
        let mut claimed = self.claimed.lock();
        claimed.get_or_insert_with(|| SessionMapping {
            session_name: self.name.clone(),
            session_id: self.winner,
            created_at: Utc::now(),
        });
        Err(StateError::NameTaken(name.to_string()))
    }
}
