//! Session name resolution with a per-resolver cache.

use crate::error::MnemosCoreError;
use crate::state::{SessionIndexStore, StateError};
use log::{debug, info, warn};
use mnemos_rs_memory::SessionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Both directions of the name index, kept in step.
#[derive(Default)]
struct SessionCache {
    by_name: HashMap<String, SessionId>,
    by_id: HashMap<SessionId, String>,
}

impl SessionCache {
    fn remember(&mut self, name: &str, session_id: SessionId) {
        self.by_name.insert(name.to_string(), session_id);
        self.by_id.insert(session_id, name.to_string());
    }
}

/// Resolves human-chosen session names to durable session ids.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionIndexStore>,
    cache: Arc<RwLock<SessionCache>>,
}

impl SessionResolver {
    /// Create a resolver with an empty cache over the given index.
    pub fn new(store: Arc<dyn SessionIndexStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(SessionCache::default())),
        }
    }

    /// Return the id for `name`, creating and persisting one if needed.
    ///
    /// A missing or blank name yields a fresh anonymous id that is not
    /// recorded. The id is only returned once the mapping is durable.
    pub async fn resolve_or_create(
        &self,
        name: Option<&str>,
    ) -> Result<SessionId, MnemosCoreError> {
        let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
            let session_id = Uuid::new_v4();
            debug!("created anonymous session (session_id={})", session_id);
            return Ok(session_id);
        };

        if let Some(session_id) = self.cache.read().by_name.get(name).copied() {
            return Ok(session_id);
        }

        if let Some(mapping) = self.store.find_by_name(name).await.map_err(state_error)? {
            debug!(
                "loaded session mapping from store (session_name={}, session_id={})",
                name, mapping.session_id
            );
            self.cache.write().remember(name, mapping.session_id);
            return Ok(mapping.session_id);
        }

        let session_id = Uuid::new_v4();
        match self.store.insert_mapping(name, session_id).await {
            Ok(mapping) => {
                info!(
                    "created session mapping (session_name={}, session_id={})",
                    name, mapping.session_id
                );
                self.cache.write().remember(name, mapping.session_id);
                Ok(mapping.session_id)
            }
            Err(StateError::NameTaken(_)) => {
                warn!("session name claimed concurrently, re-reading (session_name={name})");
                let mapping = self
                    .store
                    .find_by_name(name)
                    .await
                    .map_err(state_error)?
                    .ok_or_else(|| {
                        MnemosCoreError::State(format!(
                            "session name reported taken but not found: {name}"
                        ))
                    })?;
                self.cache.write().remember(name, mapping.session_id);
                Ok(mapping.session_id)
            }
            Err(err) => Err(state_error(err)),
        }
    }

    /// Reverse lookup from id to session name.
    pub async fn session_name(
        &self,
        session_id: SessionId,
    ) -> Result<Option<String>, MnemosCoreError> {
        if let Some(name) = self.cache.read().by_id.get(&session_id).cloned() {
            return Ok(Some(name));
        }
        let mapping = self
            .store
            .find_by_id(session_id)
            .await
            .map_err(state_error)?;
        Ok(mapping.map(|mapping| {
            self.cache
                .write()
                .remember(&mapping.session_name, mapping.session_id);
            mapping.session_name
        }))
    }
}

fn state_error(err: StateError) -> MnemosCoreError {
    MnemosCoreError::State(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::SessionResolver;
    use crate::state::JsonlSessionIndex;
    use pretty_assertions::{assert_eq, assert_ne};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn resolver(root: &std::path::Path) -> SessionResolver {
        SessionResolver::new(Arc::new(JsonlSessionIndex::new(root).expect("index")))
    }

    #[tokio::test]
    async fn named_session_is_stable() {
        let temp = tempdir().expect("tempdir");
        let resolver = resolver(temp.path());
        let first = resolver.resolve_or_create(Some("alpha")).await.expect("first");
        let second = resolver.resolve_or_create(Some("alpha")).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(
            resolver.session_name(first).await.expect("name"),
            Some("alpha".to_string())
        );
    }

    #[tokio::test]
    async fn anonymous_sessions_are_distinct_and_unrecorded() {
        let temp = tempdir().expect("tempdir");
        let resolver = resolver(temp.path());
        let a = resolver.resolve_or_create(None).await.expect("a");
        let b = resolver.resolve_or_create(Some("")).await.expect("b");
        let c = resolver.resolve_or_create(Some("   ")).await.expect("c");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(resolver.session_name(a).await.expect("name"), None);
        assert_eq!(resolver.session_name(b).await.expect("name"), None);
    }

    #[tokio::test]
    async fn independent_resolvers_share_the_store() {
        let temp = tempdir().expect("tempdir");
        let id = resolver(temp.path())
            .resolve_or_create(Some("alpha"))
            .await
            .expect("create");

        let second = resolver(temp.path());
        assert_eq!(
            second.resolve_or_create(Some("alpha")).await.expect("reuse"),
            id
        );
        assert_eq!(
            second.session_name(id).await.expect("reverse"),
            Some("alpha".to_string())
        );
    }

    #[tokio::test]
    async fn names_are_trimmed() {
        let temp = tempdir().expect("tempdir");
        let resolver = resolver(temp.path());
        let id = resolver.resolve_or_create(Some("alpha")).await.expect("create");
        assert_eq!(
            resolver.resolve_or_create(Some("  alpha ")).await.expect("trimmed"),
            id
        );
    }
}
