//! `Mnemos` facade tying stores, sessions, prompt filling, and ingestion together.

use crate::error::MnemosCoreError;
use crate::prompt::PromptFiller;
use crate::sessions::SessionResolver;
use crate::sqlite::SqliteStore;
use crate::state::{JsonlSessionIndex, SessionIndexStore};
use crate::tools::MemoryTools;
use log::{debug, info};
use mnemos_rs_config::{MnemosConfig, StoreProvider};
use mnemos_rs_memory::{
    BatchIngestor, FileMemoryStore, IngestReport, ListFilter, MemoryRecord, MemoryRecordInput,
    MemoryResolver, MemoryStore, MemoryUpdate, RunScope, SessionId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Inputs for preparing a single agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    pub agent_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Human-chosen session name; blank or missing starts an anonymous session.
    #[serde(default)]
    pub session_name: Option<String>,
    pub template: String,
    /// Caller-supplied run id; a fresh UUID is used when missing.
    #[serde(default)]
    pub run_id: Option<String>,
}

/// A filled system prompt plus the identifiers it was built for.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreparedRun {
    pub run_id: String,
    pub session_id: SessionId,
    pub session_name: Option<String>,
    pub scope: RunScope,
    pub system_prompt: String,
}

/// Entry point for memory-backed prompt preparation.
pub struct Mnemos {
    config: MnemosConfig,
    memory_store: Arc<dyn MemoryStore>,
    sessions: SessionResolver,
    prompt: PromptFiller,
    ingestor: BatchIngestor,
    tools: MemoryTools,
}

impl Mnemos {
    /// Build the configured storage backends.
    pub fn new(config: MnemosConfig) -> Result<Self, MnemosCoreError> {
        let (memory_store, session_index) = build_default_stores(&config)?;
        Ok(Self::with_stores(config, memory_store, session_index))
    }

    /// Wire the facade over caller-provided stores.
    pub fn with_stores(
        config: MnemosConfig,
        memory_store: Arc<dyn MemoryStore>,
        session_index: Arc<dyn SessionIndexStore>,
    ) -> Self {
        let resolver = MemoryResolver::new(memory_store.clone());
        let prompt = PromptFiller::new(resolver.clone(), config.prompt.run_metadata);
        debug!(
            "mnemos wired (provider={:?}, run_metadata={})",
            config.memory.provider, config.prompt.run_metadata
        );
        Self {
            sessions: SessionResolver::new(session_index),
            ingestor: BatchIngestor::new(memory_store.clone()),
            tools: MemoryTools::new(resolver),
            prompt,
            memory_store,
            config,
        }
    }

    pub fn config(&self) -> &MnemosConfig {
        &self.config
    }

    /// Resolve a session name to its durable id, creating it on first use.
    pub async fn resolve_session(&self, name: Option<&str>) -> Result<SessionId, MnemosCoreError> {
        self.sessions.resolve_or_create(name).await
    }

    /// Reverse lookup of a named session.
    pub async fn session_name(
        &self,
        session_id: SessionId,
    ) -> Result<Option<String>, MnemosCoreError> {
        self.sessions.session_name(session_id).await
    }

    /// Fill a template with the memory visible to `scope`.
    pub async fn fill_prompt(
        &self,
        template: &str,
        run_id: &str,
        scope: &RunScope,
    ) -> Result<String, MnemosCoreError> {
        self.prompt.fill_prompt(template, run_id, scope).await
    }

    /// Resolve the session, pick a run id, and fill the system prompt.
    pub async fn prepare_run(&self, request: RunRequest) -> Result<PreparedRun, MnemosCoreError> {
        let RunRequest {
            agent_id,
            user_id,
            session_name,
            template,
            run_id,
        } = request;
        let session_name = session_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let session_id = self.resolve_session(session_name.as_deref()).await?;
        let run_id = run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut scope = RunScope::new(agent_id).with_session(session_id);
        if let Some(user_id) = user_id {
            scope = scope.with_user(user_id);
        }
        let system_prompt = self.fill_prompt(&template, &run_id, &scope).await?;
        info!(
            "prepared run (run_id={}, agent_id={}, session_id={}, prompt_len={})",
            run_id,
            scope.agent_id,
            session_id,
            system_prompt.len()
        );
        Ok(PreparedRun {
            run_id,
            session_id,
            session_name,
            scope,
            system_prompt,
        })
    }

    /// Write records atomically, falling back to per-record writes.
    pub async fn ingest(&self, inputs: Vec<MemoryRecordInput>) -> IngestReport {
        self.ingestor.ingest(inputs).await
    }

    /// Tool-side read of any record visible to the run.
    pub async fn read_tool_memory(
        &self,
        name: &str,
        scope: &RunScope,
    ) -> Result<Option<Value>, MnemosCoreError> {
        self.tools.read(name, scope).await
    }

    /// Tool-side write, updating or creating a run-scoped record.
    pub async fn write_memory(
        &self,
        name: &str,
        content: Value,
        scope: &RunScope,
    ) -> Result<MemoryRecord, MnemosCoreError> {
        self.tools.write(name, content, scope).await
    }

    pub async fn create_memory(
        &self,
        input: MemoryRecordInput,
    ) -> Result<MemoryRecord, MnemosCoreError> {
        Ok(self.memory_store.create(input).await?)
    }

    pub async fn get_memory(&self, id: Uuid) -> Result<Option<MemoryRecord>, MnemosCoreError> {
        Ok(self.memory_store.get(id).await?)
    }

    pub async fn update_memory(
        &self,
        id: Uuid,
        update: MemoryUpdate,
    ) -> Result<MemoryRecord, MnemosCoreError> {
        Ok(self.memory_store.update(id, update).await?)
    }

    pub async fn delete_memory(&self, id: Uuid) -> Result<bool, MnemosCoreError> {
        Ok(self.memory_store.delete(id).await?)
    }

    pub async fn list_memory(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<MemoryRecord>, MnemosCoreError> {
        Ok(self.memory_store.list(filter).await?)
    }
}

/// Storage backends selected by `memory.provider`.
fn build_default_stores(
    config: &MnemosConfig,
) -> Result<(Arc<dyn MemoryStore>, Arc<dyn SessionIndexStore>), MnemosCoreError> {
    let memory_path = config.memory.resolved_path();
    match config.memory.provider {
        StoreProvider::File => {
            let sessions_path = config.sessions.resolved_path();
            info!(
                "using file stores (memory={}, sessions={})",
                memory_path, sessions_path
            );
            let memory: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(&memory_path)?);
            let sessions: Arc<dyn SessionIndexStore> = Arc::new(
                JsonlSessionIndex::new(&sessions_path)
                    .map_err(|err| MnemosCoreError::Config(err.to_string()))?,
            );
            Ok((memory, sessions))
        }
        StoreProvider::Sqlite => {
            info!("using sqlite store (path={})", memory_path);
            let store = Arc::new(
                SqliteStore::open(&memory_path)
                    .map_err(|err| MnemosCoreError::Config(err.to_string()))?,
            );
            let memory: Arc<dyn MemoryStore> = store.clone();
            let sessions: Arc<dyn SessionIndexStore> = store;
            Ok((memory, sessions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Mnemos, RunRequest};
    use mnemos_rs_config::{MemoryConfig, MnemosConfig, SessionsConfig, StoreProvider};
    use mnemos_rs_memory::{ListFilter, MemoryRecordInput, MemoryScope, MemoryUpdate};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn file_config(root: &std::path::Path) -> MnemosConfig {
        MnemosConfig::builder()
            .memory(MemoryConfig {
                provider: StoreProvider::File,
                path: Some(root.join("memory").display().to_string()),
            })
            .sessions(SessionsConfig {
                path: Some(root.join("sessions").display().to_string()),
            })
            .build()
    }

    fn sqlite_config(root: &std::path::Path) -> MnemosConfig {
        MnemosConfig::builder()
            .memory(MemoryConfig {
                provider: StoreProvider::Sqlite,
                path: Some(root.join("mnemos.db").display().to_string()),
            })
            .build()
    }

    async fn prepare_with(config: MnemosConfig) {
        let mnemos = Mnemos::new(config).expect("mnemos");
        let report = mnemos
            .ingest(vec![
                MemoryRecordInput::new("persona", "concise").with_scope(MemoryScope::agent("bot")),
                MemoryRecordInput::new("facts", json!(["sky is blue"])),
            ])
            .await;
        assert_eq!(report.created_count(), 2);

        let request = RunRequest {
            agent_id: "bot".to_string(),
            session_name: Some("daily".to_string()),
            template: "{{persona}} {{run_id}} {{facts}}".to_string(),
            run_id: Some("run-1".to_string()),
            ..RunRequest::default()
        };
        let first = mnemos.prepare_run(request.clone()).await.expect("first");
        assert_eq!(
            first.system_prompt,
            "concise run-1 [\n  \"sky is blue\"\n]"
        );
        assert_eq!(first.session_name.as_deref(), Some("daily"));
        assert_eq!(first.scope.session_id, Some(first.session_id));

        let second = mnemos.prepare_run(request).await.expect("second");
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(
            mnemos.session_name(first.session_id).await.expect("name"),
            Some("daily".to_string())
        );
    }

    #[tokio::test]
    async fn prepare_run_with_file_stores() {
        let temp = tempdir().expect("tempdir");
        prepare_with(file_config(temp.path())).await;
    }

    #[tokio::test]
    async fn prepare_run_with_sqlite_store() {
        let temp = tempdir().expect("tempdir");
        prepare_with(sqlite_config(temp.path())).await;
    }

    #[tokio::test]
    async fn anonymous_runs_get_fresh_sessions_and_run_ids() {
        let temp = tempdir().expect("tempdir");
        let mnemos = Mnemos::new(file_config(temp.path())).expect("mnemos");
        let request = RunRequest {
            agent_id: "bot".to_string(),
            session_name: Some("  ".to_string()),
            template: "{{run_id}}".to_string(),
            ..RunRequest::default()
        };
        let a = mnemos.prepare_run(request.clone()).await.expect("a");
        let b = mnemos.prepare_run(request).await.expect("b");
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.session_name, None);
        assert_eq!(a.system_prompt, a.run_id);
    }

    #[tokio::test]
    async fn memory_crud_through_facade() {
        let temp = tempdir().expect("tempdir");
        let mnemos = Mnemos::new(sqlite_config(temp.path())).expect("mnemos");
        let record = mnemos
            .create_memory(MemoryRecordInput::new("goal", "ship"))
            .await
            .expect("create");
        mnemos
            .update_memory(record.id, MemoryUpdate::content("ship v2"))
            .await
            .expect("update");
        assert_eq!(
            mnemos
                .get_memory(record.id)
                .await
                .expect("get")
                .map(|record| record.content),
            Some(json!("ship v2"))
        );
        assert_eq!(
            mnemos.list_memory(&ListFilter::default()).await.expect("list").len(),
            1
        );
        assert!(mnemos.delete_memory(record.id).await.expect("delete"));
        assert_eq!(mnemos.get_memory(record.id).await.expect("get"), None);
    }
}
