//! Memory store abstraction and the default JSONL file implementation.

use crate::error::MemoryError;
use crate::lock::FileLock;
use crate::model::{ListFilter, MemoryRecord, MemoryRecordInput, MemoryUpdate, RunScope};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[async_trait]
/// Storage collaborator for memory records.
pub trait MemoryStore: Send + Sync {
    /// Create one record. Rejects a duplicate name within the same scope.
    async fn create(&self, input: MemoryRecordInput) -> Result<MemoryRecord, MemoryError>;

    /// Create all records or none. Output order matches input order.
    async fn create_batch(
        &self,
        inputs: Vec<MemoryRecordInput>,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, MemoryError>;

    /// Records whose scope matches the run, in any read mode.
    async fn find_in_scope(&self, scope: &RunScope) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Records with the given name whose scope matches the run.
    async fn find_by_name(
        &self,
        name: &str,
        scope: &RunScope,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = self.find_in_scope(scope).await?;
        records.retain(|record| record.name == name);
        Ok(records)
    }

    /// Operator listing with exact-match filters.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Apply a partial update to an existing record.
    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<MemoryRecord, MemoryError>;

    /// Delete a record, returning whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError>;
}

/// File-backed memory store keeping every record in one JSONL file.
///
/// Writers hold an exclusive advisory lock on `records.lock` across the
/// duplicate check and the write; readers hold it shared.
#[derive(Debug)]
pub struct FileMemoryStore {
    /// Root directory for the records file.
    root: PathBuf,
    /// Serialize read-modify-write access within this instance.
    write_lock: Mutex<()>,
}

const RECORDS_FILE: &str = "records.jsonl";
const LOCK_FILE: &str = "records.lock";

impl FileMemoryStore {
    /// Create a new file-backed store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("initialized file memory store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the records JSONL file.
    fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    /// Path to the temporary records file.
    fn temp_path(&self) -> PathBuf {
        self.root.join(format!("{RECORDS_FILE}.tmp"))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn lock_exclusive(&self) -> Result<FileLock, MemoryError> {
        Ok(FileLock::exclusive(&self.lock_path())?)
    }

    /// Load all records under a shared lock.
    fn read_records(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let _shared = FileLock::shared(&self.lock_path())?;
        self.load_records()
    }

    /// Load all records. Callers hold the lock file.
    fn load_records(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MemoryRecord = serde_json::from_str(&line)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Append records to the file.
    fn append_records(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.records_path())?;
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())?;
        Ok(())
    }

    /// Rewrite all records atomically.
    fn write_records(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        let path = self.records_path();
        let temp_path = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
        }
        std::fs::rename(temp_path, path)?;
        Ok(())
    }
}

/// Validate inputs against existing records and each other.
pub fn check_inputs(
    existing: &[MemoryRecord],
    inputs: &[MemoryRecordInput],
) -> Result<(), MemoryError> {
    for (index, input) in inputs.iter().enumerate() {
        input.validate()?;
        let clashes_existing = existing
            .iter()
            .any(|record| record.same_slot(&input.name, &input.scope));
        let clashes_batch = inputs[..index]
            .iter()
            .any(|earlier| earlier.name == input.name && earlier.scope == input.scope);
        if clashes_existing || clashes_batch {
            return Err(MemoryError::Duplicate {
                name: input.name.clone(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn create(&self, input: MemoryRecordInput) -> Result<MemoryRecord, MemoryError> {
        let _guard = self.write_lock.lock();
        let _file_lock = self.lock_exclusive()?;
        let existing = self.load_records()?;
        check_inputs(&existing, std::slice::from_ref(&input))?;
        let record = MemoryRecord::from_input(input);
        self.append_records(std::slice::from_ref(&record))?;
        debug!(
            "stored memory record (id={}, name={}, read_mode={})",
            record.id,
            record.name,
            record.read_mode.as_str()
        );
        Ok(record)
    }

    async fn create_batch(
        &self,
        inputs: Vec<MemoryRecordInput>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let _guard = self.write_lock.lock();
        let _file_lock = self.lock_exclusive()?;
        let existing = self.load_records()?;
        check_inputs(&existing, &inputs)?;
        let created: Vec<MemoryRecord> = inputs.into_iter().map(MemoryRecord::from_input).collect();
        let mut next = existing;
        next.extend(created.iter().cloned());
        self.write_records(&next)?;
        info!("stored memory batch (count={})", created.len());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(self.read_records()?.into_iter().find(|record| record.id == id))
    }

    async fn find_in_scope(&self, scope: &RunScope) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = self.read_records()?;
        records.retain(|record| record.scope.matches(scope));
        debug!(
            "found scoped memory (agent_id={}, returned={})",
            scope.agent_id,
            records.len()
        );
        Ok(records)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = self.read_records()?;
        records.retain(|record| filter.accepts(record));
        Ok(records)
    }

    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<MemoryRecord, MemoryError> {
        let _guard = self.write_lock.lock();
        let _file_lock = self.lock_exclusive()?;
        let mut records = self.load_records()?;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(MemoryError::NotFound(id))?;
        record.apply(update);
        let updated = record.clone();
        self.write_records(&records)?;
        debug!("updated memory record (id={}, name={})", id, updated.name);
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError> {
        let _guard = self.write_lock.lock();
        let _file_lock = self.lock_exclusive()?;
        let mut records = self.load_records()?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            warn!("memory record not found for delete (id={})", id);
            return Ok(false);
        }
        self.write_records(&records)?;
        info!("deleted memory record (id={})", id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{FileMemoryStore, MemoryStore};
    use crate::error::MemoryError;
    use crate::model::{
        Access, ListFilter, MemoryRecordInput, MemoryScope, MemoryUpdate, ReadMode, RunScope,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn create_persists_across_instances() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        let record = store
            .create(
                MemoryRecordInput::new("persona", json!({ "tone": "calm" }))
                    .with_scope(MemoryScope::agent("agent"))
                    .with_metadata("priority", 1),
            )
            .await
            .expect("create");

        let reopened = FileMemoryStore::new(temp.path()).expect("store");
        let loaded = reopened.get(record.id).await.expect("get").expect("record");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_slot() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        let input = MemoryRecordInput::new("persona", "a").with_scope(MemoryScope::agent("agent"));
        store.create(input.clone()).await.expect("first");
        let err = store.create(input).await.expect_err("duplicate");
        assert!(matches!(err, MemoryError::Duplicate { name } if name == "persona"));

        // Same name under a different scope is a different slot.
        store
            .create(MemoryRecordInput::new("persona", "b").with_scope(MemoryScope::agent("other")))
            .await
            .expect("other scope");
    }

    #[tokio::test]
    async fn create_batch_is_all_or_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        let inputs = vec![
            MemoryRecordInput::new("a", "1"),
            MemoryRecordInput::new("b", "2"),
            MemoryRecordInput::new("a", "3"),
        ];
        let err = store.create_batch(inputs).await.expect_err("duplicate");
        assert!(matches!(err, MemoryError::Duplicate { .. }));
        assert!(store.list(&ListFilter::default()).await.expect("list").is_empty());

        let created = store
            .create_batch(vec![MemoryRecordInput::new("a", "1"), MemoryRecordInput::new("b", "2")])
            .await
            .expect("batch");
        let names: Vec<_> = created.iter().map(|record| record.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn find_in_scope_filters_by_run() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        store
            .create_batch(vec![
                MemoryRecordInput::new("global", "g"),
                MemoryRecordInput::new("mine", "m").with_scope(MemoryScope::agent("agent")),
                MemoryRecordInput::new("theirs", "t").with_scope(MemoryScope::agent("other")),
                MemoryRecordInput::new("user", "u")
                    .with_scope(MemoryScope::agent("agent").with_user("u1")),
            ])
            .await
            .expect("batch");

        let mut names: Vec<String> = store
            .find_in_scope(&RunScope::new("agent"))
            .await
            .expect("find")
            .into_iter()
            .map(|record| record.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["global".to_string(), "mine".to_string()]);

        let found = store
            .find_by_name("user", &RunScope::new("agent").with_user("u1"))
            .await
            .expect("by name");
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        let record = store
            .create(MemoryRecordInput::new("notes", "v1"))
            .await
            .expect("create");

        let updated = store
            .update(
                record.id,
                MemoryUpdate {
                    content: Some(json!("v2")),
                    read_mode: Some(ReadMode::ToolCall),
                    access: Some(Access::Read),
                    ..MemoryUpdate::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.content, json!("v2"));
        assert_eq!(updated.read_mode, ReadMode::ToolCall);
        assert_eq!(updated.created_at, record.created_at);

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, MemoryUpdate::content("x")).await,
            Err(MemoryError::NotFound(id)) if id == missing
        ));

        assert_eq!(store.delete(record.id).await.expect("delete"), true);
        assert_eq!(store.delete(record.id).await.expect("delete again"), false);
        assert_eq!(store.get(record.id).await.expect("get"), None);
    }

    #[tokio::test]
    async fn list_applies_filters() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path()).expect("store");
        store
            .create_batch(vec![
                MemoryRecordInput::new("a", "1").with_scope(MemoryScope::agent("x")),
                MemoryRecordInput::new("b", "2").with_scope(MemoryScope::agent("y")),
            ])
            .await
            .expect("batch");
        let filter = ListFilter {
            agent_id: Some("y".to_string()),
            ..ListFilter::default()
        };
        let records = store.list(&filter).await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b");
    }

    #[test]
    fn separate_instances_never_duplicate_a_slot() {
        let temp = tempdir().expect("tempdir");
        for round in 0..25 {
            let barrier = Arc::new(Barrier::new(2));
            let results: Vec<bool> = thread::scope(|scope| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        let barrier = barrier.clone();
                        let root = temp.path();
                        scope.spawn(move || {
                            let store = FileMemoryStore::new(root).expect("store");
                            let runtime = tokio::runtime::Builder::new_current_thread()
                                .build()
                                .expect("runtime");
                            barrier.wait();
                            runtime
                                .block_on(store.create(
                                    MemoryRecordInput::new("persona", "x")
                                        .with_scope(MemoryScope::agent(format!("agent{round}"))),
                                ))
                                .is_ok()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().expect("join"))
                    .collect()
            });
            assert_eq!(results.iter().filter(|created| **created).count(), 1);
        }

        let store = FileMemoryStore::new(temp.path()).expect("store");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let records = runtime
            .block_on(store.list(&ListFilter::default()))
            .expect("list");
        assert_eq!(records.len(), 25);
    }
}
