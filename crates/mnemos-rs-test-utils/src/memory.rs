use async_trait::async_trait;
use mnemos_rs_memory::store::check_inputs;
use mnemos_rs_memory::{
    ListFilter, MemoryError, MemoryRecord, MemoryRecordInput, MemoryStore, MemoryUpdate, RunScope,
};
use parking_lot::RwLock;
use uuid::Uuid;

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct StubMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
    fail_batch: bool,
    fail_reads: bool,
}

impl StubMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `create_batch` call fails; single creates still work.
    pub fn failing_batches() -> Self {
        Self {
            fail_batch: true,
            ..Self::default()
        }
    }

    /// Scope lookups fail, simulating an unreachable backend.
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MemoryStore for StubMemoryStore {
    async fn create(&self, input: MemoryRecordInput) -> Result<MemoryRecord, MemoryError> {
        let mut records = self.records.write();
        check_inputs(&records, std::slice::from_ref(&input))?;
        let record = MemoryRecord::from_input(input);
        records.push(record.clone());
        Ok(record)
    }

    async fn create_batch(
        &self,
        inputs: Vec<MemoryRecordInput>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        if self.fail_batch {
            return Err(MemoryError::Store("batch writes unavailable".to_string()));
        }
        let mut records = self.records.write();
        check_inputs(&records, &inputs)?;
        let created: Vec<MemoryRecord> = inputs.into_iter().map(MemoryRecord::from_input).collect();
        records.extend(created.iter().cloned());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn find_in_scope(&self, scope: &RunScope) -> Result<Vec<MemoryRecord>, MemoryError> {
        if self.fail_reads {
            return Err(MemoryError::Store("store unreachable".to_string()));
        }
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| record.scope.matches(scope))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| filter.accepts(record))
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, update: MemoryUpdate) -> Result<MemoryRecord, MemoryError> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(MemoryError::NotFound(id))?;
        record.apply(update);
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() != before)
    }
}
