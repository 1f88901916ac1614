//! Turns scoped memory records into template variables.

use crate::error::MemoryError;
use crate::model::{MemoryRecord, ReadMode, RunScope, prefer};
use crate::store::MemoryStore;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves the memory visible to a run.
///
/// When several records share a name, the one with the most scope fields set
/// wins and the most recently updated record breaks ties.
#[derive(Clone)]
pub struct MemoryResolver {
    store: Arc<dyn MemoryStore>,
}

impl MemoryResolver {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Underlying store handle.
    pub fn store(&self) -> Arc<dyn MemoryStore> {
        self.store.clone()
    }

    /// Name to content mapping of `system_prompt` records in scope.
    pub async fn resolve(&self, scope: &RunScope) -> Result<BTreeMap<String, Value>, MemoryError> {
        let records = self.store.find_in_scope(scope).await?;
        let total = records.len();
        let selected = select_most_specific(
            records
                .into_iter()
                .filter(|record| record.read_mode == ReadMode::SystemPrompt),
        );
        debug!(
            "resolved memory (agent_id={}, candidates={}, variables={})",
            scope.agent_id,
            total,
            selected.len()
        );
        Ok(selected
            .into_iter()
            .map(|(name, record)| (name, record.content))
            .collect())
    }

    /// On-demand lookup used by agent tools mid-run.
    pub async fn read_tool_memory(
        &self,
        name: &str,
        scope: &RunScope,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.store.find_by_name(name, scope).await?;
        Ok(select_most_specific(records).remove(name))
    }
}

/// Keep one record per name according to scope precedence.
pub fn select_most_specific(
    records: impl IntoIterator<Item = MemoryRecord>,
) -> BTreeMap<String, MemoryRecord> {
    let mut selected: BTreeMap<String, MemoryRecord> = BTreeMap::new();
    for record in records {
        match selected.get(&record.name) {
            Some(current) if !prefer(&record, current) => {}
            _ => {
                selected.insert(record.name.clone(), record);
            }
        }
    }
    selected
}
