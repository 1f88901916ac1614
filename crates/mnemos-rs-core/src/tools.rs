//! Memory access for agent tools during a run.

use crate::error::MnemosCoreError;
use log::{debug, info};
use mnemos_rs_memory::{
    Access, MemoryRecord, MemoryRecordInput, MemoryResolver, MemoryUpdate, ReadMode, RunScope,
};
use serde_json::Value;

/// Read and write memory on behalf of a running agent, enforcing access.
#[derive(Clone)]
pub struct MemoryTools {
    resolver: MemoryResolver,
}

impl MemoryTools {
    pub fn new(resolver: MemoryResolver) -> Self {
        Self { resolver }
    }

    /// Content of the most specific record named `name`, in any read mode.
    pub async fn read(
        &self,
        name: &str,
        scope: &RunScope,
    ) -> Result<Option<Value>, MnemosCoreError> {
        let Some(record) = self.resolver.read_tool_memory(name, scope).await? else {
            debug!("tool memory read missed (name={}, agent_id={})", name, scope.agent_id);
            return Ok(None);
        };
        if !record.access.allows_read() {
            return Err(MnemosCoreError::Permission(format!(
                "memory record is write-only: {name}"
            )));
        }
        Ok(Some(record.content))
    }

    /// Replace the content of the most specific record, or create one
    /// scoped to the run when none exists.
    pub async fn write(
        &self,
        name: &str,
        content: Value,
        scope: &RunScope,
    ) -> Result<MemoryRecord, MnemosCoreError> {
        let store = self.resolver.store();
        match self.resolver.read_tool_memory(name, scope).await? {
            Some(record) if !record.access.allows_write() => Err(MnemosCoreError::Permission(
                format!("memory record is read-only: {name}"),
            )),
            Some(record) => {
                let updated = store
                    .update(record.id, MemoryUpdate::content(content))
                    .await?;
                info!(
                    "tool updated memory (name={}, id={}, agent_id={})",
                    name, updated.id, scope.agent_id
                );
                Ok(updated)
            }
            None => {
                let input = MemoryRecordInput::new(name, content)
                    .with_scope(scope.to_memory_scope())
                    .with_read_mode(ReadMode::SystemPrompt)
                    .with_access(Access::Both);
                let created = store.create(input).await?;
                info!(
                    "tool created memory (name={}, id={}, agent_id={})",
                    name, created.id, scope.agent_id
                );
                Ok(created)
            }
        }
    }
}
