//! Batch ingestion with per-record fallback.
//!
//! Ingestion first tries one atomic batch write. If that fails for any
//! reason, every input is written on its own, in input order, and each
//! outcome is reported separately. Re-running an ingestion after a partial
//! fallback can create duplicates unless the store rejects them by name and
//! scope.

use crate::model::{MemoryRecord, MemoryRecordInput};
use crate::store::MemoryStore;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Which write path produced the report.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// The atomic batch write succeeded.
    Batch,
    /// The batch write failed and records were written one at a time.
    Fallback,
}

/// Result for a single input record.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created { record: MemoryRecord },
    Failed { name: String, reason: String },
}

impl IngestOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, IngestOutcome::Created { .. })
    }

    /// The created record, if any.
    pub fn record(&self) -> Option<&MemoryRecord> {
        match self {
            IngestOutcome::Created { record } => Some(record),
            IngestOutcome::Failed { .. } => None,
        }
    }
}

/// Per-record report, in input order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    pub mode: IngestMode,
    /// Reason the batch write was abandoned, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_error: Option<String>,
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn created_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_created()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.created_count()
    }
}

/// Two-phase ingestion coordinator over a memory store.
#[derive(Clone)]
pub struct BatchIngestor {
    store: Arc<dyn MemoryStore>,
}

impl BatchIngestor {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Write all inputs, degrading to per-record writes if the batch fails.
    pub async fn ingest(&self, inputs: Vec<MemoryRecordInput>) -> IngestReport {
        if inputs.is_empty() {
            return IngestReport {
                mode: IngestMode::Batch,
                batch_error: None,
                outcomes: Vec::new(),
            };
        }
        match self.store.create_batch(inputs.clone()).await {
            Ok(records) => {
                info!("memory batch ingested (count={})", records.len());
                IngestReport {
                    mode: IngestMode::Batch,
                    batch_error: None,
                    outcomes: records
                        .into_iter()
                        .map(|record| IngestOutcome::Created { record })
                        .collect(),
                }
            }
            Err(err) => {
                warn!(
                    "memory batch failed, writing records individually (count={}, error={})",
                    inputs.len(),
                    err
                );
                let outcomes = self.write_each(inputs).await;
                IngestReport {
                    mode: IngestMode::Fallback,
                    batch_error: Some(err.to_string()),
                    outcomes,
                }
            }
        }
    }

    /// Sequential per-record writes that continue past failures.
    async fn write_each(&self, inputs: Vec<MemoryRecordInput>) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let name = input.name.clone();
            match self.store.create(input).await {
                Ok(record) => outcomes.push(IngestOutcome::Created { record }),
                Err(err) => {
                    warn!("memory record failed (index={index}, name={name}, error={err})");
                    outcomes.push(IngestOutcome::Failed {
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        let created = outcomes.iter().filter(|outcome| outcome.is_created()).count();
        info!(
            "memory fallback ingestion finished (created={}, failed={})",
            created,
            outcomes.len() - created
        );
        outcomes
    }
}
