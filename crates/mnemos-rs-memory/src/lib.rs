//! Scoped agent memory for Mnemos.
//!
//! Records are named pieces of content owned by an agent, user, or session.
//! The resolver turns the records visible to a run into template variables,
//! and the template engine substitutes them into a system prompt.

pub mod error;
pub mod ingest;
pub mod lock;
pub mod model;
pub mod resolver;
pub mod store;
pub mod template;

/// Memory error type.
pub use error::MemoryError;
/// Batch ingestion.
pub use ingest::{BatchIngestor, IngestMode, IngestOutcome, IngestReport};
/// Memory record model.
pub use model::{
    Access, ListFilter, MemoryRecord, MemoryRecordInput, MemoryScope, MemoryUpdate, Metadata,
    ReadMode, RunScope, SessionId,
};
pub use resolver::MemoryResolver;
/// Memory store interface and default file implementation.
pub use store::{FileMemoryStore, MemoryStore};
pub use template::{extract_variables, fill};
