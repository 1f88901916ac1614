//! Error types for the core crate.

use mnemos_rs_memory::MemoryError;
use thiserror::Error;

/// Errors returned by session, prompt, and memory tool operations.
#[derive(Debug, Error)]
pub enum MnemosCoreError {
    /// Memory store or resolution failure.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// Session index failure.
    #[error("state error: {0}")]
    State(String),
    /// A run tried to read or write a record its access level forbids.
    #[error("permission error: {0}")]
    Permission(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config or backend construction error.
    #[error("config error: {0}")]
    Config(String),
}
