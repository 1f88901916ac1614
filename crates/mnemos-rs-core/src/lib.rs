//! Core runtime for Mnemos.
//!
//! This crate owns session identity, prompt filling, tool-side memory access,
//! the SQLite backend, and the `Mnemos` facade used by the SDK and CLI.

pub mod error;
pub mod prompt;
pub mod runtime;
pub mod sessions;
pub mod sqlite;
pub mod state;
pub mod tools;

pub use error::MnemosCoreError;
pub use prompt::PromptFiller;
/// Facade and run preparation types.
pub use runtime::{Mnemos, PreparedRun, RunRequest};
pub use sessions::SessionResolver;
pub use sqlite::SqliteStore;
/// Session index persistence.
pub use state::{JsonlSessionIndex, SessionIndexStore, SessionMapping, StateError};
pub use tools::MemoryTools;
