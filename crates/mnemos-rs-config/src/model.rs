//! Configuration schema for Mnemos.

use serde::{Deserialize, Serialize};

/// Root config for the Mnemos SDK.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemosConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl MnemosConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemosConfigBuilder {
        MnemosConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemosConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemosConfigBuilder {
    config: MnemosConfig,
}

impl MnemosConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemosConfig::default(),
        }
    }

    /// Replace the memory store configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the session index configuration.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the prompt filling configuration.
    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.config.prompt = prompt;
        self
    }

    /// Finalize and return the built `MnemosConfig`.
    pub fn build(self) -> MnemosConfig {
        self.config
    }
}

/// Storage backend used for memory records and session names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// JSONL files on disk.
    #[default]
    File,
    /// A single SQLite database shared by memory and sessions.
    Sqlite,
}

/// Memory store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    #[serde(default)]
    pub provider: StoreProvider,
    /// Directory for the file provider, database file for sqlite.
    #[serde(default)]
    pub path: Option<String>,
}

impl MemoryConfig {
    /// Configured path or the provider's default location.
    pub fn resolved_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| match self.provider {
            StoreProvider::File => default_memory_dir(),
            StoreProvider::Sqlite => default_sqlite_path(),
        })
    }
}

/// Default memory directory for the file provider.
fn default_memory_dir() -> String {
    ".mnemos/memory".to_string()
}

/// Default database path for the sqlite provider.
fn default_sqlite_path() -> String {
    ".mnemos/mnemos.db".to_string()
}

/// Session name index configuration.
///
/// Ignored when the memory provider is sqlite; both share one database.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionsConfig {
    #[serde(default)]
    pub path: Option<String>,
}

impl SessionsConfig {
    /// Configured path or the default sessions directory.
    pub fn resolved_path(&self) -> String {
        self.path
            .clone()
            .unwrap_or_else(|| ".mnemos/sessions".to_string())
    }
}

/// Prompt filling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Expose `agent_id`, `user_id`, and `session_id` as template variables.
    #[serde(default = "default_run_metadata")]
    pub run_metadata: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            run_metadata: default_run_metadata(),
        }
    }
}

fn default_run_metadata() -> bool {
    true
}
