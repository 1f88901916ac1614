//! Memory record model shared by stores, the resolver, and ingestion.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Session identifier type.
pub type SessionId = Uuid;

/// Caller-defined flags carried alongside a record and never interpreted.
pub type Metadata = BTreeMap<String, Value>;

/// How a record reaches the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Substituted directly into the system prompt.
    #[default]
    SystemPrompt,
    /// Fetched on demand by a tool invocation.
    ToolCall,
}

impl ReadMode {
    /// Wire name for the read mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadMode::SystemPrompt => "system_prompt",
            ReadMode::ToolCall => "tool_call",
        }
    }

    /// Parse the wire name for a read mode.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system_prompt" => Some(ReadMode::SystemPrompt),
            "tool_call" => Some(ReadMode::ToolCall),
            _ => None,
        }
    }
}

/// What an agent run may do with a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Consume only.
    Read,
    /// Produce or update only.
    Write,
    /// Consume and update.
    #[default]
    Both,
}

impl Access {
    /// Wire name for the access level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Both => "both",
        }
    }

    /// Parse the wire name for an access level.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Access::Read),
            "write" => Some(Access::Write),
            "both" => Some(Access::Both),
            _ => None,
        }
    }

    /// Whether an agent run may read the record.
    pub fn allows_read(&self) -> bool {
        matches!(self, Access::Read | Access::Both)
    }

    /// Whether an agent run may mutate the record.
    pub fn allows_write(&self) -> bool {
        matches!(self, Access::Write | Access::Both)
    }
}

/// Ownership scope of a record. Unset fields match any run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct MemoryScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl MemoryScope {
    /// Scope that is visible to every run.
    pub fn global() -> Self {
        Self::default()
    }

    /// Scope narrowed to a single agent.
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Narrow the scope to a user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Narrow the scope to a session.
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// True when every set field equals the run's corresponding id.
    pub fn matches(&self, run: &RunScope) -> bool {
        let agent_ok = self
            .agent_id
            .as_deref()
            .is_none_or(|agent_id| agent_id == run.agent_id);
        let user_ok = match &self.user_id {
            Some(user_id) => run.user_id.as_deref() == Some(user_id.as_str()),
            None => true,
        };
        let session_ok = match self.session_id {
            Some(session_id) => run.session_id == Some(session_id),
            None => true,
        };
        agent_ok && user_ok && session_ok
    }

    /// Number of scope fields that are set.
    pub fn specificity(&self) -> usize {
        usize::from(self.agent_id.is_some())
            + usize::from(self.user_id.is_some())
            + usize::from(self.session_id.is_some())
    }
}

/// Ids identifying a single agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunScope {
    pub agent_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<SessionId>,
}

impl RunScope {
    /// Run scope for an agent without user or session.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: None,
            session_id: None,
        }
    }

    /// Attach a user id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a session id.
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// The most specific record scope for this run.
    pub fn to_memory_scope(&self) -> MemoryScope {
        MemoryScope {
            agent_id: Some(self.agent_id.clone()),
            user_id: self.user_id.clone(),
            session_id: self.session_id,
        }
    }
}

/// Persisted memory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Placeholder name used in templates.
    pub name: String,
    /// Free text explaining intent.
    #[serde(default)]
    pub description: Option<String>,
    /// Plain text (JSON string) or structured content.
    pub content: Value,
    pub read_mode: ReadMode,
    pub access: Access,
    /// Ownership scope.
    #[serde(flatten)]
    pub scope: MemoryScope,
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Build a new record from input, stamping id and timestamps.
    pub fn from_input(input: MemoryRecordInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            content: input.content,
            read_mode: input.read_mode,
            access: input.access,
            scope: input.scope,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when both records share name and scope.
    pub fn same_slot(&self, name: &str, scope: &MemoryScope) -> bool {
        self.name == name && &self.scope == scope
    }

    /// Apply an update, bumping `updated_at`.
    pub fn apply(&mut self, update: MemoryUpdate) {
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(read_mode) = update.read_mode {
            self.read_mode = read_mode;
        }
        if let Some(access) = update.access {
            self.access = access;
        }
        if let Some(metadata) = update.metadata {
            self.metadata = metadata;
        }
        self.updated_at = Utc::now();
    }
}

/// Creation payload for a memory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecordInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub read_mode: ReadMode,
    #[serde(default)]
    pub access: Access,
    #[serde(flatten)]
    pub scope: MemoryScope,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryRecordInput {
    /// Input with plain-text content and default modes.
    pub fn new(name: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            description: None,
            content: content.into(),
            read_mode: ReadMode::default(),
            access: Access::default(),
            scope: MemoryScope::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reject names that can never be used as a template placeholder, and
    /// empty scope ids, which stores would otherwise read back as unset.
    pub fn validate(&self) -> Result<(), MemoryError> {
        validate_name(&self.name)?;
        let ids = [
            ("agent_id", &self.scope.agent_id),
            ("user_id", &self.scope.user_id),
        ];
        for (field, value) in ids {
            if value.as_deref().is_some_and(|id| id.trim().is_empty()) {
                return Err(MemoryError::Validation(format!(
                    "{field} must not be empty; omit it for an unscoped record"
                )));
            }
        }
        Ok(())
    }
}

/// Partial update for a memory record. Name and scope are immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub read_mode: Option<ReadMode>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl MemoryUpdate {
    /// Update that only replaces content.
    pub fn content(content: impl Into<Value>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Filter for operator listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub agent_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<SessionId>,
    pub name: Option<String>,
}

impl ListFilter {
    /// Whether a record passes every set filter field.
    pub fn accepts(&self, record: &MemoryRecord) -> bool {
        let field_ok = |filter: &Option<String>, value: &Option<String>| match filter {
            Some(expected) => value.as_deref() == Some(expected.as_str()),
            None => true,
        };
        field_ok(&self.agent_id, &record.scope.agent_id)
            && field_ok(&self.user_id, &record.scope.user_id)
            && self
                .session_id
                .is_none_or(|session_id| record.scope.session_id == Some(session_id))
            && self
                .name
                .as_deref()
                .is_none_or(|name| record.name == name)
    }
}

/// Names must be non-empty and match `[a-zA-Z_]+`.
pub fn validate_name(name: &str) -> Result<(), MemoryError> {
    if name.is_empty() {
        return Err(MemoryError::Validation("name is required".to_string()));
    }
    if !name.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '_') {
        return Err(MemoryError::Validation(format!(
            "name must match [a-zA-Z_]+: {name}"
        )));
    }
    Ok(())
}

/// Order two candidates for the same name: most specific scope first, then
/// most recently updated.
pub fn prefer(candidate: &MemoryRecord, current: &MemoryRecord) -> bool {
    let (a, b) = (candidate.scope.specificity(), current.scope.specificity());
    a > b || (a == b && candidate.updated_at > current.updated_at)
}
