//! System prompt filling from resolved memory.

use crate::error::MnemosCoreError;
use log::debug;
use mnemos_rs_memory::template::RUN_ID_VARIABLE;
use mnemos_rs_memory::{MemoryResolver, RunScope, extract_variables, fill};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fills prompt templates with the memory visible to a run.
#[derive(Clone)]
pub struct PromptFiller {
    resolver: MemoryResolver,
    /// Expose `agent_id`, `user_id`, and `session_id` to templates.
    run_metadata: bool,
}

impl PromptFiller {
    pub fn new(resolver: MemoryResolver, run_metadata: bool) -> Self {
        Self {
            resolver,
            run_metadata,
        }
    }

    /// Resolve memory for `scope` and substitute it into `template`.
    ///
    /// The returned prompt contains no `{{name}}` placeholders. Store failures
    /// are returned rather than rendered.
    pub async fn fill_prompt(
        &self,
        template: &str,
        run_id: &str,
        scope: &RunScope,
    ) -> Result<String, MnemosCoreError> {
        let requested = extract_variables(template);
        let needs_memory = requested.iter().any(|name| name != RUN_ID_VARIABLE);
        let mut variables = if needs_memory {
            self.resolver.resolve(scope).await?
        } else {
            BTreeMap::new()
        };
        if self.run_metadata {
            insert_run_metadata(&mut variables, scope);
        }
        debug!(
            "filling prompt (agent_id={}, run_id={}, requested={}, variables={})",
            scope.agent_id,
            run_id,
            requested.len(),
            variables.len()
        );
        Ok(fill(template, &variables, Some(run_id)))
    }
}

/// Memory records keep precedence over run metadata of the same name.
fn insert_run_metadata(variables: &mut BTreeMap<String, Value>, scope: &RunScope) {
    variables
        .entry("agent_id".to_string())
        .or_insert_with(|| Value::String(scope.agent_id.clone()));
    if let Some(user_id) = &scope.user_id {
        variables
            .entry("user_id".to_string())
            .or_insert_with(|| Value::String(user_id.clone()));
    }
    if let Some(session_id) = scope.session_id {
        variables
            .entry("session_id".to_string())
            .or_insert_with(|| Value::String(session_id.to_string()));
    }
}
