//! Script executor trait and the type-routing registry

use crate::error::ScriptError;
use async_trait::async_trait;
use hookscript_core::{EventEnvelope, Result, ScriptMap};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Runs scripts of one or more types
///
/// `Ok(None)` means the script decided there was nothing to do. Errors are
/// execution faults and are never used to signal "no result".
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `content` as a script of `script_type` against `data`
    async fn execute(
        &self,
        name: &str,
        content: &str,
        script_type: &str,
        config: &ScriptMap,
        data: &EventEnvelope,
    ) -> Result<Option<Value>>;
}

/// Routes execution to the executor registered for the script's type
///
/// Type identifiers are matched case-insensitively.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn ScriptExecutor>>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("script_types", &self.script_types())
            .finish()
    }
}

impl ExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Rhai executor under `rhai`
    pub fn with_defaults() -> Self {
        Self::new().with_executor("rhai", Arc::new(crate::rhai_executor::RhaiExecutor::new()))
    }

    /// Register an executor for a script type, replacing any previous one
    pub fn with_executor(mut self, script_type: &str, executor: Arc<dyn ScriptExecutor>) -> Self {
        self.register(script_type, executor);
        self
    }

    /// Register an executor for a script type, replacing any previous one
    pub fn register(&mut self, script_type: &str, executor: Arc<dyn ScriptExecutor>) {
        self.executors
            .insert(script_type.to_lowercase(), executor);
    }

    /// Whether an executor handles `script_type`
    pub fn supports(&self, script_type: &str) -> bool {
        self.executors.contains_key(&script_type.to_lowercase())
    }

    /// Registered type identifiers, sorted
    pub fn script_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }
}

#[async_trait]
impl ScriptExecutor for ExecutorRegistry {
    async fn execute(
        &self,
        name: &str,
        content: &str,
        script_type: &str,
        config: &ScriptMap,
        data: &EventEnvelope,
    ) -> Result<Option<Value>> {
        let executor = self
            .executors
            .get(&script_type.to_lowercase())
            .ok_or_else(|| ScriptError::unsupported_type(script_type).into_fault(name))?;

        trace!(script = %name, script_type = %script_type, "Routing script to executor");
        executor
            .execute(name, content, script_type, config, data)
            .await
    }
}
