//! Event script storage and read-time resolution

use async_trait::async_trait;
use chrono::Utc;
use hookscript_core::{Error, EventScript, Result, ScriptMap};
use hookscript_scripting::{LookupResolver, NoLookups};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persists event scripts
#[async_trait]
pub trait ScriptRecordStore: Send + Sync {
    /// Exact-name lookup returning the script only when it is active
    ///
    /// Names are unique, so at most one record can match.
    async fn find_active_by_name(&self, name: &str) -> Result<Option<EventScript>>;
}

/// In-process script store keyed by name
#[derive(Clone, Default)]
pub struct InMemoryScriptStore {
    scripts: Arc<RwLock<HashMap<String, EventScript>>>,
}

impl std::fmt::Debug for InMemoryScriptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryScriptStore")
            .field("scripts", &"<opaque>")
            .finish()
    }
}

impl InMemoryScriptStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a script, maintaining audit timestamps
    pub async fn upsert(&self, mut script: EventScript) -> EventScript {
        let now = Utc::now();
        let mut scripts = self.scripts.write().await;

        match scripts.get(&script.name) {
            Some(existing) => {
                script.created_date = existing.created_date;
                script.created_by = existing.created_by;
            }
            None => {
                script.created_date.get_or_insert(now);
            }
        }
        script.last_modified_date = Some(now);

        scripts.insert(script.name.clone(), script.clone());
        tracing::debug!(script = %script.name, active = script.is_active, "Event script stored");

        script
    }

    /// Insert many scripts
    pub async fn seed(&self, scripts: impl IntoIterator<Item = EventScript>) {
        for script in scripts {
            self.upsert(script).await;
        }
    }

    /// Remove a script
    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut scripts = self.scripts.write().await;

        if scripts.remove(name).is_some() {
            tracing::info!(script = %name, "Event script removed");
            Ok(())
        } else {
            Err(Error::Store(format!("event script '{name}' not found")))
        }
    }

    /// Activate or deactivate a script
    pub async fn set_active(&self, name: &str, active: bool) -> Result<()> {
        let mut scripts = self.scripts.write().await;

        let script = scripts
            .get_mut(name)
            .ok_or_else(|| Error::Store(format!("event script '{name}' not found")))?;
        script.is_active = active;
        script.last_modified_date = Some(Utc::now());

        tracing::info!(script = %name, active, "Event script activation changed");
        Ok(())
    }

    /// Get a script regardless of activation
    pub async fn get(&self, name: &str) -> Option<EventScript> {
        let scripts = self.scripts.read().await;
        scripts.get(name).cloned()
    }

    /// All script names, sorted
    pub async fn list(&self) -> Vec<String> {
        let scripts = self.scripts.read().await;
        let mut names: Vec<_> = scripts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored scripts
    pub async fn count(&self) -> usize {
        let scripts = self.scripts.read().await;
        scripts.len()
    }
}

#[async_trait]
impl ScriptRecordStore for InMemoryScriptStore {
    async fn find_active_by_name(&self, name: &str) -> Result<Option<EventScript>> {
        let scripts = self.scripts.read().await;
        Ok(scripts.get(name).filter(|s| s.is_active).cloned())
    }
}

/// An active script ready to run, with lookups resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveScript {
    /// Script name
    pub name: String,
    /// Script language identifier
    pub script_type: String,
    /// Content with lookup placeholders resolved
    pub content: String,
    /// Configuration mapping
    pub config: ScriptMap,
    /// Whether the result may mutate the event
    pub allow_event_modification: bool,
}

/// Looks up active scripts and resolves their content for execution
///
/// Every call performs a fresh store lookup so activation changes are
/// observed immediately.
#[derive(Clone)]
pub struct ScriptResolver {
    store: Arc<dyn ScriptRecordStore>,
    lookups: Arc<dyn LookupResolver>,
}

impl std::fmt::Debug for ScriptResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptResolver")
            .field("lookups", &self.lookups)
            .finish()
    }
}

impl ScriptResolver {
    /// Create a resolver without lookup substitution
    pub fn new(store: Arc<dyn ScriptRecordStore>) -> Self {
        Self {
            store,
            lookups: Arc::new(NoLookups),
        }
    }

    /// Use a lookup resolver for script content
    pub fn with_lookups(mut self, lookups: Arc<dyn LookupResolver>) -> Self {
        self.lookups = lookups;
        self
    }

    /// Resolve the active script named exactly `name`
    pub async fn resolve(&self, name: &str) -> Result<Option<ActiveScript>> {
        let Some(script) = self.store.find_active_by_name(name).await? else {
            return Ok(None);
        };

        // Inactive records never dispatch, whatever the store returned
        if !script.is_active {
            return Ok(None);
        }

        Ok(Some(ActiveScript {
            content: self.lookups.translate(&script.content),
            config: script.config_map(),
            name: script.name,
            script_type: script.script_type,
            allow_event_modification: script.allow_event_modification,
        }))
    }
}
