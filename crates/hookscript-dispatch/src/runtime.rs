//! Wires stores, executors, queue, engine and bus from [`Settings`]

use crate::bus::EventBus;
use crate::dispatcher::EventDispatchEngine;
use crate::queue::{CollectingFailureSink, JobRunner, TokioScriptQueue};
use crate::service_config::{ConfigResolver, InMemoryConfigStore};
use crate::store::{InMemoryScriptStore, ScriptResolver};
use hookscript_config::{DisablePolicy, Settings};
use hookscript_core::{CacheConfig, Event, Result, ServiceScriptConfig};
use hookscript_scripting::{ExecutorRegistry, MapLookups, RhaiExecutor, ScriptExecutor};
use std::sync::Arc;
use tracing::info;

/// A running dispatch stack
#[derive(Debug)]
pub struct Runtime {
    settings: Settings,
    policy: DisablePolicy,
    bus: EventBus,
    engine: Arc<EventDispatchEngine>,
    scripts: InMemoryScriptStore,
    executors: ExecutorRegistry,
    queue: Arc<TokioScriptQueue>,
    failures: Arc<CollectingFailureSink>,
    base_configs: Arc<InMemoryConfigStore<ServiceScriptConfig>>,
    cache_configs: Arc<InMemoryConfigStore<CacheConfig>>,
}

impl Runtime {
    /// Start building a runtime
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Fire an event on the bus
    pub async fn fire(&self, event: &mut Event) -> Result<bool> {
        self.bus.fire(event).await
    }

    /// Configuration resolver for services scripted in `script_type`
    pub fn config_resolver(&self, script_type: &str) -> ConfigResolver {
        ConfigResolver::new(
            script_type,
            self.policy.clone(),
            self.base_configs.clone(),
            self.cache_configs.clone(),
        )
    }

    /// Loaded settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Dispatch engine
    pub fn engine(&self) -> &Arc<EventDispatchEngine> {
        &self.engine
    }

    /// Script store
    pub fn scripts(&self) -> &InMemoryScriptStore {
        &self.scripts
    }

    /// Registered executors
    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Deferred job queue
    pub fn queue(&self) -> &Arc<TokioScriptQueue> {
        &self.queue
    }

    /// Deferred job failures
    pub fn failures(&self) -> &Arc<CollectingFailureSink> {
        &self.failures
    }

    /// Stop the queue, waiting up to the configured shutdown timeout
    pub async fn shutdown(&self) -> usize {
        self.queue.shutdown(self.settings.queue.shutdown_timeout).await
    }
}

/// Builds a [`Runtime`]
#[derive(Default)]
pub struct RuntimeBuilder {
    settings: Option<Settings>,
    executors: Vec<(String, Arc<dyn ScriptExecutor>)>,
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<_> = self.executors.iter().map(|(t, _)| t.as_str()).collect();
        f.debug_struct("RuntimeBuilder")
            .field("settings", &self.settings)
            .field("executors", &types)
            .finish()
    }
}

impl RuntimeBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these settings
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Register an additional executor
    pub fn executor(
        mut self,
        script_type: impl Into<String>,
        executor: Arc<dyn ScriptExecutor>,
    ) -> Self {
        self.executors.push((script_type.into(), executor));
        self
    }

    /// Build and start the runtime
    ///
    /// Seeds scripts and service configurations from the settings. Must be
    /// called from within a Tokio runtime.
    pub async fn build(self) -> Result<Runtime> {
        let settings = self.settings.unwrap_or_default();
        let policy = settings.disable_policy();

        let rhai = &settings.scripting.rhai;
        let mut executors = ExecutorRegistry::new().with_executor(
            "rhai",
            Arc::new(RhaiExecutor::with_limits(rhai.max_operations, rhai.max_string_size)),
        );
        for (script_type, executor) in self.executors {
            executors.register(&script_type, executor);
        }
        let executor: Arc<dyn ScriptExecutor> = Arc::new(executors.clone());

        let scripts = InMemoryScriptStore::new();
        scripts.seed(settings.scripts.iter().cloned()).await;

        let lookups = Arc::new(MapLookups::new(settings.lookups.clone()));
        let resolver =
            ScriptResolver::new(Arc::new(scripts.clone())).with_lookups(lookups.clone());

        let failures = Arc::new(CollectingFailureSink::new());
        let queue = TokioScriptQueue::start(
            JobRunner::new(resolver, Arc::clone(&executor)),
            &settings.queue,
            failures.clone(),
        );

        let engine = Arc::new(
            EventDispatchEngine::new(Arc::new(scripts.clone()), executor, queue.clone())
                .with_lookups(lookups),
        );
        let bus = EventBus::new();
        engine.subscribe(&bus).await;

        let runtime = Runtime {
            policy,
            bus,
            engine,
            scripts,
            executors,
            queue,
            failures,
            base_configs: Arc::new(InMemoryConfigStore::new()),
            cache_configs: Arc::new(InMemoryConfigStore::new()),
            settings,
        };

        for service in &runtime.settings.services {
            runtime
                .config_resolver(&service.script_type)
                .set_config(service.service_id, service.config.clone())
                .await?;
        }

        info!(
            scripts = runtime.settings.scripts.len(),
            services = runtime.settings.services.len(),
            script_types = ?runtime.executors.script_types(),
            policy = %runtime.policy,
            "Hookscript runtime started"
        );

        Ok(runtime)
    }
}
