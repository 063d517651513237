//! The event dispatch engine

use crate::merger::ResultMerger;
use crate::queue::{QueueSubmitter, ScriptJob};
use crate::store::{ActiveScript, ScriptResolver, ScriptRecordStore};
use hookscript_core::{
    queued_name, ApiEvent, Event, EventEnvelope, RequestPhase, Result, ServiceEvent,
};
use hookscript_scripting::{LookupResolver, ScriptExecutor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Matches events to active scripts, runs them and applies their results
///
/// Both entry points return whether propagation should continue. Faults
/// from the executor or from a malformed result are returned to the caller
/// untouched.
#[derive(Clone)]
pub struct EventDispatchEngine {
    scripts: ScriptResolver,
    executor: Arc<dyn ScriptExecutor>,
    queue: Arc<dyn QueueSubmitter>,
}

impl std::fmt::Debug for EventDispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatchEngine")
            .field("scripts", &self.scripts)
            .finish()
    }
}

impl EventDispatchEngine {
    /// Create an engine
    pub fn new(
        store: Arc<dyn ScriptRecordStore>,
        executor: Arc<dyn ScriptExecutor>,
        queue: Arc<dyn QueueSubmitter>,
    ) -> Self {
        Self {
            scripts: ScriptResolver::new(store),
            executor,
            queue,
        }
    }

    /// Resolve lookup placeholders in script content before execution
    pub fn with_lookups(mut self, lookups: Arc<dyn LookupResolver>) -> Self {
        self.scripts = self.scripts.with_lookups(lookups);
        self
    }

    /// Script resolver used by this engine
    pub fn scripts(&self) -> &ScriptResolver {
        &self.scripts
    }

    /// Dispatch any event to its handler
    pub async fn handle(&self, event: &mut Event) -> Result<bool> {
        match event {
            Event::Request(event) => self.handle_request_lifecycle_event(event).await,
            Event::Service(event) => self.handle_service_event(event).await,
        }
    }

    /// Handle a pre-process or post-process event
    pub async fn handle_request_lifecycle_event(&self, event: &mut ApiEvent) -> Result<bool> {
        let Some(script) = self.scripts.resolve(&event.name).await? else {
            debug!(event = %event.name, "No active script for event");
            return Ok(true);
        };

        let data = event.make_data();
        let Some(result) = self.run(&script, &data).await? else {
            return Ok(true);
        };

        if script.allow_event_modification {
            match event.phase {
                RequestPhase::PreProcess => {
                    ResultMerger::merge_pre_process(&script.name, event, &result)?
                }
                RequestPhase::PostProcess => {
                    ResultMerger::merge_post_process(&script.name, &mut event.response, &result)?
                }
            }
        } else {
            debug!(script = %script.name, "Event modification not allowed, result not merged");
        }

        Ok(Self::propagation(&script, &result))
    }

    /// Handle a generic API or service event
    ///
    /// With no active script, an active `.queued` variant is submitted to the
    /// queue and propagation continues.
    pub async fn handle_service_event(&self, event: &mut ServiceEvent) -> Result<bool> {
        if let Some(script) = self.scripts.resolve(&event.name).await? {
            let data = event.make_data();
            let Some(result) = self.run(&script, &data).await? else {
                return Ok(true);
            };

            if script.allow_event_modification {
                ResultMerger::merge_post_process(&script.name, &mut event.response, &result)?;
            } else {
                debug!(script = %script.name, "Event modification not allowed, result not merged");
            }

            return Ok(Self::propagation(&script, &result));
        }

        let queued = queued_name(&event.name);
        if let Some(script) = self.scripts.resolve(&queued).await? {
            let job = ScriptJob::service_event(queued, event, script.config);
            debug!(
                event = %event.name,
                job_id = %job.id,
                script = %job.name,
                "Deferring event to queued script"
            );
            self.queue.submit(job);
            return Ok(true);
        }

        debug!(event = %event.name, "No active script for event");
        Ok(true)
    }

    async fn run(&self, script: &ActiveScript, data: &EventEnvelope) -> Result<Option<Value>> {
        debug!(script = %script.name, script_type = %script.script_type, "Running event script");

        let result = self
            .executor
            .execute(
                &script.name,
                &script.content,
                &script.script_type,
                &script.config,
                data,
            )
            .await?;

        if result.is_none() {
            debug!(script = %script.name, "Script produced no result");
        }
        Ok(result)
    }

    fn propagation(script: &ActiveScript, result: &Value) -> bool {
        if ResultMerger::stop_propagation(result) {
            info!(script = %script.name, "Propagation stopped by script");
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryScriptStore;
    use async_trait::async_trait;
    use hookscript_core::{Error, EventResponse, EventScript, ScriptMap, ServiceRequest};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Returns a fixed result and records what it saw
    struct Fixed {
        result: Option<Value>,
        seen: Mutex<Vec<EventEnvelope>>,
    }

    impl Fixed {
        fn new(result: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ScriptExecutor for Fixed {
        async fn execute(
            &self,
            _name: &str,
            _content: &str,
            _script_type: &str,
            _config: &ScriptMap,
            data: &EventEnvelope,
        ) -> Result<Option<Value>> {
            self.seen.lock().push(data.clone());
            Ok(self.result.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ScriptExecutor for Failing {
        async fn execute(
            &self,
            name: &str,
            _content: &str,
            _script_type: &str,
            _config: &ScriptMap,
            _data: &EventEnvelope,
        ) -> Result<Option<Value>> {
            Err(Error::execution(name, "exploded"))
        }
    }

    #[derive(Default)]
    struct Jobs(Mutex<Vec<ScriptJob>>);

    impl QueueSubmitter for Jobs {
        fn submit(&self, job: ScriptJob) {
            self.0.lock().push(job);
        }
    }

    async fn engine(
        scripts: Vec<EventScript>,
        executor: Arc<dyn ScriptExecutor>,
    ) -> (EventDispatchEngine, Arc<Jobs>) {
        let store = InMemoryScriptStore::new();
        store.seed(scripts).await;
        let jobs = Arc::new(Jobs::default());
        (
            EventDispatchEngine::new(Arc::new(store), executor, jobs.clone()),
            jobs,
        )
    }

    fn pre_event() -> ApiEvent {
        ApiEvent::pre_process("svc.get.pre_process", ServiceRequest::new("GET", "svc"))
    }

    #[tokio::test]
    async fn test_pre_process_merges_when_allowed() {
        let executor = Fixed::new(Some(json!({"request": {"foo": 1}})));
        let (engine, _) = engine(
            vec![EventScript::new("svc.get.pre_process", "rhai").active().allow_modification()],
            executor.clone(),
        )
        .await;

        let mut event = pre_event();
        assert!(engine.handle_request_lifecycle_event(&mut event).await.unwrap());
        assert_eq!(event.request.get("foo"), Some(&json!(1)));

        let seen = executor.seen.lock();
        assert_eq!(seen[0].event_name(), Some("svc.get.pre_process"));
        assert_eq!(seen[0].get("response"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_modification_gate_still_honors_stop() {
        let executor = Fixed::new(Some(json!({"request": {"foo": 1}, "stop_propagation": true})));
        let (engine, _) = engine(
            vec![EventScript::new("svc.get.pre_process", "rhai").active()],
            executor,
        )
        .await;

        let mut event = pre_event();
        let before = event.clone();
        assert!(!engine.handle_request_lifecycle_event(&mut event).await.unwrap());
        assert_eq!(event, before);
    }

    #[tokio::test]
    async fn test_no_result_continues() {
        let (engine, _) = engine(
            vec![EventScript::new("svc.get.pre_process", "rhai").active().allow_modification()],
            Fixed::new(None),
        )
        .await;

        let mut event = pre_event();
        assert!(engine.handle_request_lifecycle_event(&mut event).await.unwrap());
        assert_eq!(event, pre_event());
    }

    #[tokio::test]
    async fn test_execution_fault_surfaces() {
        let (engine, _) = engine(
            vec![EventScript::new("svc.get.pre_process", "rhai").active()],
            Arc::new(Failing),
        )
        .await;

        let err = engine
            .handle_request_lifecycle_event(&mut pre_event())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[tokio::test]
    async fn test_service_event_sync_script() {
        let (engine, jobs) = engine(
            vec![
                EventScript::new("user.created", "rhai").active().allow_modification(),
                EventScript::new("user.created.queued", "rhai").active(),
            ],
            Fixed::new(Some(json!("welcome"))),
        )
        .await;

        let mut event = ServiceEvent::service("user.created", json!({"id": 1}));
        assert!(engine.handle_service_event(&mut event).await.unwrap());
        assert_eq!(
            event.response.as_ref().map(EventResponse::to_value),
            Some(json!({"content": "welcome", "status_code": 200}))
        );
        assert!(jobs.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_service_event_queued_fallback() {
        let mut config = ScriptMap::new();
        config.insert("QUEUED_QUEUE".into(), json!("mail"));
        let executor = Fixed::new(Some(json!({"stop_propagation": true})));
        let (engine, jobs) = engine(
            vec![EventScript::new("user.created.queued", "rhai").active().with_config(config)],
            executor.clone(),
        )
        .await;

        let mut event = ServiceEvent::service("user.created", json!({"id": 1}));
        assert!(engine.handle_service_event(&mut event).await.unwrap());

        let jobs = jobs.0.lock();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "user.created.queued");
        assert_eq!(jobs[0].placement.queue.as_deref(), Some("mail"));
        assert_eq!(jobs[0].event.get("payload"), Some(&json!({"id": 1})));
        assert!(executor.seen.lock().is_empty());
        assert!(event.response.is_none());
    }

    #[tokio::test]
    async fn test_unknown_event_continues() {
        let (engine, jobs) = engine(Vec::new(), Fixed::new(Some(json!(1)))).await;

        let mut event = Event::from(ServiceEvent::api("nothing.here", Value::Null));
        assert!(engine.handle(&mut event).await.unwrap());
        assert!(jobs.0.lock().is_empty());
    }
}
