//! End-to-end tests: settings -> runtime -> Rhai scripts

use async_trait::async_trait;
use hookscript_config::{load_str, SettingsFormat};
use hookscript_core::{
    ApiEvent, Error, Event, EventEnvelope, EventResponse, EventScript, Result, ScriptMap,
    ServiceEvent, ServiceRequest, StatusCode,
};
use hookscript_dispatch::Runtime;
use hookscript_scripting::ScriptExecutor;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

const SETTINGS: &str = r#"
scripting:
  rhai:
    max_operations: 50000
queue:
  default_queue: scripts
  workers: 2
  shutdown_timeout: 5s
lookups:
  tenant: acme
scripts:
  - name: db._table.contact.get.pre_process
    type: rhai
    is_active: true
    allow_event_modification: true
    content: |
      let limit = event.request.parameters.limit;
      #{ request: #{ tenant: "{tenant}", limit: limit * 2 } }
  - name: db._table.contact.get.post_process
    type: rhai
    is_active: true
    allow_event_modification: true
    content: |
      if type_of(event.response) == "()" { "empty" } else { #{ content: "wrapped", stop_propagation: true } }
  - name: db._table.secret.get.pre_process
    type: rhai
    is_active: true
    allow_event_modification: true
    content: |
      #{ response: #{ content: #{ error: "denied" }, status_code: 403 } }
services:
  - service_id: 5
    type: rhai
    config:
      queued: true
      cache_ttl: 120
"#;

/// Records every envelope it is asked to run
#[derive(Default)]
struct Probe {
    seen: Mutex<Vec<(String, EventEnvelope)>>,
}

#[async_trait]
impl ScriptExecutor for Probe {
    async fn execute(
        &self,
        name: &str,
        content: &str,
        _script_type: &str,
        _config: &ScriptMap,
        data: &EventEnvelope,
    ) -> Result<Option<Value>> {
        self.seen.lock().push((name.to_string(), data.clone()));
        if content == "fail" {
            return Err(Error::execution(name, "probe failure"));
        }
        Ok(Some(json!({"response": {"content": "ignored"}})))
    }
}

async fn runtime(probe: Arc<Probe>) -> Runtime {
    let settings = load_str(SETTINGS, SettingsFormat::Yaml).unwrap();
    Runtime::builder()
        .settings(settings)
        .executor("probe", probe)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_pre_process_script_rewrites_request() {
    let runtime = runtime(Arc::default()).await;

    let request = ServiceRequest::new("GET", "_table/contact").with_parameter("limit", json!(5));
    let mut event = Event::from(ApiEvent::pre_process(
        "db._table.contact.get.pre_process",
        request,
    ));

    assert!(runtime.fire(&mut event).await.unwrap());

    let event = event.as_request().unwrap();
    assert_eq!(event.request.get("tenant"), Some(&json!("acme")));
    assert_eq!(event.request.get("limit"), Some(&json!(10)));
    assert_eq!(event.request.method(), Some("GET"));
}

#[tokio::test]
async fn test_pre_process_script_short_circuits() {
    let runtime = runtime(Arc::default()).await;

    let mut event = Event::from(ApiEvent::pre_process(
        "db._table.secret.get.pre_process",
        ServiceRequest::new("GET", "_table/secret"),
    ));
    assert!(runtime.fire(&mut event).await.unwrap());

    let response = event
        .response()
        .and_then(EventResponse::as_structured)
        .unwrap();
    assert_eq!(response.status_code, StatusCode::FORBIDDEN);
    assert_eq!(response.content, json!({"error": "denied"}));
}

#[tokio::test]
async fn test_post_process_script_paths() {
    let runtime = runtime(Arc::default()).await;

    let mut empty = Event::from(ApiEvent::post_process(
        "db._table.contact.get.post_process",
        ServiceRequest::new("GET", "_table/contact"),
        None,
    ));
    assert!(runtime.fire(&mut empty).await.unwrap());
    assert_eq!(
        empty.response().map(EventResponse::to_value),
        Some(json!({"content": "empty", "status_code": 200}))
    );

    let mut wrapped = Event::from(ApiEvent::post_process(
        "db._table.contact.get.post_process",
        ServiceRequest::new("GET", "_table/contact"),
        Some(EventResponse::Payload(json!({"content": []}))),
    ));
    assert!(!runtime.fire(&mut wrapped).await.unwrap());
    assert_eq!(
        wrapped.response().map(EventResponse::to_value),
        Some(json!({"content": "wrapped", "stop_propagation": true}))
    );
}

#[tokio::test]
async fn test_queued_script_runs_on_snapshot() {
    let probe = Arc::new(Probe::default());
    let runtime = runtime(Arc::clone(&probe)).await;
    runtime
        .scripts()
        .upsert(
            EventScript::new("mail.send.queued", "probe")
                .active()
                .allow_modification(),
        )
        .await;

    let mut event = Event::from(ServiceEvent::service("mail.send", json!({"to": "a@b.c"})));
    assert!(runtime.fire(&mut event).await.unwrap());

    assert_eq!(runtime.shutdown().await, 0);
    assert!(event.response().is_none());

    let seen = probe.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "mail.send.queued");
    assert_eq!(seen[0].1.get("payload"), Some(&json!({"to": "a@b.c"})));
    assert!(runtime.failures().is_empty());
}

#[tokio::test]
async fn test_queued_failure_never_reaches_caller() {
    let probe = Arc::new(Probe::default());
    let runtime = runtime(Arc::clone(&probe)).await;
    runtime
        .scripts()
        .upsert(
            EventScript::new("mail.send.queued", "probe")
                .active()
                .with_content("fail"),
        )
        .await;

    let mut event = Event::from(ServiceEvent::service("mail.send", Value::Null));
    assert!(runtime.fire(&mut event).await.unwrap());
    runtime.shutdown().await;

    let failures = runtime.failures().failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].queue.as_deref(), Some("scripts"));
}

#[tokio::test]
async fn test_unknown_script_type_is_execution_fault() {
    let runtime = runtime(Arc::default()).await;
    runtime
        .scripts()
        .upsert(EventScript::new("user.deleted", "cobol").active())
        .await;

    let mut event = Event::from(ServiceEvent::service("user.deleted", Value::Null));
    let err = runtime.fire(&mut event).await.unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
}

#[tokio::test]
async fn test_seeded_service_config() {
    let runtime = runtime(Arc::default()).await;

    let config = runtime.config_resolver("rhai").get_config(5).await.unwrap();
    assert_eq!(config["queued"], json!(true));
    assert_eq!(config["cache_ttl"], json!(120));
}

#[tokio::test]
async fn test_disabled_policy_rejects_seeded_services() {
    let mut settings = load_str(SETTINGS, SettingsFormat::Yaml).unwrap();
    settings.scripting.disable = Some("rhai".to_string());

    let err = Runtime::builder().settings(settings).build().await.unwrap_err();
    assert_eq!(err.to_string(), "Scripting with rhai is disabled for this instance.");
}
