//! Platform events dispatched to scripts

use crate::response::EventResponse;
use crate::types::ScriptMap;
use crate::value;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The closed set of event kinds the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Before the service handles the request
    PreProcess,
    /// After the service produced a response
    PostProcess,
    /// Generic API notification
    Api,
    /// Service lifecycle notification
    Service,
}

impl EventKind {
    /// Listener group this kind belongs to
    pub fn group(&self) -> EventGroup {
        match self {
            Self::PreProcess | Self::PostProcess => EventGroup::RequestLifecycle,
            Self::Api | Self::Service => EventGroup::Service,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreProcess => write!(f, "pre_process"),
            Self::PostProcess => write!(f, "post_process"),
            Self::Api => write!(f, "api"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Listener subscription groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventGroup {
    /// Pre-process and post-process events
    RequestLifecycle,
    /// API and service events
    Service,
}

/// Phase of a request-lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Request is mutable, no response yet
    PreProcess,
    /// Response may already be populated
    PostProcess,
}

/// Flavor of a non-request event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    /// Generic API notification
    Api,
    /// Service lifecycle notification
    Service,
}

/// In-flight request as exposed to scripts
///
/// Backed by a plain mapping so script-supplied fields can be merged in
/// without a fixed schema. `method`, `path`, `parameters`, `headers` and
/// `payload` are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    fields: ScriptMap,
}

impl ServiceRequest {
    /// Create a request for `method` on `path`
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let mut fields = ScriptMap::new();
        fields.insert("method".to_string(), Value::String(method.into()));
        fields.insert("path".to_string(), Value::String(path.into()));
        fields.insert("parameters".to_string(), Value::Object(ScriptMap::new()));
        fields.insert("headers".to_string(), Value::Object(ScriptMap::new()));
        fields.insert("payload".to_string(), Value::Null);
        Self { fields }
    }

    /// Create from an existing mapping
    pub fn from_map(fields: ScriptMap) -> Self {
        Self { fields }
    }

    /// HTTP method
    pub fn method(&self) -> Option<&str> {
        self.fields.get("method").and_then(Value::as_str)
    }

    /// Resource path
    pub fn path(&self) -> Option<&str> {
        self.fields.get("path").and_then(Value::as_str)
    }

    /// Request payload
    pub fn payload(&self) -> &Value {
        self.fields.get("payload").unwrap_or(&Value::Null)
    }

    /// Any field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Set payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.set("payload", payload);
        self
    }

    /// Set a query parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        if let Some(Value::Object(params)) = self.fields.get_mut("parameters") {
            params.insert(name.into(), value);
        } else {
            let mut params = ScriptMap::new();
            params.insert(name.into(), value);
            self.set("parameters", Value::Object(params));
        }
        self
    }

    /// Shallow-merge script-supplied fields; keys in `fields` win
    pub fn merge_from_map(&mut self, fields: &ScriptMap) {
        value::merge_shallow(&mut self.fields, fields);
    }

    /// Plain mapping as exposed to scripts
    pub fn to_map(&self) -> ScriptMap {
        self.fields.clone()
    }
}

/// Data object handed to a script, built from the live event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventEnvelope(ScriptMap);

impl EventEnvelope {
    /// Wrap a mapping
    pub fn new(data: ScriptMap) -> Self {
        Self(data)
    }

    /// Borrow the mapping
    pub fn as_map(&self) -> &ScriptMap {
        &self.0
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Name of the event this envelope was built from
    pub fn event_name(&self) -> Option<&str> {
        self.get("event").and_then(Value::as_str)
    }

    /// Convert into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Request-lifecycle event carrying a mutable request and optional response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEvent {
    /// Event name, e.g. `db._table.contact.get.pre_process`
    pub name: String,
    /// Pre- or post-process
    pub phase: RequestPhase,
    /// Resource path the request targets
    pub resource: String,
    /// The in-flight request
    pub request: ServiceRequest,
    /// The response; installing one in pre-process short-circuits handling
    pub response: Option<EventResponse>,
}

impl ApiEvent {
    /// Create a pre-process event
    pub fn pre_process(name: impl Into<String>, request: ServiceRequest) -> Self {
        Self {
            name: name.into(),
            phase: RequestPhase::PreProcess,
            resource: String::new(),
            request,
            response: None,
        }
    }

    /// Create a post-process event
    pub fn post_process(
        name: impl Into<String>,
        request: ServiceRequest,
        response: Option<EventResponse>,
    ) -> Self {
        Self {
            name: name.into(),
            phase: RequestPhase::PostProcess,
            resource: String::new(),
            request,
            response,
        }
    }

    /// Set resource
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self.phase {
            RequestPhase::PreProcess => EventKind::PreProcess,
            RequestPhase::PostProcess => EventKind::PostProcess,
        }
    }

    /// Whether a script installed a response that replaces normal handling
    pub fn is_short_circuited(&self) -> bool {
        self.phase == RequestPhase::PreProcess && self.response.is_some()
    }

    /// Build the envelope passed to scripts
    pub fn make_data(&self) -> EventEnvelope {
        let mut data = ScriptMap::new();
        data.insert("event".to_string(), Value::String(self.name.clone()));
        data.insert("resource".to_string(), Value::String(self.resource.clone()));
        data.insert("request".to_string(), Value::Object(self.request.to_map()));
        data.insert(
            "response".to_string(),
            self.response
                .as_ref()
                .map_or(Value::Null, EventResponse::to_value),
        );
        EventEnvelope::new(data)
    }
}

/// Generic, non-request-shaped event
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    /// Event name
    pub name: String,
    /// API or service notification
    pub kind: ServiceEventKind,
    /// Resource the event concerns
    pub resource: String,
    /// Arbitrary event payload
    pub payload: Value,
    /// Response computed by a script, if any
    pub response: Option<EventResponse>,
}

impl ServiceEvent {
    /// Create a service lifecycle event
    pub fn service(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            kind: ServiceEventKind::Service,
            resource: String::new(),
            payload,
            response: None,
        }
    }

    /// Create a generic API event
    pub fn api(name: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: ServiceEventKind::Api,
            ..Self::service(name, payload)
        }
    }

    /// Set resource
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self.kind {
            ServiceEventKind::Api => EventKind::Api,
            ServiceEventKind::Service => EventKind::Service,
        }
    }

    /// Build the envelope passed to scripts
    pub fn make_data(&self) -> EventEnvelope {
        let mut data = ScriptMap::new();
        data.insert("event".to_string(), Value::String(self.name.clone()));
        data.insert("resource".to_string(), Value::String(self.resource.clone()));
        data.insert("payload".to_string(), self.payload.clone());
        data.insert(
            "response".to_string(),
            self.response
                .as_ref()
                .map_or(Value::Null, EventResponse::to_value),
        );
        EventEnvelope::new(data)
    }
}

/// Any event fired on the platform bus
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Pre-process or post-process event
    Request(ApiEvent),
    /// API or service event
    Service(ServiceEvent),
}

impl Event {
    /// Event name
    pub fn name(&self) -> &str {
        match self {
            Self::Request(e) => &e.name,
            Self::Service(e) => &e.name,
        }
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Request(e) => e.kind(),
            Self::Service(e) => e.kind(),
        }
    }

    /// Listener group
    pub fn group(&self) -> EventGroup {
        self.kind().group()
    }

    /// Response currently attached to the event
    pub fn response(&self) -> Option<&EventResponse> {
        match self {
            Self::Request(e) => e.response.as_ref(),
            Self::Service(e) => e.response.as_ref(),
        }
    }

    /// Get as request-lifecycle event
    pub fn as_request(&self) -> Option<&ApiEvent> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }

    /// Get as service event
    pub fn as_service(&self) -> Option<&ServiceEvent> {
        match self {
            Self::Service(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiEvent> for Event {
    fn from(event: ApiEvent) -> Self {
        Self::Request(event)
    }
}

impl From<ServiceEvent> for Event {
    fn from(event: ServiceEvent) -> Self {
        Self::Service(event)
    }
}
