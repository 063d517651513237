//! Script records and per-service configuration

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key-value mapping, interpreted only by script executors
pub type ScriptMap = Map<String, Value>;

/// Reserved suffix naming the asynchronous variant of an event script
pub const QUEUED_SUFFIX: &str = ".queued";

/// Name of the queued variant of an event script
pub fn queued_name(event_name: &str) -> String {
    format!("{event_name}{QUEUED_SUFFIX}")
}

/// A named, reusable script bound to a platform event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventScript {
    /// Unique name, conventionally `<serviceOrResourcePath>.<eventType>`
    pub name: String,

    /// Script language identifier
    #[serde(rename = "type")]
    pub script_type: String,

    /// Inactive scripts never dispatch
    #[serde(default)]
    pub is_active: bool,

    /// Script source, possibly containing lookup placeholders
    #[serde(default)]
    pub content: String,

    /// Engine-specific configuration; anything but a mapping reads as empty
    #[serde(default)]
    pub config: Value,

    /// Whether the script's result may mutate the live request/response
    #[serde(default)]
    pub allow_event_modification: bool,

    /// Creating user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,

    /// Last modifying user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<i64>,

    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,

    /// Last modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
}

impl EventScript {
    /// Create an inactive script with empty content
    pub fn new(name: impl Into<String>, script_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script_type: script_type.into(),
            is_active: false,
            content: String::new(),
            config: Value::Object(Map::new()),
            allow_event_modification: false,
            created_by: None,
            last_modified_by: None,
            created_date: None,
            last_modified_date: None,
        }
    }

    /// Mark active
    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Set content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set config
    pub fn with_config(mut self, config: ScriptMap) -> Self {
        self.config = Value::Object(config);
        self
    }

    /// Allow the script result to modify the event
    pub fn allow_modification(mut self) -> Self {
        self.allow_event_modification = true;
        self
    }

    /// Config as a mapping
    pub fn config_map(&self) -> ScriptMap {
        match &self.config {
            Value::Object(map) => map.clone(),
            _ => ScriptMap::new(),
        }
    }

    /// Whether this is the queued variant of an event script
    pub fn is_queued_variant(&self) -> bool {
        self.name.ends_with(QUEUED_SUFFIX)
    }
}

/// Per-service scripting configuration (base layer)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceScriptConfig {
    /// Owning service
    pub service_id: i64,

    /// Script source
    #[serde(default)]
    pub content: Option<String>,

    /// Additional engine and queue configuration
    #[serde(default)]
    pub config: ScriptMap,

    /// Route execution through the asynchronous queue
    #[serde(default)]
    pub queued: bool,

    /// Storage service holding the script source
    #[serde(default)]
    pub storage_service_id: Option<i64>,

    /// Path of the script within the storage service
    #[serde(default)]
    pub storage_path: Option<String>,

    /// Source control repository
    #[serde(default)]
    pub scm_repository: Option<String>,

    /// Source control reference (branch or tag)
    #[serde(default)]
    pub scm_reference: Option<String>,

    /// The script supplies its own access list
    #[serde(default)]
    pub implements_access_list: bool,
}

impl ServiceScriptConfig {
    /// Attribute names accepted in a configuration mapping
    pub const FIELDS: &'static [&'static str] = &[
        "service_id",
        "content",
        "config",
        "queued",
        "storage_service_id",
        "storage_path",
        "scm_repository",
        "scm_reference",
        "implements_access_list",
    ];

    /// Parse from a configuration mapping, forcing `service_id`
    pub fn from_map(service_id: i64, map: ScriptMap) -> Result<Self> {
        let mut map = map;
        map.insert("service_id".to_string(), Value::from(service_id));
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Validation(format!("invalid script configuration: {e}")))
    }

    /// Convert into a configuration mapping
    pub fn to_map(&self) -> Result<ScriptMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Internal(format!(
                "script configuration serialized as {other}"
            ))),
        }
    }
}

/// Secondary cache-configuration layer, merged over [`ServiceScriptConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Owning service
    pub service_id: i64,

    /// Cache responses produced by this service
    #[serde(default)]
    pub cache_enabled: bool,

    /// Cache lifetime in seconds
    #[serde(default)]
    pub cache_ttl: u64,
}

impl CacheConfig {
    /// Attribute names accepted in a configuration mapping
    pub const FIELDS: &'static [&'static str] = &["service_id", "cache_enabled", "cache_ttl"];

    /// Parse from a configuration mapping, forcing `service_id`
    pub fn from_map(service_id: i64, map: ScriptMap) -> Result<Self> {
        let mut map = map;
        map.insert("service_id".to_string(), Value::from(service_id));
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Validation(format!("invalid cache configuration: {e}")))
    }

    /// Convert into a configuration mapping
    pub fn to_map(&self) -> Result<ScriptMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Internal(format!(
                "cache configuration serialized as {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queued_name() {
        assert_eq!(queued_name("mail.send"), "mail.send.queued");
        assert!(EventScript::new("mail.send.queued", "rhai").is_queued_variant());
    }

    #[test]
    fn test_non_mapping_config_reads_empty() {
        let mut script = EventScript::new("db._table.get.pre_process", "rhai");
        script.config = json!("not a map");
        assert!(script.config_map().is_empty());

        let script = script.with_config(json!({"timeout": 5}).as_object().unwrap().clone());
        assert_eq!(script.config_map().get("timeout"), Some(&json!(5)));
    }

    #[test]
    fn test_event_script_deserialize_type_field() {
        let script: EventScript = serde_json::from_value(json!({
            "name": "files.get.post_process",
            "type": "rhai",
            "is_active": true,
        }))
        .unwrap();
        assert_eq!(script.script_type, "rhai");
        assert!(script.is_active);
        assert!(!script.allow_event_modification);
    }

    #[test]
    fn test_service_config_from_map_forces_id() {
        let map = json!({"service_id": 99, "queued": true, "content": "x"});
        let cfg = ServiceScriptConfig::from_map(7, map.as_object().unwrap().clone()).unwrap();
        assert_eq!(cfg.service_id, 7);
        assert!(cfg.queued);
        assert_eq!(cfg.content.as_deref(), Some("x"));
    }

    #[test]
    fn test_service_config_rejects_bad_types() {
        let map = json!({"storage_service_id": "abc"});
        let result = ServiceScriptConfig::from_map(1, map.as_object().unwrap().clone());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_cache_config_roundtrip_map() {
        let cfg = CacheConfig {
            service_id: 3,
            cache_enabled: true,
            cache_ttl: 60,
        };
        let map = cfg.to_map().unwrap();
        assert_eq!(map.get("cache_ttl"), Some(&json!(60)));
    }
}
