//! Descriptive configuration schema consumed by administrative tooling

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One configurable attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchemaField {
    /// Attribute name
    pub name: String,
    /// Display label
    pub label: String,
    /// Presentation type (`string`, `text`, `boolean`, `integer`, `object`)
    #[serde(rename = "type")]
    pub field_type: String,
    /// Help text
    #[serde(default)]
    pub description: String,
    /// Whether null is accepted
    #[serde(default)]
    pub allow_null: bool,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Key/value layout for `object` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl ConfigSchemaField {
    /// Create a field
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: field_type.into(),
            description: String::new(),
            allow_null: true,
            default: None,
            object: None,
        }
    }

    /// Set description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set default
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Disallow null
    pub fn required(mut self) -> Self {
        self.allow_null = false;
        self
    }
}

/// Schema of the base script configuration layer
pub fn script_config_schema() -> Vec<ConfigSchemaField> {
    vec![
        ConfigSchemaField::new("content", "Content", "text")
            .describe("The content of the script written in the appropriate language."),
        ConfigSchemaField::new("config", "Additional Configuration", "object")
            .describe(
                "Additional configuration needed for the script to run, including queue placement: \
                 QUEUED_DELAY = seconds to delay execution, \
                 QUEUED_QUEUE = alternative queue name, \
                 QUEUED_CONNECTION = alternative queue connection.",
            )
            .with_object(json!({
                "key": {"label": "Name", "type": "string"},
                "value": {"label": "Value", "type": "string"}
            })),
        ConfigSchemaField::new("queued", "Queue For Later Execution", "boolean")
            .describe(
                "Select to queue the script for later execution \
                 (queuing success or failure returned to client immediately), \
                 un-select to process the script upon calling the API.",
            )
            .with_default(json!(false))
            .required(),
        ConfigSchemaField::new("storage_service_id", "Storage Service", "integer")
            .describe("Storage service holding the script source, instead of inline content."),
        ConfigSchemaField::new("storage_path", "Storage Path", "string")
            .describe("Path of the script within the storage service or repository."),
        ConfigSchemaField::new("scm_repository", "Repository", "string")
            .describe("Source control repository holding the script."),
        ConfigSchemaField::new("scm_reference", "Reference", "string")
            .describe("Branch or tag to read from the repository."),
        ConfigSchemaField::new("implements_access_list", "Script Implements Access List", "boolean")
            .describe(
                "By default, the access list is generated by the API specification provided. \
                 To override, check this and implement the access list in the script.",
            )
            .with_default(json!(false))
            .required(),
    ]
}

/// Schema of the cache configuration layer
pub fn cache_config_schema() -> Vec<ConfigSchemaField> {
    vec![
        ConfigSchemaField::new("cache_enabled", "Data Retrieval Caching Enabled", "boolean")
            .describe("Enable caching of GET requests for this service.")
            .with_default(json!(false))
            .required(),
        ConfigSchemaField::new("cache_ttl", "Cache Time To Live (seconds)", "integer")
            .describe("The number of seconds to cache responses for this service.")
            .with_default(json!(0))
            .required(),
    ]
}

impl ConfigSchemaField {
    fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }
}
