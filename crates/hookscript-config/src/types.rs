//! Settings types

use crate::policy::DisablePolicy;
use hookscript_core::{EventScript, ScriptMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Scripting policy and engine limits
    #[serde(default)]
    pub scripting: ScriptingSettings,

    /// Asynchronous queue for `.queued` scripts
    #[serde(default)]
    pub queue: QueueSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Lookup values substituted into script content (`{name}`)
    #[serde(default)]
    pub lookups: HashMap<String, String>,

    /// Event scripts to seed the script store with
    #[serde(default)]
    pub scripts: Vec<EventScript>,

    /// Per-service script configuration to seed
    #[serde(default)]
    pub services: Vec<ServiceSettings>,
}

impl Settings {
    /// The administrative disable policy
    pub fn disable_policy(&self) -> DisablePolicy {
        DisablePolicy::from_setting(self.scripting.disable.as_deref())
    }
}

/// Scripting settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScriptingSettings {
    /// `all`, or a list of disabled script types
    #[serde(default)]
    pub disable: Option<String>,

    /// Rhai engine limits
    #[serde(default)]
    pub rhai: RhaiSettings,
}

/// Rhai engine limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RhaiSettings {
    /// Maximum operations per script run
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum string size in bytes
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_max_string_size() -> usize {
    1024 * 1024
}

impl Default for RhaiSettings {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_string_size: default_max_string_size(),
        }
    }
}

/// Queue settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSettings {
    /// Queue used when a script does not name one
    #[serde(default = "default_queue_name")]
    pub default_queue: String,

    /// Maximum concurrently running deferred jobs
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long shutdown waits for in-flight jobs
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

fn default_queue_name() -> String {
    "default".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_queue: default_queue_name(),
            workers: default_workers(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Seed configuration for one scripted service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSettings {
    /// Service identifier
    pub service_id: i64,

    /// Script type the service runs
    #[serde(rename = "type")]
    pub script_type: String,

    /// Combined base and cache configuration mapping
    #[serde(default)]
    pub config: ScriptMap,
}
