//! Settings loading

use crate::{Settings, SettingsFormat};
use hookscript_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::fs;
use std::path::Path;

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("valid env var pattern")
});

/// Load settings from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read settings file {}: {e}", path.display())))?;

    let format = SettingsFormat::from_path(path)?;

    load_from_str(&content, format)
}

/// Expand environment variables in a settings string
/// Supports syntax: ${VAR} and ${VAR:-default}
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in ENV_VAR.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match env::var(var_name) {
            Ok(val) => val,
            Err(_) => match default_value {
                Some(default) => default.to_string(),
                None => {
                    return Err(Error::Config(format!(
                        "Environment variable '{var_name}' not set and no default provided"
                    )));
                }
            },
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load settings from a string
pub fn load_from_str(content: &str, format: SettingsFormat) -> Result<Settings> {
    let expanded_content = expand_env_vars(content)?;

    let settings = match format {
        SettingsFormat::Yaml => serde_yaml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
        SettingsFormat::Toml => toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        SettingsFormat::Json => serde_json::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse JSON: {e}")))?,
    };

    Ok(settings)
}

/// Load and validate settings from a file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let settings = load_from_file(path)?;

    crate::validator::validate_settings(&settings)?;

    Ok(settings)
}

/// Load and merge multiple settings files
///
/// Files are merged in order, with later files overriding earlier ones:
/// - base.yaml (common defaults)
/// - production.yaml (env-specific)
/// - scripts.yaml (event scripts)
pub fn load_and_merge<P: AsRef<Path>>(paths: Vec<P>) -> Result<Settings> {
    if paths.is_empty() {
        return Err(Error::Config("No settings files provided".to_string()));
    }

    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        layers.push(load_from_file(path)?);
    }

    let merged = crate::merger::merge_settings(layers)?;
    crate::validator::validate_settings(&merged)?;

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML_SETTINGS: &str = r#"
scripting:
  disable: python

queue:
  default_queue: scripts
  workers: 2
  shutdown_timeout: "5s"

lookups:
  api_key: secret

scripts:
  - name: db._table.contact.get.pre_process
    type: rhai
    is_active: true
    allow_event_modification: true
    content: |
      #{ request: #{ key: "{api_key}" } }
  - name: user.created.queued
    type: rhai
    is_active: true
    config:
      QUEUED_DELAY: 2

services:
  - service_id: 5
    type: rhai
    config:
      queued: true
      cache_ttl: 30
"#;

    #[test]
    fn test_load_yaml() {
        let settings = load_from_str(YAML_SETTINGS, SettingsFormat::Yaml).unwrap();

        assert_eq!(settings.scripting.disable.as_deref(), Some("python"));
        assert_eq!(settings.queue.workers, 2);
        assert_eq!(settings.queue.shutdown_timeout.as_secs(), 5);
        assert_eq!(settings.scripts.len(), 2);
        assert!(settings.scripts[0].allow_event_modification);
        assert_eq!(settings.services[0].service_id, 5);
        assert_eq!(settings.lookups.get("api_key").map(String::as_str), Some("secret"));
    }

    #[test]
    fn test_defaults_for_empty_document() {
        let settings = load_from_str("{}", SettingsFormat::Json).unwrap();
        assert_eq!(settings.queue.default_queue, "default");
        assert_eq!(settings.logging.level, "info");
        assert!(settings.scripts.is_empty());
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[scripting]
disable = "all"

[[scripts]]
name = "files.get.post_process"
type = "rhai"
is_active = true
"#;
        let settings = load_from_str(toml, SettingsFormat::Toml).unwrap();
        assert_eq!(settings.scripting.disable.as_deref(), Some("all"));
        assert_eq!(settings.scripts[0].name, "files.get.post_process");
    }

    #[test]
    fn test_invalid_yaml() {
        let result = load_from_str("scripts: [yaml", SettingsFormat::Yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_with_default() {
        env::remove_var("HOOKSCRIPT_UNDEFINED_QUEUE");

        let settings = load_from_str(
            "queue:\n  default_queue: \"${HOOKSCRIPT_UNDEFINED_QUEUE:-fallback}\"\n",
            SettingsFormat::Yaml,
        )
        .unwrap();
        assert_eq!(settings.queue.default_queue, "fallback");
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("HOOKSCRIPT_TEST_DISABLE", "php");

        let settings = load_from_str(
            "scripting:\n  disable: \"${HOOKSCRIPT_TEST_DISABLE}\"\n",
            SettingsFormat::Yaml,
        )
        .unwrap();
        assert_eq!(settings.scripting.disable.as_deref(), Some("php"));

        env::remove_var("HOOKSCRIPT_TEST_DISABLE");
    }

    #[test]
    fn test_missing_env_var_no_default() {
        env::remove_var("HOOKSCRIPT_MISSING_VAR");

        let result = expand_env_vars("disable: ${HOOKSCRIPT_MISSING_VAR}");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HOOKSCRIPT_MISSING_VAR"));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML_SETTINGS.as_bytes()).unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.scripts.len(), 2);
    }

    #[test]
    fn test_load_and_merge_files() {
        let mut base = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        base.write_all(YAML_SETTINGS.as_bytes()).unwrap();

        let mut overlay = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        overlay
            .write_all(
                br#"{"scripts": [{"name": "user.created.queued", "type": "rhai", "is_active": false}]}"#,
            )
            .unwrap();

        let merged = load_and_merge(vec![base.path(), overlay.path()]).unwrap();
        assert_eq!(merged.scripts.len(), 2);
        let queued = merged
            .scripts
            .iter()
            .find(|s| s.name == "user.created.queued")
            .unwrap();
        assert!(!queued.is_active);
    }

    #[test]
    fn test_load_and_merge_requires_paths() {
        let result = load_and_merge::<&Path>(vec![]);
        assert!(result.is_err());
    }
}
