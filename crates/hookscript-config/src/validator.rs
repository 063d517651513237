//! Settings validation

use crate::Settings;
use hookscript_core::{CacheConfig, Error, Result, ServiceScriptConfig, QUEUED_SUFFIX};
use std::collections::HashSet;

/// Validate settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_queue(settings)?;
    validate_scripts(settings)?;
    validate_services(settings)?;

    Ok(())
}

fn validate_queue(settings: &Settings) -> Result<()> {
    if settings.queue.default_queue.trim().is_empty() {
        return Err(Error::Config("queue.default_queue cannot be empty".to_string()));
    }

    if settings.queue.workers == 0 {
        return Err(Error::Config("queue.workers must be > 0".to_string()));
    }

    if settings.scripting.rhai.max_operations == 0 {
        return Err(Error::Config(
            "scripting.rhai.max_operations must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_scripts(settings: &Settings) -> Result<()> {
    let policy = settings.disable_policy();
    let mut names = HashSet::new();

    for script in &settings.scripts {
        if script.name.trim().is_empty() {
            return Err(Error::Config("script name cannot be empty".to_string()));
        }

        if script.script_type.trim().is_empty() {
            return Err(Error::Config(format!(
                "script '{}' has no type",
                script.name
            )));
        }

        if !names.insert(script.name.as_str()) {
            return Err(Error::Config(format!(
                "duplicate script name: {}",
                script.name
            )));
        }

        if !policy.allows(&script.script_type) {
            tracing::warn!(
                script = %script.name,
                script_type = %script.script_type,
                "Script type is disabled by scripting.disable"
            );
        }
    }

    // An event may be handled inline or queued, never both
    for script in settings.scripts.iter().filter(|s| s.is_active) {
        if let Some(base) = script.name.strip_suffix(QUEUED_SUFFIX) {
            let conflict = settings
                .scripts
                .iter()
                .any(|s| s.is_active && s.name == base);
            if conflict {
                return Err(Error::Config(format!(
                    "scripts '{}' and '{}' are both active",
                    base, script.name
                )));
            }
        }
    }

    Ok(())
}

fn validate_services(settings: &Settings) -> Result<()> {
    let mut ids = HashSet::new();

    for service in &settings.services {
        if service.service_id <= 0 {
            return Err(Error::Config(format!(
                "service_id must be > 0, got {}",
                service.service_id
            )));
        }

        if !ids.insert(service.service_id) {
            return Err(Error::Config(format!(
                "duplicate service_id: {}",
                service.service_id
            )));
        }

        if service.script_type.trim().is_empty() {
            return Err(Error::Config(format!(
                "service {} has no script type",
                service.service_id
            )));
        }

        for key in service.config.keys() {
            let known = ServiceScriptConfig::FIELDS.contains(&key.as_str())
                || CacheConfig::FIELDS.contains(&key.as_str());
            if !known {
                return Err(Error::Config(format!(
                    "service {}: unknown configuration key '{}'",
                    service.service_id, key
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceSettings;
    use hookscript_core::{EventScript, ScriptMap};
    use serde_json::json;

    fn minimal_settings() -> Settings {
        Settings {
            scripts: vec![
                EventScript::new("db._table.contact.get.pre_process", "rhai").active(),
                EventScript::new("user.created.queued", "rhai").active(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_minimal_settings() {
        assert!(validate_settings(&minimal_settings()).is_ok());
    }

    #[test]
    fn test_duplicate_script_name() {
        let mut settings = minimal_settings();
        settings
            .scripts
            .push(EventScript::new("db._table.contact.get.pre_process", "rhai"));

        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("duplicate script name"));
    }

    #[test]
    fn test_inline_and_queued_both_active() {
        let mut settings = minimal_settings();
        settings
            .scripts
            .push(EventScript::new("user.created", "rhai").active());
        assert!(validate_settings(&settings).is_err());

        settings.scripts.last_mut().unwrap().is_active = false;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_empty_type() {
        let mut settings = minimal_settings();
        settings.scripts.push(EventScript::new("files.get.post_process", " "));
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_zero_workers() {
        let mut settings = minimal_settings();
        settings.queue.workers = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_unknown_service_config_key() {
        let mut settings = minimal_settings();
        let mut config = ScriptMap::new();
        config.insert("queued".into(), json!(true));
        config.insert("cache_ttl".into(), json!(10));
        settings.services.push(ServiceSettings {
            service_id: 3,
            script_type: "rhai".into(),
            config: config.clone(),
        });
        assert!(validate_settings(&settings).is_ok());

        settings.services[0].config.insert("colour".into(), json!("blue"));
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_duplicate_service_id() {
        let mut settings = minimal_settings();
        for _ in 0..2 {
            settings.services.push(ServiceSettings {
                service_id: 9,
                script_type: "rhai".into(),
                config: ScriptMap::new(),
            });
        }
        assert!(validate_settings(&settings).is_err());
    }
}
