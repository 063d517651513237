//! Settings file merging
//!
//! Later layers override earlier ones:
//! - base.yaml (defaults)
//! - environment.yaml (env-specific)
//! - scripts.yaml (event scripts maintained separately)

use crate::types::{ScriptingSettings, ServiceSettings, Settings};
use hookscript_core::{EventScript, Result};

/// Merge multiple settings layers together
///
/// Scripts merge by name and services by id; a later entry replaces an
/// earlier one in place, new entries are appended in order.
pub fn merge_settings(layers: Vec<Settings>) -> Result<Settings> {
    let mut layers = layers.into_iter();
    let Some(mut result) = layers.next() else {
        return Err(hookscript_core::Error::Config(
            "No settings to merge".to_string(),
        ));
    };

    for overlay in layers {
        result = merge_two(result, overlay);
    }

    Ok(result)
}

fn merge_two(mut base: Settings, overlay: Settings) -> Settings {
    base.scripting = merge_scripting(base.scripting, overlay.scripting);

    // Overlay wins
    base.queue = overlay.queue;
    base.logging = overlay.logging;

    base.lookups.extend(overlay.lookups);
    base.scripts = merge_scripts(base.scripts, overlay.scripts);
    base.services = merge_services(base.services, overlay.services);

    base
}

fn merge_scripting(base: ScriptingSettings, overlay: ScriptingSettings) -> ScriptingSettings {
    ScriptingSettings {
        disable: overlay.disable.or(base.disable),
        rhai: overlay.rhai,
    }
}

fn merge_scripts(mut base: Vec<EventScript>, overlay: Vec<EventScript>) -> Vec<EventScript> {
    for script in overlay {
        match base.iter_mut().find(|s| s.name == script.name) {
            Some(existing) => *existing = script,
            None => base.push(script),
        }
    }
    base
}

fn merge_services(
    mut base: Vec<ServiceSettings>,
    overlay: Vec<ServiceSettings>,
) -> Vec<ServiceSettings> {
    for service in overlay {
        match base.iter_mut().find(|s| s.service_id == service.service_id) {
            Some(existing) => *existing = service,
            None => base.push(service),
        }
    }
    base
}
