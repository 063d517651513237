//! # Hookscript Configuration
//!
//! Settings management with support for:
//! - Multiple formats (YAML, TOML, JSON)
//! - Environment variable expansion
//! - Layered files (later files win)
//! - Validation
//! - The administrative scripting kill-switch

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod merger;
pub mod policy;
pub mod types;
pub mod validator;

pub use loader::{load_and_merge, load_from_file, load_from_str, load_settings};
pub use merger::merge_settings;
pub use policy::DisablePolicy;
pub use types::{
    LoggingSettings, QueueSettings, RhaiSettings, ScriptingSettings, ServiceSettings, Settings,
};
pub use validator::validate_settings;

use hookscript_core::{Error, Result};
use std::path::Path;

/// Load settings from a file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings> {
    load_from_file(path)
}

/// Load settings from a string
pub fn load_str(content: &str, format: SettingsFormat) -> Result<Settings> {
    load_from_str(content, format)
}

/// Settings file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl SettingsFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Config("Unable to detect settings format".to_string()))?;

        match ext {
            "yaml" | "yml" => Ok(SettingsFormat::Yaml),
            "toml" => Ok(SettingsFormat::Toml),
            "json" => Ok(SettingsFormat::Json),
            _ => Err(Error::Config(format!("Unsupported settings format: {}", ext))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            SettingsFormat::from_path(&PathBuf::from("hookscript.yml")).unwrap(),
            SettingsFormat::Yaml
        );
        assert_eq!(
            SettingsFormat::from_path(&PathBuf::from("hookscript.toml")).unwrap(),
            SettingsFormat::Toml
        );
        assert_eq!(
            SettingsFormat::from_path(&PathBuf::from("hookscript.json")).unwrap(),
            SettingsFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        assert!(SettingsFormat::from_path(&PathBuf::from("hookscript.ini")).is_err());
        assert!(SettingsFormat::from_path(&PathBuf::from("hookscript")).is_err());
    }
}
