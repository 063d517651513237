//! Administrative scripting kill-switch

use hookscript_core::{Error, Result};
use std::fmt;

/// Which script types may be configured on this instance
///
/// Parsed from the `scripting.disable` setting: empty means enabled, `all`
/// (any case) disables everything, anything else is a list of type
/// identifiers matched case-insensitively as substrings, e.g. `"python,php"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DisablePolicy {
    /// Scripting is allowed
    #[default]
    Enabled,
    /// All scripting is disabled
    All,
    /// Types named in the (lowercased) value are disabled
    Types(String),
}

impl DisablePolicy {
    /// Parse from the raw setting value
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Enabled,
            Some(v) if v.eq_ignore_ascii_case("all") => Self::All,
            Some(v) => Self::Types(v.to_lowercase()),
        }
    }

    /// Fail with [`Error::ConfigurationForbidden`] when `script_type` is disabled
    pub fn check(&self, script_type: &str) -> Result<()> {
        match self {
            Self::Enabled => Ok(()),
            Self::All => Err(Error::ConfigurationForbidden(
                "All scripting is disabled for this instance.".to_string(),
            )),
            Self::Types(disabled) => {
                if !script_type.is_empty() && disabled.contains(&script_type.to_lowercase()) {
                    Err(Error::ConfigurationForbidden(format!(
                        "Scripting with {script_type} is disabled for this instance."
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Whether `script_type` may be configured
    pub fn allows(&self, script_type: &str) -> bool {
        self.check(script_type).is_ok()
    }
}

impl fmt::Display for DisablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::All => write!(f, "all"),
            Self::Types(types) => write!(f, "{types}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(DisablePolicy::from_setting(None), DisablePolicy::Enabled);
        assert_eq!(DisablePolicy::from_setting(Some("  ")), DisablePolicy::Enabled);
        assert_eq!(DisablePolicy::from_setting(Some("ALL")), DisablePolicy::All);
        assert_eq!(
            DisablePolicy::from_setting(Some("Python,PHP")),
            DisablePolicy::Types("python,php".to_string())
        );
    }

    #[test]
    fn test_all_blocks_everything() {
        let policy = DisablePolicy::All;
        let err = policy.check("rhai").unwrap_err();
        assert!(matches!(err, Error::ConfigurationForbidden(_)));
        assert!(err.to_string().contains("All scripting"));
        assert!(!policy.allows(""));
    }

    #[test]
    fn test_type_match_is_case_insensitive_substring() {
        let policy = DisablePolicy::from_setting(Some("nodejs, PYTHON"));
        assert!(!policy.allows("python"));
        assert!(!policy.allows("Python"));
        assert!(!policy.allows("nodejs"));
        assert!(policy.allows("rhai"));
        assert!(policy.allows(""));

        let err = policy.check("python").unwrap_err();
        assert_eq!(err.to_string(), "Scripting with python is disabled for this instance.");
    }

    #[test]
    fn test_enabled_allows() {
        assert!(DisablePolicy::Enabled.check("rhai").is_ok());
    }
}
