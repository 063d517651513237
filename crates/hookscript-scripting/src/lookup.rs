//! Lookup placeholder resolution
//!
//! Script content may reference `{name}` placeholders that are replaced with
//! session or environment values just before execution. Unknown names are
//! left untouched so literal braces in scripts survive.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("valid placeholder pattern"));

/// Resolves lookup placeholders in script content
pub trait LookupResolver: Send + Sync + fmt::Debug {
    /// Return `content` with known placeholders replaced
    fn translate(&self, content: &str) -> String;
}

/// Leaves content unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookups;

impl LookupResolver for NoLookups {
    fn translate(&self, content: &str) -> String {
        content.to_string()
    }
}

/// Resolves placeholders from a fixed name → value map
#[derive(Debug, Clone, Default)]
pub struct MapLookups {
    values: HashMap<String, String>,
}

impl MapLookups {
    /// Create from a map
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Add a value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Number of known lookups
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no lookups are known
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl LookupResolver for MapLookups {
    fn translate(&self, content: &str) -> String {
        if self.values.is_empty() || !content.contains('{') {
            return content.to_string();
        }

        PLACEHOLDER
            .replace_all(content, |caps: &Captures<'_>| match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}
