//! Responses carried by events and constructed from script results

use crate::types::ScriptMap;
use crate::value;
use http::StatusCode;
use serde_json::Value;

/// Structured response produced by a service or installed by a script
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    /// Response content
    pub content: Value,
    /// Content type (`None` means the platform default)
    pub content_type: Option<String>,
    /// HTTP status code
    pub status_code: StatusCode,
    /// Response headers
    pub headers: ScriptMap,
}

impl ServiceResponse {
    /// Create a response with default content type and no headers
    pub fn new(content: Value, status_code: StatusCode) -> Self {
        Self {
            content,
            content_type: None,
            status_code,
            headers: ScriptMap::new(),
        }
    }

    /// Set content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Merge fields from a mapping; keys in `fields` win
    ///
    /// Recognized keys are `content`, `content_type`, `status_code` and
    /// `headers`. Anything else is ignored.
    pub fn merge_from_map(&mut self, fields: &ScriptMap) -> Result<(), String> {
        if let Some(content) = fields.get("content") {
            self.content = content.clone();
        }
        if let Some(content_type) = fields.get("content_type") {
            self.content_type = parse_content_type(content_type)?;
        }
        if let Some(status) = fields.get("status_code") {
            if !status.is_null() {
                self.status_code = parse_status(status)?;
            }
        }
        match fields.get("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(headers)) => value::merge_shallow(&mut self.headers, headers),
            Some(other) => return Err(format!("headers must be a mapping, got {other}")),
        }
        Ok(())
    }

    /// Convert to a plain mapping as exposed to scripts
    pub fn to_map(&self) -> ScriptMap {
        let mut map = ScriptMap::new();
        map.insert("content".to_string(), self.content.clone());
        map.insert(
            "content_type".to_string(),
            self.content_type.clone().map_or(Value::Null, Value::String),
        );
        map.insert(
            "status_code".to_string(),
            Value::from(self.status_code.as_u16()),
        );
        map.insert("headers".to_string(), Value::Object(self.headers.clone()));
        map
    }
}

/// Response attached to an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    /// A structured service response; script payloads merge into it
    Structured(ServiceResponse),
    /// A bare payload computed from a script result
    Payload(Value),
}

impl EventResponse {
    /// Plain value as exposed to scripts
    pub fn to_value(&self) -> Value {
        match self {
            Self::Structured(response) => Value::Object(response.to_map()),
            Self::Payload(payload) => payload.clone(),
        }
    }

    /// Structured response, if this is one
    pub fn as_structured(&self) -> Option<&ServiceResponse> {
        match self {
            Self::Structured(response) => Some(response),
            _ => None,
        }
    }
}

/// Builds [`ServiceResponse`] values from script-supplied data
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFactory;

impl ResponseFactory {
    /// Create a response from content, optional content type and status
    pub fn create(
        content: Value,
        content_type: Option<String>,
        status_code: StatusCode,
    ) -> ServiceResponse {
        ServiceResponse {
            content,
            content_type,
            status_code,
            headers: ScriptMap::new(),
        }
    }

    /// Create a `200 OK` response around raw content
    pub fn raw(content: Value) -> ServiceResponse {
        Self::create(content, None, StatusCode::OK)
    }

    /// Create a response from a `{content, content_type, status_code}` descriptor
    ///
    /// A missing or null `status_code` defaults to `200 OK`.
    pub fn from_descriptor(descriptor: &ScriptMap) -> Result<ServiceResponse, String> {
        let content = descriptor.get("content").cloned().unwrap_or(Value::Null);
        let content_type = match descriptor.get("content_type") {
            Some(v) => parse_content_type(v)?,
            None => None,
        };
        let status_code = match descriptor.get("status_code") {
            None | Some(Value::Null) => StatusCode::OK,
            Some(v) => parse_status(v)?,
        };

        Ok(Self::create(content, content_type, status_code))
    }
}

/// Parse an HTTP status from an integer or numeric string
pub fn parse_status(value: &Value) -> Result<StatusCode, String> {
    let code = match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|c| u16::try_from(c).ok())
            .ok_or_else(|| format!("status_code out of range: {n}"))?,
        Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("status_code is not numeric: {s:?}"))?,
        other => return Err(format!("status_code must be an integer, got {other}")),
    };

    StatusCode::from_u16(code).map_err(|e| format!("Invalid status code {code}: {e}"))
}

fn parse_content_type(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(format!("content_type must be a string, got {other}")),
    }
}
