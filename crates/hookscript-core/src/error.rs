//! Error types for hookscript

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for hookscript
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Administrative policy disables scripting globally or for a script type
    #[error("{0}")]
    ConfigurationForbidden(String),

    /// The script executor failed (syntax error, runtime exception, exhaustion)
    #[error("Script '{script}' failed: {message}")]
    Execution {
        /// Script name
        script: String,
        /// Error message
        message: String,
    },

    /// The script returned something the merge rules cannot interpret
    #[error("Script '{script}' returned a malformed result: {message}")]
    MalformedResult {
        /// Script name
        script: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration payload supplied by an administrator
    #[error("Validation error: {0}")]
    Validation(String),

    /// Script or configuration store error
    #[error("Store error: {0}")]
    Store(String),

    /// Queue submission error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Settings error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::ConfigurationForbidden(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create an execution fault
    pub fn execution(script: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Execution {
            script: script.into(),
            message: message.into(),
        }
    }

    /// Create a malformed result error
    pub fn malformed(script: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedResult {
            script: script.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a script fault (execution or malformed result)
    pub fn is_script_fault(&self) -> bool {
        matches!(self, Error::Execution { .. } | Error::MalformedResult { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::ConfigurationForbidden("off".to_string()).to_status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::execution("svc.get.pre_process", "boom").to_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Validation("bad".to_string()).to_status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_malformed_is_script_fault() {
        let err = Error::malformed("db.post.post_process", "status_code must be an integer");
        assert!(err.is_script_fault());
        assert!(err.to_string().contains("db.post.post_process"));
        assert!(!Error::Store("down".to_string()).is_script_fault());
    }
}
