//! Script execution error types

use hookscript_core::Error;

/// Script execution result type
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Fault raised while compiling or running a script
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// Script compilation/parsing error
    #[error("Script compilation error: {message}{}", position(.line, .column))]
    Compilation {
        /// Error message
        message: String,
        /// Line number if available
        line: Option<usize>,
        /// Column number if available
        column: Option<usize>,
    },

    /// Script runtime error
    #[error("Script runtime error: {message}{}", position(.line, &None))]
    Runtime {
        /// Error message
        message: String,
        /// Script line where error occurred
        line: Option<usize>,
    },

    /// No executor registered for the script type
    #[error("Unsupported script type: {script_type}")]
    UnsupportedType {
        /// Script type identifier
        script_type: String,
    },

    /// Conversion between script values and JSON failed
    #[error("Script type error: {message}")]
    TypeError {
        /// Error message
        message: String,
    },
}

fn position(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(col)) => format!(" at line {line}, column {col}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

impl ScriptError {
    /// Create a compilation error
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::Compilation {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
            line: None,
        }
    }

    /// Create an unsupported type error
    pub fn unsupported_type<S: Into<String>>(script_type: S) -> Self {
        Self::UnsupportedType {
            script_type: script_type.into(),
        }
    }

    /// Create a type error
    pub fn type_error<S: Into<String>>(message: S) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Attribute this fault to a script, producing an execution fault
    pub fn into_fault(self, script: &str) -> Error {
        Error::execution(script, self.to_string())
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        let pos = err.position();
        Self::Runtime {
            message: err.to_string(),
            line: pos.line(),
        }
    }
}

impl From<rhai::ParseError> for ScriptError {
    fn from(err: rhai::ParseError) -> Self {
        let pos = err.position();
        Self::Compilation {
            message: err.err_type().to_string(),
            line: pos.line(),
            column: pos.position(),
        }
    }
}
