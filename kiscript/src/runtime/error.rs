// Error handling for the KiScript runtime

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Runtime errors that can occur during KiScript execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Undefined variable
    #[error("name '{name}' is not defined")]
    UndefinedName { name: String },

    #[error("'{type_name}' object has no attribute '{attribute}'")]
    AttributeNotFound {
        type_name: String,
        attribute: String,
    },

    #[error("attribute '{attribute}' of '{type_name}' objects is not writable")]
    ReadOnlyAttribute {
        type_name: String,
        attribute: String,
    },

    /// Type errors (wrong type for operation)
    #[error("{operation}: expected {expected}, got {actual}")]
    TypeError {
        expected: String,
        actual: String,
        operation: String,
    },

    #[error("'{type_name}' object is not callable")]
    NotCallable { type_name: String },

    /// Arity mismatch (wrong number of arguments)
    #[error("{function}() takes {expected} argument(s) but {actual} were given")]
    ArityMismatch {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("{function}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { function: String, keyword: String },

    #[error("{0}")]
    ValueError(String),

    /// Index out of bounds
    #[error("index {index} out of range for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    /// Key not found in dict
    #[error("{key}")]
    KeyNotFound { key: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("maximum call depth of {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("execution exceeded its deadline of {limit_ms} ms")]
    Timeout { limit_ms: u128 },

    #[error("execution was cancelled")]
    Cancelled,

    /// `break`/`continue`/`return` used where it has no meaning.
    #[error("'{statement}' outside {context}")]
    Misplaced {
        statement: &'static str,
        context: &'static str,
    },

    /// Raised by script code with `raise`.
    #[error("{message}")]
    Raised { kind: String, message: String },

    /// Failure reported by a host object (document session, commits, ...).
    #[error("{message}")]
    Host { kind: String, message: String },

    #[error("internal error: {0}")]
    InternalError(String),
}

impl RuntimeError {
    /// The fault kind shown to callers and matched by `except Kind`.
    pub fn kind(&self) -> &str {
        match self {
            RuntimeError::UndefinedName { .. } => "NameError",
            RuntimeError::AttributeNotFound { .. } | RuntimeError::ReadOnlyAttribute { .. } => {
                "AttributeError"
            }
            RuntimeError::TypeError { .. }
            | RuntimeError::NotCallable { .. }
            | RuntimeError::ArityMismatch { .. }
            | RuntimeError::UnexpectedKeyword { .. } => "TypeError",
            RuntimeError::ValueError(_) => "ValueError",
            RuntimeError::IndexOutOfBounds { .. } => "IndexError",
            RuntimeError::KeyNotFound { .. } => "KeyError",
            RuntimeError::DivisionByZero => "ZeroDivisionError",
            RuntimeError::RecursionLimit { .. } => "RecursionError",
            RuntimeError::Timeout { .. } | RuntimeError::Cancelled => "TimeoutError",
            RuntimeError::Misplaced { .. } => "SyntaxError",
            RuntimeError::Raised { kind, .. } | RuntimeError::Host { kind, .. } => kind,
            RuntimeError::InternalError(_) => "InternalError",
        }
    }

    /// Deadline and cancellation faults stop the script even inside `try`.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, RuntimeError::Timeout { .. } | RuntimeError::Cancelled)
    }

    /// Whether an `except Kind` clause naming `handler_kind` catches this error.
    pub fn matches_handler(&self, handler_kind: &str) -> bool {
        handler_kind == "Exception" || handler_kind == self.kind()
    }

    pub fn type_error(expected: &str, actual: &str, operation: &str) -> Self {
        RuntimeError::TypeError {
            expected: expected.to_string(),
            actual: actual.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn attribute_not_found(type_name: &str, attribute: &str) -> Self {
        RuntimeError::AttributeNotFound {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn read_only(type_name: &str, attribute: &str) -> Self {
        RuntimeError::ReadOnlyAttribute {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        RuntimeError::ValueError(message.into())
    }

    pub fn host(kind: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Host {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
