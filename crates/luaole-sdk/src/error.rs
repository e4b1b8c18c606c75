//! Error types reported by foreign object systems

/// Result type for foreign dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised by the foreign object system.
///
/// Backends map their native failure codes onto these variants and keep the
/// foreign diagnostic text, which the bridge forwards to scripts verbatim.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// Environment initialization failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No class is registered under the requested name
    #[error("activation failed: class not registered: {0}")]
    ClassNotFound(String),

    /// The object does not expose the requested interface
    #[error("interface not supported: {0}")]
    InterfaceNotSupported(String),

    /// No member with this name exists on the object
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// Wrong number of arguments for the member
    #[error("bad parameter count: expected {expected}, got {got}")]
    BadParamCount {
        /// Number of arguments the member accepts
        expected: usize,
        /// Number of arguments supplied
        got: usize,
    },

    /// An argument could not be coerced to the type the member expects
    #[error("type mismatch at argument {index}: {message}")]
    TypeMismatch {
        /// Zero-based argument position
        index: usize,
        /// Foreign diagnostic
        message: String,
    },

    /// The member raised an exception
    #[error("exception from {source_name}: {description}")]
    Exception {
        /// Component that raised the exception
        source_name: String,
        /// Exception description
        description: String,
    },

    /// The object does not support enumeration
    #[error("object is not enumerable")]
    NotEnumerable,

    /// Any other failure code
    #[error("{0}")]
    Other(String),
}

impl From<String> for DispatchError {
    fn from(s: String) -> Self {
        DispatchError::Other(s)
    }
}

impl From<&str> for DispatchError {
    fn from(s: &str) -> Self {
        DispatchError::Other(s.to_string())
    }
}
