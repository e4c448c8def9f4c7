use serde_json::Value;
use thiserror::Error;

/// Main error type for esquery operations
#[derive(Error, Debug)]
pub enum EsQueryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{message} (queries: {body})")]
    Query {
        method: String,
        body: Value,
        message: String,
    },

    #[error("no such index [{index}]")]
    IndexNotFound { method: String, index: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Malformed response: {0}")]
    Response(String),
}

/// Result type alias for esquery operations
pub type Result<T> = std::result::Result<T, EsQueryError>;

impl EsQueryError {
    /// Shorthand constructor for fluent-construction misuse errors
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EsQueryError::InvalidArgument(message.into())
    }

    /// Check if this error was raised during fluent construction
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EsQueryError::InvalidArgument(_))
    }

    /// Check if this error reports a missing index
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, EsQueryError::IndexNotFound { .. })
    }

    /// The engine operation that produced this error, if it happened at
    /// execution time
    pub fn method(&self) -> Option<&str> {
        match self {
            EsQueryError::Query { method, .. } => Some(method),
            EsQueryError::IndexNotFound { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Attach execution context to a connection failure.
    ///
    /// Errors that already carry their context (`Query`, `IndexNotFound`)
    /// pass through unchanged so the original payload is never lost.
    pub(crate) fn into_query(self, method: &str, body: &Value) -> Self {
        match self {
            err @ (EsQueryError::Query { .. } | EsQueryError::IndexNotFound { .. }) => err,
            other => EsQueryError::Query {
                method: method.to_string(),
                body: body.clone(),
                message: other.to_string(),
            },
        }
    }
}
