//! Typed errors for the job sources library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! failing source apart from a failing store.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a single job source adapter.
///
/// These never cross the registry boundary: the registry records them per
/// source and carries on with the remaining adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure talking to the source
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The source rejected our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The source answered with something we could not normalize
    #[error("parse error: {0}")]
    Parse(String),

    /// A credential the adapter needs is not configured
    #[error("missing credential `{key}` for source {source_name}")]
    MissingCredential { source_name: String, key: String },

    /// Rate limit exceeded on the remote side
    #[error("rate limit exceeded")]
    RateLimited,

    /// The adapter did not settle within its timeout
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The caller stopped waiting before the adapter settled
    #[error("search cancelled")]
    Cancelled,

    /// The adapter panicked while running
    #[error("adapter panicked: {0}")]
    Panicked(String),

    /// The adapter does not implement this optional capability
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// No adapter registered under this name
    #[error("unknown source: {name}")]
    UnknownSource { name: String },
}

/// A listing that cannot be persisted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListingError {
    /// A required normalized field is missing or blank
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Numeric salary bounds are inverted
    #[error("salary min {min} exceeds max {max}")]
    InvalidSalaryRange { min: i64, max: i64 },
}

/// Errors from aggregation, persistence, and saved-search operations.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Entity not found in the store
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Caller supplied an invalid value
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl AggregationError {
    /// Wrap any error as a storage failure.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(err.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for AggregationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Result type alias for aggregation and store operations.
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Result type alias for adapter operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
