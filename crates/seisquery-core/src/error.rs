//! Error types for seisquery-core.

use thiserror::Error;

/// Result alias for request-level operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Failures of the catalog store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No connection to the backing store could be opened.
    #[error("could not connect to catalog store: {0}")]
    Unavailable(String),

    /// The store holds data that violates the catalog model.
    #[error("corrupt catalog: {0}")]
    Corrupt(String),

    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request-level failure taxonomy.
///
/// "No matching events" is not an error; it is reported as an empty outcome
/// by the service layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Malformed or conflicting filter value. The message names the
    /// offending parameter(s).
    #[error("{0}")]
    InvalidParameter(String),

    /// Syntactically valid request for something this service does not do.
    #[error("{0}")]
    Unsupported(String),

    /// The catalog store could not be reached.
    #[error("{0}")]
    StoreUnavailable(String),

    /// Assembly crossed the configured object ceiling.
    #[error(
        "the result set of your request exceeds the configured maximum number of objects ({max}), refine your request"
    )]
    QuotaExceeded { max: usize },

    /// The caller went away while the request was being processed.
    #[error("request cancelled by client")]
    Disconnected,

    #[error(transparent)]
    Store(StoreError),
}

impl SearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SearchError::InvalidParameter(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        SearchError::Unsupported(message.into())
    }

    /// True for outcomes caused by the request itself rather than the
    /// service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::InvalidParameter(_)
                | SearchError::Unsupported(_)
                | SearchError::QuotaExceeded { .. }
                | SearchError::Disconnected
        )
    }

    /// True when assembly was cut short (quota or disconnect).
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            SearchError::QuotaExceeded { .. } | SearchError::Disconnected
        )
    }
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => SearchError::StoreUnavailable(msg),
            other => SearchError::Store(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
