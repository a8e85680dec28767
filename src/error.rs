use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure talking to the REST backend. Always recoverable by the adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Parse(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Parse(err.to_string())
    }
}

/// Failure of the local key/value storage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("local storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Crate-level error taxonomy.
///
/// Only errors whose fallback path is exhausted reach callers as `AppError`;
/// the persistence adapter absorbs `Network` failures by switching to the
/// local mirror and reports them through [`crate::store::Source::Local`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("network error: {0}")]
    Network(#[from] RemoteError),

    #[error("{what} not found: {hint}")]
    NotFound { what: String, hint: String },

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("local storage is full ({needed} bytes needed, quota {quota} bytes)")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("local storage failure: {0}")]
    Storage(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>, hint: impl Into<String>) -> Self {
        AppError::NotFound {
            what: what.into(),
            hint: hint.into(),
        }
    }

    /// Transient failures that are worth retrying once the backend is reachable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// Errors with no further fallback; the UI must tell the user.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::QuotaExceeded { .. } | AppError::Storage(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded { needed, quota } => AppError::QuotaExceeded { needed, quota },
            StorageError::Backend(message) => AppError::Storage(message),
        }
    }
}
