use std::fmt;

/// Stable, backend-independent error codes.
///
/// Both backends map their native failures onto this set so callers can
/// branch on the code without knowing which backend is wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    Conflict,
    PathOutsideBounds,
    IsDirectory,
    IsFile,
    Validation,
    Api,
    Transport,
    Io,
    Serialization,
    Timeout,
    Cancelled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PathOutsideBounds => "PATH_OUTSIDE_BOUNDS",
            ErrorCode::IsDirectory => "IS_DIRECTORY",
            ErrorCode::IsFile => "IS_FILE",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Api => "API_ERROR",
            ErrorCode::Transport => "TRANSPORT_ERROR",
            ErrorCode::Io => "IO_ERROR",
            ErrorCode::Serialization => "SERIALIZATION_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File \"{path}\" not found")]
    NotFound { path: String },

    #[error("File \"{path}\" already exists")]
    AlreadyExists { path: String },

    #[error("Hash mismatch for \"{path}\": expected {expected}, current {}", current.as_deref().unwrap_or("unknown"))]
    Conflict {
        path: String,
        expected: String,
        current: Option<String>,
    },

    #[error("Path \"{path}\" is outside the storage root")]
    PathOutsideBounds { path: String },

    #[error("Path \"{path}\" is a directory, not a file")]
    IsDirectory { path: String },

    #[error("Path \"{path}\" is a file, not a directory")]
    IsFile { path: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StorageError::NotFound { .. } => ErrorCode::NotFound,
            StorageError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            StorageError::Conflict { .. } => ErrorCode::Conflict,
            StorageError::PathOutsideBounds { .. } => ErrorCode::PathOutsideBounds,
            StorageError::IsDirectory { .. } => ErrorCode::IsDirectory,
            StorageError::IsFile { .. } => ErrorCode::IsFile,
            StorageError::Validation(_) => ErrorCode::Validation,
            StorageError::Api { .. } => ErrorCode::Api,
            StorageError::Transport(_) => ErrorCode::Transport,
            StorageError::Io { .. } => ErrorCode::Io,
            StorageError::Serialization(_) => ErrorCode::Serialization,
            StorageError::Timeout(_) => ErrorCode::Timeout,
            StorageError::Cancelled => ErrorCode::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }

    /// Convenience constructor for [`StorageError::Io`].
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
