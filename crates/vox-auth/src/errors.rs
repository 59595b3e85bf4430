//! Auth error types.

use vox_core::InvalidGroup;

/// Errors that can occur during credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// `SQLite` query failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool could not hand out a connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The store could not be reached (blocking task failed, timeout).
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// `issue` was called with a key that already exists.
    #[error("credential already exists")]
    DuplicateKey,

    /// A stored record names a group outside the closed set.
    #[error("{0}")]
    InvalidGroup(#[from] InvalidGroup),

    /// A stored timestamp could not be parsed.
    #[error("corrupt credential record: {0}")]
    Corrupt(String),
}

/// Result type for credential store operations.
pub type Result<T> = std::result::Result<T, AuthError>;
