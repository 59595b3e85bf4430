//! Server error types.

use thiserror::Error;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket bind or accept failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An allowed origin that is not a valid header value.
    #[error("invalid CORS origin: {0:?}")]
    InvalidOrigin(String),

    /// The global metrics recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),
}

/// Convenience alias for server results.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_origin_display() {
        let err = ServerError::InvalidOrigin("bad\norigin".into());
        assert_eq!(err.to_string(), "invalid CORS origin: \"bad\\norigin\"");
    }

    #[test]
    fn io_error_converts() {
        let err: ServerError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
