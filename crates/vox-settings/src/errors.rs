//! Settings error types.

use thiserror::Error;

/// Why the relay refused its configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not JSON, or a field has the wrong shape (including an
    /// unknown worker group in the language table).
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A field holds a value the relay cannot run with.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// camelCase path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// An entry of `broker.languages` cannot be routed.
    #[error("invalid route for language '{language}': {reason}")]
    InvalidRoute {
        /// The language tag as written in the table.
        language: String,
        /// What is wrong with the entry.
        reason: &'static str,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
