//! Broker error types.

use thiserror::Error;
use vox_core::{InvalidGroup, LanguageTag};

/// Reply sent to a producer whose request could not be parsed.
pub const INVALID_DATA_FORMAT: &str = "Invalid data format.";

/// Reply sent to a producer when its worker reported a failure.
pub const TRANSCRIPTION_UNAVAILABLE: &str = "Transcription service unavailable.";

/// Outcome of a rejected inbound event.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Bad or missing credential, or a group mismatch.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The claimed group is not one of the known groups.
    #[error(transparent)]
    InvalidGroup(#[from] InvalidGroup),

    /// Malformed payload or missing language.
    #[error("invalid request format")]
    InvalidRequestFormat,

    /// The producer sent again before its minimum interval elapsed.
    #[error("rate limited")]
    RateLimited,

    /// No transcription group is configured for the language.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(LanguageTag),

    /// The language resolves to a group that has no bound worker.
    #[error("no worker available for language {0}")]
    ServiceUnavailable(LanguageTag),

    /// The credential check timed out or the store failed.
    #[error("credential store unavailable")]
    CredentialStoreUnavailable,
}

impl BrokerError {
    /// Message reported to the producer, or `None` when the error is silent
    /// or does not concern a producer.
    pub fn producer_message(&self) -> Option<String> {
        match self {
            Self::InvalidRequestFormat => Some(INVALID_DATA_FORMAT.to_owned()),
            Self::UnsupportedLanguage(language) => {
                Some(format!("Language '{language}' is not supported."))
            }
            Self::ServiceUnavailable(language) => {
                Some(format!("Service for '{language}' is unavailable."))
            }
            Self::RateLimited
            | Self::AuthenticationFailed(_)
            | Self::InvalidGroup(_)
            | Self::CredentialStoreUnavailable => None,
        }
    }

    /// Whether the error ends the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::InvalidGroup(_) | Self::CredentialStoreUnavailable
        )
    }
}
