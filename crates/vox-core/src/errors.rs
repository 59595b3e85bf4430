//! Core error types.

use thiserror::Error;

/// A group name outside the closed [`GroupName`](crate::GroupName) set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid worker group: {0:?}")]
pub struct InvalidGroup(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_name() {
        let err = InvalidGroup("gpt".into());
        assert_eq!(err.to_string(), "invalid worker group: \"gpt\"");
    }
}
