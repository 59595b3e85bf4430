//! Routing table and rate-limit policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vox_core::GroupName;

/// Broker policy settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Minimum spacing between two admitted requests from one producer.
    pub min_request_interval_ms: u64,
    /// Language tag → transcription group.
    pub languages: BTreeMap<String, GroupName>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        let languages = BTreeMap::from([
            ("english-only".to_string(), GroupName::Wave2vec),
            ("malay-only".to_string(), GroupName::Whisper),
            ("malay-english".to_string(), GroupName::Whisper),
        ]);
        Self {
            min_request_interval_ms: 1000,
            languages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_language_table() {
        let cfg = BrokerSettings::default();
        assert_eq!(cfg.languages["english-only"], GroupName::Wave2vec);
        assert_eq!(cfg.languages["malay-only"], GroupName::Whisper);
        assert_eq!(cfg.languages["malay-english"], GroupName::Whisper);
        assert_eq!(cfg.languages.len(), 3);
    }

    #[test]
    fn unknown_group_fails_to_parse() {
        let json = r#"{"languages":{"tamil-only":"gpt"}}"#;
        let result: Result<BrokerSettings, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
