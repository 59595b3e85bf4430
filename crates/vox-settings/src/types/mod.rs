//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may contain any subset of fields; missing ones keep their defaults.

mod auth;
mod broker;
mod server;

pub use auth::*;
pub use broker::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use vox_core::GroupName;
use vox_core::logging::LogFormat;

use crate::errors::{Result, SettingsError};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 3000 },
///   "broker": { "languages": { "english-only": "wave2vec" } },
///   "auth": { "adminSecret": "change-me" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// HTTP/WebSocket listener settings.
    pub server: ServerSettings,
    /// Routing and rate-limit policy.
    pub broker: BrokerSettings,
    /// Worker credential settings.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Check constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "server.heartbeatIntervalMs",
                "must be positive",
            ));
        }
        if server.heartbeat_timeout_ms < server.heartbeat_interval_ms {
            return Err(SettingsError::invalid(
                "server.heartbeatTimeoutMs",
                format!(
                    "{} is below heartbeatIntervalMs ({})",
                    server.heartbeat_timeout_ms, server.heartbeat_interval_ms
                ),
            ));
        }
        for (field, value) in [
            ("server.maxConnections", server.max_connections),
            ("server.sendQueueSize", server.send_queue_size),
            ("server.maxMessageSize", server.max_message_size),
        ] {
            if value == 0 {
                return Err(SettingsError::invalid(field, "must be positive"));
            }
        }
        for (language, group) in &self.broker.languages {
            let reason = if language.trim().is_empty() {
                "empty language tag"
            } else if *group == GroupName::Store {
                "cannot route to the store group"
            } else {
                continue;
            };
            return Err(SettingsError::InvalidRoute {
                language: language.clone(),
                reason,
            });
        }
        if let Some(secret) = &self.auth.admin_secret {
            if secret.len() < 16 {
                return Err(SettingsError::invalid(
                    "auth.adminSecret",
                    "must be at least 16 characters",
                ));
            }
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: RelaySettings =
            serde_json::from_str(r#"{"server":{"port":8080}}"#).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.broker.min_request_interval_ms, 1000);
    }

    #[test]
    fn camel_case_keys() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json["broker"]["minRequestIntervalMs"].is_number());
        assert!(json["auth"]["validateTimeoutMs"].is_number());
        assert!(json["server"]["allowedOrigins"].is_array());
    }

    #[test]
    fn store_target_rejected() {
        let mut settings = RelaySettings::default();
        let _ = settings
            .broker
            .languages
            .insert("archive".into(), GroupName::Store);
        let err = settings.validate().unwrap_err();
        assert_matches!(err, SettingsError::InvalidRoute { language, .. } if language == "archive");
    }

    #[test]
    fn empty_language_rejected() {
        let mut settings = RelaySettings::default();
        let _ = settings.broker.languages.insert(" ".into(), GroupName::Whisper);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn heartbeat_timeout_below_interval_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.heartbeat_interval_ms = 30_000;
        settings.server.heartbeat_timeout_ms = 10_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn short_admin_secret_rejected() {
        let mut settings = RelaySettings::default();
        settings.auth.admin_secret = Some("short".into());
        assert!(settings.validate().is_err());
        settings.auth.admin_secret = Some("a-long-enough-admin-secret".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_max_connections_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.max_connections = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_interval_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.heartbeat_interval_ms = 0;
        settings.server.heartbeat_timeout_ms = 0;
        assert_matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue { field: "server.heartbeatIntervalMs", .. })
        );
    }

    #[test]
    fn zero_send_queue_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.send_queue_size = 0;
        assert_matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue { field: "server.sendQueueSize", .. })
        );
    }

    #[test]
    fn zero_max_message_size_rejected() {
        let mut settings = RelaySettings::default();
        settings.server.max_message_size = 0;
        assert_matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue { field: "server.maxMessageSize", .. })
        );
    }
}
