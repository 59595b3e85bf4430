//! Server configuration.

use std::time::Duration;

use vox_broker::{BrokerConfig, RoutingTable};
use vox_settings::RelaySettings;

/// Runtime configuration for the HTTP and `WebSocket` front end.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent `WebSocket` connections.
    pub max_connections: usize,
    /// Max `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub send_queue_size: usize,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Idle time after which a silent connection is closed.
    pub heartbeat_timeout: Duration,
    /// Origins allowed by CORS. `"*"` allows any.
    pub allowed_origins: Vec<String>,
    /// Shared secret for `POST /admin/keys`. Issuance is disabled when unset.
    pub admin_secret: Option<String>,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            max_connections: server.max_connections,
            max_message_size: server.max_message_size,
            send_queue_size: server.send_queue_size,
            heartbeat_interval: Duration::from_millis(server.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(server.heartbeat_timeout_ms),
            allowed_origins: server.allowed_origins.clone(),
            admin_secret: settings.auth.admin_secret.clone(),
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&RelaySettings::default())
    }
}

/// Broker parameters from loaded settings.
pub fn broker_config(settings: &RelaySettings) -> BrokerConfig {
    BrokerConfig {
        min_request_interval: Duration::from_millis(settings.broker.min_request_interval_ms),
        routing: settings
            .broker
            .languages
            .iter()
            .map(|(language, group)| (language.clone(), *group))
            .collect::<RoutingTable>(),
        validate_timeout: Duration::from_millis(settings.auth.validate_timeout_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::{GroupName, LanguageTag};

    #[test]
    fn defaults_follow_settings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(25));
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(cfg.allowed_origins, vec!["http://localhost:8010"]);
        assert!(cfg.admin_secret.is_none());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn broker_config_carries_language_table() {
        let mut settings = RelaySettings::default();
        settings.broker.min_request_interval_ms = 250;
        let _ = settings
            .broker
            .languages
            .insert("tamil-only".into(), GroupName::Whisper);

        let cfg = broker_config(&settings);
        assert_eq!(cfg.min_request_interval, Duration::from_millis(250));
        assert_eq!(cfg.validate_timeout, Duration::from_secs(5));
        assert_eq!(cfg.routing.len(), 4);
        assert_eq!(
            cfg.routing.resolve(&LanguageTag::new("tamil-only").unwrap()),
            Some(GroupName::Whisper)
        );
        assert_eq!(
            cfg.routing.resolve(&LanguageTag::new("english-only").unwrap()),
            Some(GroupName::Wave2vec)
        );
    }
}
