//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Listen settings for the gateway's HTTP/WebSocket surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind (0 = ephemeral, used by tests).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest WebSocket message accepted from a client, applied at
    /// upgrade time. Audio chunks above this are the client's problem to
    /// split; the relay re-slices anything below it for the engine.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Seconds between keepalive pings on an open socket.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Seconds a client may go without answering pings, or leave a socket
    /// write blocked, before its connection is reaped.
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9980
}

fn default_max_message_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_client_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_message_bytes: default_max_message_bytes(),
            ping_interval_secs: default_ping_interval_secs(),
            client_timeout_secs: default_client_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// `host:port` form for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Keepalive ping cadence as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong deadline as a [`Duration`]; a client past it counts as dead.
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9980);
        assert_eq!(config.max_message_bytes, 16 * 1024 * 1024);
        assert_eq!(config.ping_interval_secs, 20);
        assert_eq!(config.client_timeout_secs, 60);
    }

    #[test]
    fn durations_from_seconds() {
        let config = ServerConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(20));
        assert_eq!(config.client_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 9980);
    }

    #[test]
    fn serde_roundtrip() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 1234,
            max_message_bytes: 1024,
            ping_interval_secs: 5,
            client_timeout_secs: 15,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, "0.0.0.0");
        assert_eq!(back.port, 1234);
        assert_eq!(back.max_message_bytes, 1024);
        assert_eq!(back.ping_interval_secs, 5);
        assert_eq!(back.client_timeout_secs, 15);
    }
}
