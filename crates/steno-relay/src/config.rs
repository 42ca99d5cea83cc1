//! Relay configuration.
//!
//! Built once at process start and cloned into each session; sessions never
//! read shared mutable state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the recognition engine listens and how patiently to dial it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine hostname or address.
    #[serde(default = "default_engine_host")]
    pub host: String,

    /// Engine TCP port.
    #[serde(default = "default_engine_port")]
    pub port: u16,

    /// Seconds allowed for a TCP connect before the engine counts as down.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds between readiness probes at startup.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

fn default_engine_host() -> String {
    "localhost".to_string()
}

fn default_engine_port() -> u16 {
    9900
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_interval_secs() -> u64 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_engine_host(),
            port: default_engine_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

impl EngineConfig {
    /// `host:port` form, for dialing and logs.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Readiness probe interval as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

/// Session-level relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Engine endpoint.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Largest single write to the engine; bigger client messages are
    /// re-sliced to this size so one huge message cannot monopolize the
    /// connection between flushes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,

    /// Seconds to wait for the client to finish closing while draining
    /// leftover messages at the end of a session.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_max_chunk_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_drain_timeout_secs() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            max_chunk_bytes: default_max_chunk_bytes(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// Drain timeout as a [`Duration`].
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
