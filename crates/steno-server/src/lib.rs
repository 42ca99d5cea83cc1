//! # steno-server
//!
//! Axum HTTP + `WebSocket` front end for the relay engine.
//!
//! - `WebSocket` endpoint `/ws`: each upgrade becomes one relay session
//! - Socket bridging: reader/writer tasks mapping frames to relay channels
//! - HTTP endpoints: `/health` (uptime + active sessions), `/metrics` (Prometheus)
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod ws;

pub use config::ServerConfig;
pub use server::{AppState, GatewayServer};
