//! # steno-relay
//!
//! Per-session relay engine bridging a framed client transport (WebSocket
//! messages) to the recognition engine's line/byte TCP protocol.
//!
//! The relay is transport-agnostic: the server's socket tasks feed a
//! [`Session`] discrete [`ClientFrame`]s over a bounded channel and read
//! reply text back out of a second channel. Each session owns one engine
//! TCP connection and supervises:
//! - Handshake: the first client message becomes one compact JSON options line
//! - Uplink: audio bytes stream to the engine, ended by the session's marker
//! - Downlink: newline-delimited engine replies become one client message each
//! - Teardown: engine close, then the client close handshake, then a bounded
//!   drain of leftover client frames

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod options;
pub mod session;

mod downlink;
mod handshake;
mod uplink;

pub use client::{ClientChannel, ClientFrame, DrainOutcome};
pub use config::{EngineConfig, RelayConfig};
pub use error::SessionError;
pub use session::Session;
