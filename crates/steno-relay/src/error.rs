//! Session error kinds.

use std::io;

use thiserror::Error;

/// Classified failure for one relay session.
///
/// The kind decides what the client is told: bad requests travel back
/// verbatim because the client can act on them, while engine and internal
/// failures are replaced by a generic message so server-side detail never
/// leaks. Client closures cannot be reported at all (the transport is gone)
/// and are only logged.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The recognition engine could not be reached.
    #[error("could not connect to recognition engine at {addr}: {source}")]
    EngineUnavailable {
        /// `host:port` that refused the connection.
        addr: String,
        /// Underlying connect failure.
        #[source]
        source: io::Error,
    },

    /// The client's first message could not be interpreted as options.
    ///
    /// `Display` output is the exact text sent back to the client.
    #[error("{0}")]
    BadRequest(String),

    /// The client connection ended outside the expected sequence.
    #[error("client connection closed unexpectedly")]
    ClientClosed,

    /// Engine-side I/O failed mid-session.
    #[error("engine i/o error: {0}")]
    EngineIo(#[from] io::Error),

    /// A failure that fits no other kind.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable label for failure metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::EngineUnavailable { .. } => "engine_unavailable",
            Self::BadRequest(_) => "bad_request",
            Self::ClientClosed => "client_closed",
            Self::EngineIo(_) => "engine_io",
            Self::Internal(_) => "internal",
        }
    }
}
