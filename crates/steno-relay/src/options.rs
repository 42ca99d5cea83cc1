//! Request options: the client's first message.
//!
//! Options are a single JSON object. The relay only interprets the `eof`
//! field; everything else passes through to the engine verbatim, compacted
//! onto one newline-terminated line.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::SessionError;

/// End-of-file marker used when options carry no `eof` field.
pub const DEFAULT_EOF_MARKER: &[u8] = b"END-OF-FILE";

/// Parsed request options, forwarded verbatim to the engine.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    fields: Map<String, Value>,
}

impl RequestOptions {
    /// Parse the first client message into an options object.
    ///
    /// Invalid UTF-8 is reported with the byte length of the message (the
    /// text itself cannot be echoed); anything that is not one JSON object
    /// is reported with the decoder's own message. Both reasons go back to
    /// the client verbatim.
    pub fn parse(message: &[u8]) -> Result<Self, SessionError> {
        let text = std::str::from_utf8(message).map_err(|_| {
            SessionError::BadRequest(format!(
                "Could not parse options from first message (comprising {} bytes).",
                message.len()
            ))
        })?;
        let fields: Map<String, Value> = serde_json::from_str(text).map_err(|e| {
            SessionError::BadRequest(format!(
                "Could not parse options from first message (JSON decode error: {e})."
            ))
        })?;
        Ok(Self { fields })
    }

    /// The end-of-file marker for this session: the `eof` option when
    /// present, the default literal otherwise.
    pub fn eof_marker(&self) -> Result<Bytes, SessionError> {
        match self.fields.get("eof") {
            None => Ok(Bytes::from_static(DEFAULT_EOF_MARKER)),
            Some(Value::String(marker)) => Ok(Bytes::copy_from_slice(marker.as_bytes())),
            Some(other) => Err(SessionError::BadRequest(format!(
                "The 'eof' option must be a string, not {other}."
            ))),
        }
    }

    /// Compact single-line re-encoding, newline-terminated, ready for the
    /// engine.
    pub fn to_line(&self) -> Result<Vec<u8>, SessionError> {
        let mut line = serde_json::to_vec(&self.fields)
            .map_err(|e| SessionError::Internal(format!("could not re-encode options: {e}")))?;
        line.push(b'\n');
        Ok(line)
    }
}
