//! Options handshake: first client message → one engine options line.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::client::{ClientChannel, ClientFrame};
use crate::error::SessionError;
use crate::options::RequestOptions;

/// Receive the client's first message, validate it, forward it to the
/// engine as one compact newline-terminated JSON line, and return the
/// session's end-of-file marker.
///
/// The message is validated in full (including the `eof` field) before any
/// byte is written, so a bad request never reaches the engine. The line is
/// flushed before returning; audio relayed afterwards can never overtake
/// it.
pub(crate) async fn relay_options<W>(
    client: &mut ClientChannel,
    engine: &mut W,
) -> Result<Bytes, SessionError>
where
    W: AsyncWrite + Unpin,
{
    let first = match client.recv().await {
        Some(ClientFrame::Message(bytes)) => bytes,
        Some(ClientFrame::Closed { .. }) | None => return Err(SessionError::ClientClosed),
    };
    debug!(bytes = first.len(), "received options message");

    let options = RequestOptions::parse(&first)?;
    let marker = options.eof_marker()?;
    let line = options.to_line()?;

    engine.write_all(&line).await?;
    engine.flush().await?;
    debug!(bytes = line.len(), "forwarded options line to engine");
    Ok(marker)
}
