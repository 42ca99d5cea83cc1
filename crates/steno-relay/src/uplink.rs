//! Client → engine audio relay.

use metrics::counter;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::client::{ClientChannel, ClientFrame};
use crate::error::SessionError;

/// Message interval for uplink progress logs.
const PROGRESS_LOG_INTERVAL: u64 = 10_000;

/// Tally of relayed audio, reported when the uplink finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UplinkStats {
    /// Audio messages relayed (terminator excluded).
    pub messages: u64,
    /// Audio bytes relayed.
    pub bytes: u64,
}

/// Pump client audio into the engine until the empty terminator arrives,
/// then write the end-of-file marker.
///
/// Messages are re-sliced to `max_chunk` and each slice is flushed before
/// the next frame is taken, so the frame channel refills only as fast as
/// the engine accepts bytes. The marker is written unconditionally on the
/// terminator, even if the client embedded its own copy in the audio. A
/// client closure before the terminator ends the relay without the marker.
pub(crate) async fn relay_audio<W>(
    client: &mut ClientChannel,
    engine: &mut W,
    eof_marker: &[u8],
    max_chunk: usize,
) -> Result<UplinkStats, SessionError>
where
    W: AsyncWrite + Unpin,
{
    // chunks() panics on zero
    let max_chunk = max_chunk.max(1);
    let mut stats = UplinkStats::default();
    loop {
        match client.recv().await {
            Some(ClientFrame::Message(chunk)) if chunk.is_empty() => break,
            Some(ClientFrame::Message(chunk)) => {
                for piece in chunk.chunks(max_chunk) {
                    engine.write_all(piece).await?;
                    engine.flush().await?;
                }
                stats.messages += 1;
                stats.bytes += chunk.len() as u64;
                counter!("relay_audio_bytes_total").increment(chunk.len() as u64);
                if stats.messages % PROGRESS_LOG_INTERVAL == 0 {
                    debug!(
                        messages = stats.messages,
                        bytes = stats.bytes,
                        "uplink progress"
                    );
                }
            }
            Some(ClientFrame::Closed { .. }) | None => return Err(SessionError::ClientClosed),
        }
    }
    engine.write_all(eof_marker).await?;
    engine.flush().await?;
    debug!(
        messages = stats.messages,
        bytes = stats.bytes,
        "audio stream complete"
    );
    Ok(stats)
}
