//! Engine → client reply relay.

use metrics::counter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SessionError;

/// Forward newline-delimited engine replies to the client, one message per
/// line with surrounding whitespace stripped, until the engine closes its
/// end. A final unterminated line is forwarded like any other.
///
/// Returns the number of replies forwarded. The send is awaited, never
/// dropped, so replies reach the client losslessly and in engine order.
pub(crate) async fn relay_replies<R>(
    engine: &mut R,
    replies: mpsc::Sender<String>,
) -> Result<u64, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut forwarded: u64 = 0;
    loop {
        line.clear();
        let n = engine.read_line(&mut line).await?;
        if n == 0 {
            debug!(forwarded, "engine closed its reply stream");
            return Ok(forwarded);
        }
        let message = line.trim();
        debug!(bytes = message.len(), "forwarding engine reply");
        replies
            .send(message.to_string())
            .await
            .map_err(|_| SessionError::ClientClosed)?;
        counter!("relay_replies_total").increment(1);
        forwarded += 1;
    }
}
