//! # steno-client
//!
//! Command-line client for the recognition gateway. Streams audio from
//! stdin as WebSocket messages and prints each reply line to stdout.
//!
//! Batch use with a pre-recorded file:
//!
//! ```text
//! curl -sL example.com/hi.wav | steno-client ws://localhost:9980 > results.jsonl
//! ```
//!
//! Live streaming:
//!
//! ```text
//! sox -dqV1 -twav -r16000 -c1 -b16 - | steno-client ws://localhost:9980 '{"partial":true}'
//! ```

#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Default audio bytes per message. Small, to match the engine's network
/// read size; batch clients can raise it substantially.
const AUDIO_MESSAGE_SIZE: usize = 128;

/// Command-line client for the recognition gateway.
#[derive(Parser, Debug)]
#[command(
    name = "steno-client",
    about = "Stream stdin audio to a recognition gateway"
)]
struct Cli {
    /// URI of the WebSocket server.
    #[arg(value_name = "URI", default_value = "ws://localhost:9980")]
    uri: String,

    /// JSON-formatted request options.
    #[arg(value_name = "OPTIONS_JSON", default_value = "{}")]
    options_json: String,

    /// Audio bytes per message; affects streaming latency.
    #[arg(long, default_value_t = AUDIO_MESSAGE_SIZE)]
    message_size: usize,
}

/// Read chunked audio and send each chunk as one binary message, then an
/// empty message once the input ends.
async fn stream_audio<R, S>(mut audio: R, mut tx: S, message_size: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let mut buf = vec![0u8; message_size.max(1)];
    loop {
        let n = audio
            .read(&mut buf)
            .await
            .context("could not read audio input")?;
        if n == 0 {
            break;
        }
        tx.send(Message::binary(buf[..n].to_vec()))
            .await
            .context("could not send audio")?;
    }
    tx.send(Message::binary(Vec::new()))
        .await
        .context("could not send audio terminator")?;
    Ok(())
}

async fn run(args: Cli) -> Result<()> {
    let (ws, _) = connect_async(&args.uri)
        .await
        .with_context(|| format!("could not connect to {}", args.uri))?;
    let (mut tx, mut rx) = ws.split();

    // Options go first; the gateway reads them before any audio.
    tx.send(Message::text(args.options_json))
        .await
        .context("could not send request options")?;

    let send_audio = tokio::spawn(stream_audio(tokio::io::stdin(), tx, args.message_size));

    // Print replies until the server closes the connection.
    while let Some(next) = rx.next().await {
        match next {
            Ok(Message::Text(reply)) => println!("{reply}"),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => return Err(error).context("connection failed"),
        }
    }

    // The server is done; any audio still unsent has nowhere to go.
    send_audio.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    tokio::select! {
        result = run(args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => ExitCode::from(130),
    }
}
