//! WebSocket endpoint: bridges each accepted socket to one relay session.
//!
//! The socket is split into a reader task and a writer task (the relay
//! engine itself never sees axum types). The reader maps frames into
//! [`ClientFrame`]s: text and binary messages become equivalent byte
//! messages; a close frame is a clean closure; a transport error or bare
//! stream end is an unclean one. The writer sends reply text and keepalive
//! pings, and begins the close handshake when the session drops its reply
//! sender. The reader records every pong; a client that goes a full
//! `client_timeout` without one, or that leaves a socket write blocked
//! that long, is reaped and its session cancelled.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use steno_relay::{ClientChannel, ClientFrame, Session};

use crate::server::AppState;

/// GET `/ws`: upgrade and run one relay session over the socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// See one accepted socket through a full session lifecycle.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let _ = state.sessions.fetch_add(1, Ordering::Relaxed);
    gauge!("relay_sessions_active").increment(1.0);

    let (socket_tx, socket_rx) = socket.split();
    let (channel, frame_tx, reply_rx) = ClientChannel::pair();
    let (pong_tx, pong_rx) = watch::channel(Instant::now());
    let reaped = CancellationToken::new();
    let writer = tokio::spawn(write_frames(
        socket_tx,
        reply_rx,
        pong_rx,
        reaped.clone(),
        state.config.ping_interval(),
        state.config.client_timeout(),
    ));
    let reader = tokio::spawn(read_frames(socket_rx, frame_tx, pong_tx));

    // A liveness reap from the writer cancels the session outright;
    // otherwise the session ends on its own and the writer follows with a
    // close frame.
    tokio::select! {
        () = Session::new(state.relay.as_ref().clone(), channel).run() => {}
        () = reaped.cancelled() => warn!("client unresponsive; cancelling its session"),
    }

    if writer.await.is_err() {
        warn!("socket writer task panicked");
    }
    // The reader normally ends with the peer's close; abort it in case the
    // peer never sends one.
    reader.abort();

    gauge!("relay_sessions_active").decrement(1.0);
    let _ = state.sessions.fetch_sub(1, Ordering::Relaxed);
}

/// Pump incoming socket messages into the session's frame channel,
/// recording pongs for the writer's liveness check.
async fn read_frames(
    mut socket_rx: SplitStream<WebSocket>,
    frames: mpsc::Sender<ClientFrame>,
    pongs: watch::Sender<Instant>,
) {
    while let Some(next) = socket_rx.next().await {
        match next {
            Ok(msg @ (Message::Binary(_) | Message::Text(_))) => {
                if frames
                    .send(ClientFrame::Message(msg.into_data()))
                    .await
                    .is_err()
                {
                    // session is gone; nothing left to feed
                    return;
                }
            }
            Ok(Message::Close(_)) => {
                let _ = frames.send(ClientFrame::Closed { clean: true }).await;
                return;
            }
            Ok(Message::Pong(_)) => {
                let _ = pongs.send(Instant::now());
            }
            // axum replies to pings itself
            Ok(Message::Ping(_)) => {}
            Err(error) => {
                debug!(error = %error, "client socket error");
                let _ = frames.send(ClientFrame::Closed { clean: false }).await;
                return;
            }
        }
    }
    // stream ended without a close frame
    let _ = frames.send(ClientFrame::Closed { clean: false }).await;
}

/// Pump session replies out to the socket, pinging to keep it alive; when
/// the reply channel closes, send a close frame and finish. Cancels
/// `reaped` instead when the client misses its pong deadline or leaves a
/// write blocked past `client_timeout`.
async fn write_frames(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut replies: mpsc::Receiver<String>,
    last_pong: watch::Receiver<Instant>,
    reaped: CancellationToken,
    ping_interval: Duration,
    client_timeout: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    let _ = ping.tick().await; // consume the immediate first tick
    loop {
        tokio::select! {
            reply = replies.recv() => match reply {
                Some(text) => {
                    match timeout(client_timeout, socket_tx.send(Message::Text(text.into()))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => return,
                        Err(_) => break,
                    }
                }
                None => {
                    // bounded so a jammed socket cannot stall teardown
                    let _ = timeout(client_timeout, socket_tx.send(Message::Close(None))).await;
                    return;
                }
            },
            _ = ping.tick() => {
                if last_pong.borrow().elapsed() >= client_timeout {
                    break;
                }
                match timeout(client_timeout, socket_tx.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => return,
                    Err(_) => break,
                }
            }
        }
    }
    // The client stopped reading or answering pings.
    reaped.cancel();
}
