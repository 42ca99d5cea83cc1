//! Channel plumbing between the socket I/O tasks and a relay session.
//!
//! A session never touches the WebSocket directly. The server's reader task
//! feeds it [`ClientFrame`]s over a bounded channel, and reply text flows
//! back through a second channel owned by the writer task. Dropping the
//! reply sender is the signal for the writer task to begin the close
//! handshake, which keeps close initiation and draining independent.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Capacity of the frame channel (client → session).
///
/// Bounds read-ahead: once this many frames are queued the reader task
/// parks, so the uplink's write+flush pace is the backpressure the client
/// ultimately sees.
pub const FRAME_BUFFER: usize = 32;

/// Capacity of the reply channel (session → client).
pub const REPLY_BUFFER: usize = 32;

/// One event received from the client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// A discrete client message; empty marks end of audio.
    Message(Bytes),
    /// The connection ended; `clean` when a close frame was exchanged.
    Closed {
        /// Whether the peer completed the close handshake.
        clean: bool,
    },
}

/// Outcome of draining leftover client frames after a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Whether the client completed a clean close.
    pub clean: bool,
    /// Frames received and discarded while draining.
    pub discarded: u64,
}

/// Session-side handle to one client connection.
#[derive(Debug)]
pub struct ClientChannel {
    frames: mpsc::Receiver<ClientFrame>,
    replies: Option<mpsc::Sender<String>>,
}

impl ClientChannel {
    /// Wrap the session side of an established frame/reply channel pair.
    pub fn new(frames: mpsc::Receiver<ClientFrame>, replies: mpsc::Sender<String>) -> Self {
        Self {
            frames,
            replies: Some(replies),
        }
    }

    /// Build a connected pair; returns the socket-side endpoints alongside.
    pub fn pair() -> (Self, mpsc::Sender<ClientFrame>, mpsc::Receiver<String>) {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
        (Self::new(frame_rx, reply_tx), frame_tx, reply_rx)
    }

    /// Receive the next frame. `None` means the socket tasks are gone.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.frames.recv().await
    }

    /// A clone of the reply sender, while the connection is still open.
    pub fn reply_sender(&self) -> Option<mpsc::Sender<String>> {
        self.replies.clone()
    }

    /// Send one text message to the client.
    pub async fn send(&self, text: String) -> Result<(), SessionError> {
        match &self.replies {
            Some(tx) => tx.send(text).await.map_err(|_| SessionError::ClientClosed),
            None => Err(SessionError::ClientClosed),
        }
    }

    /// Drop the reply sender, telling the writer task to close the socket.
    pub fn begin_close(&mut self) {
        self.replies = None;
    }

    /// Consume and discard frames until the connection reports closure.
    pub async fn drain(&mut self) -> DrainOutcome {
        let mut discarded = 0;
        loop {
            match self.frames.recv().await {
                Some(ClientFrame::Message(_)) => discarded += 1,
                Some(ClientFrame::Closed { clean }) => return DrainOutcome { clean, discarded },
                None => {
                    return DrainOutcome {
                        clean: false,
                        discarded,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (mut channel, frames, _replies) = ClientChannel::pair();
        frames
            .send(ClientFrame::Message(Bytes::from_static(b"one")))
            .await
            .unwrap();
        frames
            .send(ClientFrame::Message(Bytes::from_static(b"two")))
            .await
            .unwrap();

        assert_eq!(
            channel.recv().await,
            Some(ClientFrame::Message(Bytes::from_static(b"one")))
        );
        assert_eq!(
            channel.recv().await,
            Some(ClientFrame::Message(Bytes::from_static(b"two")))
        );
    }

    #[tokio::test]
    async fn send_reaches_socket_side() {
        let (channel, _frames, mut replies) = ClientChannel::pair();
        channel.send("hello".to_string()).await.unwrap();
        assert_eq!(replies.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn send_after_begin_close_fails() {
        let (mut channel, _frames, _replies) = ClientChannel::pair();
        channel.begin_close();
        let err = channel.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, SessionError::ClientClosed));
    }

    #[tokio::test]
    async fn begin_close_ends_reply_stream() {
        let (mut channel, _frames, mut replies) = ClientChannel::pair();
        channel.begin_close();
        assert_eq!(replies.recv().await, None);
    }

    #[tokio::test]
    async fn drain_counts_and_reports_clean_close() {
        let (mut channel, frames, _replies) = ClientChannel::pair();
        frames
            .send(ClientFrame::Message(Bytes::from_static(b"left")))
            .await
            .unwrap();
        frames
            .send(ClientFrame::Message(Bytes::from_static(b"over")))
            .await
            .unwrap();
        frames
            .send(ClientFrame::Closed { clean: true })
            .await
            .unwrap();

        let outcome = channel.drain().await;
        assert_eq!(
            outcome,
            DrainOutcome {
                clean: true,
                discarded: 2
            }
        );
    }

    #[tokio::test]
    async fn drain_without_close_frame_is_unclean() {
        let (mut channel, frames, _replies) = ClientChannel::pair();
        drop(frames);
        let outcome = channel.drain().await;
        assert!(!outcome.clean);
        assert_eq!(outcome.discarded, 0);
    }
}
