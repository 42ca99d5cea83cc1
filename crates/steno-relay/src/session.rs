//! Session supervisor: one client connection driving one engine connection.
//!
//! The supervisor owns every phase of a session: connect to the engine,
//! relay the options line, run the uplink and downlink concurrently, then
//! tear everything down in a fixed order. The engine decides when a request
//! is finished; the session waits on the downlink only, and the uplink is
//! silently cancelled (its future dropped) the moment the downlink sees the
//! engine close. Teardown then closes the engine connection, starts the
//! client close handshake, and drains whatever the client was still
//! sending, so leftover audio cannot stall the close.

use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::client::ClientChannel;
use crate::config::RelayConfig;
use crate::downlink;
use crate::engine::EngineConnection;
use crate::error::SessionError;
use crate::handshake;
use crate::uplink::{self, UplinkStats};

/// Tag marking error replies as gateway-originated rather than
/// engine-originated.
const ERROR_TAG: &str = "[gateway]";

/// Client text when the engine cannot be reached.
const ENGINE_UNAVAILABLE_TEXT: &str =
    "Could not connect to recognition engine; contact server operator.";

/// Client text for failures whose detail must not leak.
const UNEXPECTED_FAILURE_TEXT: &str = "Request failed unexpectedly; contact server operator.";

/// Render a gateway-originated error reply.
fn error_reply(details: &str) -> String {
    serde_json::json!({
        "status": "failed",
        "error": format!("{ERROR_TAG} {details}"),
    })
    .to_string()
}

/// Client-facing text for a failure, if the kind allows one to be sent.
fn client_text(err: &SessionError) -> Option<&str> {
    match err {
        SessionError::EngineUnavailable { .. } => Some(ENGINE_UNAVAILABLE_TEXT),
        SessionError::BadRequest(reason) => Some(reason),
        // The transport is gone; there is nobody to tell.
        SessionError::ClientClosed => None,
        SessionError::EngineIo(_) | SessionError::Internal(_) => Some(UNEXPECTED_FAILURE_TEXT),
    }
}

/// Combine the relay halves once the downlink has returned. The engine
/// owns request completion: after the downlink finishes cleanly, a
/// recorded uplink failure was already logged when the uplink ended, and
/// only a vanished client still fails the session.
fn relay_outcome(
    downlink: Result<u64, SessionError>,
    uplink: Option<Result<UplinkStats, SessionError>>,
) -> Result<(), SessionError> {
    let forwarded = downlink?;
    debug!(replies = forwarded, "downlink finished");
    match uplink {
        Some(Err(err @ SessionError::ClientClosed)) => Err(err),
        _ => Ok(()),
    }
}

/// One relay session.
pub struct Session {
    id: Uuid,
    config: RelayConfig,
    client: ClientChannel,
}

impl Session {
    /// Create a session over an established client channel.
    pub fn new(config: RelayConfig, client: ClientChannel) -> Self {
        Self {
            id: Uuid::now_v7(),
            config,
            client,
        }
    }

    /// Session id, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Drive the session to completion: connect, handshake, relay, drain.
    ///
    /// Never returns an error. Every failure is classified, reported to
    /// the client when the kind allows it, and funneled into the same
    /// teardown.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn run(mut self) {
        counter!("relay_sessions_total").increment(1);
        info!(engine = %self.config.engine.addr(), "session started");

        let mut engine = match EngineConnection::connect(&self.config.engine).await {
            Ok(conn) => conn,
            Err(err) => {
                self.fail(&err).await;
                self.client.begin_close();
                info!("session closed");
                return;
            }
        };

        let eof_marker = match handshake::relay_options(&mut self.client, &mut engine.writer).await
        {
            Ok(marker) => marker,
            Err(err) => {
                self.fail(&err).await;
                engine.close().await;
                self.client.begin_close();
                info!("session closed");
                return;
            }
        };

        let result = self.relay(&mut engine, &eof_marker).await;
        if let Err(err) = &result {
            self.fail(err).await;
        }

        // Teardown order matters: the uplink future is already gone, the
        // engine side goes next, and only then does the client close
        // handshake begin, with the drain absorbing in-flight frames.
        engine.close().await;
        self.client.begin_close();
        match timeout(self.config.drain_timeout(), self.client.drain()).await {
            Ok(outcome) if outcome.clean => {
                debug!(discarded = outcome.discarded, "client connection drained");
            }
            Ok(outcome) => {
                warn!(
                    discarded = outcome.discarded,
                    "client connection closed uncleanly during drain"
                );
            }
            Err(_) => warn!("client did not close within the drain window"),
        }
        info!("session closed");
    }

    /// Run both relays, waiting on the downlink; the uplink is cancelled by
    /// dropping its future once the downlink returns.
    async fn relay(
        &mut self,
        engine: &mut EngineConnection,
        eof_marker: &[u8],
    ) -> Result<(), SessionError> {
        let Some(reply_tx) = self.client.reply_sender() else {
            return Err(SessionError::Internal(
                "client reply channel closed before relaying".to_string(),
            ));
        };
        let EngineConnection { reader, writer } = engine;
        let max_chunk = self.config.max_chunk_bytes;

        let uplink = uplink::relay_audio(&mut self.client, writer, eof_marker, max_chunk);
        let downlink = downlink::relay_replies(reader, reply_tx);
        tokio::pin!(uplink);
        tokio::pin!(downlink);

        let mut uplink_result: Option<Result<UplinkStats, SessionError>> = None;
        let downlink_result = loop {
            tokio::select! {
                res = &mut downlink => break res,
                res = &mut uplink, if uplink_result.is_none() => {
                    match &res {
                        Ok(stats) => debug!(
                            messages = stats.messages,
                            bytes = stats.bytes,
                            "uplink finished"
                        ),
                        Err(err) => warn!(error = %err, "uplink ended early; waiting on engine"),
                    }
                    uplink_result = Some(res);
                }
            }
        };

        relay_outcome(downlink_result, uplink_result)
    }

    /// Log a terminal failure, count it, and send the client its reply when
    /// the kind allows one.
    async fn fail(&self, err: &SessionError) {
        counter!("relay_session_failures_total", "kind" => err.kind_label()).increment(1);
        match err {
            SessionError::BadRequest(reason) => error!(reason = %reason, "rejected client request"),
            SessionError::ClientClosed => error!("client connection closed unexpectedly"),
            other => error!(error = %other, "session failed"),
        }
        if let Some(text) = client_text(err) {
            if self.client.send(error_reply(text)).await.is_err() {
                error!("could not send error reply to client");
            }
        }
    }
}
