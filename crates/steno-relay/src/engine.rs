//! TCP connection to the recognition engine.

use std::io;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::SessionError;

/// An established engine connection, split so the two relays can use it
/// concurrently.
#[derive(Debug)]
pub struct EngineConnection {
    /// Buffered read half; engine replies are newline-delimited.
    pub(crate) reader: BufReader<OwnedReadHalf>,
    /// Write half; carries the options line, audio, and end-of-file marker.
    pub(crate) writer: OwnedWriteHalf,
}

impl EngineConnection {
    /// Connect to the engine, bounded by the configured connect timeout.
    pub async fn connect(config: &EngineConfig) -> Result<Self, SessionError> {
        let addr = config.addr();
        let connect = TcpStream::connect((config.host.as_str(), config.port));
        let stream = timeout(config.connect_timeout(), connect)
            .await
            .map_err(|_| SessionError::EngineUnavailable {
                addr: addr.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| SessionError::EngineUnavailable {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to engine");
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Close both directions of the connection.
    ///
    /// Shutdown errors are ignored; the engine may already be gone.
    pub async fn close(self) {
        let mut writer = self.writer;
        let _ = writer.shutdown().await;
    }
}

/// Probe the engine address once, bounded by the connect timeout.
pub async fn probe(config: &EngineConfig) -> io::Result<()> {
    let connect = TcpStream::connect((config.host.as_str(), config.port));
    let stream = timeout(config.connect_timeout(), connect)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    drop(stream);
    Ok(())
}

/// Wait until the engine accepts connections, retrying at the configured
/// interval. Used at server startup so the gateway does not come up ahead
/// of the engine it fronts.
pub async fn wait_until_ready(config: &EngineConfig) {
    let addr = config.addr();
    let mut attempts: u64 = 0;
    loop {
        match probe(config).await {
            Ok(()) => {
                info!(%addr, "engine is reachable");
                return;
            }
            Err(error) => {
                attempts += 1;
                if attempts == 1 {
                    warn!(%addr, %error, "engine not reachable yet; waiting");
                } else {
                    debug!(%addr, attempts, "engine still not reachable");
                }
            }
        }
        sleep(config.retry_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_config() -> (TcpListener, EngineConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = EngineConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            connect_timeout_secs: 2,
            retry_interval_secs: 1,
        };
        (listener, config)
    }

    #[tokio::test]
    async fn connects_to_listening_engine() {
        let (listener, config) = local_config().await;
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let conn = EngineConnection::connect(&config).await.unwrap();
        let _ = accept.await.unwrap();
        conn.close().await;
    }

    #[tokio::test]
    async fn refused_connection_is_engine_unavailable() {
        let (listener, config) = local_config().await;
        drop(listener);

        let err = EngineConnection::connect(&config).await.unwrap_err();
        let SessionError::EngineUnavailable { addr, .. } = err else {
            panic!("expected EngineUnavailable");
        };
        assert_eq!(addr, config.addr());
    }

    #[tokio::test]
    async fn probe_sees_listening_engine() {
        let (_listener, config) = local_config().await;
        probe(&config).await.unwrap();
    }

    #[tokio::test]
    async fn probe_reports_down_engine() {
        let (listener, config) = local_config().await;
        drop(listener);
        assert!(probe(&config).await.is_err());
    }

    #[tokio::test]
    async fn wait_until_ready_returns_once_listening() {
        let (_listener, config) = local_config().await;
        wait_until_ready(&config).await;
    }
}
