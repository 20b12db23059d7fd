//! Physical connections to the event stream server.
//!
//! A [`Connector`] produces one [`Connection`]: a pair of text-frame
//! channels. The hub only ever sees the channels, so routing and rejoin
//! logic run the same against a websocket or an in-memory pair.

use async_trait::async_trait;
use conclave_application::EventError;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

/// One established connection.
///
/// The connection is considered lost once `inbound` yields `None`.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl Connection {
    /// Create a connection plus the server-side ends of its channels.
    ///
    /// Returns `(connection, from_client, to_client)`.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
    ) {
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        (Self { outbound, inbound }, from_client, to_client)
    }
}

/// Opens connections to the event stream.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, EventError>;
}

/// Default limit on one websocket handshake (TCP, TLS and upgrade).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Websocket connector.
pub struct TungsteniteConnector {
    url: String,
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self) -> Result<Connection, EventError> {
        let handshake = tokio_tungstenite::connect_async(self.url.as_str());
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                EventError::Connect(format!(
                    "{}: timed out after {:?}",
                    self.url, self.connect_timeout
                ))
            })?
            .map_err(|e| EventError::Connect(format!("{}: {}", self.url, e)))?;
        debug!("Connected to event stream at {}", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (connection, mut from_client, to_client) = Connection::pair();

        // Writer: forward control frames until the hub drops its sender or
        // the socket refuses a write.
        tokio::spawn(async move {
            while let Some(text) = from_client.recv().await {
                trace!("Event stream send: {}", text);
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!("Event stream write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Reader: dropping `to_client` ends the hub's inbound channel, which
        // is how the hub learns the connection is gone.
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if to_client.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Event stream closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Event stream read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(connection)
    }
}
