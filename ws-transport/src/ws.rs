//! tokio-tungstenite backed implementation of [`Connector`] and [`Transport`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, TransportError};
use crate::{CloseReason, Connector, Inbound, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    endpoint: String,
}

impl WsConnector {
    /// Create a connector for a `ws://` or `wss://` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if the URL does not parse or
    /// uses another scheme.
    pub fn new(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidUrl(format!("{endpoint}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "{endpoint}: unsupported scheme '{other}'"
                )))
            }
        }

        Ok(Self {
            endpoint: url.to_string(),
            url,
        })
    }

    /// The parsed endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        debug!(endpoint = %self.endpoint, "Opening WebSocket connection");

        let (stream, response) = connect_async(self.url.as_str()).await.map_err(|e| match e {
            tokio_tungstenite::tungstenite::Error::Http(response) => {
                TransportError::Handshake(format!("HTTP {}", response.status()))
            }
            other => TransportError::Handshake(other.to_string()),
        })?;

        debug!(
            endpoint = %self.endpoint,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        Ok(Box::new(WsTransport { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// An established WebSocket connection.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Inbound> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Inbound::Text(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Inbound::Text(text)),
                    Err(_) => {
                        warn!(len = data.len(), "Dropping non-UTF-8 binary frame");
                    }
                },
                // tungstenite queues the pong reply itself.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Pong(_))) => return Ok(Inbound::Pong),
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(f) => CloseReason::with_code(f.reason.to_string(), f.code.into()),
                        None => CloseReason::new("Server closed connection"),
                    };
                    return Ok(Inbound::Closed(reason));
                }
                Some(Err(e)) => return Err(TransportError::Network(e.to_string())),
                None => return Err(TransportError::StreamEnded),
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.stream
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
