//! WebSocket push channel over tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use infrawatch_core::{ClientConfig, TransportError};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};

use crate::connection::{Connector, PushChannel};

/// Opens WebSocket channels to a fixed URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for `url` (`ws://` or `wss://`).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Connector for the push endpoint derived from `config`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] if the REST base path is not
    /// an absolute HTTP(S) URL.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(config.ws_url()?))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn PushChannel>, TransportError> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(map_ws_error)?;
        tracing::debug!(url = %self.url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsChannel { stream }))
    }
}

struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(map_ws_error(e))),
            };
            match message {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::debug!("dropping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    tracing::debug!(?frame, "close frame received");
                    return None;
                }
                // Control frames are answered by tungstenite.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!(error = %e, "websocket close failed");
        }
    }
}

fn map_ws_error(error: WsError) -> TransportError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        WsError::Io(e) => TransportError::Network(e.to_string()),
        WsError::Http(response) => {
            TransportError::Protocol(format!("handshake rejected with HTTP {}", response.status()))
        }
        other => TransportError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_url_from_config() {
        let config = ClientConfig::default().with_api_url("https://watch.example.com/api/v1");
        assert_eq!(
            WsConnector::from_config(&config).unwrap().url(),
            "wss://watch.example.com/ws"
        );

        let config = ClientConfig::default().with_api_url("watch.example.com/api/v1");
        assert!(matches!(
            WsConnector::from_config(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(map_ws_error(WsError::ConnectionClosed), TransportError::Closed);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(map_ws_error(WsError::Io(io)), TransportError::Network(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let connector = WsConnector::new("ws://127.0.0.1:1/ws");
        let result = connector.connect().await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
