//! WebSocket transport.
//!
//! Adapts a `tokio-tungstenite` stream to a [`Link`]. Only binary messages
//! carry frames; text messages are logged and skipped, ping/pong are handled
//! by tungstenite, and a close message ends the inbound stream.

// ============================================================================
// Imports
// ============================================================================

use std::future;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Link};

// ============================================================================
// Link Adapter
// ============================================================================

/// Splits a WebSocket stream into a frame [`Link`].
///
/// Used by both the client connector and the server listener.
pub(crate) fn websocket_link<S>(ws_stream: WebSocketStream<S>) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws_write, ws_read) = ws_stream.split();

    let sink = ws_write.with(|bytes: Vec<u8>| {
        future::ready(Ok::<_, Error>(Message::Binary(bytes.into())))
    });

    let stream = ws_read
        .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Binary(bytes)) => Some(Ok(bytes.to_vec())),
                Ok(Message::Text(text)) => {
                    warn!(len = text.len(), "Ignoring text message");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::from(e))),
            })
        });

    Link::new(Box::pin(sink), Box::pin(stream))
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens client links with `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector {
    config: Option<WebSocketConfig>,
}

impl WebSocketConnector {
    /// Creates a connector with tungstenite's default limits.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector with custom WebSocket limits.
    #[inline]
    #[must_use]
    pub fn with_config(config: WebSocketConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        let (ws_stream, response) =
            tokio_tungstenite::connect_async_with_config(url.as_str(), self.config, false)
                .await
                .map_err(|e| Error::connection(format!("WebSocket connect to {url} failed: {e}")))?;

        debug!(%url, status = %response.status(), "WebSocket connection established");

        Ok(websocket_link(ws_stream))
    }
}
