//! Listening socket and connection registry.
//!
//! The [`Server`] binds a TCP listener, upgrades connections on the
//! configured path and hands each WebSocket to its own connection task.
//!
//! # Example
//!
//! ```ignore
//! let config = ServerConfig::builder().ip_port(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).build()?;
//! let server = Server::bind(config, Arc::new(Downloads::default())).await?;
//! println!("listening on {}", server.ws_url());
//!
//! server.publish_report("admin", &report)?;
//! server.shutdown().await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HttpRequest, Response as HttpResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{FilesHistoryReport, ServerEvent};
use crate::transport::Link;
use crate::transport::websocket::websocket_link;

use super::config::ServerConfig;
use super::connection::{ServerContext, serve_connection};
use super::handler::RequestHandler;

// ============================================================================
// Constants
// ============================================================================

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// Server
// ============================================================================

/// A running protocol server.
///
/// Dropping the server without calling [`shutdown`](Self::shutdown) also
/// stops the accept loop and every connection.
pub struct Server {
    local_addr: SocketAddr,
    config: ServerConfig,
    context: Arc<ServerContext>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Binds the listener and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let context = Arc::new(ServerContext::new(handler, config.replay_capacity));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&context),
            config.clone(),
            shutdown_rx,
        ));

        info!(%local_addr, path = %config.path, "Server listening");

        Ok(Self {
            local_addr,
            config,
            context,
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Address the listener is bound to.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// WebSocket URL clients connect to.
    ///
    /// Format: `ws://{ip}:{port}{path}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.config.path)
    }

    /// Serves an already established link, such as an in-memory one.
    pub fn serve(&self, link: Link) -> JoinHandle<()> {
        tokio::spawn(serve_connection(
            link,
            Arc::clone(&self.context),
            self.shutdown_tx.subscribe(),
        ))
    }

    /// Pushes a `FILES_HISTORY_REPORT` to every subscribed connection of
    /// `username`.
    ///
    /// Returns the number of connections the event was queued for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the report cannot be serialized.
    pub fn publish_report(&self, username: &str, report: &FilesHistoryReport) -> Result<usize> {
        let frame = ServerEvent::files_history_report(report)?;
        let username = username.to_lowercase();
        let delivered = self
            .context
            .subscriptions
            .publish(&username, &frame.encode());

        debug!(username = %username, files = report.files.len(), delivered, "Report pushed");
        Ok(delivered)
    }

    /// Number of open connections, authenticated or not.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.context.connections.read().len()
    }

    /// Number of connections subscribed to reports.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.context.subscriptions.len()
    }

    /// Stops accepting and closes every connection.
    pub async fn shutdown(&self) {
        info!(local_addr = %self.local_addr, "Server shutting down");
        self.shutdown_tx.send_replace(true);

        let accept_task = self.accept_task.lock().take();
        if let Some(task) = accept_task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Accept loop ended abnormally");
        }

        info!("Server shutdown complete");
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("path", &self.config.path)
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Accept Loop
// ============================================================================

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    config: ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Accept loop started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let context = Arc::clone(&context);
                    let config = config.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_tcp(stream, addr, context, config, shutdown).await {
                            warn!(error = %e, %addr, "Connection handling failed");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }

    debug!("Accept loop terminated");
}

/// Upgrades one TCP connection and serves it.
async fn handle_tcp(
    stream: TcpStream,
    addr: SocketAddr,
    context: Arc<ServerContext>,
    config: ServerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    debug!(%addr, "New TCP connection");

    let expected_path = config.path.clone();
    let check_path = move |request: &HttpRequest,
                           response: HttpResponse|
          -> StdResult<HttpResponse, ErrorResponse> {
        if request.uri().path() == expected_path {
            return Ok(response);
        }

        debug!(%addr, path = request.uri().path(), "Upgrade refused for unknown path");
        let mut refusal = ErrorResponse::new(Some("Not Found".to_string()));
        *refusal.status_mut() = StatusCode::NOT_FOUND;
        Err(refusal)
    };

    let ws_stream = accept_hdr_async_with_config(stream, check_path, Some(config.websocket_config()))
        .await
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    info!(%addr, "WebSocket connection established");
    serve_connection(websocket_link(ws_stream), context, shutdown).await;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
