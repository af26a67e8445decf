//! Server configuration.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default WebSocket upgrade path.
pub const DEFAULT_PATH: &str = "/websocket";

/// Largest accepted WebSocket message and frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Answered request ids remembered per connection for replay.
pub const DEFAULT_REPLAY_CAPACITY: usize = 64;

// ============================================================================
// ServerConfig
// ============================================================================

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) path: String,
    pub(crate) max_message_size: usize,
    pub(crate) replay_capacity: usize,
}

impl ServerConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Address the listener binds to.
    #[inline]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// WebSocket upgrade path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// WebSocket limits applied to every connection.
    pub(crate) fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            path: DEFAULT_PATH.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
        }
    }
}

// ============================================================================
// ServerConfigBuilder
// ============================================================================

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a builder with the defaults: `127.0.0.1:8080`, `/websocket`,
    /// 64 KiB messages.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listening address. Port 0 picks a free port.
    #[inline]
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Sets the listening IP and port.
    #[inline]
    #[must_use]
    pub fn ip_port(mut self, ip: IpAddr, port: u16) -> Self {
        self.config.bind_addr = SocketAddr::new(ip, port);
        self
    }

    /// Sets the WebSocket upgrade path. Requests to other paths get 404.
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Sets the largest accepted message size in bytes.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    /// Sets how many answered request ids each connection remembers.
    #[inline]
    #[must_use]
    pub fn replay_capacity(mut self, capacity: usize) -> Self {
        self.config.replay_capacity = capacity;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path does not start with `/` or the
    /// message size cannot hold a frame header.
    pub fn build(self) -> Result<ServerConfig> {
        if !self.config.path.starts_with('/') {
            return Err(Error::config(format!(
                "WebSocket path must start with '/', got '{}'.",
                self.config.path
            )));
        }

        if self.config.max_message_size < crate::protocol::HEADER_SIZE {
            return Err(Error::config(format!(
                "max_message_size must be at least {} bytes.",
                crate::protocol::HEADER_SIZE
            )));
        }

        Ok(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================
