//! Message transport layer.
//!
//! The protocol core is written against a message-oriented, order-preserving
//! duplex connection: one `send` on one side is exactly one delivered message
//! on the other. WebSocket binary messages provide this for free; a raw byte
//! stream would need a length-prefix layer beneath the codec.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session        │         WebSocket            │  Server         │
//! │  (client loop)  │◄────────────────────────────►│  (per-conn loop)│
//! │  Link           │   ws://host:port/websocket   │  Link           │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! A [`Connector`] opens a [`Link`]: a sink of outbound frame bytes and a
//! stream of inbound frame bytes. The stream ending is the close signal; an
//! `Err` item is the error signal.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | `tokio-tungstenite` connector and link adapter |
//! | `memory` | In-process connector over channels |

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport over channels.
pub mod memory;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::WebSocketConnector;

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a link. Each item is one encoded frame.
pub type FrameSink = Pin<Box<dyn Sink<Vec<u8>, Error = Error> + Send>>;

/// Inbound half of a link. Each item is one received message.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

// ============================================================================
// Link
// ============================================================================

/// An open transport connection.
///
/// Dropping both halves closes the connection.
pub struct Link {
    /// Outbound messages.
    pub sink: FrameSink,
    /// Inbound messages.
    pub stream: FrameStream,
}

impl Link {
    /// Creates a link from its halves.
    #[inline]
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens transport connections for a client session.
///
/// A session calls [`Connector::open`] once per connection attempt and never
/// holds two links at a time.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new link to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the peer cannot be reached.
    async fn open(&self, url: &Url) -> Result<Link>;
}
