//! In-process transport.
//!
//! [`MemoryConnector`] hands each opened link's far end to a
//! [`MemoryListener`] as a [`MemoryPeer`]. Tests drive the peer as a scripted
//! server; embedders can use it to run client and server in one process.
//!
//! # Example
//!
//! ```ignore
//! let (connector, mut listener) = MemoryConnector::new();
//! let session = Session::connect_with(config, connector, SessionHandlers::new())?;
//!
//! let mut peer = listener.accept().await.unwrap();
//! let login = peer.recv_frame().await?;
//! peer.send_frame(&Frame::new(login.request_id, login.command, Vec::new()))?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Frame;

use super::{Connector, Link};

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector producing in-process links.
///
/// Cloning shares the same listener.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    /// Delivers the far end of each new link.
    peer_tx: mpsc::UnboundedSender<MemoryPeer>,
    /// Number of upcoming `open` calls to fail.
    refusals: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Creates a connector and the listener receiving its peers.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let connector = Self {
            peer_tx,
            refusals: Arc::new(AtomicUsize::new(0)),
        };
        (connector, MemoryListener { peer_rx })
    }

    /// Makes the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    fn take_refusal(&self) -> bool {
        self.refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        if self.take_refusal() {
            return Err(Error::connection(format!("connection to {url} refused")));
        }

        let (client_tx, peer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (peer_tx, client_rx) = mpsc::unbounded_channel::<Result<Vec<u8>>>();

        let peer = MemoryPeer {
            url: url.clone(),
            outbound: peer_tx,
            inbound: peer_rx,
        };
        self.peer_tx
            .send(peer)
            .map_err(|_| Error::connection(format!("no listener for {url}")))?;

        debug!(%url, "In-memory link opened");

        let sink = sink::unfold(client_tx, |tx, bytes: Vec<u8>| async move {
            tx.send(bytes).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });

        let stream = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(Link::new(Box::pin(sink), Box::pin(stream)))
    }
}

// ============================================================================
// MemoryListener
// ============================================================================

/// Receives the far end of every link a [`MemoryConnector`] opens.
#[derive(Debug)]
pub struct MemoryListener {
    peer_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Waits for the next connection.
    ///
    /// Returns `None` once every connector clone is dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peer_rx.recv().await
    }

    /// Returns an already opened connection without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peer_rx.try_recv().ok()
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Far end of an in-memory link.
///
/// Dropping the peer closes the link.
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    outbound: mpsc::UnboundedSender<Result<Vec<u8>>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// Returns the URL the client opened.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends one message to the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.outbound
            .send(Ok(bytes))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Encodes and sends one frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.send(frame.encode())
    }

    /// Receives the next message from the client.
    ///
    /// Returns `None` once the client closed the link.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Receives and decodes the next frame from the client.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the client closed the link
    /// - [`Error::MalformedFrame`] if the message is shorter than a header
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        let bytes = self.recv().await.ok_or(Error::ConnectionClosed)?;
        Frame::decode(&bytes)
    }

    /// Returns `true` if a message from the client is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.inbound.is_empty()
    }

    /// Turns the far end into a [`Link`], e.g. to serve it with
    /// [`Server::serve`](crate::server::Server::serve).
    #[must_use]
    pub fn into_link(self) -> Link {
        let Self {
            outbound, inbound, ..
        } = self;

        let sink = sink::unfold(outbound, |tx, bytes: Vec<u8>| async move {
            tx.send(Ok(bytes)).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });

        let stream = stream::unfold(inbound, |mut rx| async move {
            rx.recv().await.map(|bytes| (Ok(bytes), rx))
        });

        Link::new(Box::pin(sink), Box::pin(stream))
    }

    /// Delivers a transport error to the client, then closes the link.
    pub fn fail(self, error: Error) {
        let _ = self.outbound.send(Err(error));
    }

    /// Closes the link.
    pub fn close(self) {
        drop(self);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};

    use crate::identifiers::RequestId;
    use crate::protocol::CommandCode;

    fn url() -> Url {
        Url::parse("ws://memory/websocket").unwrap()
    }

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut link = connector.open(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();
        assert_eq!(peer.url().path(), "/websocket");

        link.sink.send(vec![1, 2, 3]).await.unwrap();
        assert_eq!(peer.recv().await, Some(vec![1, 2, 3]));

        peer.send(vec![4, 5]).unwrap();
        assert_eq!(link.stream.next().await.unwrap().unwrap(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_peer_drop_ends_stream() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut link = connector.open(&url()).await.unwrap();
        listener.accept().await.unwrap().close();

        assert!(link.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_link_drop_closes_peer() {
        let (connector, mut listener) = MemoryConnector::new();
        let link = connector.open(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        drop(link);
        assert!(peer.recv().await.is_none());
        assert!(matches!(peer.recv_frame().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_fail_delivers_error() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut link = connector.open(&url()).await.unwrap();
        listener
            .accept()
            .await
            .unwrap()
            .fail(Error::connection("reset"));

        assert!(matches!(
            link.stream.next().await,
            Some(Err(Error::Connection { .. }))
        ));
        assert!(link.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_refuse_next() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.refuse_next(2);

        assert!(connector.open(&url()).await.is_err());
        assert!(connector.open(&url()).await.is_err());
        assert!(connector.open(&url()).await.is_ok());
        assert!(listener.try_accept().is_some());
        assert!(listener.try_accept().is_none());
    }

    #[tokio::test]
    async fn test_peer_into_link() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut client = connector.open(&url()).await.unwrap();
        let mut server = listener.accept().await.unwrap().into_link();

        client.sink.send(vec![1]).await.unwrap();
        assert_eq!(server.stream.next().await.unwrap().unwrap(), vec![1]);

        server.sink.send(vec![2]).await.unwrap();
        assert_eq!(client.stream.next().await.unwrap().unwrap(), vec![2]);

        drop(server);
        assert!(client.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_frames() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut link = connector.open(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        let frame = Frame::new(RequestId::new(3), CommandCode::DeleteFile, Vec::new());
        link.sink.send(frame.encode()).await.unwrap();
        assert_eq!(peer.recv_frame().await.unwrap(), frame);
    }
}
