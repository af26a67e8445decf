//! Remote Downloader RPC - binary WebSocket protocol for a remote download manager.
//!
//! This library provides both ends of the protocol: a client [`Session`]
//! that talks to a download server, and a [`Server`] that accepts sessions
//! and forwards their requests to an application handler.
//!
//! # Architecture
//!
//! Every WebSocket binary message carries exactly one frame:
//!
//! ```text
//! ┌──────────────┬──────────────┬────────────────────────┐
//! │ request id   │ command      │ payload                │
//! │ u32 BE       │ u16 BE       │ UTF-8 JSON (or empty)  │
//! └──────────────┴──────────────┴────────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - Request id `0` marks a server-pushed event, any other id correlates a
//!   response to its request
//! - LOGIN must succeed before any other command is accepted
//! - Unanswered requests are resent under the same id; the server replays
//!   answers instead of running a request twice
//! - A dropped connection rejects everything pending, then reconnects with
//!   backoff
//!
//! # Quick Start
//!
//! ```no_run
//! use remote_downloader_rpc::{ClientConfig, Result, Session, SessionHandlers};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .address("localhost:8080")
//!         .credentials("admin", "secret")
//!         .subscribe_to_reports(true)
//!         .build()?;
//!
//!     let session = Session::connect(config, SessionHandlers::new());
//!     session.wait_until_open().await?;
//!
//!     let record = session
//!         .download_url("https://example.com/file.iso", "file.iso", None)
//!         .await?;
//!     println!("Started download {}", record.id);
//!
//!     session.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Session`], configuration and policies |
//! | [`server`] | [`Server`] and the [`RequestHandler`] hook |
//! | [`protocol`] | Frame codec, command codes and JSON bodies |
//! | [`transport`] | WebSocket and in-memory links |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request and connection ids |

// ============================================================================
// Modules
// ============================================================================

/// Client session.
///
/// - [`Session`] - Cloneable handle to one logical connection
/// - [`ClientConfig`] - Address, credentials and policies
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Binary protocol message types.
pub mod protocol;

/// Protocol server.
pub mod server;

/// Message transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ClientConfig, ClientConfigBuilder, Credentials, ReconnectPolicy, RetryPolicy, Session,
    SessionHandlers, SessionState,
};

// Server types
pub use server::{RequestContext, RequestHandler, Server, ServerConfig, ServerConfigBuilder};

// Protocol types
pub use protocol::{
    CommandCode, ErrorKind, FileRecord, FileStatus, FilesHistoryReport, Frame, ListFoldersResponse,
    Page, ParsedEvent, Request, ServerError, ServerEvent,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, RequestId};
