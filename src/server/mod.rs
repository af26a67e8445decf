//! Protocol server.
//!
//! Accepts WebSocket connections, enforces the login gate, validates request
//! bodies and forwards them to an application [`RequestHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   TCP    ┌─────────────┐  spawn   ┌──────────────────┐
//! │   Client   │ ───────► │ accept loop │ ───────► │ connection task  │
//! └────────────┘          └─────────────┘          │ login gate       │
//!                                                  │ replay cache     │
//!                                                  │ outbound writer  │
//!                                                  └────────┬─────────┘
//!                                                           │ spawn per request
//!                                                           ▼
//!                                                  ┌──────────────────┐
//!                                                  │ RequestHandler   │
//!                                                  └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Bind address, path and limits |
//! | `handler` | Application hook trait |
//! | `listener` | [`Server`] and the accept loop |
//! | `connection` | Per-connection state machine |
//! | `replay` | Answered-request cache for resends |
//! | `subscriptions` | Report push registry |

// ============================================================================
// Submodules
// ============================================================================

/// Server configuration.
pub mod config;

/// Application hook trait.
pub mod handler;

mod connection;
mod listener;
mod replay;
mod subscriptions;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ServerConfig, ServerConfigBuilder};
pub use handler::{RequestContext, RequestHandler};
pub use listener::Server;
