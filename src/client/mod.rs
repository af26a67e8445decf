//! Client session.
//!
//! # Architecture
//!
//! ```text
//! Session (handle, Clone)
//!    │  mpsc: Send / Shutdown
//!    ▼
//! EventLoop (one task)
//!    ├── Connector ──► Link (sink + stream)
//!    ├── CorrelationTable (pending calls, retry timers)
//!    └── RequestIdGenerator (reset per link)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`ClientConfig`] builder |
//! | `policy` | [`RetryPolicy`], [`ReconnectPolicy`] |
//! | `session` | [`Session`] handle |
//! | `commands` | Typed request helpers on [`Session`] |
//! | `handlers` | Lifecycle callbacks |
//! | `state` | [`SessionState`] |

// ============================================================================
// Submodules
// ============================================================================

mod commands;
mod correlation;
mod event_loop;

/// Client configuration.
pub mod config;

/// Lifecycle and event callbacks.
pub mod handlers;

/// Retry and reconnect policies.
pub mod policy;

/// Session handle.
pub mod session;

/// Session lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ClientConfig, ClientConfigBuilder, Credentials};
pub use handlers::{EventHandler, SessionHandlers};
pub use policy::{ReconnectPolicy, RetryPolicy};
pub use session::Session;
pub use state::SessionState;
