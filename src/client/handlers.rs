//! Lifecycle and event callbacks.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::protocol::ServerEvent;

/// Event handler callback type.
///
/// Called on the session task for each server event, in arrival order.
pub type EventHandler = Box<dyn Fn(ServerEvent) + Send + Sync>;

type Callback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Callbacks for session lifecycle changes.
///
/// - `on_open` fires after every successful login.
/// - `on_close` fires when an open connection ends, for whatever reason.
/// - `on_error` fires once per failed connection attempt, and when an open
///   connection fails.
///
/// Callbacks run on the session task and must not block.
#[derive(Clone, Default)]
pub struct SessionHandlers {
    on_open: Option<Callback>,
    on_close: Option<Callback>,
    on_error: Option<ErrorCallback>,
}

impl SessionHandlers {
    /// Creates an empty set of callbacks.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback fired after login succeeds.
    #[must_use]
    pub fn on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(callback));
        self
    }

    /// Sets the callback fired when an open connection ends.
    #[must_use]
    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    /// Sets the callback fired on connection and login failures.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub(crate) fn opened(&self) {
        if let Some(callback) = &self.on_open {
            callback();
        }
    }

    pub(crate) fn closed(&self) {
        if let Some(callback) = &self.on_close {
            callback();
        }
    }

    pub(crate) fn failed(&self, error: &Error) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

impl fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
