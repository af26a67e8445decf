//! Session lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Session`](super::Session).
///
/// ```text
/// Connecting ──open──► Authenticating ──login ok──► Open
///     │                     │                        │
///     └──fail──► ReconnectScheduled ◄──fail / close──┘
///                     │
///                     └──delay──► Connecting
///
/// close() from any state ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Opening the transport.
    Connecting,
    /// Transport open, LOGIN in flight.
    Authenticating,
    /// Logged in; calls are accepted.
    Open,
    /// Waiting before the next connection attempt.
    ReconnectScheduled,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Returns the kebab-case name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Open => "open",
            Self::ReconnectScheduled => "reconnect-scheduled",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` if calls are accepted in this state.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
