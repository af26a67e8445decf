//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing request ids with raw integers or with
//! server connection ids.
//!
//! | Type | Wraps | Meaning |
//! |------|-------|---------|
//! | [`RequestId`] | `u32` | Frame correlation id, `0` = server event |
//! | [`ConnectionId`] | `Uuid` | One accepted server connection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// RequestId
// ============================================================================

/// Correlation id carried in the first four bytes of every frame.
///
/// Id `0` is reserved for events pushed by the server; client requests use
/// ids starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RequestId(u32);

impl RequestId {
    /// Id used by server-initiated events.
    pub const EVENT: Self = Self(0);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns `true` for the reserved event id.
    #[inline]
    #[must_use]
    pub const fn is_event(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RequestId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestIdGenerator
// ============================================================================

/// Per-connection request id counter.
///
/// Issues 1, 2, 3, ... and never wraps back to the event id. A fresh
/// generator is created for every transport connection.
#[derive(Debug, Clone)]
pub struct RequestIdGenerator {
    next: Option<u32>,
}

impl RequestIdGenerator {
    /// Creates a generator whose first id is 1.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { next: Some(1) }
    }

    /// Creates a generator starting at an arbitrary id.
    #[inline]
    #[must_use]
    pub const fn starting_at(first: u32) -> Self {
        Self { next: Some(first) }
    }

    /// Issues the next id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestIdExhaustion`] once `u32::MAX` has been issued.
    pub fn next_id(&mut self) -> Result<RequestId> {
        let id = self.next.ok_or(Error::RequestIdExhaustion)?;
        self.next = id.checked_add(1);
        Ok(RequestId(id))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifies one accepted connection on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a random connection id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
