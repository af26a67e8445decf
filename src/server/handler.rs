//! Application hook for the server.
//!
//! The server owns the socket, the frame codec, the authentication gate and
//! validation. What a command actually does is up to the embedding
//! application, which implements [`RequestHandler`].
//!
//! # Example
//!
//! ```ignore
//! struct Downloads { /* ... */ }
//!
//! #[async_trait]
//! impl RequestHandler for Downloads {
//!     async fn authenticate(&self, login: &LoginRequest) -> Result<(), ServerError> {
//!         if login.password == "secret" {
//!             Ok(())
//!         } else {
//!             Err(ServerError::incorrect_credentials())
//!         }
//!     }
//!
//!     async fn handle(&self, ctx: &RequestContext, request: Request) -> Result<Value, ServerError> {
//!         match request {
//!             Request::DeleteFile(req) => { /* ... */ Ok(Value::Null) }
//!             _ => Err(ServerError::unknown("Not supported.")),
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::identifiers::ConnectionId;
use crate::protocol::{LoginRequest, Request, ServerError};

/// Identity of the connection a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Server-assigned connection id.
    pub connection_id: ConnectionId,
    /// Lowercased username the connection logged in as.
    pub username: String,
}

/// Executes commands on behalf of authenticated clients.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Checks LOGIN credentials.
    ///
    /// The username has already been validated. Return
    /// `INCORRECT_CREDENTIALS` to reject.
    async fn authenticate(&self, login: &LoginRequest) -> Result<(), ServerError>;

    /// Executes one validated request.
    ///
    /// The returned value becomes the response body (`null` for an empty
    /// payload). Errors are sent to the client as ERROR frames.
    async fn handle(&self, ctx: &RequestContext, request: Request) -> Result<Value, ServerError>;
}
