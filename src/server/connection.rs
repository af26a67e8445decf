//! Per-connection protocol handling.
//!
//! Each accepted link runs one task with a small state machine:
//!
//! | State | LOGIN | Other commands |
//! |-------|-------|----------------|
//! | Unauthenticated | validate, `authenticate`, reply | `NOT_AUTHENTICATED` |
//! | Authenticated | `ALREADY_AUTHENTICATED` | validate, handle on a spawned task |
//!
//! Login is handled inline because it changes the connection's state.
//! Authenticated requests run on their own tasks and report back through a
//! channel, so a slow handler does not stall reads. Every outbound frame
//! (inline replies, handler results, pushed events) goes through the
//! connection task, which is the only writer of the sink.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::identifiers::{ConnectionId, RequestId};
use crate::protocol::request::parse_body;
use crate::protocol::{
    CommandCode, ErrorKind, Frame, LoginRequest, Request, ServerError, Validate, encode,
    json_payload,
};
use crate::transport::Link;

use super::handler::{RequestContext, RequestHandler};
use super::replay::{Replay, ReplayCache};
use super::subscriptions::{Outbound, SubscriptionRegistry};

// ============================================================================
// ServerContext
// ============================================================================

/// State shared by the listener and every connection.
pub(crate) struct ServerContext {
    pub handler: Arc<dyn RequestHandler>,
    pub subscriptions: SubscriptionRegistry,
    /// Live connections and the user each one logged in as.
    pub connections: RwLock<FxHashMap<ConnectionId, Option<String>>>,
    pub replay_capacity: usize,
}

impl ServerContext {
    pub fn new(handler: Arc<dyn RequestHandler>, replay_capacity: usize) -> Self {
        Self {
            handler,
            subscriptions: SubscriptionRegistry::default(),
            connections: RwLock::new(FxHashMap::default()),
            replay_capacity,
        }
    }
}

// ============================================================================
// Connection Loop
// ============================================================================

/// Serves one link until the client disconnects or the server shuts down.
pub(crate) async fn serve_connection(
    link: Link,
    context: Arc<ServerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Link {
        mut sink,
        mut stream,
    } = link;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let mut connection = Connection {
        id: ConnectionId::generate(),
        username: None,
        replay: ReplayCache::new(context.replay_capacity),
        outbound: outbound_tx,
        done_tx,
        context: Arc::clone(&context),
    };
    let id = connection.id;
    context.connections.write().insert(id, None);
    debug!(connection_id = %id, "Connection started");

    if !*shutdown.borrow_and_update() {
        loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(bytes)) => connection.on_message(&bytes).await,
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Transport error");
                        break;
                    }
                    None => {
                        debug!(connection_id = %id, "Client disconnected");
                        break;
                    }
                },

                Some(bytes) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(bytes).await {
                        debug!(connection_id = %id, error = %e, "Write failed");
                        break;
                    }
                }

                Some((request_id, bytes)) = done_rx.recv() => {
                    connection.replay.complete(request_id, &bytes);
                    if let Err(e) = sink.send(bytes).await {
                        debug!(connection_id = %id, error = %e, "Write failed");
                        break;
                    }
                }

                _ = shutdown.changed() => {
                    debug!(connection_id = %id, "Server shutting down, closing connection");
                    let _ = sink.close().await;
                    break;
                }
            }
        }
    }

    context.subscriptions.unsubscribe(id);
    context.connections.write().remove(&id);
    debug!(connection_id = %id, "Connection terminated");
}

// ============================================================================
// Connection
// ============================================================================

struct Connection {
    id: ConnectionId,
    /// Set once LOGIN succeeds.
    username: Option<String>,
    replay: ReplayCache,
    outbound: Outbound,
    done_tx: mpsc::UnboundedSender<(RequestId, Vec<u8>)>,
    context: Arc<ServerContext>,
}

impl Connection {
    async fn on_message(&mut self, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        if frame.is_event() {
            warn!(
                connection_id = %self.id,
                command = frame.command,
                "Dropping client frame with request id 0"
            );
            return;
        }

        trace!(
            connection_id = %self.id,
            request_id = %frame.request_id,
            command = frame.command,
            "Request received"
        );

        match self.username.clone() {
            None => self.on_unauthenticated(&frame).await,
            Some(username) => self.on_authenticated(&frame, username),
        }
    }

    // ========================================================================
    // Login Gate
    // ========================================================================

    async fn on_unauthenticated(&mut self, frame: &Frame) {
        if frame.command_code() != Some(CommandCode::Login) {
            debug!(connection_id = %self.id, command = frame.command, "Request before login");
            self.send(error_bytes(
                frame.request_id,
                &ServerError::new(ErrorKind::NotAuthenticated, "You have to authenticate first."),
            ));
            return;
        }

        let login = match parse_login(frame) {
            Ok(login) => login,
            Err(e) => {
                self.send(error_bytes(frame.request_id, &e));
                return;
            }
        };

        if let Err(e) = self.context.handler.authenticate(&login).await {
            info!(connection_id = %self.id, username = %login.username, "Login rejected");
            self.send(error_bytes(frame.request_id, &e));
            return;
        }

        let username = login.username.to_lowercase();
        info!(
            connection_id = %self.id,
            username = %username,
            subscribe = login.subscribe_on_downloading_files_report,
            "Client authenticated"
        );

        if login.subscribe_on_downloading_files_report {
            self.context
                .subscriptions
                .subscribe(self.id, &username, self.outbound.clone());
        }
        self.context
            .connections
            .write()
            .insert(self.id, Some(username.clone()));
        self.username = Some(username);

        self.send(encode(frame.request_id, frame.command, &[]));
    }

    // ========================================================================
    // Requests
    // ========================================================================

    fn on_authenticated(&mut self, frame: &Frame, username: String) {
        let request_id = frame.request_id;

        match self.replay.check(request_id) {
            Replay::Fresh => {}
            Replay::InFlight => {
                debug!(connection_id = %self.id, %request_id, "Ignoring resend of in-flight request");
                return;
            }
            Replay::Answered(bytes) => {
                debug!(connection_id = %self.id, %request_id, "Replaying answered request");
                self.send(bytes);
                return;
            }
        }

        let request = if frame.command_code() == Some(CommandCode::Login) {
            Err(ServerError::new(
                ErrorKind::AlreadyAuthenticated,
                "Already authenticated.",
            ))
        } else {
            parse_request(frame)
        };

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                debug!(connection_id = %self.id, %request_id, error = %e, "Request refused");
                let bytes = error_bytes(request_id, &e);
                self.replay.complete(request_id, &bytes);
                self.send(bytes);
                return;
            }
        };

        self.replay.start(request_id);

        let handler = Arc::clone(&self.context.handler);
        let done_tx = self.done_tx.clone();
        let context = RequestContext {
            connection_id: self.id,
            username,
        };
        let command = frame.command;

        tokio::spawn(async move {
            let bytes = match handler.handle(&context, request).await {
                Ok(value) => response_bytes(request_id, command, &value),
                Err(e) => {
                    debug!(%request_id, error = %e, "Handler returned error");
                    error_bytes(request_id, &e)
                }
            };
            let _ = done_tx.send((request_id, bytes));
        });
    }

    fn send(&self, bytes: Vec<u8>) {
        if self.outbound.send(bytes).is_err() {
            trace!(connection_id = %self.id, "Outbound channel closed");
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_login(frame: &Frame) -> Result<LoginRequest, ServerError> {
    let body = frame
        .body()
        .map_err(|e| ServerError::validation(e.to_string()))?;
    let login: LoginRequest = parse_body(body)?;
    login.validate()?;
    Ok(login)
}

fn parse_request(frame: &Frame) -> Result<Request, ServerError> {
    let handled = CommandCode::from_code(frame.command)
        .is_some_and(|command| command.is_client_request() && command != CommandCode::Login);
    if !handled {
        return Err(ServerError::new(ErrorKind::UnknownCommand, "Unknown command."));
    }

    let body = frame
        .body()
        .map_err(|e| ServerError::validation(e.to_string()))?;
    Request::parse(frame.command, body)
}

fn response_bytes(request_id: RequestId, command: u16, value: &Value) -> Vec<u8> {
    match json_payload(value) {
        Ok(payload) => encode(request_id, command, &payload),
        Err(e) => {
            warn!(%request_id, error = %e, "Could not serialize response");
            error_bytes(request_id, &ServerError::unknown("Unknown error."))
        }
    }
}

fn error_bytes(request_id: RequestId, error: &ServerError) -> Vec<u8> {
    let payload = serde_json::to_vec(error).unwrap_or_default();
    encode(request_id, CommandCode::Error.code(), &payload)
}

// ============================================================================
// Tests
// ============================================================================
