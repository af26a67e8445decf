//! Session event loop.
//!
//! One tokio task per session owns the transport, the correlation table and
//! the request id counter. Everything that touches them runs as a branch of
//! a single `select!`:
//!
//! - Inbound frames from the transport (responses, events)
//! - Outbound calls from [`Session`](super::Session) handles
//! - The request retry timer
//! - The login deadline
//!
//! Inbound frames are therefore processed one at a time, in arrival order,
//! and timers never interleave with frame processing.

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestIdGenerator;
use crate::protocol::{CommandCode, ErrorKind, Frame, Response, ServerError, ServerEvent, encode};
use crate::transport::{Connector, FrameSink, Link};

use super::config::ClientConfig;
use super::correlation::{CorrelationTable, Responder};
use super::handlers::{EventHandler, SessionHandlers};
use super::state::SessionState;

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for a graceful transport close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the event loop.
pub(crate) enum SessionCommand {
    /// Send a request and report its result.
    Send {
        command: u16,
        payload: Vec<u8>,
        responder: Responder,
    },
    /// Stop the session.
    Shutdown,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of one connection attempt.
enum Opening {
    Opened(Link),
    Failed(Error),
    Shutdown,
}

/// Why a link ended.
#[derive(Debug)]
enum LinkEnd {
    /// `close()` was called or every handle dropped.
    Shutdown,
    /// The peer closed the transport.
    Closed,
    /// Transport or open failure.
    Failed(Error),
    /// LOGIN rejected or unanswered.
    LoginFailed(Error),
    /// Unrecoverable; the session stops.
    Fatal(Error),
}

/// A finished link and whether it reached [`SessionState::Open`].
struct LinkOutcome {
    end: LinkEnd,
    was_open: bool,
}

// ============================================================================
// EventLoop
// ============================================================================

pub(crate) struct EventLoop {
    pub config: ClientConfig,
    pub connector: Box<dyn Connector>,
    pub handlers: SessionHandlers,
    pub command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    pub state_tx: watch::Sender<SessionState>,
    pub closed: Arc<AtomicBool>,
    pub event_handler: Arc<Mutex<Option<EventHandler>>>,
    /// Reconnects since the last successful login.
    pub reconnect_attempt: u32,
}

impl EventLoop {
    /// Runs until the session is closed.
    pub async fn run(mut self) {
        let mut first_attempt = true;

        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            self.set_state(SessionState::Connecting);
            let outcome = match self.open_link().await {
                Opening::Opened(link) => self.run_link(link).await,
                Opening::Failed(e) => {
                    warn!(url = %self.config.url, error = %e, "Connection attempt failed");
                    LinkOutcome {
                        end: LinkEnd::Failed(e),
                        was_open: false,
                    }
                }
                Opening::Shutdown => break,
            };

            self.report(&outcome);

            match outcome.end {
                LinkEnd::Shutdown => break,
                LinkEnd::Fatal(e) => {
                    error!(error = %e, "Session stopped");
                    break;
                }
                LinkEnd::LoginFailed(_) if first_attempt && self.config.fail_fast_login => {
                    info!("First login failed, not reconnecting");
                    break;
                }
                _ => {}
            }
            first_attempt = false;

            if self.closed.load(Ordering::SeqCst) || !self.wait_reconnect().await {
                break;
            }
        }

        self.set_state(SessionState::Closed);
        self.reject_queued();
        debug!("Session event loop terminated");
    }

    // ========================================================================
    // Connecting
    // ========================================================================

    /// Opens a transport, rejecting calls until it is up.
    async fn open_link(&mut self) -> Opening {
        let connect_timeout = self.config.connect_timeout;
        let url = self.config.url.clone();
        let connect = timeout(connect_timeout, self.connector.open(&url));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(Ok(link)) => {
                            debug!(%url, "Transport opened");
                            Opening::Opened(link)
                        }
                        Ok(Err(e)) => Opening::Failed(e),
                        Err(_) => Opening::Failed(Error::timeout(
                            format!("connect to {url}"),
                            connect_timeout.as_millis() as u64,
                        )),
                    };
                }

                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Send { responder, .. }) => {
                        let _ = responder.send(Err(Error::not_connected(SessionState::Connecting)));
                    }
                    Some(SessionCommand::Shutdown) | None => return Opening::Shutdown,
                },
            }
        }
    }

    /// Waits out the reconnect delay. Returns `false` on shutdown.
    async fn wait_reconnect(&mut self) -> bool {
        self.set_state(SessionState::ReconnectScheduled);

        let delay = self.config.reconnect.delay_for(self.reconnect_attempt);
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.reconnect_attempt,
            "Reconnect scheduled"
        );

        let wait = sleep(delay);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                () = &mut wait => return !self.closed.load(Ordering::SeqCst),

                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Send { responder, .. }) => {
                        let _ = responder.send(Err(Error::not_connected(
                            SessionState::ReconnectScheduled,
                        )));
                    }
                    Some(SessionCommand::Shutdown) | None => return false,
                },
            }
        }
    }

    // ========================================================================
    // Link
    // ========================================================================

    /// Logs in and serves one transport until it ends.
    async fn run_link(&mut self, link: Link) -> LinkOutcome {
        let Link { mut sink, mut stream } = link;
        let mut ids = RequestIdGenerator::starting_at(self.config.first_request_id);
        let mut table = CorrelationTable::new(self.config.retry);
        let mut state = SessionState::Authenticating;
        self.set_state(state);

        let (login_tx, mut login_rx) = oneshot::channel();
        let auth_deadline = sleep(self.config.auth_timeout);
        tokio::pin!(auth_deadline);

        let end = 'link: {
            if let Err(e) = self.send_login(&mut ids, &mut table, &mut sink, login_tx).await {
                break 'link LinkEnd::Failed(e);
            }

            loop {
                tokio::select! {
                    message = stream.next() => match message {
                        Some(Ok(bytes)) => {
                            self.dispatch(&bytes, &mut table);

                            if state == SessionState::Authenticating {
                                match login_result(&mut login_rx) {
                                    None => {}
                                    Some(Ok(())) => {
                                        state = SessionState::Open;
                                        self.on_login();
                                    }
                                    Some(Err(e)) => break 'link LinkEnd::LoginFailed(e),
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Transport error");
                            break 'link LinkEnd::Failed(e);
                        }
                        None => {
                            debug!("Transport closed by peer");
                            break 'link LinkEnd::Closed;
                        }
                    },

                    command = self.command_rx.recv() => match command {
                        Some(SessionCommand::Send { command, payload, responder }) => {
                            if state != SessionState::Open {
                                let _ = responder.send(Err(Error::not_connected(state)));
                                continue;
                            }

                            if table.len() >= self.config.max_pending
                                && table.prune_abandoned() == 0
                            {
                                warn!(max = self.config.max_pending, "Too many pending requests");
                                let _ = responder.send(Err(Error::protocol(format!(
                                    "Too many pending requests: {}/{}",
                                    table.len(),
                                    self.config.max_pending
                                ))));
                                continue;
                            }

                            let id = match ids.next_id() {
                                Ok(id) => id,
                                Err(e) => {
                                    let _ = responder.send(Err(Error::RequestIdExhaustion));
                                    break 'link LinkEnd::Fatal(e);
                                }
                            };

                            let bytes = encode(id, command, &payload);
                            if let Err(e) = table.register(id, command, bytes.clone(), responder, true) {
                                warn!(request_id = %id, error = %e, "Could not register call");
                                continue;
                            }

                            trace!(request_id = %id, command, len = bytes.len(), "Request sent");
                            if let Err(e) = sink.send(bytes).await {
                                break 'link LinkEnd::Failed(e);
                            }
                        }
                        Some(SessionCommand::Shutdown) | None => break 'link LinkEnd::Shutdown,
                    },

                    () = sleep_until_some(table.next_deadline()) => {
                        for retry in table.due_retries(Instant::now()) {
                            debug!(
                                request_id = %retry.id,
                                command = retry.command,
                                attempt = retry.attempt,
                                "Resending unanswered request"
                            );
                            if let Err(e) = sink.send(retry.frame).await {
                                break 'link LinkEnd::Failed(e);
                            }
                        }
                    },

                    () = &mut auth_deadline, if state == SessionState::Authenticating => {
                        let ms = self.config.auth_timeout.as_millis() as u64;
                        warn!(timeout_ms = ms, "Login timed out");
                        break 'link LinkEnd::LoginFailed(Error::timeout(CommandCode::Login.name(), ms));
                    },
                }
            }
        };

        if !matches!(end, LinkEnd::Closed) {
            let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
        }
        drop(stream);

        table.cancel_all("transport closed");

        LinkOutcome {
            end,
            was_open: state == SessionState::Open,
        }
    }

    /// Sends LOGIN as request 1. It is never resent.
    async fn send_login(
        &self,
        ids: &mut RequestIdGenerator,
        table: &mut CorrelationTable,
        sink: &mut FrameSink,
        login_tx: Responder,
    ) -> Result<()> {
        let id = ids.next_id()?;
        let frame = Frame::with_body(id, CommandCode::Login, &self.config.login_request())?;
        let bytes = frame.encode();

        table.register(id, frame.command, bytes.clone(), login_tx, false)?;
        debug!(
            request_id = %id,
            username = %self.config.credentials.username,
            "Sending LOGIN"
        );
        sink.send(bytes).await
    }

    fn on_login(&mut self) {
        info!(url = %self.config.url, "Session open");
        self.reconnect_attempt = 0;
        self.set_state(SessionState::Open);
        self.handlers.opened();
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Routes one inbound message: id 0 to the event handler, others to the
    /// correlation table. Malformed frames are dropped.
    fn dispatch(&self, bytes: &[u8], table: &mut CorrelationTable) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Dropping malformed frame");
                return;
            }
        };

        trace!(
            request_id = %frame.request_id,
            command = frame.command,
            len = frame.payload.len(),
            "Frame received"
        );

        if frame.is_event() {
            self.deliver_event(&frame);
            return;
        }

        match Response::from_frame(&frame) {
            Ok(response) => {
                table.complete(response);
            }
            Err(e) => {
                warn!(request_id = %frame.request_id, error = %e, "Undecodable response body");
                table.reject(frame.request_id, e);
            }
        }
    }

    fn deliver_event(&self, frame: &Frame) {
        let event = match ServerEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(command = frame.command, error = %e, "Dropping undecodable event");
                return;
            }
        };

        let handler = self.event_handler.lock();
        match handler.as_ref() {
            Some(handler) => handler(event),
            None => trace!(command = event.command, "No event handler, event dropped"),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    /// Fires lifecycle callbacks for a finished link.
    fn report(&self, outcome: &LinkOutcome) {
        if outcome.was_open {
            if let LinkEnd::Failed(e) | LinkEnd::Fatal(e) = &outcome.end {
                self.handlers.failed(e);
            }
            self.handlers.closed();
            return;
        }

        match &outcome.end {
            LinkEnd::Shutdown => {}
            LinkEnd::Closed => self.handlers.failed(&Error::ConnectionClosed),
            LinkEnd::Failed(e) | LinkEnd::LoginFailed(e) | LinkEnd::Fatal(e) => {
                self.handlers.failed(e);
            }
        }
    }

    /// Rejects calls still queued after the loop stopped.
    fn reject_queued(&mut self) {
        self.command_rx.close();
        while let Ok(command) = self.command_rx.try_recv() {
            if let SessionCommand::Send { responder, .. } = command {
                let _ = responder.send(Err(Error::not_connected(SessionState::Closed)));
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Checks whether the LOGIN call has completed.
///
/// `ALREADY_AUTHENTICATED` counts as success.
fn login_result(login_rx: &mut oneshot::Receiver<Result<serde_json::Value>>) -> Option<Result<()>> {
    match login_rx.try_recv() {
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Closed) => Some(Err(Error::ConnectionClosed)),
        Ok(Ok(_)) => Some(Ok(())),
        Ok(Err(Error::Server { kind, message })) => {
            if kind == ErrorKind::AlreadyAuthenticated {
                debug!("Server reports already authenticated");
                Some(Ok(()))
            } else {
                Some(Err(Error::authentication_failed(ServerError::new(kind, message))))
            }
        }
        Ok(Err(e)) => Some(Err(e)),
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
