//! Client session handle.
//!
//! A [`Session`] owns one logical connection to the server. It spawns an
//! event loop task that opens the transport, logs in, correlates responses,
//! resends unanswered requests and reconnects after failures.
//!
//! # Example
//!
//! ```ignore
//! use remote_downloader_rpc::client::{ClientConfig, Session, SessionHandlers};
//!
//! let config = ClientConfig::builder()
//!     .address("localhost:8080")
//!     .credentials("admin", "secret")
//!     .build()?;
//!
//! let session = Session::connect(config, SessionHandlers::new());
//! session.wait_until_open().await?;
//!
//! let page = session.get_files_history(0, 20).await?;
//! ```
//!
//! # Thread Safety
//!
//! `Session` is `Send + Sync` and cheap to clone. The loop stops once
//! [`Session::close`] is called or every clone is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{CommandCode, ServerEvent, json_payload};
use crate::transport::{Connector, WebSocketConnector};

use super::config::ClientConfig;
use super::event_loop::{EventLoop, SessionCommand};
use super::handlers::{EventHandler, SessionHandlers};
use super::state::SessionState;

// ============================================================================
// Session
// ============================================================================

/// Handle to a client session.
#[derive(Clone)]
pub struct Session {
    /// Channel to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Current lifecycle state, published by the event loop.
    state_rx: watch::Receiver<SessionState>,
    /// Set once by `close()`.
    closed: Arc<AtomicBool>,
    /// Event handler (shared with event loop).
    event_handler: Arc<Mutex<Option<EventHandler>>>,
}

impl Session {
    /// Starts a session over WebSocket.
    ///
    /// Returns immediately; the session connects in the background. Use
    /// [`Session::wait_until_open`] to wait for the first login.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn connect(config: ClientConfig, handlers: SessionHandlers) -> Self {
        Self::connect_with(config, WebSocketConnector::new(), handlers)
    }

    /// Starts a session over a custom transport.
    #[must_use]
    pub fn connect_with(
        config: ClientConfig,
        connector: impl Connector,
        handlers: SessionHandlers,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let closed = Arc::new(AtomicBool::new(false));
        let event_handler: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

        debug!(url = %config.url(), "Starting session");

        let event_loop = EventLoop {
            config,
            connector: Box::new(connector),
            handlers,
            command_rx,
            state_tx,
            closed: Arc::clone(&closed),
            event_handler: Arc::clone(&event_handler),
            reconnect_attempt: 0,
        };
        tokio::spawn(event_loop.run());

        Self {
            command_tx,
            state_rx,
            closed,
            event_handler,
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Sends a request and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the session is not open
    /// - [`Error::Server`] if the server answered with an error
    /// - [`Error::ConnectionClosed`] if the transport closed first
    /// - [`Error::Protocol`] if too many calls are outstanding
    pub async fn send<T: Serialize + ?Sized>(&self, command: CommandCode, body: &T) -> Result<Value> {
        let payload = json_payload(body)?;
        self.send_raw(command.code(), payload).await
    }

    /// Sends a request with a raw command code and payload bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Session::send`].
    pub async fn send_raw(&self, command: u16, payload: Vec<u8>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::not_connected(SessionState::Closed));
        }

        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Send {
                command,
                payload,
                responder,
            })
            .map_err(|_| Error::not_connected(SessionState::Closed))?;

        response_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Sends a request and deserializes its result.
    ///
    /// # Errors
    ///
    /// Same as [`Session::send`], plus [`Error::Json`] if the result does not
    /// match `R`.
    pub async fn request<R, T>(&self, command: CommandCode, body: &T) -> Result<R>
    where
        R: DeserializeOwned,
        T: Serialize + ?Sized,
    {
        let value = self.send(command, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends a request, giving up after `request_timeout`.
    ///
    /// The call stays registered until its next retry tick; a response
    /// arriving after the caller gave up is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`Session::send`], plus [`Error::Timeout`].
    pub async fn send_with_timeout<T: Serialize + ?Sized>(
        &self,
        command: CommandCode,
        body: &T,
        request_timeout: Duration,
    ) -> Result<Value> {
        timeout(request_timeout, self.send(command, body))
            .await
            .map_err(|_| Error::timeout(command.name(), request_timeout.as_millis() as u64))?
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Sets the server event handler, replacing any previous one.
    ///
    /// The handler runs on the session task and must not call back into
    /// `set_event_handler` or `clear_event_handler`.
    pub fn set_event_handler(&self, handler: impl Fn(ServerEvent) + Send + Sync + 'static) {
        *self.event_handler.lock() = Some(Box::new(handler));
    }

    /// Clears the event handler. Later events are dropped.
    pub fn clear_event_handler(&self) {
        *self.event_handler.lock() = None;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Returns `true` if the session is logged in.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Waits until the session is logged in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the session closes first.
    pub async fn wait_until_open(&self) -> Result<()> {
        let mut state_rx = self.state_rx.clone();
        let state = *state_rx
            .wait_for(|state| state.is_open() || state.is_closed())
            .await
            .map_err(|_| Error::not_connected(SessionState::Closed))?;

        if state.is_closed() {
            return Err(Error::not_connected(state));
        }
        Ok(())
    }

    /// Waits until the event loop has stopped.
    pub async fn wait_closed(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx.wait_for(|state| state.is_closed()).await;
    }

    /// Closes the session.
    ///
    /// Outstanding calls are rejected with [`Error::ConnectionClosed`], no
    /// reconnect is attempted, and later calls fail with
    /// [`Error::NotConnected`]. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing session");
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }

    /// Returns `true` once `close()` has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::client::{ClientConfigBuilder, ReconnectPolicy};
    use crate::identifiers::RequestId;
    use crate::protocol::{ErrorKind, FilesHistoryReport, Frame, ParsedEvent};
    use crate::transport::{MemoryConnector, MemoryListener, MemoryPeer};

    type Log = Arc<Mutex<Vec<String>>>;

    const RECORD: &str = r#"{"id":"f1","name":"a.txt","status":"DOWNLOADING","totalBytes":100,"downloadedBytes":0,"speedBytesPerMS":0}"#;

    fn config() -> ClientConfigBuilder {
        ClientConfig::builder()
            .address("memory:1")
            .credentials("admin", "secret")
    }

    fn recording(log: &Log) -> SessionHandlers {
        let (open, close, error) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
        SessionHandlers::new()
            .on_open(move || open.lock().push("open".to_string()))
            .on_close(move || close.lock().push("close".to_string()))
            .on_error(move |e| error.lock().push(format!("error: {e}")))
    }

    fn start(builder: ClientConfigBuilder) -> (Session, MemoryConnector, MemoryListener, Log) {
        let (connector, listener) = MemoryConnector::new();
        let log = Log::default();
        let session = Session::connect_with(
            builder.build().unwrap(),
            connector.clone(),
            recording(&log),
        );
        (session, connector, listener, log)
    }

    fn reply(peer: &MemoryPeer, request: &Frame, command: CommandCode, body: &str) {
        peer.send_frame(&Frame::new(
            request.request_id,
            command,
            body.as_bytes().to_vec(),
        ))
        .unwrap();
    }

    /// Accepts the next connection and answers its LOGIN with success.
    async fn accept_login(listener: &mut MemoryListener) -> MemoryPeer {
        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        assert_eq!(login.request_id, RequestId::new(1));
        assert_eq!(login.command_code(), Some(CommandCode::Login));
        reply(&peer, &login, CommandCode::Login, "");
        peer
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_then_request() {
        let (session, _connector, mut listener, log) = start(config().subscribe_to_reports(true));

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        let body = login.body().unwrap();
        assert_eq!(body["username"], "admin");
        assert_eq!(body["password"], "secret");
        assert_eq!(body["subscribeOnDownloadingFilesReport"], true);
        reply(&peer, &login, CommandCode::Login, "");

        session.wait_until_open().await.unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(*log.lock(), vec!["open"]);

        let call = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .download_url("https://example.com/a.txt", "a.txt", None)
                    .await
            }
        });

        let request = peer.recv_frame().await.unwrap();
        assert_eq!(request.request_id, RequestId::new(2));
        assert_eq!(request.command_code(), Some(CommandCode::DownloadUrl));
        assert_eq!(request.body().unwrap()["fileName"], "a.txt");
        reply(&peer, &request, CommandCode::DownloadUrl, RECORD);

        let record = call.await.unwrap().unwrap();
        assert_eq!(record.id, "f1");
        assert_eq!(record.total_bytes, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_ids_increase() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        for expected in 2..=4 {
            let call = tokio::spawn({
                let session = session.clone();
                async move { session.delete_file("f1").await }
            });
            let request = peer.recv_frame().await.unwrap();
            assert_eq!(request.request_id, RequestId::new(expected));
            reply(&peer, &request, CommandCode::DeleteFile, "");
            call.await.unwrap().unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_reaches_caller() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.stop_downloading("missing").await }
        });
        let request = peer.recv_frame().await.unwrap();
        reply(
            &peer,
            &request,
            CommandCode::Error,
            r#"{"type":"NOT_FOUND","message":"File is not found."}"#,
        );

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.server_kind(), Some(ErrorKind::NotFound));
        assert!(session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_request_is_sent_three_times() {
        let (session, _connector, mut listener, log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });

        let first = peer.recv_frame().await.unwrap();
        let second = peer.recv_frame().await.unwrap();
        let third = peer.recv_frame().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second, third);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!peer.has_pending());
        assert!(!call.is_finished());

        peer.close();
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        session.close();
        session.wait_closed().await;
        assert_eq!(*log.lock(), vec!["open", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_after_retries_resolves() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.resume_downloading("f1").await }
        });

        let mut request = peer.recv_frame().await.unwrap();
        for _ in 0..2 {
            request = peer.recv_frame().await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        reply(&peer, &request, CommandCode::ResumeDownloading, RECORD);
        assert_eq!(call.await.unwrap().unwrap().name, "a.txt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_authenticated_counts_as_login() {
        let (session, _connector, mut listener, log) = start(config());

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        reply(
            &peer,
            &login,
            CommandCode::Error,
            r#"{"type":"ALREADY_AUTHENTICATED","message":"Already authenticated."}"#,
        );

        session.wait_until_open().await.unwrap();
        assert_eq!(*log.lock(), vec!["open"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_goes_to_handler_only() {
        let (session, _connector, mut listener, log) = start(config());
        let peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        session.set_event_handler(move |event| {
            let _ = event_tx.send(event);
        });

        let report = FilesHistoryReport::default();
        peer.send_frame(&ServerEvent::files_history_report(&report).unwrap())
            .unwrap();

        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.command_code(), Some(CommandCode::FilesHistoryReport));
        assert_eq!(event.parse(), ParsedEvent::FilesHistoryReport(report));
        assert_eq!(*log.lock(), vec!["open"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_without_handler_are_dropped() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();
        session.clear_event_handler();

        peer.send_frame(&Frame::new(RequestId::EVENT, 42u16, b"{}".to_vec()))
            .unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });
        let request = peer.recv_frame().await.unwrap();
        reply(&peer, &request, CommandCode::DeleteFile, "");
        call.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_restart_after_reconnect() {
        let builder = config().reconnect(ReconnectPolicy::Fixed(Duration::from_millis(100)));
        let (session, _connector, mut listener, log) = start(builder);

        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });
        let request = peer.recv_frame().await.unwrap();
        assert_eq!(request.request_id, RequestId::new(2));
        reply(&peer, &request, CommandCode::DeleteFile, "");
        call.await.unwrap().unwrap();

        peer.close();

        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f2").await }
        });
        let request = peer.recv_frame().await.unwrap();
        assert_eq!(request.request_id, RequestId::new(2));
        reply(&peer, &request, CommandCode::DeleteFile, "");
        call.await.unwrap().unwrap();

        assert_eq!(*log.lock(), vec!["open", "close", "open"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_rejected_while_authenticating() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = listener.accept().await.unwrap();
        let _login = peer.recv_frame().await.unwrap();

        let err = session.delete_file("f1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotConnected {
                state: SessionState::Authenticating
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_login_closes_session() {
        let (session, _connector, mut listener, log) = start(config().fail_fast_login(true));

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        reply(
            &peer,
            &login,
            CommandCode::Error,
            r#"{"type":"INCORRECT_CREDENTIALS","message":"Incorrect username or password."}"#,
        );

        let err = session.wait_until_open().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            *log.lock(),
            vec!["error: Authentication failed (INCORRECT_CREDENTIALS): Incorrect username or password."]
        );
        assert!(listener.try_accept().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_login_reconnects() {
        let (session, _connector, mut listener, log) = start(config());

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        reply(
            &peer,
            &login,
            CommandCode::Error,
            r#"{"type":"INCORRECT_CREDENTIALS","message":"Incorrect username or password."}"#,
        );

        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("error: Authentication failed"));
        assert_eq!(log[1], "open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_timeout_reconnects() {
        let (session, _connector, mut listener, log) = start(config());

        let _silent = listener.accept().await.unwrap();
        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let log = log.lock();
        assert_eq!(log[0], "error: Timeout after 10000ms: LOGIN");
        assert_eq!(log[1], "open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_reports_error_and_retries() {
        let (connector, mut listener) = MemoryConnector::new();
        connector.refuse_next(1);
        let log = Log::default();
        let session = Session::connect_with(config().build().unwrap(), connector, recording(&log));

        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let log = log.lock();
        assert!(log[0].starts_with("error: Connection failed"));
        assert_eq!(log[1], "open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_pending_and_later_calls() {
        let (session, _connector, mut listener, log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });
        let _request = peer.recv_frame().await.unwrap();

        session.close();
        session.close();

        assert!(matches!(
            call.await.unwrap().unwrap_err(),
            Error::ConnectionClosed
        ));
        session.wait_closed().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_closed());

        let err = session.delete_file("f2").await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotConnected {
                state: SessionState::Closed
            }
        ));

        assert!(peer.recv().await.is_none());
        assert!(listener.try_accept().is_none());
        assert_eq!(*log.lock(), vec!["open", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_dropped() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        peer.send(vec![0, 0, 1]).unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.list_folders(None).await }
        });
        let request = peer.recv_frame().await.unwrap();
        reply(
            &peer,
            &request,
            CommandCode::ListFolders,
            r#"{"canDownload":true,"files":[{"folder":true,"fileName":"music"}]}"#,
        );

        let listing = call.await.unwrap().unwrap();
        assert!(listing.can_download);
        assert_eq!(listing.files[0].file_name, "music");
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_response_rejects_caller() {
        let (session, _connector, mut listener, _log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.get_files_history(0, 10).await }
        });
        let request = peer.recv_frame().await.unwrap();
        reply(&peer, &request, CommandCode::GetFilesHistory, "{not json");

        assert!(matches!(
            call.await.unwrap().unwrap_err(),
            Error::MalformedFrame { .. }
        ));
        assert!(session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_cap() {
        let (session, _connector, mut listener, _log) = start(config().max_pending(1));
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let _first = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });
        let _request = peer.recv_frame().await.unwrap();

        let err = session.delete_file("f2").await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_with_timeout() {
        let (session, _connector, mut listener, _log) = start(config());
        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let err = session
            .send_with_timeout(
                CommandCode::DeleteFile,
                &json!({ "fileId": "f1" }),
                Duration::from_millis(500),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout after 500ms: DELETE_FILE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_every_handle_stops_the_loop() {
        let (session, _connector, mut listener, log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        drop(session);
        assert!(peer.recv().await.is_none());
        assert_eq!(*log.lock(), vec!["open", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_login_reports_error_then_reconnects() {
        let (session, _connector, mut listener, log) = start(config());

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        assert_eq!(login.command_code(), Some(CommandCode::Login));
        peer.close();

        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        assert_eq!(*log.lock(), vec!["error: Connection closed", "open"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_while_open_rejects_pending_and_reconnects() {
        let (session, _connector, mut listener, log) = start(config());
        let mut peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.delete_file("f1").await }
        });
        let _request = peer.recv_frame().await.unwrap();
        peer.fail(Error::connection("boom"));

        assert!(matches!(
            call.await.unwrap().unwrap_err(),
            Error::ConnectionClosed
        ));
        assert_eq!(
            *log.lock(),
            vec!["open", "error: Connection failed: boom", "close"]
        );

        let _peer = accept_login(&mut listener).await;
        session.wait_until_open().await.unwrap();
        assert_eq!(
            *log.lock(),
            vec!["open", "error: Connection failed: boom", "close", "open"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_request_ids_close_session() {
        let (connector, mut listener) = MemoryConnector::new();
        let log = Log::default();
        let mut config = config().build().unwrap();
        config.first_request_id = u32::MAX;
        let session = Session::connect_with(config, connector, recording(&log));

        let mut peer = listener.accept().await.unwrap();
        let login = peer.recv_frame().await.unwrap();
        assert_eq!(login.request_id, RequestId::new(u32::MAX));
        reply(&peer, &login, CommandCode::Login, "");
        session.wait_until_open().await.unwrap();

        let err = session.delete_file("f1").await.unwrap_err();
        assert!(matches!(err, Error::RequestIdExhaustion));

        session.wait_closed().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            *log.lock(),
            vec!["open", "error: Request id space exhausted", "close"]
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(listener.try_accept().is_none());
        assert!(peer.recv().await.is_none());
    }
}
