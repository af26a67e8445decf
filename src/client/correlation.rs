//! Request/response correlation table.
//!
//! Maps outstanding request ids to the caller waiting on them. Owned by the
//! session event loop and rebuilt for every transport connection.
//!
//! Each pending call keeps its encoded frame so a retry resends identical
//! bytes under the same id.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Response;

use super::policy::RetryPolicy;

// ============================================================================
// Types
// ============================================================================

/// Completes one caller's call.
pub(crate) type Responder = oneshot::Sender<Result<Value>>;

/// An outstanding request.
#[derive(Debug)]
struct PendingCall {
    command: u16,
    frame: Vec<u8>,
    attempts_made: u32,
    /// `None` once no further resend is allowed.
    retry_at: Option<Instant>,
    responder: Responder,
}

/// A frame due for resending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Retry {
    pub id: RequestId,
    pub command: u16,
    pub frame: Vec<u8>,
    /// Attempt number of this send, the first send being 1.
    pub attempt: u32,
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Outstanding calls keyed by request id.
#[derive(Debug)]
pub(crate) struct CorrelationTable {
    calls: FxHashMap<RequestId, PendingCall>,
    retry: RetryPolicy,
}

impl CorrelationTable {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            calls: FxHashMap::default(),
            retry,
        }
    }

    /// Records a call whose frame has just been sent for the first time.
    ///
    /// With `retryable` the call is resent per the retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `id` is already outstanding. The
    /// responder is rejected with the same error.
    pub fn register(
        &mut self,
        id: RequestId,
        command: u16,
        frame: Vec<u8>,
        responder: Responder,
        retryable: bool,
    ) -> Result<()> {
        if self.calls.contains_key(&id) {
            let duplicate = || Error::protocol(format!("request id {id} is already outstanding"));
            let _ = responder.send(Err(duplicate()));
            return Err(duplicate());
        }

        let retry_at = (retryable && self.retry.allows_another(1))
            .then(|| Instant::now() + self.retry.interval);

        self.calls.insert(
            id,
            PendingCall {
                command,
                frame,
                attempts_made: 1,
                retry_at,
                responder,
            },
        );
        Ok(())
    }

    /// Completes a call with a result value.
    ///
    /// Returns `false` if no call is outstanding under `id`.
    pub fn resolve(&mut self, id: RequestId, value: Value) -> bool {
        self.finish(id, Ok(value))
    }

    /// Completes a call with an error.
    ///
    /// Returns `false` if no call is outstanding under `id`.
    pub fn reject(&mut self, id: RequestId, error: Error) -> bool {
        self.finish(id, Err(error))
    }

    /// Completes the call a response belongs to.
    pub fn complete(&mut self, response: Response) -> bool {
        let id = response.id;
        match response.into_result() {
            Ok(value) => self.resolve(id, value),
            Err(error) => self.reject(id, error),
        }
    }

    fn finish(&mut self, id: RequestId, result: Result<Value>) -> bool {
        let Some(call) = self.calls.remove(&id) else {
            debug!(request_id = %id, "Response for unknown request id");
            return false;
        };

        trace!(
            request_id = %id,
            command = call.command,
            attempts = call.attempts_made,
            ok = result.is_ok(),
            "Call completed"
        );

        if call.responder.send(result).is_err() {
            trace!(request_id = %id, "Caller stopped waiting");
        }
        true
    }

    /// Rejects every outstanding call with [`Error::ConnectionClosed`].
    ///
    /// Returns the number of calls cancelled.
    pub fn cancel_all(&mut self, reason: &str) -> usize {
        let count = self.calls.len();
        for (id, call) in self.calls.drain() {
            trace!(request_id = %id, command = call.command, "Cancelling call");
            let _ = call.responder.send(Err(Error::ConnectionClosed));
        }
        if count > 0 {
            debug!(count, reason, "Cancelled outstanding calls");
        }
        count
    }

    /// Collects the frames whose retry deadline has passed, in id order.
    ///
    /// Each returned call has its attempt counter bumped and its timer
    /// re-armed, or cleared once the ceiling is reached. Calls whose caller
    /// went away are dropped instead.
    pub fn due_retries(&mut self, now: Instant) -> Vec<Retry> {
        let policy = self.retry;
        let mut due = Vec::new();

        self.calls.retain(|id, call| {
            if call.responder.is_closed() {
                debug!(request_id = %id, "Dropping abandoned call");
                return false;
            }

            if call.retry_at.is_some_and(|at| at <= now) {
                call.attempts_made += 1;
                call.retry_at = policy
                    .allows_another(call.attempts_made)
                    .then(|| now + policy.interval);
                due.push(Retry {
                    id: *id,
                    command: call.command,
                    frame: call.frame.clone(),
                    attempt: call.attempts_made,
                });
            }
            true
        });

        due.sort_by_key(|retry| retry.id);
        due
    }

    /// Drops calls whose caller went away. Returns the number dropped.
    pub fn prune_abandoned(&mut self) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, call| !call.responder.is_closed());
        before - self.calls.len()
    }

    /// Earliest pending retry deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.calls.values().filter_map(|call| call.retry_at).min()
    }

    /// Number of sends made for `id`.
    #[cfg(test)]
    pub fn attempts(&self, id: RequestId) -> Option<u32> {
        self.calls.get(&id).map(|call| call.attempts_made)
    }

    #[cfg(test)]
    pub fn contains(&self, id: RequestId) -> bool {
        self.calls.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::protocol::{CommandCode, ErrorKind, Frame};

    fn table() -> CorrelationTable {
        CorrelationTable::new(RetryPolicy::default())
    }

    fn register(
        table: &mut CorrelationTable,
        id: u32,
    ) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        table
            .register(
                RequestId::new(id),
                CommandCode::DownloadUrl.code(),
                vec![id as u8],
                tx,
                true,
            )
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn test_download_url_response_resolves_caller() {
        let mut table = table();
        let rx = register(&mut table, 1);

        let frame = Frame::new(
            RequestId::new(1),
            CommandCode::DownloadUrl,
            br#"{"id":"f1","name":"a.txt","status":"DOWNLOADING","totalBytes":0,"downloadedBytes":0,"speedBytesPerMS":0}"#.to_vec(),
        );
        assert!(table.complete(Response::from_frame(&frame).unwrap()));

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["id"], "f1");
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_error_response_rejects_caller() {
        let mut table = table();
        let rx = register(&mut table, 4);

        let frame = Frame::new(
            RequestId::new(4),
            CommandCode::Error,
            br#"{"type":"NOT_FOUND","message":"File is not found."}"#.to_vec(),
        );
        table.complete(Response::from_frame(&frame).unwrap());

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.server_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let mut table = table();
        let _rx = register(&mut table, 1);

        assert!(!table.resolve(RequestId::new(99), json!(null)));
        assert!(!table.reject(RequestId::new(99), Error::ConnectionClosed));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_register_rejected() {
        let mut table = table();
        let _first = register(&mut table, 1);

        let (tx, rx) = oneshot::channel();
        let result = table.register(RequestId::new(1), 4, Vec::new(), tx, true);
        assert!(matches!(result, Err(Error::Protocol { .. })));
        assert!(matches!(rx.await.unwrap(), Err(Error::Protocol { .. })));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_all_rejects_each_once() {
        let mut table = table();
        let receivers: Vec<_> = (1..=3).map(|id| register(&mut table, id)).collect();

        assert_eq!(table.cancel_all("test"), 3);
        assert!(table.is_empty());
        assert_eq!(table.cancel_all("test"), 0);

        for rx in receivers {
            assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionClosed)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let mut table = table();
        let _rx = register(&mut table, 7);
        let id = RequestId::new(7);

        assert!(table.due_retries(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        let due = table.due_retries(Instant::now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].frame, vec![7]);
        assert_eq!(due[0].attempt, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(table.due_retries(Instant::now())[0].attempt, 3);

        assert_eq!(table.next_deadline(), None);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(table.due_retries(Instant::now()).is_empty());

        assert_eq!(table.attempts(id), Some(3));
        assert!(table.contains(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_has_no_deadline() {
        let mut table = table();
        let (tx, _rx) = oneshot::channel();
        table
            .register(RequestId::new(1), CommandCode::Login.code(), Vec::new(), tx, false)
            .unwrap();

        assert_eq!(table.next_deadline(), None);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(table.due_retries(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_call_is_pruned() {
        let mut table = table();
        let rx = register(&mut table, 1);
        let _kept = register(&mut table, 2);
        drop(rx);

        tokio::time::advance(Duration::from_secs(1)).await;
        let due = table.due_retries(Instant::now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, RequestId::new(2));
        assert!(!table.contains(RequestId::new(1)));
    }

    #[tokio::test]
    async fn test_prune_abandoned() {
        let mut table = table();
        drop(register(&mut table, 1));
        let _kept = register(&mut table, 2);

        assert_eq!(table.prune_abandoned(), 1);
        assert_eq!(table.len(), 1);
    }
}
