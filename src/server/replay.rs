//! Per-connection replay cache.
//!
//! Clients resend unanswered requests under the same id. The cache makes
//! that safe: a resend of a request still being handled is ignored, and a
//! resend of a recently answered request gets the stored response bytes
//! instead of running the handler again.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::identifiers::RequestId;

/// What to do with an incoming request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Replay {
    /// Not seen recently; handle it.
    Fresh,
    /// Still being handled; drop the duplicate.
    InFlight,
    /// Already answered; resend these bytes.
    Answered(Vec<u8>),
}

#[derive(Debug)]
pub(crate) struct ReplayCache {
    in_flight: FxHashSet<RequestId>,
    answered: VecDeque<(RequestId, Vec<u8>)>,
    capacity: usize,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            in_flight: FxHashSet::default(),
            answered: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn check(&self, id: RequestId) -> Replay {
        if self.in_flight.contains(&id) {
            return Replay::InFlight;
        }

        self.answered
            .iter()
            .rev()
            .find(|(answered, _)| *answered == id)
            .map_or(Replay::Fresh, |(_, bytes)| Replay::Answered(bytes.clone()))
    }

    /// Marks `id` as being handled.
    pub fn start(&mut self, id: RequestId) {
        self.in_flight.insert(id);
    }

    /// Stores the response sent for `id`, evicting the oldest entry when full.
    pub fn complete(&mut self, id: RequestId, response: &[u8]) {
        self.in_flight.remove(&id);
        if self.capacity == 0 {
            return;
        }

        self.answered.retain(|(answered, _)| *answered != id);
        if self.answered.len() == self.capacity {
            self.answered.pop_front();
        }
        self.answered.push_back((id, response.to_vec()));
    }
}
