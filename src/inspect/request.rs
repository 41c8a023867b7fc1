//! Inspection request correlator.
//!
//! # State Machine
//! ```text
//! Created → Pending → Completed | Failed(Timeout)
//! Created → Failed(Unavailable)      (channel saturated at start)
//! ```
//!
//! # Design Decisions
//! - One request, one timer, one terminal event
//! - Fail fast when the manager cannot take a write right now; no queueing
//! - Whichever of reply, timeout or drop comes first wins; the timer and the
//!   manager route are released on every path

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::InspectConfig;
use crate::http::HttpRequestData;
use crate::inspect::manager::InspectManager;
use crate::inspect::types::{
    InspectData, InspectError, InspectEvent, InspectId, InspectRequestPacket, InspectResponsePacket,
    ReplySender,
};
use crate::observability::metrics;

#[derive(Debug)]
pub(crate) enum Turn {
    Start,
    Reply(InspectResponsePacket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectState {
    Created,
    Pending,
    Completed,
    Failed(InspectError),
}

impl InspectState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InspectState::Completed | InspectState::Failed(_))
    }
}

/// Asks the inspection service about one HTTP request.
pub struct InspectRequest<M: InspectManager> {
    id: InspectId,
    manager: Option<Arc<M>>,
    timeout: Duration,
    request: Option<HttpRequestData>,
    started: bool,
    deadline: Option<Instant>,
    state: InspectState,
    event: Option<InspectEvent>,
    turns_tx: mpsc::UnboundedSender<Turn>,
    turns_rx: mpsc::UnboundedReceiver<Turn>,
}

impl<M: InspectManager> InspectRequest<M> {
    pub fn new(manager: Arc<M>, config: &InspectConfig) -> Self {
        Self::with_timeout(manager, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(manager: Arc<M>, timeout: Duration) -> Self {
        let (turns_tx, turns_rx) = mpsc::unbounded_channel();
        Self {
            id: InspectId::new(),
            manager: Some(manager),
            timeout,
            request: None,
            started: false,
            deadline: None,
            state: InspectState::Created,
            event: None,
            turns_tx,
            turns_rx,
        }
    }

    pub fn id(&self) -> InspectId {
        self.id
    }

    pub fn state(&self) -> InspectState {
        self.state
    }

    pub fn error_condition(&self) -> Option<InspectError> {
        match self.state {
            InspectState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether a timeout is currently armed.
    pub fn timer_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Handle the manager uses to route the reply back here.
    pub fn reply_sender(&self) -> ReplySender {
        ReplySender::new(self.turns_tx.clone())
    }

    /// Submit the request. The send happens on the next turn. Only the
    /// first call has any effect.
    pub fn start(&mut self, request: HttpRequestData) {
        if self.started {
            tracing::warn!(inspect_id = %self.id, "Inspection already started");
            return;
        }

        self.started = true;
        self.request = Some(request);
        self.schedule(Turn::Start);
    }

    /// Accept a reply routed to this request. Ignored unless the request is
    /// pending and the id matches.
    pub fn handle(&mut self, reply: InspectResponsePacket) {
        if self.state != InspectState::Pending {
            tracing::debug!(inspect_id = %self.id, state = ?self.state, "Dropping late inspection reply");
            return;
        }
        if reply.id != self.id {
            tracing::warn!(inspect_id = %self.id, reply_id = %reply.id, "Inspection reply id mismatch");
            return;
        }

        let data = InspectData::from(reply);
        self.cleanup();
        self.state = InspectState::Completed;
        self.event = Some(InspectEvent::Finished(data));

        metrics::record_inspect_outcome("completed");
        tracing::debug!(inspect_id = %self.id, "Inspection completed");
    }

    /// Wait for the terminal event.
    ///
    /// Returns `None` once it has been delivered, or if the request was
    /// never started. A reply that is ready at the same time as the
    /// deadline wins. Cancel safe.
    pub async fn next_event(&mut self) -> Option<InspectEvent> {
        loop {
            if let Some(event) = self.event.take() {
                return Some(event);
            }
            if self.state.is_terminal() || !self.started {
                return None;
            }

            let turn = match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        biased;
                        turn = self.turns_rx.recv() => turn,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.timed_out();
                            continue;
                        }
                    }
                }
                None => self.turns_rx.recv().await,
            };

            match turn {
                Some(turn) => self.apply(turn),
                None => return None,
            }
        }
    }

    /// Like [`next_event`](Self::next_event) but without waiting.
    pub fn try_next_event(&mut self) -> Option<InspectEvent> {
        loop {
            if let Some(event) = self.event.take() {
                return Some(event);
            }
            if self.state.is_terminal() {
                return None;
            }

            match self.turns_rx.try_recv() {
                Ok(turn) => self.apply(turn),
                Err(_) => {
                    if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        self.timed_out();
                        continue;
                    }
                    return None;
                }
            }
        }
    }

    fn schedule(&self, turn: Turn) {
        // we hold the receiver, so this cannot fail
        let _ = self.turns_tx.send(turn);
    }

    fn apply(&mut self, turn: Turn) {
        match turn {
            Turn::Start => self.do_start(),
            Turn::Reply(reply) => self.handle(reply),
        }
    }

    fn do_start(&mut self) {
        let (Some(manager), Some(request)) = (self.manager.clone(), self.request.take()) else {
            return;
        };

        if !manager.can_write_immediately() {
            tracing::warn!(inspect_id = %self.id, "Inspection channel saturated");
            self.fail(InspectError::Unavailable);
            return;
        }

        let packet = InspectRequestPacket {
            id: self.id,
            method: request.method,
            path: request.path,
            headers: request.headers,
        };

        self.deadline = Some(Instant::now() + self.timeout);
        self.state = InspectState::Pending;
        manager.write(packet, self.reply_sender());

        tracing::debug!(
            inspect_id = %self.id,
            timeout_ms = self.timeout.as_millis() as u64,
            "Inspection request sent"
        );
    }

    fn timed_out(&mut self) {
        tracing::warn!(inspect_id = %self.id, "Inspection request timed out");
        self.fail(InspectError::Timeout);
    }

    fn fail(&mut self, error: InspectError) {
        if self.state.is_terminal() {
            return;
        }

        self.cleanup();
        self.state = InspectState::Failed(error);
        self.event = Some(InspectEvent::Error(error));

        metrics::record_inspect_outcome(match error {
            InspectError::Unavailable => "unavailable",
            InspectError::Timeout => "timeout",
        });
    }

    fn cleanup(&mut self) {
        self.deadline = None;

        if let Some(manager) = self.manager.take() {
            manager.unlink(&self.id);
        }
    }
}

impl<M: InspectManager> Drop for InspectRequest<M> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<M: InspectManager> std::fmt::Debug for InspectRequest<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectRequest")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("timer_armed", &self.deadline.is_some())
            .finish()
    }
}
