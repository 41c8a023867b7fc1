//! Inspection manager capability.
//!
//! # Responsibilities
//! - Report whether the channel to the inspection service can take a write
//!   right now
//! - Submit inspection requests and route replies back by id
//! - Forget requests that have finished (idempotent)

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::config::InspectConfig;
use crate::inspect::types::{InspectId, InspectRequestPacket, InspectResponsePacket, ReplySender};

/// What an inspection request needs from the component that owns the
/// channel to the inspection service.
pub trait InspectManager: Send + Sync {
    /// Point-in-time sample; no reservation is made.
    fn can_write_immediately(&self) -> bool;

    /// Fire-and-forget submit. The reply, if any, goes to `reply`.
    fn write(&self, packet: InspectRequestPacket, reply: ReplySender);

    /// Forget a request. Must tolerate ids that are already unlinked.
    fn unlink(&self, id: &InspectId);
}

/// In-process inspection manager over a bounded channel.
///
/// The receiving half is handed to whatever talks to the inspection
/// service; replies come back through [`dispatch`](Self::dispatch).
#[derive(Debug)]
pub struct ChannelInspectManager {
    outbound: mpsc::Sender<InspectRequestPacket>,
    routes: DashMap<InspectId, ReplySender>,
}

impl ChannelInspectManager {
    pub fn new(config: &InspectConfig) -> (Self, mpsc::Receiver<InspectRequestPacket>) {
        let (outbound, rx) = mpsc::channel(config.queue_capacity.max(1));

        (
            Self {
                outbound,
                routes: DashMap::new(),
            },
            rx,
        )
    }

    /// Route a reply to the request waiting for it. Returns `false` if no
    /// request with that id is outstanding.
    pub fn dispatch(&self, reply: InspectResponsePacket) -> bool {
        let route = self.routes.get(&reply.id).map(|r| r.value().clone());

        match route {
            Some(sender) => sender.send(reply),
            None => {
                tracing::debug!(inspect_id = %reply.id, "Reply for unknown inspection request");
                false
            }
        }
    }

    /// Number of requests awaiting a reply.
    pub fn pending(&self) -> usize {
        self.routes.len()
    }
}

impl InspectManager for ChannelInspectManager {
    fn can_write_immediately(&self) -> bool {
        self.outbound.capacity() > 0
    }

    fn write(&self, packet: InspectRequestPacket, reply: ReplySender) {
        let id = packet.id;
        self.routes.insert(id, reply);

        if let Err(e) = self.outbound.try_send(packet) {
            // the request stays routed and will time out
            tracing::warn!(inspect_id = %id, error = %e, "Failed to queue inspection request");
        }
    }

    fn unlink(&self, id: &InspectId) {
        self.routes.remove(id);
    }
}
