//! Frontend request manager capability.
//!
//! # Responsibilities
//! - Deregister a request once its body stream is done with it
//! - Address the response for a request
//! - Route out-of-band frontend notices (upload done, disconnect) by `Rid`

use std::sync::Arc;

use dashmap::DashMap;

use crate::body::stream::{BodyControl, RequestBodyStream};
use crate::body::types::{BodyError, RequestPacket, Rid};
use crate::body::watch::FileGrowthObserver;
use crate::config::BodyConfig;

/// What a body stream needs from the component that owns the frontend channel.
pub trait RequestManager: Send + Sync {
    type Response;

    /// Forget a request. Must tolerate ids that are already unlinked.
    fn unlink(&self, rid: &Rid);

    fn create_response(&self, rid: &Rid) -> Self::Response;
}

/// Addresses the response to one frontend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHandle {
    pub rid: Rid,
}

/// In-process routing table of live body streams.
pub struct FrontendRegistry {
    requests: DashMap<Rid, BodyControl>,
    config: BodyConfig,
    observer: Arc<dyn FileGrowthObserver>,
}

impl FrontendRegistry {
    pub fn new(config: BodyConfig, observer: Arc<dyn FileGrowthObserver>) -> Self {
        Self {
            requests: DashMap::new(),
            config,
            observer,
        }
    }

    /// Attach a body stream for `packet` and register it for routing.
    pub fn accept(
        self: &Arc<Self>,
        packet: RequestPacket,
        https: bool,
    ) -> Result<RequestBodyStream<Self>, BodyError> {
        let stream = RequestBodyStream::attach(
            Arc::clone(self),
            packet,
            https,
            &self.config,
            self.observer.as_ref(),
        )?;

        self.requests.insert(stream.rid().clone(), stream.control());
        Ok(stream)
    }

    /// Route an "upload done" notice. Returns `false` for unknown requests.
    pub fn upload_done(&self, rid: &Rid) -> bool {
        self.requests
            .get(rid)
            .map(|entry| entry.upload_done())
            .unwrap_or(false)
    }

    /// Route a disconnect notice. Returns `false` for unknown requests.
    pub fn disconnected(&self, rid: &Rid) -> bool {
        self.requests
            .get(rid)
            .map(|entry| entry.disconnected())
            .unwrap_or(false)
    }

    /// A whole frontend went away: every request it sent is lost.
    pub fn disconnect_sender(&self, sender: &[u8]) -> usize {
        let mut count = 0;
        for entry in self.requests.iter() {
            if entry.key().sender.as_ref() == sender && entry.disconnected() {
                count += 1;
            }
        }

        if count > 0 {
            tracing::warn!(
                sender = %String::from_utf8_lossy(sender),
                requests = count,
                "Frontend sender disconnected"
            );
        }
        count
    }

    pub fn contains(&self, rid: &Rid) -> bool {
        self.requests.contains_key(rid)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl RequestManager for FrontendRegistry {
    type Response = ResponseHandle;

    fn unlink(&self, rid: &Rid) {
        if self.requests.remove(rid).is_some() {
            tracing::trace!(rid = %rid, "Request unlinked");
        }
    }

    fn create_response(&self, rid: &Rid) -> ResponseHandle {
        ResponseHandle { rid: rid.clone() }
    }
}
