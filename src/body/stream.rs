//! Request body stream.
//!
//! # Responsibilities
//! - Hold a body delivered inline with the request packet, or
//! - Pull a body progressively out of an upload file the frontend is still
//!   writing, never holding more than `buffer_size` unread bytes
//! - Deliver `ReadyRead*` then exactly one terminal event to its owner
//! - Release the upload file, its watch and the manager link exactly once
//!
//! # Scheduling
//! Work that must not run inside the caller's own method call (activation,
//! re-draining after a read, file growth, routed notices) is queued as a
//! [`Turn`] on the stream's own channel and only processed inside a later
//! [`RequestBodyStream::next_event`] call. Events are queued and pulled, so
//! nothing ever calls back into the owner.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method};
use tokio::sync::mpsc;

use crate::body::file_reader::BufferedFileReader;
use crate::body::manager::RequestManager;
use crate::body::types::{BodyError, BodyErrorCondition, BodyEvent, RequestPacket, Rid};
use crate::body::watch::{FileGrowthObserver, GrowthSignal, WatchGuard};
use crate::config::BodyConfig;
use crate::http::HttpRequestData;
use crate::observability::metrics;

/// Deferred work for a stream, processed on a later turn.
#[derive(Debug)]
pub(crate) enum Turn {
    Activate,
    Drain,
    FileGrew,
    UploadDone,
    Disconnected,
}

/// Lifecycle of a body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Running,
    Finished,
    Errored(BodyErrorCondition),
}

/// Cloneable handle a manager keeps to route out-of-band notices to a stream.
#[derive(Debug, Clone)]
pub struct BodyControl {
    tx: mpsc::UnboundedSender<Turn>,
}

impl BodyControl {
    /// The frontend will not append to the upload file any more.
    /// Returns `false` if the stream is gone.
    pub fn upload_done(&self) -> bool {
        self.tx.send(Turn::UploadDone).is_ok()
    }

    /// The frontend connection died.
    pub fn disconnected(&self) -> bool {
        self.tx.send(Turn::Disconnected).is_ok()
    }
}

struct UploadSource {
    reader: BufferedFileReader,
    _watch: WatchGuard,
}

/// Body of one incoming request.
pub struct RequestBodyStream<M: RequestManager> {
    rid: Rid,
    request: HttpRequestData,
    https: bool,
    buffer_size: usize,
    inbound: BytesMut,
    /// `None` once the whole body is resident (or was never file-backed).
    upload: Option<UploadSource>,
    upload_complete: bool,
    active: bool,
    drain_scheduled: bool,
    finished: bool,
    state: StreamState,
    rcount: u64,
    manager: Option<Arc<M>>,
    /// Kept after unlink so a response can still be created.
    response_manager: Arc<M>,
    events: VecDeque<BodyEvent>,
    turns_tx: mpsc::UnboundedSender<Turn>,
    turns_rx: mpsc::UnboundedReceiver<Turn>,
}

impl<M: RequestManager> RequestBodyStream<M> {
    /// Take over a request packet.
    ///
    /// With an upload file, the file is opened, watched and drained once.
    /// Any failure there fails construction; nothing is left registered.
    pub fn attach(
        manager: Arc<M>,
        packet: RequestPacket,
        https: bool,
        config: &BodyConfig,
        observer: &dyn FileGrowthObserver,
    ) -> Result<Self, BodyError> {
        let rid = packet.rid();
        let (turns_tx, turns_rx) = mpsc::unbounded_channel();

        let mut stream = Self {
            rid,
            request: packet.request,
            https,
            buffer_size: config.buffer_size,
            inbound: BytesMut::new(),
            upload: None,
            upload_complete: false,
            active: false,
            drain_scheduled: false,
            finished: false,
            state: StreamState::Running,
            rcount: 0,
            manager: None,
            response_manager: Arc::clone(&manager),
            events: VecDeque::new(),
            turns_tx,
            turns_rx,
        };

        match packet.upload_file {
            Some(path) => {
                if let Err(e) = stream.open_upload(&path, observer) {
                    tracing::error!(rid = %stream.rid, error = %e, "Unable to attach upload file");
                    return Err(e);
                }
            }
            None => {
                stream.inbound = BytesMut::from(&packet.body[..]);
                stream.rcount = packet.body.len() as u64;
                stream.upload_complete = true;
                stream.finished = true;
            }
        }

        stream.manager = Some(manager);

        tracing::debug!(
            rid = %stream.rid,
            method = %stream.request.method,
            path = %stream.request.path,
            file_backed = stream.upload.is_some(),
            buffered = stream.inbound.len(),
            "Request body attached"
        );
        Ok(stream)
    }

    fn open_upload(&mut self, path: &Path, observer: &dyn FileGrowthObserver) -> Result<(), BodyError> {
        let reader = BufferedFileReader::open(path)?;
        let signal = GrowthSignal::new(self.turns_tx.clone());
        let watch = observer
            .subscribe(path, signal)
            .map_err(|source| BodyError::Watch {
                path: path.to_path_buf(),
                source,
            })?;

        self.upload = Some(UploadSource {
            reader,
            _watch: watch,
        });
        self.try_read_file()
    }

    pub fn rid(&self) -> &Rid {
        &self.rid
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn request(&self) -> &HttpRequestData {
        &self.request
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    /// Whether the whole body has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_file_backed(&self) -> bool {
        self.upload.is_some()
    }

    /// Body bytes taken in so far, read by the consumer or not.
    pub fn actual_content_length(&self) -> u64 {
        self.rcount
    }

    /// Bytes waiting to be read.
    pub fn bytes_available(&self) -> usize {
        self.inbound.len()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn error_condition(&self) -> Option<BodyErrorCondition> {
        match self.state {
            StreamState::Errored(condition) => Some(condition),
            _ => None,
        }
    }

    pub fn control(&self) -> BodyControl {
        BodyControl {
            tx: self.turns_tx.clone(),
        }
    }

    pub fn create_response(&self) -> M::Response {
        self.response_manager.create_response(&self.rid)
    }

    /// Start delivering events. The first `ReadyRead` (if any body is
    /// buffered) arrives on the next turn, never from this call. Only the
    /// first call has any effect.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }

        self.active = true;
        self.schedule(Turn::Activate);
    }

    /// Take up to `max` buffered bytes.
    pub fn read(&mut self, max: usize) -> Bytes {
        let size = max.min(self.inbound.len());
        self.take(size)
    }

    /// Take every buffered byte.
    pub fn read_all(&mut self) -> Bytes {
        let size = self.inbound.len();
        self.take(size)
    }

    fn take(&mut self, size: usize) -> Bytes {
        if size == 0 {
            return Bytes::new();
        }

        let out = self.inbound.split_to(size).freeze();

        // one pending drain covers any number of reads
        if self.upload.is_some() && !self.drain_scheduled {
            self.drain_scheduled = true;
            self.schedule(Turn::Drain);
        }

        out
    }

    /// The frontend will not append to the upload file any more.
    pub fn upload_done(&mut self) {
        self.upload_complete = true;

        let len = match self.upload.as_ref().map(|upload| upload.reader.len()) {
            None => None,
            Some(Ok(len)) => Some(len),
            Some(Err(e)) => {
                tracing::error!(rid = %self.rid, error = %e, "Unable to stat upload file");
                self.fail(e);
                return;
            }
        };

        if len.map_or(true, |len| self.rcount >= len) {
            self.release_upload();
            self.try_finish();
        }
    }

    /// The frontend connection died. Ends a running stream with
    /// `ConnectionLost`; ignored once the stream is terminal.
    pub fn disconnected(&mut self) {
        if self.state != StreamState::Running {
            return;
        }

        tracing::warn!(rid = %self.rid, received = self.rcount, "Frontend disconnected mid-body");
        self.fail(BodyError::ConnectionLost);
    }

    /// Wait for the next event.
    ///
    /// Returns `None` after the terminal event has been delivered. Without
    /// activation, or while the upload can still grow, this waits for file
    /// growth or routed notices. Cancel safe.
    pub async fn next_event(&mut self) -> Option<BodyEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.state != StreamState::Running {
                return None;
            }

            let turn = self.turns_rx.recv().await?;
            self.apply(turn);
        }
    }

    /// Like [`next_event`](Self::next_event) but only processes work that is
    /// already queued.
    pub fn try_next_event(&mut self) -> Option<BodyEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.state != StreamState::Running {
                return None;
            }

            let turn = self.turns_rx.try_recv().ok()?;
            self.apply(turn);
        }
    }

    fn schedule(&self, turn: Turn) {
        // we hold the receiver, so this cannot fail
        let _ = self.turns_tx.send(turn);
    }

    fn apply(&mut self, turn: Turn) {
        if self.state != StreamState::Running {
            return;
        }

        match turn {
            Turn::Activate => self.do_activate(),
            Turn::Drain => {
                self.drain_scheduled = false;
                self.do_read();
            }
            Turn::FileGrew => {
                if self.inbound.len() < self.buffer_size {
                    self.do_read();
                }
            }
            Turn::UploadDone => self.upload_done(),
            Turn::Disconnected => self.disconnected(),
        }
    }

    fn do_activate(&mut self) {
        if !self.inbound.is_empty() {
            self.events.push_back(BodyEvent::ReadyRead);
        }

        self.try_finish();
    }

    fn do_read(&mut self) {
        if self.upload.is_none() {
            return;
        }

        if let Err(e) = self.try_read_file() {
            tracing::error!(rid = %self.rid, error = %e, "Unable to read upload file");
            self.fail(e);
        }
    }

    fn try_read_file(&mut self) -> Result<(), BodyError> {
        let avail = self.buffer_size.saturating_sub(self.inbound.len());
        if avail == 0 {
            return Ok(());
        }

        let Some(upload) = self.upload.as_mut() else {
            return Ok(());
        };

        let chunk = upload.reader.read_up_to(avail)?;
        if chunk.is_empty() {
            return Ok(());
        }

        self.inbound.extend_from_slice(&chunk);
        self.rcount += chunk.len() as u64;
        metrics::record_upload_bytes(chunk.len());

        let drained = self.upload_complete && self.rcount >= upload.reader.len()?;
        if drained {
            self.release_upload();
        }

        if self.active {
            self.events.push_back(BodyEvent::ReadyRead);
            self.try_finish();
        }

        Ok(())
    }

    fn release_upload(&mut self) {
        if let Some(upload) = self.upload.take() {
            tracing::trace!(
                rid = %self.rid,
                path = %upload.reader.path().display(),
                bytes = self.rcount,
                "Upload fully buffered"
            );
        }
    }

    fn try_finish(&mut self) {
        // upload is None once everything is buffered, or if no file was used
        if self.active && self.upload.is_none() && self.state == StreamState::Running {
            self.cleanup();
            self.state = StreamState::Finished;
            self.finished = true;
            self.events.push_back(BodyEvent::Finished);

            metrics::record_body_outcome("finished");
            tracing::debug!(rid = %self.rid, bytes = self.rcount, "Request body finished");
        }
    }

    fn fail(&mut self, error: BodyError) {
        if self.state != StreamState::Running {
            return;
        }

        self.cleanup();
        let condition = error.condition();
        self.state = StreamState::Errored(condition);
        self.events.push_back(BodyEvent::Error(error));

        metrics::record_body_outcome(match condition {
            BodyErrorCondition::Upload => "upload_error",
            BodyErrorCondition::ConnectionLost => "connection_lost",
        });
    }

    fn cleanup(&mut self) {
        self.upload = None;

        if let Some(manager) = self.manager.take() {
            manager.unlink(&self.rid);
        }
    }
}

impl<M: RequestManager> Drop for RequestBodyStream<M> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<M: RequestManager> std::fmt::Debug for RequestBodyStream<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBodyStream")
            .field("rid", &self.rid)
            .field("state", &self.state)
            .field("buffered", &self.inbound.len())
            .field("rcount", &self.rcount)
            .field("file_backed", &self.upload.is_some())
            .finish()
    }
}
