//! Shared utilities for body stream and inspection tests.

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use gateway_core::body::{BodyEvent, RequestBodyStream, RequestManager, RequestPacket, Rid};
use gateway_core::http::HttpRequestData;
use gateway_core::inspect::{InspectId, InspectManager, InspectRequestPacket, ReplySender};

/// Request manager that records every unlink.
#[derive(Default)]
pub struct RecordingManager {
    pub unlinked: Mutex<Vec<Rid>>,
}

impl RecordingManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unlink_count(&self) -> usize {
        self.unlinked.lock().unwrap().len()
    }
}

impl RequestManager for RecordingManager {
    type Response = Rid;

    fn unlink(&self, rid: &Rid) {
        self.unlinked.lock().unwrap().push(rid.clone());
    }

    fn create_response(&self, rid: &Rid) -> Rid {
        rid.clone()
    }
}

/// Inspection manager with a switchable write readiness.
pub struct ScriptedInspectManager {
    pub writable: AtomicBool,
    pub written: Mutex<Vec<(InspectRequestPacket, ReplySender)>>,
    pub unlinks: AtomicUsize,
}

impl ScriptedInspectManager {
    pub fn new(writable: bool) -> Arc<Self> {
        Arc::new(Self {
            writable: AtomicBool::new(writable),
            written: Mutex::new(Vec::new()),
            unlinks: AtomicUsize::new(0),
        })
    }

    pub fn write_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

impl InspectManager for ScriptedInspectManager {
    fn can_write_immediately(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    fn write(&self, packet: InspectRequestPacket, reply: ReplySender) {
        self.written.lock().unwrap().push((packet, reply));
    }

    fn unlink(&self, _id: &InspectId) {
        self.unlinks.fetch_add(1, Ordering::SeqCst);
    }
}

/// An upload file the test appends to, as a frontend would.
pub struct UploadFile {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl UploadFile {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::File::create(&path).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, data: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(&self.path).unwrap();
        file.write_all(data).unwrap();
        file.sync_all().unwrap();
    }

    pub fn truncate(&self) {
        OpenOptions::new().write(true).open(&self.path).unwrap().set_len(0).unwrap();
    }
}

pub fn inline_packet(id: &'static str, body: Vec<u8>) -> RequestPacket {
    RequestPacket {
        sender: Bytes::from_static(b"frontend-1"),
        id: Bytes::from_static(id.as_bytes()),
        request: HttpRequestData::default(),
        body: Bytes::from(body),
        upload_file: None,
    }
}

pub fn file_packet(id: &'static str, path: &Path) -> RequestPacket {
    RequestPacket {
        sender: Bytes::from_static(b"frontend-1"),
        id: Bytes::from_static(id.as_bytes()),
        request: HttpRequestData::new(http::Method::POST, "/upload", http::HeaderMap::new()),
        body: Bytes::new(),
        upload_file: Some(path.to_path_buf()),
    }
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Wait for the next event, failing the test instead of hanging.
pub async fn next_event<M: RequestManager>(stream: &mut RequestBodyStream<M>) -> Option<BodyEvent> {
    tokio::time::timeout(Duration::from_secs(10), stream.next_event())
        .await
        .expect("timed out waiting for body event")
}
