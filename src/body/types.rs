//! Request identity, frontend packets, errors and events for body streams.

use std::fmt;
use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

use crate::http::HttpRequestData;

/// Identity of a request within the frontend manager's routing table.
///
/// A pair of (sender channel id, per-sender request id). Immutable once
/// assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rid {
    pub sender: Bytes,
    pub id: Bytes,
}

impl Rid {
    pub fn new(sender: impl Into<Bytes>, id: impl Into<Bytes>) -> Self {
        Self {
            sender: sender.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            String::from_utf8_lossy(&self.sender),
            String::from_utf8_lossy(&self.id)
        )
    }
}

/// An incoming request as handed over by the frontend listener.
///
/// Either `body` holds the complete body, or `upload_file` names a file the
/// frontend keeps appending the body to.
#[derive(Debug, Clone, Default)]
pub struct RequestPacket {
    pub sender: Bytes,
    pub id: Bytes,
    pub request: HttpRequestData,
    pub body: Bytes,
    pub upload_file: Option<PathBuf>,
}

impl RequestPacket {
    pub fn rid(&self) -> Rid {
        Rid::new(self.sender.clone(), self.id.clone())
    }
}

/// Coarse error kind reported to the owner of a body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyErrorCondition {
    /// The upload file could not be opened, watched or read.
    Upload,
    /// The frontend connection went away before the body completed.
    ConnectionLost,
}

/// Errors that end a body stream.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("unable to open upload file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("unable to read upload file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("unable to watch upload file {}: {source}", path.display())]
    Watch { path: PathBuf, source: notify::Error },

    #[error("upload file {} shrank to {len} bytes after {consumed} were read", path.display())]
    Truncated { path: PathBuf, len: u64, consumed: u64 },

    #[error("connection lost before body completed")]
    ConnectionLost,
}

impl BodyError {
    pub fn condition(&self) -> BodyErrorCondition {
        match self {
            BodyError::ConnectionLost => BodyErrorCondition::ConnectionLost,
            _ => BodyErrorCondition::Upload,
        }
    }
}

/// Events delivered by a body stream, in order: any number of
/// `ReadyRead`, then exactly one of `Finished` or `Error`.
#[derive(Debug)]
pub enum BodyEvent {
    ReadyRead,
    Finished,
    Error(BodyError),
}

impl BodyEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BodyEvent::ReadyRead)
    }
}
