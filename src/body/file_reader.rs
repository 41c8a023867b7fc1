//! Incremental reader for an upload file that may still be growing.
//!
//! # Responsibilities
//! - Pull at most a byte budget from the current cursor
//! - Keep the cursor anchored on the last byte handed out, so bytes appended
//!   later are picked up on the next read without reopening the file
//! - Report the current file size for the "fully drained" check
//!
//! # Preconditions
//! - The frontend only appends to the file. A file that becomes shorter than
//!   what was already read is reported as [`BodyError::Truncated`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::body::types::BodyError;

#[derive(Debug)]
pub struct BufferedFileReader {
    path: PathBuf,
    file: File,
    position: u64,
}

impl BufferedFileReader {
    /// Open the upload file for reading from the start.
    pub fn open(path: &Path) -> Result<Self, BodyError> {
        let file = File::open(path).map_err(|source| BodyError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current size of the file on disk.
    pub fn len(&self) -> Result<u64, BodyError> {
        self.file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|source| self.read_error(source))
    }

    /// Read up to `budget` bytes from the cursor.
    ///
    /// An empty result means the file has not grown since the last call.
    pub fn read_up_to(&mut self, budget: usize) -> Result<Bytes, BodyError> {
        if budget == 0 {
            return Ok(Bytes::new());
        }

        let len = self.len()?;
        if len < self.position {
            return Err(BodyError::Truncated {
                path: self.path.clone(),
                len,
                consumed: self.position,
            });
        }

        let start = self.position;
        let mut buf = Vec::new();
        let read = (&mut self.file).take(budget as u64).read_to_end(&mut buf);
        read.map_err(|source| self.read_error(source))?;

        // step back from EOF onto the last byte we hand out
        let end = start + buf.len() as u64;
        self.file
            .seek(SeekFrom::Start(end))
            .map_err(|source| self.read_error(source))?;
        self.position = end;

        Ok(Bytes::from(buf))
    }

    fn read_error(&self, source: std::io::Error) -> BodyError {
        BodyError::Read {
            path: self.path.clone(),
            source,
        }
    }
}
