//! Streaming response content.
//!
//! A `Content` delivers response body bytes across any number of
//! non-blocking write attempts. `write_to` reports `Ok(true)` once every
//! byte has been handed to the destination; until then a cursor records how
//! far delivery has progressed, so the next writable event resumes exactly
//! where the previous one stopped. Nothing is ever sent twice and the whole
//! resource is never buffered in memory for the file-backed variant.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::FileExt;

use bytes::Bytes;

/// Bytes read from the backing file per write attempt.
const FILE_CHUNK: usize = 8192;

#[derive(Debug)]
pub enum Content {
    Buffer(BufferContent),
    File(FileContent),
}

impl Content {
    pub fn buffer(data: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Content::Buffer(BufferContent {
            data: data.into(),
            pos: 0,
            content_type: content_type.map(str::to_owned),
        })
    }

    pub fn file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(Content::File(FileContent {
            file: Some(file),
            size,
            offset: 0,
        }))
    }

    /// Writes as many currently-available bytes as the destination will
    /// accept without blocking. Returns `Ok(true)` once the stream is
    /// exhausted; calling again after that is harmless and returns
    /// `Ok(true)` immediately.
    pub fn write_to(&mut self, to: &mut impl Write) -> io::Result<bool> {
        match self {
            Content::Buffer(b) => b.write_to(to),
            Content::File(f) => f.write_to(to),
        }
    }

    /// Total number of bytes this stream will deliver, when known.
    pub fn size(&self) -> Option<u64> {
        match self {
            Content::Buffer(b) => Some(b.data.len() as u64),
            Content::File(f) => Some(f.size),
        }
    }

    /// MIME type, when known.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Content::Buffer(b) => b.content_type.as_deref(),
            Content::File(_) => None,
        }
    }
}

/// A fixed in-memory byte sequence with a delivery cursor.
#[derive(Debug)]
pub struct BufferContent {
    data: Bytes,
    pos: usize,
    content_type: Option<String>,
}

impl BufferContent {
    fn write_to(&mut self, to: &mut impl Write) -> io::Result<bool> {
        if self.pos >= self.data.len() {
            return Ok(true);
        }
        match to.write(&self.data[self.pos..]) {
            Ok(n) => {
                self.pos += n;
                Ok(self.pos >= self.data.len())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// An open file with an offset window into it. The handle is released the
/// first time the window is observed to be exhausted.
#[derive(Debug)]
pub struct FileContent {
    file: Option<File>,
    size: u64,
    offset: u64,
}

impl FileContent {
    fn write_to(&mut self, to: &mut impl Write) -> io::Result<bool> {
        let Some(file) = self.file.as_ref() else {
            return Ok(true);
        };

        let window = (self.size - self.offset).min(FILE_CHUNK as u64) as usize;
        if window == 0 {
            self.file = None;
            return Ok(true);
        }

        let mut chunk = [0u8; FILE_CHUNK];
        let read = file.read_at(&mut chunk[..window], self.offset)?;
        if read == 0 {
            // the file shrank since the size was recorded
            self.file = None;
            return Ok(true);
        }

        match to.write(&chunk[..read]) {
            Ok(n) => {
                self.offset += n as u64;
                if self.offset >= self.size {
                    self.file = None;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
}
