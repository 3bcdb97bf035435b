//! Shared fixtures for unit tests.

use std::io::{self, Read, Write};
use std::sync::Arc;

use attache_types::{ContentEntity, ContentEntityMetadata, ContentId};

use crate::error::{StoreError, StoreResult};
use crate::loader::{BlobResource, BlobResourceLoader, BlobWriter};
use crate::memory::InMemoryBlobLoader;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Doc {
    pub id: u32,
    pub content_id: Option<ContentId>,
    pub len: u64,
    pub mime_type: Option<String>,
    pub original_file_name: Option<String>,
    pub version: u64,
}

impl Doc {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

impl ContentEntity for Doc {
    fn content_id(&self) -> Option<&ContentId> {
        self.content_id.as_ref()
    }
    fn set_content_id(&mut self, id: Option<ContentId>) {
        self.content_id = id;
    }
    fn content_length(&self) -> u64 {
        self.len
    }
    fn set_content_length(&mut self, length: u64) {
        self.len = length;
    }
    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
    fn set_mime_type(&mut self, mime_type: Option<String>) {
        self.mime_type = mime_type;
    }
    fn original_file_name(&self) -> Option<&str> {
        self.original_file_name.as_deref()
    }
    fn set_original_file_name(&mut self, name: Option<String>) {
        self.original_file_name = name;
    }
    fn content_version(&self) -> u64 {
        self.version
    }
    fn set_content_version(&mut self, version: u64) {
        self.version = version;
    }
}

pub fn doc_metadata() -> ContentEntityMetadata<Doc> {
    ContentEntityMetadata::of()
}

pub fn read_all(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    out
}

/// Failure modes for [`FlakyLoader`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Faults {
    pub fail_delete: bool,
    pub fail_write_after: Option<usize>,
    pub fail_commit: bool,
}

/// Wraps an in-memory loader and injects backend failures.
pub struct FlakyLoader {
    pub inner: Arc<InMemoryBlobLoader>,
    pub faults: Faults,
}

impl FlakyLoader {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: Arc::new(InMemoryBlobLoader::new()),
            faults,
        }
    }

    fn wrap(&self, writer: Box<dyn BlobWriter>) -> Box<dyn BlobWriter> {
        Box::new(FlakyWriter {
            inner: writer,
            written: 0,
            faults: self.faults,
        })
    }
}

impl BlobResourceLoader for FlakyLoader {
    fn resolve(&self, id: &ContentId) -> StoreResult<Box<dyn BlobResource>> {
        self.inner.resolve(id)
    }

    fn create(&self) -> StoreResult<(ContentId, Box<dyn BlobWriter>)> {
        let (id, writer) = self.inner.create()?;
        Ok((id, self.wrap(writer)))
    }

    fn open_write(&self, id: &ContentId) -> StoreResult<Box<dyn BlobWriter>> {
        let writer = self.inner.open_write(id)?;
        Ok(self.wrap(writer))
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        if self.faults.fail_delete {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "connection lost",
            )));
        }
        self.inner.delete(id)
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

struct FlakyWriter {
    inner: Box<dyn BlobWriter>,
    written: usize,
    faults: Faults,
}

impl Write for FlakyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.faults.fail_write_after {
            if self.written + buf.len() > limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
        }
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl BlobWriter for FlakyWriter {
    fn commit(self: Box<Self>) -> StoreResult<u64> {
        if self.faults.fail_commit {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "commit rejected",
            )));
        }
        self.inner.commit()
    }
}

/// A reader that yields one byte per call after sleeping.
pub struct SlowReader {
    pub remaining: usize,
    pub delay: std::time::Duration,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        std::thread::sleep(self.delay);
        buf[0] = b'x';
        self.remaining -= 1;
        Ok(1)
    }
}

/// A reader that fails after yielding some bytes, like a dropped client.
pub struct BrokenReader {
    pub data: io::Cursor<Vec<u8>>,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "client disconnected",
            )),
            n => Ok(n),
        }
    }
}
