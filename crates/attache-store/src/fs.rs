use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use attache_types::ContentId;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::loader::{BlobResource, BlobResourceLoader, BlobWriter};

/// Directory under the root that holds in-flight uploads.
const STAGING_DIR: &str = ".staging";

/// Filesystem blob loader.
///
/// Layout under `root`:
///
/// ```text
/// root/
///   .staging/            in-flight uploads (temp files)
///   01/92/0192a3...      committed blobs, fanned out by id prefix
/// ```
///
/// Uploads are written to a temp file in `.staging` and published with an
/// atomic rename on commit, so a reader sees either the previous bytes or
/// the new ones, never a truncated file. The staging directory lives on the
/// same filesystem as the blobs, which is what makes the rename atomic.
pub struct FsBlobLoader {
    root: PathBuf,
    staging: PathBuf,
}

impl FsBlobLoader {
    /// Open (or create) a loader rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the committed blob for `id`.
    pub fn blob_path(&self, id: &ContentId) -> PathBuf {
        let s = id.as_str();
        if s.len() >= 4 {
            self.root.join(&s[..2]).join(&s[2..4]).join(s)
        } else {
            self.root.join("_").join(s)
        }
    }

    fn writer(&self, id: ContentId) -> StoreResult<Box<dyn BlobWriter>> {
        let temp = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.staging)?;
        Ok(Box::new(FsWriter {
            target: self.blob_path(&id),
            id,
            temp: Some(temp),
            written: 0,
        }))
    }
}

impl BlobResourceLoader for FsBlobLoader {
    fn resolve(&self, id: &ContentId) -> StoreResult<Box<dyn BlobResource>> {
        let path = self.blob_path(id);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Box::new(FsResource {
                id: id.clone(),
                path,
            })),
            Ok(_) => Err(StoreError::ContentNotFound(id.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::ContentNotFound(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self) -> StoreResult<(ContentId, Box<dyn BlobWriter>)> {
        let id = ContentId::generate();
        let writer = self.writer(id.clone())?;
        Ok((id, writer))
    }

    fn open_write(&self, id: &ContentId) -> StoreResult<Box<dyn BlobWriter>> {
        if !self.blob_path(id).is_file() {
            return Err(StoreError::ContentNotFound(id.clone()));
        }
        self.writer(id.clone())
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

impl std::fmt::Debug for FsBlobLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobLoader")
            .field("root", &self.root)
            .finish()
    }
}

struct FsResource {
    id: ContentId,
    path: PathBuf,
}

impl BlobResource for FsResource {
    fn content_id(&self) -> &ContentId {
        &self.id
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn open_read(&self) -> StoreResult<Box<dyn Read + Send>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            // Deleted between resolve and open.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::ContentNotFound(self.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

struct FsWriter {
    id: ContentId,
    target: PathBuf,
    temp: Option<NamedTempFile>,
    written: u64,
}

impl FsWriter {
    fn temp(&mut self) -> io::Result<&mut NamedTempFile> {
        self.temp
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already committed"))
    }
}

impl Write for FsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.temp()?.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp()?.flush()
    }
}

impl BlobWriter for FsWriter {
    fn commit(mut self: Box<Self>) -> StoreResult<u64> {
        let mut temp = self.temp.take().ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "writer already committed",
            ))
        })?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)?;
        }
        temp.persist(&self.target).map_err(|e| StoreError::Io(e.error))?;
        Ok(self.written)
    }
}

impl Drop for FsWriter {
    fn drop(&mut self) {
        // NamedTempFile removes itself on drop.
        if self.temp.is_some() {
            debug!(content_id = %self.id, bytes = self.written, "discarding uncommitted write");
        }
    }
}
