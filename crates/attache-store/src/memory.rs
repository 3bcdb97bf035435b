use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use attache_types::ContentId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::loader::{BlobResource, BlobResourceLoader, BlobWriter};

type BlobMap = Arc<RwLock<HashMap<ContentId, Arc<[u8]>>>>;

/// In-memory, HashMap-based blob loader.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock`;
/// resolved resources keep a snapshot of the bytes, so readers are never
/// affected by a concurrent overwrite.
pub struct InMemoryBlobLoader {
    blobs: BlobMap,
}

impl InMemoryBlobLoader {
    /// Create a new empty loader.
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no blob is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Remove all blobs.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }

    fn writer(&self, id: ContentId) -> Box<dyn BlobWriter> {
        Box::new(MemoryWriter {
            id,
            buf: Vec::new(),
            blobs: Arc::clone(&self.blobs),
            committed: false,
        })
    }
}

impl Default for InMemoryBlobLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobResourceLoader for InMemoryBlobLoader {
    fn resolve(&self, id: &ContentId) -> StoreResult<Box<dyn BlobResource>> {
        let map = self.blobs.read().expect("lock poisoned");
        let data = map
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ContentNotFound(id.clone()))?;
        Ok(Box::new(MemoryResource {
            id: id.clone(),
            data,
        }))
    }

    fn create(&self) -> StoreResult<(ContentId, Box<dyn BlobWriter>)> {
        let id = ContentId::generate();
        Ok((id.clone(), self.writer(id)))
    }

    fn open_write(&self, id: &ContentId) -> StoreResult<Box<dyn BlobWriter>> {
        if !self.blobs.read().expect("lock poisoned").contains_key(id) {
            return Err(StoreError::ContentNotFound(id.clone()));
        }
        Ok(self.writer(id.clone()))
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        self.blobs.write().expect("lock poisoned").remove(id);
        Ok(())
    }

    fn exists(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.blobs.read().expect("lock poisoned").contains_key(id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryBlobLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobLoader")
            .field("blob_count", &self.len())
            .finish()
    }
}

struct MemoryResource {
    id: ContentId,
    data: Arc<[u8]>,
}

impl BlobResource for MemoryResource {
    fn content_id(&self) -> &ContentId {
        &self.id
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn open_read(&self) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }
}

struct MemoryWriter {
    id: ContentId,
    buf: Vec<u8>,
    blobs: BlobMap,
    committed: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MemoryWriter {
    fn commit(mut self: Box<Self>) -> StoreResult<u64> {
        let data: Arc<[u8]> = std::mem::take(&mut self.buf).into();
        let size = data.len() as u64;
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(self.id.clone(), data);
        self.committed = true;
        Ok(size)
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.committed {
            debug!(content_id = %self.id, bytes = self.buf.len(), "discarding uncommitted write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_blob(loader: &InMemoryBlobLoader, data: &[u8]) -> ContentId {
        let (id, mut writer) = loader.create().unwrap();
        writer.write_all(data).unwrap();
        assert_eq!(writer.commit().unwrap(), data.len() as u64);
        id
    }

    fn read_all(resource: &dyn BlobResource) -> Vec<u8> {
        let mut out = Vec::new();
        resource.open_read().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn create_commit_resolve() {
        let loader = InMemoryBlobLoader::new();
        let id = write_blob(&loader, b"hello world");
        let resource = loader.resolve(&id).unwrap();
        assert_eq!(resource.content_id(), &id);
        assert_eq!(resource.size().unwrap(), 11);
        assert_eq!(read_all(resource.as_ref()), b"hello world");
    }

    #[test]
    fn overwrite_existing() {
        let loader = InMemoryBlobLoader::new();
        let id = write_blob(&loader, b"first");
        let mut writer = loader.open_write(&id).unwrap();
        writer.write_all(b"second version").unwrap();
        writer.commit().unwrap();
        assert_eq!(read_all(loader.resolve(&id).unwrap().as_ref()), b"second version");
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn open_write_unknown_is_not_found() {
        let loader = InMemoryBlobLoader::new();
        let id = ContentId::generate();
        assert!(matches!(
            loader.open_write(&id),
            Err(StoreError::ContentNotFound(_))
        ));
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let loader = InMemoryBlobLoader::new();
        assert!(matches!(
            loader.resolve(&ContentId::generate()),
            Err(StoreError::ContentNotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Staged writes
    // -----------------------------------------------------------------------

    #[test]
    fn uncommitted_create_is_invisible() {
        let loader = InMemoryBlobLoader::new();
        let (id, mut writer) = loader.create().unwrap();
        writer.write_all(b"partial").unwrap();
        assert!(!loader.exists(&id).unwrap());
        drop(writer);
        assert!(!loader.exists(&id).unwrap());
        assert!(loader.is_empty());
    }

    #[test]
    fn dropped_overwrite_keeps_previous_bytes() {
        let loader = InMemoryBlobLoader::new();
        let id = write_blob(&loader, b"stable");
        let mut writer = loader.open_write(&id).unwrap();
        writer.write_all(b"trunc").unwrap();
        drop(writer);
        assert_eq!(read_all(loader.resolve(&id).unwrap().as_ref()), b"stable");
    }

    #[test]
    fn resolved_snapshot_survives_overwrite() {
        let loader = InMemoryBlobLoader::new();
        let id = write_blob(&loader, b"old");
        let resource = loader.resolve(&id).unwrap();
        let mut writer = loader.open_write(&id).unwrap();
        writer.write_all(b"new").unwrap();
        writer.commit().unwrap();
        assert_eq!(read_all(resource.as_ref()), b"old");
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_present_and_absent() {
        let loader = InMemoryBlobLoader::new();
        let id = write_blob(&loader, b"to-delete");
        loader.delete(&id).unwrap();
        assert!(!loader.exists(&id).unwrap());
        // Second delete is a no-op.
        loader.delete(&id).unwrap();
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn total_bytes_and_clear() {
        let loader = InMemoryBlobLoader::new();
        write_blob(&loader, b"12345");
        write_blob(&loader, b"123456789");
        assert_eq!(loader.total_bytes(), 14);
        loader.clear();
        assert!(loader.is_empty());
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::thread;

        let loader = Arc::new(InMemoryBlobLoader::new());
        let id = write_blob(&loader, b"shared data");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                let id = id.clone();
                thread::spawn(move || {
                    let resource = loader.resolve(&id).unwrap();
                    assert_eq!(read_all(resource.as_ref()), b"shared data");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let loader = InMemoryBlobLoader::new();
        write_blob(&loader, b"x");
        let debug = format!("{loader:?}");
        assert!(debug.contains("InMemoryBlobLoader"));
        assert!(debug.contains("blob_count"));
    }
}
