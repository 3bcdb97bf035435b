use std::io::{Read, Write};

use attache_types::ContentId;

use crate::error::{StoreError, StoreResult};

/// A writable stream into a backend resource.
///
/// Nothing written becomes visible to resolvers until [`commit`] returns.
/// Dropping a writer without committing discards everything written, which
/// is how aborted and timed-out uploads are cleaned up.
///
/// [`commit`]: BlobWriter::commit
pub trait BlobWriter: Write + Send {
    /// Publish the written bytes and return how many were published.
    fn commit(self: Box<Self>) -> StoreResult<u64>;
}

/// A resolved backend resource.
pub trait BlobResource: Send {
    /// The id this resource was resolved from.
    fn content_id(&self) -> &ContentId;

    /// Size of the stored bytes.
    fn size(&self) -> StoreResult<u64>;

    /// Open a readable stream over the stored bytes.
    ///
    /// The stream is released when dropped.
    fn open_read(&self) -> StoreResult<Box<dyn Read + Send>>;
}

/// Backend adapter resolving, creating and deleting physical resources by
/// opaque content id.
///
/// All implementations must satisfy these invariants:
/// - `resolve` and `open_write` fail with [`StoreError::ContentNotFound`]
///   for ids the backend does not know.
/// - Writes are staged: no partial state is visible to other resolvers
///   until the writer is committed.
/// - `delete` of an absent id is a no-op.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobResourceLoader: Send + Sync {
    /// Resolve an existing content id.
    fn resolve(&self, id: &ContentId) -> StoreResult<Box<dyn BlobResource>>;

    /// Allocate a new content id and return a writer for it.
    ///
    /// The id is not resolvable until the writer is committed.
    fn create(&self) -> StoreResult<(ContentId, Box<dyn BlobWriter>)>;

    /// Open a writer that replaces the bytes of an existing content id.
    fn open_write(&self, id: &ContentId) -> StoreResult<Box<dyn BlobWriter>>;

    /// Delete a content id. Deleting an absent id succeeds.
    fn delete(&self, id: &ContentId) -> StoreResult<()>;

    /// Check whether a content id is resolvable.
    fn exists(&self, id: &ContentId) -> StoreResult<bool> {
        match self.resolve(id) {
            Ok(_) => Ok(true),
            Err(StoreError::ContentNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
