use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use attache_types::{ContentEntityMetadata, ContentId};
use tracing::{debug, warn};

use crate::config::{OverwritePolicy, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::loader::{BlobResourceLoader, BlobWriter};

/// Optional descriptive attributes supplied with new content.
///
/// `None` leaves the entity's current value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentAttributes {
    pub mime_type: Option<String>,
    pub original_file_name: Option<String>,
}

impl ContentAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_original_file_name(mut self, name: impl Into<String>) -> Self {
        self.original_file_name = Some(name.into());
        self
    }
}

/// A content stream and the size of the blob behind it.
pub struct OpenedContent {
    pub length: u64,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for OpenedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedContent")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Backend-bound engine for setting, getting and unsetting content.
///
/// Every mutation follows write-then-link: the blob is fully written and
/// committed before any attribute of the entity changes, so a failure at any
/// step leaves the entity untouched and no partial blob visible.
pub struct ContentTemplate {
    loader: Arc<dyn BlobResourceLoader>,
    config: StoreConfig,
}

impl ContentTemplate {
    pub fn new(loader: Arc<dyn BlobResourceLoader>, config: StoreConfig) -> Self {
        Self { loader, config }
    }

    pub fn loader(&self) -> &Arc<dyn BlobResourceLoader> {
        &self.loader
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Copy `content` into a blob and link it to the entity.
    ///
    /// Under [`OverwritePolicy::Relink`] every write goes to a new content id
    /// and the id it replaced is returned; the caller hands it to
    /// [`release_content`](Self::release_content) once the entity has been
    /// persisted. Under [`OverwritePolicy::Reuse`] the existing id is
    /// rewritten in place when the backend still knows it.
    pub fn set_content<E>(
        &self,
        metadata: &ContentEntityMetadata<E>,
        entity: &mut E,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> StoreResult<Option<ContentId>> {
        let entity_type = metadata.type_name();
        let previous = metadata.content_id(entity);
        let (content_id, mut writer) = self.open_writer(entity_type, previous.as_ref())?;

        let written = copy_within_window(
            content,
            writer.as_mut(),
            self.config.commit_timeout(),
            self.config.copy_buffer_size,
        )
        .map_err(|e| {
            warn!(entity = entity_type, content_id = %content_id, error = %e, "content write aborted");
            e.with_context(entity_type, &content_id)
        })?;
        writer
            .commit()
            .map_err(|e| e.with_context(entity_type, &content_id))?;

        metadata.set_content_id(entity, Some(content_id.clone()));
        metadata.set_length(entity, written);
        if let Some(mime_type) = attributes.mime_type {
            metadata.set_mime_type(entity, Some(mime_type));
        }
        if let Some(name) = attributes.original_file_name {
            metadata.set_original_file_name(entity, Some(name));
        }
        let version = metadata.bump_version(entity);

        debug!(entity = entity_type, content_id = %content_id, bytes = written, version, "content set");
        Ok(previous.filter(|old| *old != content_id))
    }

    /// Open the entity's content, or `None` if it has none.
    pub fn get_content<E>(
        &self,
        metadata: &ContentEntityMetadata<E>,
        entity: &E,
    ) -> StoreResult<Option<Box<dyn Read + Send>>> {
        Ok(self.open_content(metadata, entity)?.map(|opened| opened.reader))
    }

    /// Open the entity's content together with the size of the blob actually
    /// opened, or `None` if it has none.
    pub fn open_content<E>(
        &self,
        metadata: &ContentEntityMetadata<E>,
        entity: &E,
    ) -> StoreResult<Option<OpenedContent>> {
        let entity_type = metadata.type_name();
        let Some(content_id) = metadata.content_id(entity) else {
            return Ok(None);
        };
        let resource = self
            .loader
            .resolve(&content_id)
            .map_err(|e| e.with_context(entity_type, &content_id))?;
        let length = resource
            .size()
            .map_err(|e| e.with_context(entity_type, &content_id))?;
        let reader = resource
            .open_read()
            .map_err(|e| e.with_context(entity_type, &content_id))?;
        debug!(entity = entity_type, content_id = %content_id, length, "content opened");
        Ok(Some(OpenedContent { length, reader }))
    }

    /// Delete a blob no entity links to any more. Failures are logged, not
    /// returned.
    pub fn release_content(&self, entity_type: &str, content_id: &ContentId) {
        match self.loader.delete(content_id) {
            Ok(()) => debug!(entity = entity_type, content_id = %content_id, "content released"),
            Err(e) => {
                warn!(entity = entity_type, content_id = %content_id, error = %e, "content release failed")
            }
        }
    }

    /// Delete the entity's blob and clear its content attributes.
    ///
    /// The blob is deleted first; if that fails the entity is left unchanged.
    /// The original file name is kept.
    pub fn unset_content<E>(
        &self,
        metadata: &ContentEntityMetadata<E>,
        entity: &mut E,
    ) -> StoreResult<()> {
        let entity_type = metadata.type_name();
        let Some(content_id) = metadata.content_id(entity) else {
            return Ok(());
        };
        if let Err(e) = self.loader.delete(&content_id) {
            warn!(entity = entity_type, content_id = %content_id, error = %e, "content delete failed");
            return Err(e.with_context(entity_type, &content_id));
        }

        metadata.set_content_id(entity, None);
        metadata.set_length(entity, 0);
        metadata.set_mime_type(entity, None);
        let version = metadata.bump_version(entity);

        debug!(entity = entity_type, content_id = %content_id, version, "content unset");
        Ok(())
    }

    fn open_writer(
        &self,
        entity_type: &'static str,
        previous: Option<&ContentId>,
    ) -> StoreResult<(ContentId, Box<dyn BlobWriter>)> {
        if let (OverwritePolicy::Reuse, Some(existing)) = (self.config.overwrite, previous) {
            match self.loader.open_write(existing) {
                Ok(writer) => return Ok((existing.clone(), writer)),
                Err(StoreError::ContentNotFound(_)) => warn!(
                    entity = entity_type,
                    content_id = %existing,
                    "content id unknown to backend, allocating a new one"
                ),
                Err(e) => return Err(e.with_context(entity_type, existing)),
            }
        }
        self.loader
            .create()
            .map_err(|e| e.with_context(entity_type, "<new>"))
    }
}

impl std::fmt::Debug for ContentTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentTemplate")
            .field("backend", &self.loader.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

/// Copy `reader` into `writer`, giving up once `window` has elapsed.
///
/// Reader failures are reported as [`StoreError::Interrupted`] (or
/// [`StoreError::CommitTimeout`] for timed-out reads) and writer failures as
/// raw I/O errors, so the caller can tell a vanished client from a failing
/// backend.
fn copy_within_window(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    window: Duration,
    buffer_size: usize,
) -> StoreResult<u64> {
    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut written = 0u64;
    loop {
        if Instant::now() > deadline {
            return Err(StoreError::CommitTimeout {
                limit: window,
                written,
            });
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(StoreError::CommitTimeout {
                    limit: window,
                    written,
                })
            }
            Err(e) => return Err(StoreError::Interrupted(e)),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
    }
    if Instant::now() > deadline {
        return Err(StoreError::CommitTimeout {
            limit: window,
            written,
        });
    }
    writer.flush()?;
    Ok(written)
}
