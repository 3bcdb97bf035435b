use serde::{Deserialize, Serialize};

use crate::content_id::ContentId;

/// Capability implemented by domain entities that carry content.
///
/// An entity owns its content attributes; Attaché only reads and writes them
/// through this interface (usually via a [`ContentEntityMetadata`] table
/// built from it) and never keeps a reference to the entity itself.
///
/// `content_version` is a counter the content engine bumps on every
/// mutation. It is what makes an overwrite with the same id and the same
/// length still produce a fresh entity tag.
///
/// [`ContentEntityMetadata`]: crate::ContentEntityMetadata
pub trait ContentEntity: Send + Sync + 'static {
    fn content_id(&self) -> Option<&ContentId>;
    fn set_content_id(&mut self, id: Option<ContentId>);

    fn content_length(&self) -> u64;
    fn set_content_length(&mut self, length: u64);

    fn mime_type(&self) -> Option<&str>;
    fn set_mime_type(&mut self, mime_type: Option<String>);

    fn original_file_name(&self) -> Option<&str>;
    fn set_original_file_name(&mut self, name: Option<String>);

    fn content_version(&self) -> u64;
    fn set_content_version(&mut self, version: u64);
}

/// Point-in-time snapshot of an entity's content attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentState {
    pub content_id: Option<ContentId>,
    pub length: u64,
    pub mime_type: Option<String>,
    pub original_file_name: Option<String>,
    pub version: u64,
}

impl ContentState {
    /// Returns `true` if content is attached.
    pub fn has_content(&self) -> bool {
        self.content_id.is_some()
    }
}
