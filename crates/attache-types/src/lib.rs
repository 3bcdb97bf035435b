//! Foundation types for Attaché.
//!
//! Attaché attaches binary content (files, images, documents) to structured
//! entities. This crate holds the vocabulary every other Attaché crate shares:
//!
//! # Key Types
//!
//! - [`ContentId`] — Opaque identifier of a blob inside a storage backend
//! - [`ContentEntity`] — Capability trait for entities that carry content
//! - [`ContentState`] — Snapshot of an entity's content attributes
//! - [`ContentEntityMetadata`] — Typed accessor table for one entity type
//! - [`MetadataRegistry`] — Process-wide, lazily populated accessor registry
//! - [`ETag`] — Entity tag derived from content state

pub mod content_id;
pub mod entity;
pub mod error;
pub mod etag;
pub mod metadata;

pub use content_id::ContentId;
pub use entity::{ContentEntity, ContentState};
pub use error::TypeError;
pub use etag::ETag;
pub use metadata::{ContentAccessors, ContentEntityMetadata, MetadataRegistry};
