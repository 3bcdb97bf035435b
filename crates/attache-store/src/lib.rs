//! Content store engine for Attaché.
//!
//! This crate binds binary content to entities. A [`Store`] is the typed
//! facade an application talks to; it forwards to a [`ContentTemplate`],
//! which drives a [`BlobResourceLoader`] and writes the resulting content
//! attributes back into the entity through its
//! [`ContentEntityMetadata`](attache_types::ContentEntityMetadata).
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobResourceLoader`] trait:
//!
//! - [`InMemoryBlobLoader`] -- `HashMap`-based loader for tests and embedding
//! - [`FsBlobLoader`] -- one file per content id under a root directory
//!
//! # Design Rules
//!
//! 1. Writes are invisible until committed; a dropped writer discards its data.
//! 2. Write-then-link: commit the blob, then update the entity's attributes.
//! 3. A failed operation leaves the entity exactly as it was.
//! 4. Every content mutation bumps the entity's content version.
//! 5. All I/O errors are propagated with entity and content-id context.

pub mod config;
pub mod error;
pub mod factory;
pub mod fs;
pub mod loader;
pub mod memory;
pub mod repository;
pub mod store;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{OverwritePolicy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use factory::StoreFactory;
pub use fs::FsBlobLoader;
pub use loader::{BlobResource, BlobResourceLoader, BlobWriter};
pub use memory::InMemoryBlobLoader;
pub use repository::{EntityRepository, InMemoryEntityRepository};
pub use store::Store;
pub use template::{ContentAttributes, ContentTemplate, OpenedContent};
