//! HTTP server for Attaché.
//!
//! Publishes content stores under `/{store}/{id}` with conditional request
//! handling: every response carries the entity's current `ETag`, and
//! `If-Match` / `If-None-Match` are evaluated before any content is read or
//! written. Uploads stream from the request body into the store on a blocking
//! thread; downloads stream back the same way.

pub mod body;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AttacheConfig, Backend, ServerConfig, StorageConfig};
pub use endpoint::{ContentEndpoint, ContentHead, ReadOutcome, StoreEndpoint, WriteOutcome};
pub use error::{ServerError, ServerResult};
pub use server::AttacheServer;
pub use state::AppState;
