use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use attache_store::{Store, StoreConfig};

use crate::endpoint::{ContentEndpoint, StoreEndpoint};
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    stores: Arc<BTreeMap<String, Arc<dyn ContentEndpoint>>>,
    upload_window: Duration,
    chunk_size: usize,
}

impl AppState {
    /// Empty state; uploads use the commit window and chunk size of `config`.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            stores: Arc::new(BTreeMap::new()),
            upload_window: config.commit_timeout(),
            chunk_size: config.copy_buffer_size.max(1),
        }
    }

    /// Publish an endpoint under its name.
    pub fn with_endpoint(mut self, endpoint: Arc<dyn ContentEndpoint>) -> ServerResult<Self> {
        let name = endpoint.name().to_owned();
        let stores = Arc::make_mut(&mut self.stores);
        if stores.contains_key(&name) {
            return Err(ServerError::Config(format!("store `{name}` registered twice")));
        }
        tracing::info!(store = %name, "store registered");
        stores.insert(name, endpoint);
        Ok(self)
    }

    /// Publish a typed store.
    pub fn with_store<E, Id>(self, store: Store<E, Id>) -> ServerResult<Self>
    where
        E: Send + Sync + 'static,
        Id: FromStr + fmt::Display + Send + Sync + 'static,
    {
        self.with_endpoint(Arc::new(StoreEndpoint::new(store)))
    }

    pub fn endpoint(&self, name: &str) -> ServerResult<Arc<dyn ContentEndpoint>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::StoreNotFound(name.to_owned()))
    }

    /// Registered store names, sorted.
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn upload_window(&self) -> Duration {
        self.upload_window
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.store_names())
            .field("upload_window", &self.upload_window)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
