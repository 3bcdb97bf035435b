use std::sync::Arc;

use attache_types::{ContentEntity, ContentEntityMetadata, MetadataRegistry};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::loader::BlobResourceLoader;
use crate::repository::EntityRepository;
use crate::store::Store;
use crate::template::ContentTemplate;

/// Builder binding a [`ContentTemplate`] to an entity/id type pair.
///
/// Either a ready template or a loader (plus an optional [`StoreConfig`]) must
/// be supplied. Metadata comes from, in order: an explicit
/// [`metadata`](Self::metadata) call, or the global [`MetadataRegistry`].
/// Missing pieces fail [`build`](Self::build) with
/// [`StoreError::Configuration`], before any request is served.
pub struct StoreFactory<E, Id> {
    name: String,
    template: Option<Arc<ContentTemplate>>,
    loader: Option<Arc<dyn BlobResourceLoader>>,
    config: StoreConfig,
    metadata: Option<Arc<ContentEntityMetadata<E>>>,
    repository: Option<Arc<dyn EntityRepository<E, Id>>>,
}

impl<E: 'static, Id> StoreFactory<E, Id> {
    /// Start building a store published under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: None,
            loader: None,
            config: StoreConfig::default(),
            metadata: None,
            repository: None,
        }
    }

    /// Use an existing template. Takes precedence over [`loader`](Self::loader).
    pub fn template(mut self, template: Arc<ContentTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    /// Build a fresh template over `loader`.
    pub fn loader(mut self, loader: Arc<dyn BlobResourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Template configuration, used together with [`loader`](Self::loader).
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metadata(mut self, metadata: Arc<ContentEntityMetadata<E>>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn EntityRepository<E, Id>>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Validate the collected parts and build the store.
    pub fn build(self) -> StoreResult<Store<E, Id>> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Configuration("store name cannot be empty".into()));
        }
        if self.name.contains('/') {
            return Err(StoreError::Configuration(format!(
                "store name `{}` cannot contain '/'",
                self.name
            )));
        }

        let template = match (self.template, self.loader) {
            (Some(template), _) => template,
            (None, Some(loader)) => Arc::new(ContentTemplate::new(loader, self.config)),
            (None, None) => {
                return Err(StoreError::Configuration(format!(
                    "store `{}`: template cannot be null",
                    self.name
                )))
            }
        };

        let metadata = self
            .metadata
            .or_else(|| MetadataRegistry::global().lookup::<E>())
            .ok_or_else(|| {
                StoreError::Configuration(format!(
                    "store `{}`: no content metadata registered for {}",
                    self.name,
                    std::any::type_name::<E>()
                ))
            })?;

        info!(
            store = %self.name,
            entity = metadata.type_name(),
            backend = template.loader().backend_name(),
            "content store built"
        );
        Ok(Store::from_parts(self.name, template, metadata, self.repository))
    }
}

impl<E: ContentEntity, Id> StoreFactory<E, Id> {
    /// Start building a store for a [`ContentEntity`] type, registering its
    /// metadata table in the global registry on first use.
    pub fn for_entity(name: impl Into<String>) -> Self {
        Self::new(name).metadata(MetadataRegistry::global().get_or_create::<E>())
    }
}
