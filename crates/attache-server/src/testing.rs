//! Shared fixtures for unit tests.

use std::sync::Arc;

use attache_store::{
    EntityRepository, InMemoryBlobLoader, InMemoryEntityRepository, Store, StoreConfig,
    StoreFactory,
};
use attache_types::{ContentEntity, ContentId};
use axum::Router;

use crate::endpoint::StoreEndpoint;
use crate::router::build_router;
use crate::state::AppState;

pub const GREETING: &[u8] = b"Hello Spring Content World!";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub content_id: Option<ContentId>,
    pub content_length: u64,
    pub mime_type: Option<String>,
    pub original_file_name: Option<String>,
    pub version: u64,
}

impl ContentEntity for Document {
    fn content_id(&self) -> Option<&ContentId> {
        self.content_id.as_ref()
    }
    fn set_content_id(&mut self, id: Option<ContentId>) {
        self.content_id = id;
    }
    fn content_length(&self) -> u64 {
        self.content_length
    }
    fn set_content_length(&mut self, length: u64) {
        self.content_length = length;
    }
    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
    fn set_mime_type(&mut self, mime_type: Option<String>) {
        self.mime_type = mime_type;
    }
    fn original_file_name(&self) -> Option<&str> {
        self.original_file_name.as_deref()
    }
    fn set_original_file_name(&mut self, name: Option<String>) {
        self.original_file_name = name;
    }
    fn content_version(&self) -> u64 {
        self.version
    }
    fn set_content_version(&mut self, version: u64) {
        self.version = version;
    }
}

pub type DocumentRepository = InMemoryEntityRepository<Document, u64>;

/// A `documents` store over an in-memory backend, seeded with document 1.
pub fn document_store(config: StoreConfig) -> (Arc<DocumentRepository>, Store<Document, u64>) {
    let repo = Arc::new(InMemoryEntityRepository::new(|d: &Document| d.id));
    repo.insert(Document {
        id: 1,
        title: "greeting".into(),
        ..Default::default()
    });
    let store = StoreFactory::<Document, u64>::for_entity("documents")
        .loader(Arc::new(InMemoryBlobLoader::new()))
        .config(config)
        .repository(repo.clone())
        .build()
        .unwrap();
    (repo, store)
}

pub fn document_endpoint() -> (Arc<DocumentRepository>, StoreEndpoint<Document, u64>) {
    let (repo, store) = document_store(StoreConfig::default());
    (repo, StoreEndpoint::new(store))
}

/// Router serving the `documents` store.
pub fn document_app(config: StoreConfig, max_body_size: usize) -> (Arc<DocumentRepository>, Router) {
    let (repo, _store, app) = document_app_with_store(config, max_body_size);
    (repo, app)
}

/// Router serving the `documents` store, plus a handle on that store.
pub fn document_app_with_store(
    config: StoreConfig,
    max_body_size: usize,
) -> (Arc<DocumentRepository>, Store<Document, u64>, Router) {
    let state = AppState::new(&config);
    let (repo, store) = document_store(config);
    let state = state.with_store(store.clone()).unwrap();
    (repo, store, build_router(state, max_body_size))
}

pub fn find(repo: &DocumentRepository, id: u64) -> Document {
    repo.find_by_id(&id).unwrap().unwrap()
}
