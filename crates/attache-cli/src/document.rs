//! Demo entity served by `attache serve`.

use std::sync::Arc;

use attache_store::{
    BlobResourceLoader, InMemoryEntityRepository, Store, StoreConfig, StoreFactory, StoreResult,
};
use attache_types::{ContentEntity, ContentId};

/// Name the demo store is published under.
pub const STORE_NAME: &str = "documents";

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

/// Build the `documents` store over `loader`, with documents `1..=seed`
/// held in an in-memory repository.
pub fn document_store(
    loader: Arc<dyn BlobResourceLoader>,
    config: StoreConfig,
    seed: u64,
) -> StoreResult<Store<Document, u64>> {
    let repository = Arc::new(InMemoryEntityRepository::new(|d: &Document| d.id));
    for id in 1..=seed {
        repository.insert(Document {
            id,
            title: format!("Document {id}"),
            ..Default::default()
        });
    }
    StoreFactory::<Document, u64>::for_entity(STORE_NAME)
        .loader(loader)
        .config(config)
        .repository(repository)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attache_store::{InMemoryBlobLoader, StoreError};
    use std::io::{Cursor, Read};

    fn store(seed: u64) -> Store<Document, u64> {
        document_store(Arc::new(InMemoryBlobLoader::new()), StoreConfig::default(), seed).unwrap()
    }

    #[test]
    fn seeds_documents() {
        let store = store(2);
        assert_eq!(store.name(), STORE_NAME);
        assert_eq!(store.find(&1).unwrap().title, "Document 1");
        assert_eq!(store.find(&2).unwrap().title, "Document 2");
        assert!(matches!(store.find(&3), Err(StoreError::EntityNotFound(_))));
    }

    #[test]
    fn content_round_trip() {
        let store = store(1);
        let saved = store
            .set_content_by_id(
                &1,
                &mut Cursor::new(b"attached".to_vec()),
                attache_store::ContentAttributes::new().with_mime_type("text/plain"),
            )
            .unwrap();
        assert_eq!(saved.content_length, 8);
        assert_eq!(saved.version, 1);

        let mut out = String::new();
        store
            .get_content_by_id(&1)
            .unwrap()
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "attached");
    }
}
