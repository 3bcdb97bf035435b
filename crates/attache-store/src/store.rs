use std::fmt;
use std::io::Read;
use std::sync::Arc;

use attache_types::{ContentEntityMetadata, ContentId, ContentState, ETag};

use crate::error::{StoreError, StoreResult};
use crate::repository::EntityRepository;
use crate::template::{ContentAttributes, ContentTemplate, OpenedContent};

/// Typed content facade for one entity/id type pair.
///
/// A `Store` owns no entities. The entity-based operations mutate the value
/// they are given and leave persisting it to the caller; the `*_by_id`
/// variants resolve and save through the store's [`EntityRepository`].
///
/// Built by [`StoreFactory`](crate::StoreFactory).
pub struct Store<E, Id> {
    name: String,
    template: Arc<ContentTemplate>,
    metadata: Arc<ContentEntityMetadata<E>>,
    repository: Option<Arc<dyn EntityRepository<E, Id>>>,
}

impl<E, Id> Store<E, Id> {
    pub(crate) fn from_parts(
        name: String,
        template: Arc<ContentTemplate>,
        metadata: Arc<ContentEntityMetadata<E>>,
        repository: Option<Arc<dyn EntityRepository<E, Id>>>,
    ) -> Self {
        Self {
            name,
            template,
            metadata,
            repository,
        }
    }

    /// Name the store is published under (the `{store}` path segment).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &ContentTemplate {
        &self.template
    }

    pub fn metadata(&self) -> &ContentEntityMetadata<E> {
        &self.metadata
    }

    /// Attach (or replace) the entity's content.
    ///
    /// Returns the content id the write superseded, if any. Pass it to
    /// [`release_content`](Self::release_content) after the entity is saved.
    pub fn set_content(
        &self,
        entity: &mut E,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> StoreResult<Option<ContentId>> {
        self.template
            .set_content(&self.metadata, entity, content, attributes)
    }

    /// Open the entity's content, or `None` if it has none.
    pub fn get_content(&self, entity: &E) -> StoreResult<Option<Box<dyn Read + Send>>> {
        self.template.get_content(&self.metadata, entity)
    }

    /// Open the entity's content along with the size of the opened blob.
    pub fn open_content(&self, entity: &E) -> StoreResult<Option<OpenedContent>> {
        self.template.open_content(&self.metadata, entity)
    }

    /// Delete a blob that no saved entity links to.
    pub fn release_content(&self, content_id: &ContentId) {
        self.template
            .release_content(self.metadata.type_name(), content_id)
    }

    /// Remove the entity's content.
    pub fn unset_content(&self, entity: &mut E) -> StoreResult<()> {
        self.template.unset_content(&self.metadata, entity)
    }

    /// Snapshot the entity's content attributes.
    pub fn state(&self, entity: &E) -> ContentState {
        self.metadata.state(entity)
    }
}

impl<E, Id: fmt::Display> Store<E, Id> {
    /// Derive the entity's current tag. Recomputed on every call.
    pub fn etag(&self, id: &Id, entity: &E) -> ETag {
        ETag::derive(
            self.metadata.type_name(),
            &id.to_string(),
            &self.metadata.state(entity),
        )
    }

    /// Resolve an entity through the repository.
    pub fn find(&self, id: &Id) -> StoreResult<E> {
        self.repository()?
            .find_by_id(id)?
            .ok_or_else(|| StoreError::EntityNotFound(format!("{}/{id}", self.name)))
    }

    /// Persist an entity through the repository.
    pub fn save(&self, entity: E) -> StoreResult<E> {
        self.repository()?.save(entity)
    }

    /// Set content on `entity` and save it.
    ///
    /// The superseded blob is released only after the save succeeds; if the
    /// save fails the newly written blob is released instead, so the stored
    /// entity keeps pointing at its previous content.
    pub fn set_content_and_save(
        &self,
        mut entity: E,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> StoreResult<E> {
        let previous = self.metadata.content_id(&entity);
        let superseded = self.set_content(&mut entity, content, attributes)?;
        let linked = self.metadata.content_id(&entity);
        match self.save(entity) {
            Ok(saved) => {
                if let Some(old) = superseded {
                    self.release_content(&old);
                }
                Ok(saved)
            }
            Err(e) => {
                if let Some(new) = linked.filter(|new| previous.as_ref() != Some(new)) {
                    self.release_content(&new);
                }
                Err(e)
            }
        }
    }

    /// Resolve, set content, and save.
    pub fn set_content_by_id(
        &self,
        id: &Id,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> StoreResult<E> {
        let entity = self.find(id)?;
        self.set_content_and_save(entity, content, attributes)
    }

    /// Resolve and open content.
    pub fn get_content_by_id(&self, id: &Id) -> StoreResult<Option<Box<dyn Read + Send>>> {
        let entity = self.find(id)?;
        self.get_content(&entity)
    }

    /// Resolve, unset content, and save.
    pub fn unset_content_by_id(&self, id: &Id) -> StoreResult<E> {
        let mut entity = self.find(id)?;
        self.unset_content(&mut entity)?;
        self.save(entity)
    }

    fn repository(&self) -> StoreResult<&Arc<dyn EntityRepository<E, Id>>> {
        self.repository.as_ref().ok_or_else(|| {
            StoreError::Configuration(format!("store `{}` has no entity repository", self.name))
        })
    }
}

impl<E, Id> Clone for Store<E, Id> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            template: Arc::clone(&self.template),
            metadata: Arc::clone(&self.metadata),
            repository: self.repository.clone(),
        }
    }
}

impl<E, Id> fmt::Debug for Store<E, Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("entity", &self.metadata.type_name())
            .field("backend", &self.template.loader().backend_name())
            .field("has_repository", &self.repository.is_some())
            .finish()
    }
}
