use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::content_id::ContentId;
use crate::entity::{ContentEntity, ContentState};

/// Raw accessor functions for the content attributes of entity type `E`.
///
/// Fill this in by hand for types that cannot implement [`ContentEntity`]
/// (foreign types, generated code) and register it with
/// [`MetadataRegistry::register`].
pub struct ContentAccessors<E> {
    pub content_id: fn(&E) -> Option<ContentId>,
    pub set_content_id: fn(&mut E, Option<ContentId>),
    pub length: fn(&E) -> u64,
    pub set_length: fn(&mut E, u64),
    pub mime_type: fn(&E) -> Option<String>,
    pub set_mime_type: fn(&mut E, Option<String>),
    pub original_file_name: fn(&E) -> Option<String>,
    pub set_original_file_name: fn(&mut E, Option<String>),
    pub version: fn(&E) -> u64,
    pub set_version: fn(&mut E, u64),
}

impl<E> Clone for ContentAccessors<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for ContentAccessors<E> {}

/// Typed accessor table for one entity type.
///
/// Pure attribute access: no I/O and no validation beyond the types.
pub struct ContentEntityMetadata<E> {
    type_name: &'static str,
    accessors: ContentAccessors<E>,
}

impl<E> ContentEntityMetadata<E> {
    /// Build a table from hand-written accessors.
    pub fn new(accessors: ContentAccessors<E>) -> Self {
        Self {
            type_name: short_type_name::<E>(),
            accessors,
        }
    }

    /// Short name of the entity type, used in logs and errors.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn content_id(&self, entity: &E) -> Option<ContentId> {
        (self.accessors.content_id)(entity)
    }

    pub fn set_content_id(&self, entity: &mut E, id: Option<ContentId>) {
        (self.accessors.set_content_id)(entity, id)
    }

    pub fn length(&self, entity: &E) -> u64 {
        (self.accessors.length)(entity)
    }

    pub fn set_length(&self, entity: &mut E, length: u64) {
        (self.accessors.set_length)(entity, length)
    }

    pub fn mime_type(&self, entity: &E) -> Option<String> {
        (self.accessors.mime_type)(entity)
    }

    pub fn set_mime_type(&self, entity: &mut E, mime_type: Option<String>) {
        (self.accessors.set_mime_type)(entity, mime_type)
    }

    pub fn original_file_name(&self, entity: &E) -> Option<String> {
        (self.accessors.original_file_name)(entity)
    }

    pub fn set_original_file_name(&self, entity: &mut E, name: Option<String>) {
        (self.accessors.set_original_file_name)(entity, name)
    }

    pub fn version(&self, entity: &E) -> u64 {
        (self.accessors.version)(entity)
    }

    /// Advance the content version by one and return the new value.
    pub fn bump_version(&self, entity: &mut E) -> u64 {
        let next = self.version(entity).wrapping_add(1);
        (self.accessors.set_version)(entity, next);
        next
    }

    /// Snapshot every content attribute of `entity`.
    pub fn state(&self, entity: &E) -> ContentState {
        ContentState {
            content_id: self.content_id(entity),
            length: self.length(entity),
            mime_type: self.mime_type(entity),
            original_file_name: self.original_file_name(entity),
            version: self.version(entity),
        }
    }
}

impl<E: ContentEntity> ContentEntityMetadata<E> {
    /// Build the table from the entity's [`ContentEntity`] implementation.
    pub fn of() -> Self {
        Self::new(ContentAccessors {
            content_id: |e| e.content_id().cloned(),
            set_content_id: |e, id| e.set_content_id(id),
            length: |e| e.content_length(),
            set_length: |e, len| e.set_content_length(len),
            mime_type: |e| e.mime_type().map(str::to_owned),
            set_mime_type: |e, m| e.set_mime_type(m),
            original_file_name: |e| e.original_file_name().map(str::to_owned),
            set_original_file_name: |e, n| e.set_original_file_name(n),
            version: |e| e.content_version(),
            set_version: |e, v| e.set_content_version(v),
        })
    }
}

impl<E> fmt::Debug for ContentEntityMetadata<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentEntityMetadata")
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn short_type_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    // Strip the module path but keep generic arguments intact.
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Registry of [`ContentEntityMetadata`] tables keyed by entity type.
///
/// Entries are created lazily on first use and never evicted. Concurrent
/// population is safe: when two threads race to create the table for the
/// same type, the first insert wins and both observe the same `Arc`.
pub struct MetadataRegistry {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

static GLOBAL_REGISTRY: OnceLock<MetadataRegistry> = OnceLock::new();

impl MetadataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static MetadataRegistry {
        GLOBAL_REGISTRY.get_or_init(MetadataRegistry::new)
    }

    /// Register a hand-written table for `E`.
    ///
    /// If `E` already has a table the existing one is kept and returned.
    pub fn register<E: 'static>(
        &self,
        metadata: ContentEntityMetadata<E>,
    ) -> Arc<ContentEntityMetadata<E>> {
        self.insert_if_absent(|| metadata)
    }

    /// Look up the table for `E`, if one has been registered or created.
    pub fn lookup<E: 'static>(&self) -> Option<Arc<ContentEntityMetadata<E>>> {
        let entries = self.entries.read().expect("lock poisoned");
        entries
            .get(&TypeId::of::<E>())
            .cloned()
            .and_then(|entry| entry.downcast::<ContentEntityMetadata<E>>().ok())
    }

    /// Return the table for `E`, creating it from `E`'s [`ContentEntity`]
    /// implementation on first use.
    pub fn get_or_create<E: ContentEntity>(&self) -> Arc<ContentEntityMetadata<E>> {
        if let Some(existing) = self.lookup::<E>() {
            return existing;
        }
        self.insert_if_absent(ContentEntityMetadata::<E>::of)
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no entity type is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_if_absent<E: 'static>(
        &self,
        make: impl FnOnce() -> ContentEntityMetadata<E>,
    ) -> Arc<ContentEntityMetadata<E>> {
        let mut entries = self.entries.write().expect("lock poisoned");
        let entry = entries
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(make()) as Arc<dyn Any + Send + Sync>)
            .clone();
        drop(entries);
        entry
            .downcast::<ContentEntityMetadata<E>>()
            .unwrap_or_else(|_| unreachable!("registry entries are keyed by their own TypeId"))
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("entity_types", &self.len())
            .finish()
    }
}
