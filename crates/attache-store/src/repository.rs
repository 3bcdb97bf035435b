use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use crate::error::StoreResult;

/// Entity lookup and persistence collaborator.
///
/// Attaché does not persist entities itself. A [`Store`](crate::Store) that
/// is given a repository can resolve ids to entities and hand mutated
/// entities back for saving.
pub trait EntityRepository<E, Id>: Send + Sync {
    /// Find an entity by id. Returns `Ok(None)` if it does not exist.
    fn find_by_id(&self, id: &Id) -> StoreResult<Option<E>>;

    /// Persist an entity and return the stored value.
    fn save(&self, entity: E) -> StoreResult<E>;
}

/// In-memory, HashMap-based entity repository.
///
/// Intended for tests and the demo server. Entities are keyed by the id that
/// `key` extracts from them.
pub struct InMemoryEntityRepository<E, Id> {
    entities: RwLock<HashMap<Id, E>>,
    key: fn(&E) -> Id,
}

impl<E, Id> InMemoryEntityRepository<E, Id>
where
    E: Clone,
    Id: Eq + Hash,
{
    /// Create an empty repository keyed by `key`.
    pub fn new(key: fn(&E) -> Id) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            key,
        }
    }

    /// Insert or replace an entity.
    pub fn insert(&self, entity: E) {
        let id = (self.key)(&entity);
        self.entities
            .write()
            .expect("lock poisoned")
            .insert(id, entity);
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.read().expect("lock poisoned").is_empty()
    }
}

impl<E, Id> EntityRepository<E, Id> for InMemoryEntityRepository<E, Id>
where
    E: Clone + Send + Sync,
    Id: Eq + Hash + Send + Sync,
{
    fn find_by_id(&self, id: &Id) -> StoreResult<Option<E>> {
        Ok(self.entities.read().expect("lock poisoned").get(id).cloned())
    }

    fn save(&self, entity: E) -> StoreResult<E> {
        self.insert(entity.clone());
        Ok(entity)
    }
}

impl<E, Id> std::fmt::Debug for InMemoryEntityRepository<E, Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.entities.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("InMemoryEntityRepository")
            .field("entity_count", &count)
            .finish()
    }
}
