use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::deletion_handling_key;
use crate::meta_namespace_key;
use crate::DeletedObject;
use crate::KeyError;
use crate::Object;

/// Thread-safe key to object store reflecting the last observed state.
///
/// Objects are handed out as `Arc<T>` so a worker holding one never blocks
/// writers.
#[derive(Debug)]
pub struct Indexer<T> {
    items: DashMap<String, Arc<T>>,
}

impl<T> Default for Indexer<T> {
    fn default() -> Self {
        Self { items: DashMap::new() }
    }
}

impl<T: Object> Indexer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached object, or `None` if the key was never seen or has
    /// been deleted.
    pub fn get_by_key(
        &self,
        key: &str,
    ) -> Option<Arc<T>> {
        self.items.get(key).map(|entry| entry.value().clone())
    }

    pub fn add(
        &self,
        obj: T,
    ) -> Result<String, KeyError> {
        self.update(obj)
    }

    /// Inserts or replaces the object, returning its key.
    pub fn update(
        &self,
        obj: T,
    ) -> Result<String, KeyError> {
        let key = meta_namespace_key(&obj)?;
        trace!("cache store {}", key);
        self.items.insert(key.clone(), Arc::new(obj));
        Ok(key)
    }

    /// Removes the entry a delete notification refers to, returning its key.
    pub fn delete(
        &self,
        deleted: &DeletedObject<T>,
    ) -> Result<String, KeyError> {
        let key = deletion_handling_key(deleted)?;
        self.delete_by_key(&key);
        Ok(key)
    }

    pub fn delete_by_key(
        &self,
        key: &str,
    ) -> Option<Arc<T>> {
        trace!("cache delete {}", key);
        self.items.remove(key).map(|(_, obj)| obj)
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.items.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn list(&self) -> Vec<Arc<T>> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
