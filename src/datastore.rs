//! The datastore seam.
//!
//! The deserializer only ever asks a datastore whether an ancestor exists;
//! saving, dumping and flushing use the rest of [`Datastore`]. Two
//! implementations ship with the crate: [`MemoryDatastore`] here and
//! [`crate::persist::SqliteDatastore`].
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{LoaddataError, Result};
use crate::key::Key;
use crate::model::FieldValue;

// ------------- Entity -------------
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, FieldValue>,
}
impl Entity {
    pub fn new(key: Key, properties: BTreeMap<String, FieldValue>) -> Self {
        Self { key, properties }
    }
    pub fn key(&self) -> &Key {
        &self.key
    }
    pub fn kind(&self) -> &str {
        self.key.kind()
    }
    pub fn properties(&self) -> &BTreeMap<String, FieldValue> {
        &self.properties
    }
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.properties.get(name)
    }
    pub fn into_parts(self) -> (Key, BTreeMap<String, FieldValue>) {
        (self.key, self.properties)
    }
}

pub trait Datastore {
    fn get(&self, key: &Key) -> Result<Option<Entity>>;
    /// Inserts or replaces the entity stored under its key.
    fn put(&self, entity: Entity) -> Result<()>;
    /// Every stored entity, ancestors before their descendants.
    fn scan(&self) -> Result<Vec<Entity>>;
    /// Deletes everything and returns how many entities were removed.
    fn flush(&self) -> Result<usize>;
}

// ------------- MemoryDatastore -------------
#[derive(Debug, Default, Clone)]
pub struct MemoryDatastore {
    entities: Arc<Mutex<BTreeMap<Key, Entity>>>,
}
impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Key, Entity>>> {
        self.entities.lock().map_err(|e| LoaddataError::Lock(e.to_string()))
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        Ok(self.lock()?.get(key).cloned())
    }
    fn put(&self, entity: Entity) -> Result<()> {
        self.lock()?.insert(entity.key().clone(), entity);
        Ok(())
    }
    fn scan(&self) -> Result<Vec<Entity>> {
        // keys order by path, so ancestors already come first
        Ok(self.lock()?.values().cloned().collect())
    }
    fn flush(&self) -> Result<usize> {
        let mut entities = self.lock()?;
        let removed = entities.len();
        entities.clear();
        Ok(removed)
    }
}
