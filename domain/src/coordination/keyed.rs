//! Keyed collection with idempotent upsert.
//!
//! Inbound snapshots are delivered at-least-once, so every owned collection
//! merges by identity: replace if the key exists, append otherwise. The
//! collection keeps first-observation order for the read boundary while
//! lookups go through a key index.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Entities with a stable identity.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// What an [`KeyedCollection::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Insertion-ordered collection with O(1) replace-by-key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedCollection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> KeyedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry with the same key, or append a new one.
    pub fn upsert(&mut self, item: T) -> Upsert {
        if let Some(pos) = self.index.get(item.key()).copied() {
            self.items[pos] = item;
            return Upsert::Replaced;
        }
        self.index.insert(item.key().to_string(), self.items.len());
        self.items.push(item);
        Upsert::Inserted
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keep only the most recent `max` entries, dropping the oldest.
    pub fn retain_last(&mut self, max: usize) {
        if self.items.len() <= max {
            return;
        }
        let excess = self.items.len() - max;
        self.items.drain(..excess);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.key().to_string(), pos))
            .collect();
    }
}

impl<T> KeyedCollection<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Ordered view in first-observation order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

impl<'a, T> IntoIterator for &'a KeyedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Keyed> FromIterator<T> for KeyedCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.upsert(item);
        }
        collection
    }
}

impl<T: Serialize> Serialize for KeyedCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + Keyed> Deserialize<'de> for KeyedCollection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}
