//! Result cache keyed by content hash.
//!
//! Shared between concurrent module evaluations. Reads are read-through and
//! each hash is written at most once: the first stored value is the one
//! every later caller sees.

use crate::analyzer::manifests::storage::ContentHash;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<ContentHash, V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &ContentHash) -> Option<V> {
        self.entries.read().get(hash).cloned()
    }

    /// Store `value` unless the hash already has one. Returns the value that
    /// is cached afterwards.
    pub fn insert(&self, hash: ContentHash, value: V) -> V {
        self.entries.write().entry(hash).or_insert(value).clone()
    }

    /// Return the cached value, computing and storing it on a miss.
    ///
    /// `compute` runs without the lock held, so two threads missing on the
    /// same hash may both compute; only the first result is kept.
    pub fn get_or_insert_with(&self, hash: &ContentHash, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(hash) {
            log::trace!("result cache hit for {}", hash);
            return value;
        }
        let value = compute();
        self.insert(hash.clone(), value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
