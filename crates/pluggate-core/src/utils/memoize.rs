//! Compute-once-per-key caching.
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

/// Caches the result of a computation per key.
///
/// Concurrent callers asking for the same missing key share one cell: the
/// first one runs the computation while the others block on the cell and
/// receive the same value. The map lock is never held while computing.
pub struct Memoizer<K, V> {
    cells: RwLock<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Memoizer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, computing it on first use.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        let existing = self.cells.read().get(&key).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(self.cells.write().entry(key.clone()).or_default()),
        };
        cell.get_or_init(|| compute(&key)).clone()
    }

    /// Returns the cached value without computing anything.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cells.read().get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    pub fn clear(&self) {
        self.cells.write().clear();
    }
}

impl<K, V> Default for Memoizer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Memoizer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizer")
            .field("entries", &self.cells.read().len())
            .finish()
    }
}
