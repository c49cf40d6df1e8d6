//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::batch::{BatchOp, WriteBatch};

use super::MemTableEntry;

/// In-memory table for recent writes
///
/// Size accounting: a value costs `key + value` bytes, a tombstone costs
/// `key` bytes. Sizes and counts are kept under the same lock as the map.
pub struct MemTable {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    size: usize,
}

impl Inner {
    /// Insert an entry, returning the new approximate size
    fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let key_len = key.len();
        let value_len = entry.value_len();
        match self.data.insert(key, entry) {
            // Same key: only the value portion changes
            Some(old) => self.size = self.size - old.value_len() + value_len,
            None => self.size += key_len + value_len,
        }
        self.size
    }
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Get an entry by key (read lock)
    ///
    /// `Some(Tombstone)` means the key was deleted here and older storage
    /// must not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.inner.read().data.get(key).cloned()
    }

    /// Put a key-value pair (write lock), returning the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.inner.write().insert(key, MemTableEntry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone), returning the new size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.inner.write().insert(key, MemTableEntry::Tombstone)
    }

    /// Apply every operation of a batch under one write lock
    pub fn apply_batch(&self, batch: WriteBatch) -> usize {
        let mut inner = self.inner.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => inner.insert(key, MemTableEntry::Value(value)),
                BatchOp::Delete { key } => inner.insert(key, MemTableEntry::Tombstone),
            };
        }
        inner.size
    }

    /// All entries (values and tombstones) whose key starts with `prefix`,
    /// in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, MemTableEntry)> {
        let inner = self.inner.read();
        inner
            .data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.inner
            .read()
            .data
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.size = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
