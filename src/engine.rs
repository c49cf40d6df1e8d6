//! Engine Module
//!
//! The embedded ordered store that coordinates WAL, MemTable and SSTables.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply write batches atomically with respect to crashes
//! - Serve point lookups and ordered prefix scans
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::batch::WriteBatch;
use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The ordered key-value engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write_batch/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get/scan_prefix): no write_lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - StorageManager takes its own lock for SSTable file seeks
///
/// Cross-key consistency for readers (never observing half of a batch) is
/// the caller's concern; the database layer holds a per-database RwLock
/// around every command.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations (put/delete/write_batch/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine rooted at `config.data_dir`
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush what was recovered
    /// 4. Start a fresh WAL
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery_result) = WalRecovery::recover(&wal_path)?;

            if recovery_result.entries_recovered > 0 || recovery_result.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery_result.entries_recovered,
                    recovery_result.entries_corrupted,
                    recovery_result.last_lsn
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                    Operation::Batch(batch) => {
                        memtable.apply_batch(batch);
                    }
                }
            }

            // Recovered data must be durable in an SSTable before the WAL
            // is reset below
            if !memtable.is_empty() {
                tracing::debug!(
                    "Flushing {} recovered entries to SSTable",
                    memtable.entry_count()
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }

        self.storage.get(key)
    }

    /// Every live `(key, value)` whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged = self.storage.scan_prefix(prefix)?;

        // MemTable entries are newer than anything on disk
        for (key, entry) in self.memtable.scan_prefix(prefix) {
            merged.insert(key, entry.into_value());
        }

        Ok(merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        let new_size = self.memtable.put(key.to_vec(), value.to_vec());
        self.maybe_flush(new_size)
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;

        let new_size = self.memtable.delete(key.to_vec());
        self.maybe_flush(new_size)
    }

    /// Apply a batch of puts and deletes atomically
    ///
    /// The batch is one WAL entry: after a crash either every operation is
    /// replayed or none is.
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();

        let op_count = batch.len();
        self.wal.lock().append(Operation::Batch(batch.clone()))?;

        let new_size = self.memtable.apply_batch(batch);
        tracing::trace!("Applied batch of {} operations", op_count);
        self.maybe_flush(new_size)
    }

    /// Delete many keys in one atomic batch
    pub fn delete_batch<I, K>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let mut batch = WriteBatch::new();
        for key in keys {
            batch.delete(key);
        }
        self.write_batch(batch)
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Flush if the memtable grew past its limit (called with write lock held)
    fn maybe_flush(&self, memtable_size: usize) -> Result<()> {
        if memtable_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        if !self.memtable.is_empty() {
            self.flush()?;
        }

        self.wal.lock().sync()?;
        tracing::debug!("Engine at {} closed", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
