//! Engine Tests
//!
//! Tests verify:
//! - Point reads and writes across memtable and SSTables
//! - Atomic batches and prefix scans
//! - Flush triggering and WAL reset
//! - Durability across close/reopen and crash recovery

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use emberkv::config::WalSyncStrategy;
use emberkv::wal::{Operation, WalEntry};
use emberkv::{Config, Engine, WriteBatch};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config(dir: &TempDir, memtable_limit: usize) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .memtable_size_limit(memtable_limit)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn wal_len(dir: &TempDir) -> u64 {
    std::fs::metadata(dir.path().join("wal.log")).unwrap().len()
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_put_get_delete() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();

    assert_eq!(engine.get(b"k").unwrap(), None);
    engine.put(b"k", b"v1").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v1".to_vec()));
    engine.put(b"k", b"v2").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
    engine.delete(b"k").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);
}

#[test]
fn test_tombstone_shadows_flushed_value() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();

    engine.put(b"k", b"on-disk").unwrap();
    engine.flush().unwrap();
    assert_eq!(engine.sstable_count(), 1);

    engine.delete(b"k").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);

    engine.flush().unwrap();
    assert_eq!(engine.get(b"k").unwrap(), None);
}

// =============================================================================
// Batch and Scan Tests
// =============================================================================

#[test]
fn test_write_batch_applies_everything() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();
    engine.put(b"doomed", b"x").unwrap();

    let mut batch = WriteBatch::new();
    batch.put("a", "1").put("b", "2").delete("doomed");
    engine.write_batch(batch).unwrap();

    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"doomed").unwrap(), None);
}

#[test]
fn test_empty_batch_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();

    engine.write_batch(WriteBatch::new()).unwrap();
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(wal_len(&temp), 0);
}

#[test]
fn test_delete_batch() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    engine.put(b"c", b"3").unwrap();

    engine.delete_batch(vec![b"a".to_vec(), b"c".to_vec()]).unwrap();

    assert_eq!(engine.get(b"a").unwrap(), None);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"c").unwrap(), None);
}

#[test]
fn test_scan_prefix_merges_memtable_over_sstables() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();

    engine.put(b"p:a", b"1").unwrap();
    engine.put(b"p:b", b"2").unwrap();
    engine.put(b"p:c", b"3").unwrap();
    engine.put(b"q:a", b"other").unwrap();
    engine.flush().unwrap();

    engine.put(b"p:b", b"20").unwrap();
    engine.delete(b"p:c").unwrap();
    engine.put(b"p:d", b"4").unwrap();

    let scanned = engine.scan_prefix(b"p:").unwrap();
    assert_eq!(
        scanned,
        vec![
            (b"p:a".to_vec(), b"1".to_vec()),
            (b"p:b".to_vec(), b"20".to_vec()),
            (b"p:d".to_vec(), b"4".to_vec()),
        ]
    );
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_triggered_by_size_limit() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(small_config(&temp, 256)).unwrap();

    for i in 0..64 {
        engine
            .put(format!("key{:03}", i).as_bytes(), &[b'v'; 16])
            .unwrap();
    }

    assert!(engine.sstable_count() >= 1);
    assert!(engine.memtable_size() < 256);
    for i in 0..64 {
        assert_eq!(
            engine.get(format!("key{:03}", i).as_bytes()).unwrap(),
            Some(vec![b'v'; 16])
        );
    }
}

#[test]
fn test_flush_resets_wal() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();

    engine.put(b"k", b"v").unwrap();
    assert!(wal_len(&temp) > 0);

    engine.flush().unwrap();
    assert_eq!(wal_len(&temp), 0);
    assert_eq!(engine.memtable_entry_count(), 0);
}

#[test]
fn test_flush_of_empty_memtable_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();
    engine.flush().unwrap();
    assert_eq!(engine.sstable_count(), 0);
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_data_survives_close_and_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open_path(temp.path()).unwrap();
        engine.put(b"kept", b"yes").unwrap();
        engine.put(b"removed", b"no").unwrap();
        engine.delete(b"removed").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp.path()).unwrap();
    assert_eq!(engine.get(b"kept").unwrap(), Some(b"yes".to_vec()));
    assert_eq!(engine.get(b"removed").unwrap(), None);
}

#[test]
fn test_recovery_from_wal_without_close() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(small_config(&temp, 64 * 1024 * 1024)).unwrap();
        let mut batch = WriteBatch::new();
        batch.put("h:a", "1").put("h:b", "2");
        engine.write_batch(batch).unwrap();
        engine.put(b"solo", b"x").unwrap();
        // Dropped without close: only the WAL holds the data
    }

    let engine = Engine::open_path(temp.path()).unwrap();
    assert_eq!(engine.get(b"h:a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"h:b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"solo").unwrap(), Some(b"x".to_vec()));
    // Recovered data was flushed and the WAL started over
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(wal_len(&temp), 0);
}

#[test]
fn test_crash_during_flush_leaves_no_torn_table() {
    let temp = TempDir::new().unwrap();
    let storage_dir = {
        let engine = Engine::open(small_config(&temp, 64 * 1024 * 1024)).unwrap();
        let mut batch = WriteBatch::new();
        batch.put("user:name", "ada").put("user:lang", "en");
        engine.write_batch(batch).unwrap();
        engine.storage_dir().to_path_buf()
    };

    // A flush that died after writing only the header
    let partial = storage_dir.join("sstable_000001.sst.tmp");
    std::fs::write(&partial, b"EMKV\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00junkjunkjunkj").unwrap();

    let engine = Engine::open_path(temp.path()).unwrap();
    assert_eq!(engine.get(b"user:name").unwrap(), Some(b"ada".to_vec()));
    assert_eq!(engine.get(b"user:lang").unwrap(), Some(b"en".to_vec()));
    assert!(!partial.exists());

    // Recovery flushed a complete table under its final name only
    let names: Vec<String> = std::fs::read_dir(&storage_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["sstable_000001.sst".to_string()]);
    assert_eq!(engine.sstable_count(), 1);
}

#[test]
fn test_torn_batch_is_not_half_applied() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(small_config(&temp, 64 * 1024 * 1024)).unwrap();
        engine.put(b"before", b"ok").unwrap();
    }

    // Simulate a crash halfway through writing a batch entry
    let mut batch = WriteBatch::new();
    batch.put("t:a", "1").put("t:b", "2").put("t:c", "3");
    let torn = WalEntry::new(2, Operation::Batch(batch)).serialize().unwrap();
    let mut wal = OpenOptions::new()
        .append(true)
        .open(temp.path().join("wal.log"))
        .unwrap();
    wal.write_all(&torn[..torn.len() - 5]).unwrap();
    drop(wal);

    let engine = Engine::open_path(temp.path()).unwrap();
    assert_eq!(engine.get(b"before").unwrap(), Some(b"ok".to_vec()));
    assert!(engine.scan_prefix(b"t:").unwrap().is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(small_config(&temp, 4 * 1024)).unwrap());

    crossbeam::scope(|scope| {
        for t in 0..4 {
            let engine = Arc::clone(&engine);
            scope.spawn(move |_| {
                for i in 0..100 {
                    let key = format!("t{}:{:03}", t, i);
                    engine.put(key.as_bytes(), key.as_bytes()).unwrap();
                }
            });
        }
        for _ in 0..2 {
            let engine = Arc::clone(&engine);
            scope.spawn(move |_| {
                for _ in 0..50 {
                    engine.scan_prefix(b"t0:").unwrap();
                }
            });
        }
    })
    .unwrap();

    for t in 0..4 {
        let scanned = engine.scan_prefix(format!("t{}:", t).as_bytes()).unwrap();
        assert_eq!(scanned.len(), 100);
        assert!(scanned.iter().all(|(k, v)| k == v));
    }
}
