//! # EmberKV
//!
//! A RESP-speaking hash store on an embedded LSM engine:
//! - Field-map (hash) records with per-key type metadata
//! - Atomic write batches logged as single WAL entries
//! - Crash recovery with partial write handling
//! - One reader/writer lock per logical database
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Server (RESP2, one thread/conn)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Command Table  (HGET, HSET, DEL, ...)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  read() / write() guard
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │            Database → Keyspace (metadata + fields)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  WriteBatch / prefix scan
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod batch;
pub mod engine;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod db;
pub mod keys;

pub mod commands;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use batch::WriteBatch;
pub use config::Config;
pub use db::{DataType, Database, Databases};
pub use engine::Engine;
pub use error::{EmberError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
