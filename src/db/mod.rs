//! Database Module
//!
//! Typed records on top of the ordered engine, behind one reader/writer
//! lock per logical database.
//!
//! ## Locking
//! ```text
//!   command ──► Database::read()  ──► &Keyspace      (lookups, scans)
//!           └─► Database::write() ──► &mut Keyspace  (anything that may mutate)
//! ```
//!
//! Mutating [`Keyspace`] methods take `&mut self`, so they can only be
//! reached through the exclusive guard. Guards release on drop, which covers
//! every early return in a command handler.

mod hash;
mod keyspace;

use std::path::Path;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

pub use hash::Field;
pub use keyspace::Keyspace;

/// Type of value a record key currently holds.
///
/// The tag byte is persisted in metadata entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    String = 0x01,
    List = 0x02,
    Hash = 0x03,
    Set = 0x04,
    SortedSet = 0x05,
}

impl DataType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(DataType::String),
            0x02 => Some(DataType::List),
            0x03 => Some(DataType::Hash),
            0x04 => Some(DataType::Set),
            0x05 => Some(DataType::SortedSet),
            _ => None,
        }
    }

    /// Name reported by the TYPE command
    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::List => "list",
            DataType::Hash => "hash",
            DataType::Set => "set",
            DataType::SortedSet => "zset",
        }
    }
}

/// One logical database: a keyspace and the lock that guards it
pub struct Database {
    index: usize,
    keyspace: RwLock<Keyspace>,
}

impl Database {
    /// Open the database stored under `config.data_dir`
    pub fn open(index: usize, config: Config) -> Result<Self> {
        let engine = Engine::open(config)?;
        Ok(Self {
            index,
            keyspace: RwLock::new(Keyspace::new(engine)),
        })
    }

    /// Open a standalone database at `path` with default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(0, Config::builder().data_dir(path).build())
    }

    /// Shared access for read-only commands
    pub fn read(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.keyspace.read()
    }

    /// Exclusive access for commands that may mutate
    pub fn write(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.keyspace.write()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Flush and close the underlying engine
    pub fn close(self) -> Result<()> {
        self.keyspace.into_inner().into_engine().close()
    }
}

/// The fixed set of logical databases a server exposes
pub struct Databases {
    databases: Vec<Database>,
}

impl Databases {
    /// Open `config.databases` databases, each in its own directory
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut databases = Vec::with_capacity(config.databases);
        for index in 0..config.databases {
            let mut db_config = config.clone();
            db_config.data_dir = config.database_dir(index);
            databases.push(Database::open(index, db_config)?);
        }

        tracing::info!(
            "Opened {} databases under {}",
            databases.len(),
            config.data_dir.display()
        );
        Ok(Self { databases })
    }

    pub fn get(&self, index: usize) -> Option<&Database> {
        self.databases.get(index)
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Close every database, reporting the first failure
    pub fn close(self) -> Result<()> {
        let mut first_err = None;
        for db in self.databases {
            let index = db.index();
            if let Err(e) = db.close() {
                tracing::error!("Failed to close database {}: {}", index, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
