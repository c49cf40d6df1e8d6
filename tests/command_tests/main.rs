//! Command integration tests
//!
//! Commands run through the dispatch table against real databases in a
//! temporary directory; the server tests go over TCP.

mod server_tests;

use std::sync::Arc;

use emberkv::commands::{CommandTable, Session};
use emberkv::protocol::{Command, Reply};
use emberkv::{Config, Databases};
use tempfile::TempDir;

/// Databases, a dispatch table and a session on database 0
pub struct Harness {
    pub _dir: TempDir,
    pub config: Config,
    pub databases: Arc<Databases>,
    pub table: CommandTable,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_memtable_limit(Config::default().memtable_size_limit)
    }

    /// A harness whose memtables flush once they exceed `limit` bytes
    pub fn with_memtable_limit(limit: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(dir.path())
            .databases(2)
            .memtable_size_limit(limit)
            .build();
        let databases = Arc::new(Databases::open(&config).unwrap());

        Self {
            _dir: dir,
            config,
            session: Session::new(Arc::clone(&databases)),
            databases,
            table: CommandTable::new(),
        }
    }

    /// Close every database and open them again from disk
    pub fn reopen(self) -> Self {
        let Harness {
            _dir,
            config,
            databases,
            table,
            session,
        } = self;
        drop(session);

        let databases = Arc::try_unwrap(databases).ok().unwrap();
        databases.close().unwrap();

        let databases = Arc::new(Databases::open(&config).unwrap());
        Self {
            _dir,
            config,
            session: Session::new(Arc::clone(&databases)),
            databases,
            table,
        }
    }

    /// Run one command given as words
    pub fn run(&mut self, words: &[&str]) -> Reply {
        let command = Command::from_parts(words.iter().map(|w| w.as_bytes().to_vec()).collect())
            .unwrap();
        self.table.execute(&command, &mut self.session).unwrap()
    }
}

pub fn bulk(s: &str) -> Reply {
    Reply::Bulk(s.as_bytes().to_vec())
}

pub fn bulks(items: &[&str]) -> Reply {
    Reply::Array(items.iter().map(|s| bulk(s)).collect())
}
