//! Command Module
//!
//! Dispatch from command names to handlers.
//!
//! ```text
//!   Command ──► CommandTable::execute ──► arity check ──► handler(args, session)
//!                                                            │
//!                                      Reply ◄───────────────┤ (client errors become
//!                                      EmberError ◄──────────┘  error replies)
//! ```
//!
//! Handlers take the selected database's lock themselves: the shared guard
//! for commands that only read, the exclusive guard for anything that may
//! write.

mod hash;
mod keys;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::db::{DataType, Database, Databases, Keyspace};
use crate::error::{EmberError, Result};
use crate::protocol::{Command, Reply, ReplyError};

/// Failure inside a handler
#[derive(Debug, Error)]
pub enum CommandError {
    /// Reported to the client; the connection carries on
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The store failed; the server cannot continue
    #[error(transparent)]
    Storage(#[from] EmberError),
}

pub type CommandResult = std::result::Result<Reply, CommandError>;

/// Handler signature. `args` excludes the command name.
pub type Handler = fn(&[Vec<u8>], &mut Session) -> CommandResult;

/// Accepted argument counts, not counting the command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
            Arity::Between(min, max) => (min..=max).contains(&argc),
        }
    }
}

/// A registered command
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub handler: Handler,
}

/// Per-connection state: the databases and which one is selected
pub struct Session {
    databases: Arc<Databases>,
    selected: usize,
}

impl Session {
    pub fn new(databases: Arc<Databases>) -> Self {
        Self {
            databases,
            selected: 0,
        }
    }

    /// The currently selected database
    pub fn db(&self) -> &Database {
        match self.databases.get(self.selected) {
            Some(db) => db,
            // `select` only accepts indexes that exist and `Databases` is never empty
            None => unreachable!("selected database {} does not exist", self.selected),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Switch databases; fails if `index` is out of range
    pub fn select(&mut self, index: usize) -> std::result::Result<(), ReplyError> {
        if index >= self.databases.len() {
            return Err(ReplyError::DbIndexOutOfRange);
        }
        self.selected = index;
        Ok(())
    }
}

/// Name-to-handler dispatch table
pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    /// Table with every supported command registered
    pub fn new() -> Self {
        let mut table = Self {
            commands: HashMap::new(),
        };
        for spec in hash::COMMANDS.iter().chain(keys::COMMANDS) {
            table.register(*spec);
        }
        table
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    /// Look up a command by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name.to_ascii_lowercase().as_str())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run a command against the session.
    ///
    /// Unknown commands, arity mismatches, writes too large to log and every
    /// client-level failure come back as `Ok(Reply::Error(..))`. `Err` means
    /// the store failed.
    pub fn execute(&self, command: &Command, session: &mut Session) -> Result<Reply> {
        let name = command.name_lowercase();

        let spec = match self.commands.get(name.as_str()) {
            Some(spec) => spec,
            None => return Ok(ReplyError::UnknownCommand(name).into()),
        };
        if !spec.arity.accepts(command.args.len()) {
            return Ok(ReplyError::WrongNumberOfArguments(name).into());
        }

        match (spec.handler)(&command.args, session) {
            Ok(reply) => Ok(reply),
            Err(CommandError::Reply(err)) => Ok(Reply::Error(err)),
            Err(CommandError::Storage(EmberError::EntryTooLarge { size, .. })) => {
                Ok(ReplyError::WriteTooLarge(size).into())
            }
            Err(CommandError::Storage(err)) => Err(err),
        }
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `key` holds a record of type `expected`: `false` if it does
/// not exist, [`ReplyError::WrongType`] if it holds another type.
fn expect_type(
    keyspace: &Keyspace,
    key: &[u8],
    expected: DataType,
) -> std::result::Result<bool, CommandError> {
    match keyspace.has_record(key)? {
        None => Ok(false),
        Some(data_type) if data_type == expected => Ok(true),
        Some(_) => Err(ReplyError::WrongType.into()),
    }
}

fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}
