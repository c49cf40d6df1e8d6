//! Reply definitions
//!
//! Typed replies produced by command handlers.

use thiserror::Error;

/// Errors reported to the client as RESP error replies.
///
/// The display text is the full error line; its first word is the error
/// kind clients match on (`ERR`, `WRONGTYPE`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotValidInteger,

    #[error("ERR value is not a valid float")]
    NotValidFloat,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    #[error("ERR max number of clients reached")]
    MaxClients,

    #[error("ERR write of {0} bytes is too large")]
    WriteTooLarge(usize),

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    /// An error line received from a server, kept verbatim
    #[error("{0}")]
    Remote(String),
}

impl ReplyError {
    /// The error kind prefix (`ERR`, `WRONGTYPE`, ...)
    pub fn kind(&self) -> String {
        let line = self.to_string();
        line.split_whitespace().next().unwrap_or("ERR").to_string()
    }
}

/// A reply to send to the client
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Absent value (`$-1`)
    Nil,

    /// Integer (`:n`)
    Integer(i64),

    /// Binary-safe string (`$len`)
    Bulk(Vec<u8>),

    /// Ordered sequence of replies (`*n`)
    Array(Vec<Reply>),

    /// Simple status line (`+OK`)
    Status(String),

    /// Error line (`-KIND message`)
    Error(ReplyError),
}

impl Reply {
    /// `+OK`
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// `:1` / `:0`
    pub fn flag(value: bool) -> Self {
        Reply::Integer(value as i64)
    }

    /// Bulk string when present, nil otherwise
    pub fn bulk_or_nil(value: Option<Vec<u8>>) -> Self {
        value.map_or(Reply::Nil, Reply::Bulk)
    }

    /// `*0`
    pub fn empty_array() -> Self {
        Reply::Array(Vec::new())
    }

    /// Array of bulk strings
    pub fn bulk_array<I: IntoIterator<Item = Vec<u8>>>(items: I) -> Self {
        Reply::Array(items.into_iter().map(Reply::Bulk).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl From<ReplyError> for Reply {
    fn from(err: ReplyError) -> Self {
        Reply::Error(err)
    }
}
