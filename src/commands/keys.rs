//! Generic key and connection commands

use super::{parse_int, Arity, CommandResult, CommandSpec, Session};
use crate::protocol::{Reply, ReplyError};

pub(super) const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "del", arity: Arity::AtLeast(1), handler: del },
    CommandSpec { name: "echo", arity: Arity::Exact(1), handler: echo },
    CommandSpec { name: "exists", arity: Arity::AtLeast(1), handler: exists },
    CommandSpec { name: "ping", arity: Arity::Between(0, 1), handler: ping },
    CommandSpec { name: "select", arity: Arity::Exact(1), handler: select },
    CommandSpec { name: "type", arity: Arity::Exact(1), handler: type_of },
];

/// DEL key [key ...]
fn del(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let mut keyspace = session.db().write();

    let mut removed = 0;
    for key in args {
        if keyspace.delete_record(key)? {
            removed += 1;
        }
    }
    Ok(Reply::Integer(removed))
}

/// EXISTS key [key ...]
///
/// A key named more than once is counted each time.
fn exists(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    let mut found = 0;
    for key in args {
        if keyspace.has_record(key)?.is_some() {
            found += 1;
        }
    }
    Ok(Reply::Integer(found))
}

/// TYPE key
fn type_of(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    let name = keyspace
        .has_record(&args[0])?
        .map_or("none", |data_type| data_type.name());
    Ok(Reply::Status(name.to_string()))
}

/// PING [message]
fn ping(args: &[Vec<u8>], _session: &mut Session) -> CommandResult {
    match args.first() {
        Some(message) => Ok(Reply::Bulk(message.clone())),
        None => Ok(Reply::Status("PONG".to_string())),
    }
}

/// ECHO message
fn echo(args: &[Vec<u8>], _session: &mut Session) -> CommandResult {
    Ok(Reply::Bulk(args[0].clone()))
}

/// SELECT index
fn select(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let index = parse_int(&args[0]).ok_or(ReplyError::NotValidInteger)?;
    let index = usize::try_from(index).map_err(|_| ReplyError::DbIndexOutOfRange)?;

    session.select(index)?;
    Ok(Reply::ok())
}
