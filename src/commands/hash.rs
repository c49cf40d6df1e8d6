//! Hash commands
//!
//! Every handler checks the key's type under the same guard it uses for
//! the operation itself, so the check and the read or write see one state.

use super::{expect_type, parse_int, Arity, CommandResult, CommandSpec, Session};
use crate::db::DataType;
use crate::protocol::{Reply, ReplyError};

pub(super) const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "hdel", arity: Arity::AtLeast(2), handler: hdel },
    CommandSpec { name: "hexists", arity: Arity::Exact(2), handler: hexists },
    CommandSpec { name: "hget", arity: Arity::Exact(2), handler: hget },
    CommandSpec { name: "hgetall", arity: Arity::Exact(1), handler: hgetall },
    CommandSpec { name: "hincrby", arity: Arity::Exact(3), handler: hincrby },
    CommandSpec { name: "hincrbyfloat", arity: Arity::Exact(3), handler: hincrbyfloat },
    CommandSpec { name: "hkeys", arity: Arity::Exact(1), handler: hkeys },
    CommandSpec { name: "hlen", arity: Arity::Exact(1), handler: hlen },
    CommandSpec { name: "hmget", arity: Arity::AtLeast(2), handler: hmget },
    CommandSpec { name: "hmset", arity: Arity::AtLeast(3), handler: hmset },
    CommandSpec { name: "hset", arity: Arity::Exact(3), handler: hset },
    CommandSpec { name: "hsetnx", arity: Arity::Exact(3), handler: hsetnx },
    CommandSpec { name: "hstrlen", arity: Arity::Exact(2), handler: hstrlen },
    CommandSpec { name: "hvals", arity: Arity::Exact(1), handler: hvals },
];

/// HDEL key field [field ...]
fn hdel(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, fields) = (&args[0], &args[1..]);
    let mut keyspace = session.db().write();

    if !expect_type(&keyspace, key, DataType::Hash)? {
        return Ok(Reply::Integer(0));
    }

    let removed = keyspace
        .get_fields(key, fields)?
        .values()
        .filter(|value| value.is_some())
        .count();
    if removed > 0 {
        keyspace.delete_fields(key, fields)?;
    }

    Ok(Reply::Integer(removed as i64))
}

/// HEXISTS key field
fn hexists(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::Integer(0));
    }
    let value = keyspace.get_field(&args[0], &args[1])?;
    Ok(Reply::flag(value.is_some()))
}

/// HGET key field
fn hget(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::Nil);
    }
    Ok(Reply::bulk_or_nil(keyspace.get_field(&args[0], &args[1])?))
}

/// HGETALL key
fn hgetall(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::empty_array());
    }
    let fields = keyspace.enumerate_fields_ordered(&args[0])?;
    Ok(Reply::bulk_array(
        fields.into_iter().flat_map(|field| [field.name, field.value]),
    ))
}

/// HINCRBY key field increment
fn hincrby(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, field) = (&args[0], &args[1]);
    let delta = parse_int(&args[2]).ok_or(ReplyError::NotValidInteger)?;

    let mut keyspace = session.db().write();
    expect_type(&keyspace, key, DataType::Hash)?;

    let current = match keyspace.get_field(key, field)? {
        Some(value) => parse_int(&value).ok_or(ReplyError::NotValidInteger)?,
        None => 0,
    };
    let updated = current
        .checked_add(delta)
        .ok_or(ReplyError::NotValidInteger)?;

    keyspace.put_record(key, DataType::Hash, [(field, updated.to_string())])?;
    Ok(Reply::Integer(updated))
}

/// HINCRBYFLOAT key field increment
fn hincrbyfloat(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, field) = (&args[0], &args[1]);
    let delta = parse_float(&args[2]).ok_or(ReplyError::NotValidFloat)?;

    let mut keyspace = session.db().write();
    expect_type(&keyspace, key, DataType::Hash)?;

    let current = match keyspace.get_field(key, field)? {
        Some(value) => parse_float(&value).ok_or(ReplyError::NotValidFloat)?,
        None => 0.0,
    };
    let updated = current + delta;
    if !updated.is_finite() {
        return Err(ReplyError::NotValidFloat.into());
    }

    let formatted = format_float(updated);
    keyspace.put_record(key, DataType::Hash, [(field, formatted.clone())])?;
    Ok(Reply::Bulk(formatted.into_bytes()))
}

/// HKEYS key
fn hkeys(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::empty_array());
    }
    Ok(Reply::bulk_array(keyspace.enumerate_fields(&args[0])?))
}

/// HLEN key
fn hlen(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::Integer(0));
    }
    Ok(Reply::Integer(keyspace.field_count(&args[0])? as i64))
}

/// HMGET key field [field ...]
fn hmget(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, fields) = (&args[0], &args[1..]);
    let keyspace = session.db().read();

    if !expect_type(&keyspace, key, DataType::Hash)? {
        return Ok(Reply::Array(vec![Reply::Nil; fields.len()]));
    }
    let values = keyspace.get_fields_ordered(key, fields)?;
    Ok(Reply::Array(
        values
            .into_iter()
            .map(|(_, value)| Reply::bulk_or_nil(value))
            .collect(),
    ))
}

/// HMSET key field value [field value ...]
fn hmset(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, pairs) = (&args[0], &args[1..]);
    if pairs.len() % 2 != 0 {
        return Err(ReplyError::WrongNumberOfArguments("hmset".to_string()).into());
    }

    let mut keyspace = session.db().write();
    expect_type(&keyspace, key, DataType::Hash)?;

    let fields = pairs
        .chunks_exact(2)
        .map(|pair| (&pair[0], pair[1].clone()));
    keyspace.put_record(key, DataType::Hash, fields)?;
    Ok(Reply::ok())
}

/// HSET key field value
fn hset(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, field, value) = (&args[0], &args[1], &args[2]);
    let mut keyspace = session.db().write();

    let created = if expect_type(&keyspace, key, DataType::Hash)? {
        keyspace.get_field(key, field)?.is_none()
    } else {
        true
    };
    keyspace.put_record(key, DataType::Hash, [(field, value.clone())])?;
    Ok(Reply::flag(created))
}

/// HSETNX key field value
fn hsetnx(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let (key, field, value) = (&args[0], &args[1], &args[2]);
    let mut keyspace = session.db().write();

    if expect_type(&keyspace, key, DataType::Hash)? && keyspace.get_field(key, field)?.is_some() {
        return Ok(Reply::Integer(0));
    }
    keyspace.put_record(key, DataType::Hash, [(field, value.clone())])?;
    Ok(Reply::Integer(1))
}

/// HSTRLEN key field
fn hstrlen(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::Integer(0));
    }
    let len = keyspace.get_field(&args[0], &args[1])?.map_or(0, |v| v.len());
    Ok(Reply::Integer(len as i64))
}

/// HVALS key
fn hvals(args: &[Vec<u8>], session: &mut Session) -> CommandResult {
    let keyspace = session.db().read();

    if !expect_type(&keyspace, &args[0], DataType::Hash)? {
        return Ok(Reply::empty_array());
    }
    let fields = keyspace.enumerate_fields_ordered(&args[0])?;
    Ok(Reply::bulk_array(fields.into_iter().map(|field| field.value)))
}

/// Finite floats only; `inf` and `nan` spellings are rejected
fn parse_float(arg: &[u8]) -> Option<f64> {
    let value: f64 = std::str::from_utf8(arg).ok()?.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Shortest decimal form that parses back to the same value, no exponent
fn format_float(value: f64) -> String {
    format!("{}", value)
}
