//! Command registry

use std::collections::HashMap;

use crate::engine::RoseDb;
use crate::error::{Result, RoseError};

use super::Reply;

/// Handler signature: the open database and the arguments after the name
pub type CommandHandler = fn(&RoseDb, &[Vec<u8>]) -> Result<Reply>;

/// Lowercase command name → handler
pub struct CommandRegistry {
    handlers: HashMap<&'static str, CommandHandler>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with every string command registered
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("set", set);
        registry.register("get", get);
        registry.register("setnx", set_nx);
        registry.register("getset", get_set);
        registry.register("strlen", str_len);
        registry.register("exists", exists);
        registry.register("del", del);
        registry.register("expire", expire);
        registry.register("persist", persist);
        registry.register("ttl", ttl);
        registry
    }

    /// Registry with no commands
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add or replace a handler
    pub fn register(&mut self, name: &'static str, handler: CommandHandler) {
        self.handlers.insert(name, handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run `name` (case-insensitive) against `db`
    pub fn execute(&self, db: &RoseDb, name: &str, args: &[Vec<u8>]) -> Result<Reply> {
        let name = name.to_ascii_lowercase();
        let handler = self
            .handlers
            .get(name.as_str())
            .ok_or_else(|| RoseError::UnknownCommand(name.clone()))?;
        handler(db, args)
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn arity<'a, const N: usize>(cmd: &str, args: &'a [Vec<u8>]) -> Result<&'a [Vec<u8>; N]> {
    args.try_into()
        .map_err(|_| RoseError::WrongArgs(cmd.to_string()))
}

fn set(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key, value] = arity::<2>("set", args)?;
    db.set(key, value)?;
    Ok(Reply::Ok)
}

fn get(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("get", args)?;
    match db.get(key) {
        Ok(value) => Ok(Reply::Bulk(value)),
        Err(RoseError::KeyNotExist | RoseError::KeyExpired) => Ok(Reply::Nil),
        Err(e) => Err(e),
    }
}

fn set_nx(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key, value] = arity::<2>("setnx", args)?;
    Ok(Reply::Integer(db.set_nx(key, value)? as i64))
}

fn get_set(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key, value] = arity::<2>("getset", args)?;
    Ok(db.get_set(key, value)?.map_or(Reply::Nil, Reply::Bulk))
}

fn str_len(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("strlen", args)?;
    match db.str_len(key) {
        Ok(len) => Ok(Reply::Integer(len as i64)),
        Err(RoseError::KeyNotExist | RoseError::KeyExpired) => Ok(Reply::Integer(0)),
        Err(e) => Err(e),
    }
}

fn exists(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("exists", args)?;
    Ok(Reply::Integer(db.str_exists(key)? as i64))
}

fn del(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("del", args)?;
    db.remove(key)?;
    Ok(Reply::Ok)
}

fn expire(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key, seconds] = arity::<2>("expire", args)?;
    let seconds = std::str::from_utf8(seconds)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(RoseError::InvalidTtl)?;
    db.expire(key, seconds)?;
    Ok(Reply::Ok)
}

fn persist(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("persist", args)?;
    db.persist(key)?;
    Ok(Reply::Ok)
}

fn ttl(db: &RoseDb, args: &[Vec<u8>]) -> Result<Reply> {
    let [key] = arity::<1>("ttl", args)?;
    match db.ttl(key) {
        Ok(Some(secs)) => Ok(Reply::Integer(secs as i64)),
        Ok(None) => Ok(Reply::Integer(-1)),
        Err(RoseError::KeyNotExist | RoseError::KeyExpired) => Ok(Reply::Integer(-2)),
        Err(e) => Err(e),
    }
}
