//! Command Module
//!
//! Name → handler dispatch for the string commands, built once and passed to
//! whatever front end parses client input.
//!
//! ### Commands
//! - `set key value`       → Ok
//! - `get key`             → Bulk, or Nil when absent/expired
//! - `setnx key value`     → Integer (1 if written, else 0)
//! - `getset key value`    → Bulk previous value, or Nil
//! - `strlen key`          → Integer (0 when absent)
//! - `exists key`          → Integer (1 or 0)
//! - `del key`             → Ok
//! - `expire key seconds`  → Ok
//! - `persist key`         → Ok
//! - `ttl key`             → Integer (-1 no deadline, -2 absent or expired)

mod registry;

pub use registry::{CommandHandler, CommandRegistry};

use std::fmt;

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Nil,
    Bulk(Vec<u8>),
    Integer(i64),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Bulk(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
        }
    }
}
