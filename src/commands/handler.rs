//! Command Handler Module
//!
//! Maps one tokenized command line to exactly one storage call.
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET key value [EX seconds]` - Set a key, optionally with a TTL
//! - `GET key` - Get a key's value
//! - `DEL key [key ...]` - Delete keys
//! - `EXISTS key [key ...]` - Count existing keys
//! - `INCR key` - Increment an integer string
//! - `APPEND key value` - Append to a string
//!
//! ### List Commands
//! - `LPUSH key value [value ...]` - Push values to the head of a list
//! - `RPUSH key value [value ...]` - Push values to the tail of a list
//! - `LPOP key` / `RPOP key` - Remove and return the first / last element
//! - `LRANGE key start stop` - Get an inclusive range of elements
//! - `LSIZE key` - Get the length of a list
//!
//! ### Hash Commands
//! - `HSET key field value` - Set a field
//! - `HGET key field` - Get a field
//! - `HGETALL key` - Get all fields and values
//! - `HDEL key field [field ...]` - Delete fields
//!
//! ### Key Commands
//! - `EXPIRE key seconds` - Set a TTL
//! - `TTL key` - Remaining TTL in seconds (-1 no TTL, -2 no key)
//! - `TYPE key` - `string`, `list`, `hash` or `none`
//! - `KEYS [pattern]` - Find keys by glob pattern
//!
//! ### Server Commands
//! - `PING [message]`, `INFO`, `DBSIZE`, `FLUSHDB`, `SAVE`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  execute()  │───>│  lookup +   │───>│   cmd_*()   │      │
//! │  │             │    │  arity check│    │             │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::persistence::{self, SnapshotManager};
use crate::protocol::Reply;
use crate::storage::{Kind, StorageEngine, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Client-visible command failures.
///
/// None of these close the connection; each becomes one `ERROR:` line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{command}' (usage: {usage})")]
    WrongArity {
        command: &'static str,
        usage: &'static str,
    },

    #[error("value is not an integer: '{0}'")]
    InvalidInteger(String),

    #[error("invalid expire time, EX takes a positive number of seconds (0 and negative values are rejected)")]
    InvalidExpireTime,

    #[error("snapshots are disabled on this server")]
    SnapshotsDisabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

type CommandResult = Result<Reply, CommandError>;

/// Number of arguments a command accepts, not counting its name.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(expected) => n == expected,
            Arity::AtLeast(min) => n >= min,
            Arity::Between(min, max) => (min..=max).contains(&n),
        }
    }
}

/// How a command is run once its arity has been checked.
#[derive(Clone, Copy)]
enum Run {
    /// A single storage call, made on the connection task
    Inline(fn(&CommandHandler, &[String]) -> CommandResult),
    /// `SAVE`: the snapshot is written on the blocking pool
    Save,
}

struct CommandDef {
    name: &'static str,
    arity: Arity,
    usage: &'static str,
    run: Run,
}

const COMMANDS: &[CommandDef] = &[
    // String commands
    CommandDef { name: "SET", arity: Arity::AtLeast(2), usage: "SET key value [EX seconds]", run: Run::Inline(CommandHandler::cmd_set) },
    CommandDef { name: "GET", arity: Arity::Exactly(1), usage: "GET key", run: Run::Inline(CommandHandler::cmd_get) },
    CommandDef { name: "DEL", arity: Arity::AtLeast(1), usage: "DEL key [key ...]", run: Run::Inline(CommandHandler::cmd_del) },
    CommandDef { name: "EXISTS", arity: Arity::AtLeast(1), usage: "EXISTS key [key ...]", run: Run::Inline(CommandHandler::cmd_exists) },
    CommandDef { name: "INCR", arity: Arity::Exactly(1), usage: "INCR key", run: Run::Inline(CommandHandler::cmd_incr) },
    CommandDef { name: "APPEND", arity: Arity::Exactly(2), usage: "APPEND key value", run: Run::Inline(CommandHandler::cmd_append) },
    // Key commands
    CommandDef { name: "EXPIRE", arity: Arity::Exactly(2), usage: "EXPIRE key seconds", run: Run::Inline(CommandHandler::cmd_expire) },
    CommandDef { name: "TTL", arity: Arity::Exactly(1), usage: "TTL key", run: Run::Inline(CommandHandler::cmd_ttl) },
    CommandDef { name: "TYPE", arity: Arity::Exactly(1), usage: "TYPE key", run: Run::Inline(CommandHandler::cmd_type) },
    CommandDef { name: "KEYS", arity: Arity::Between(0, 1), usage: "KEYS [pattern]", run: Run::Inline(CommandHandler::cmd_keys) },
    // List commands
    CommandDef { name: "LPUSH", arity: Arity::AtLeast(2), usage: "LPUSH key value [value ...]", run: Run::Inline(CommandHandler::cmd_lpush) },
    CommandDef { name: "RPUSH", arity: Arity::AtLeast(2), usage: "RPUSH key value [value ...]", run: Run::Inline(CommandHandler::cmd_rpush) },
    CommandDef { name: "LPOP", arity: Arity::Exactly(1), usage: "LPOP key", run: Run::Inline(CommandHandler::cmd_lpop) },
    CommandDef { name: "RPOP", arity: Arity::Exactly(1), usage: "RPOP key", run: Run::Inline(CommandHandler::cmd_rpop) },
    CommandDef { name: "LRANGE", arity: Arity::Exactly(3), usage: "LRANGE key start stop", run: Run::Inline(CommandHandler::cmd_lrange) },
    CommandDef { name: "LSIZE", arity: Arity::Exactly(1), usage: "LSIZE key", run: Run::Inline(CommandHandler::cmd_lsize) },
    // Hash commands
    CommandDef { name: "HSET", arity: Arity::Exactly(3), usage: "HSET key field value", run: Run::Inline(CommandHandler::cmd_hset) },
    CommandDef { name: "HGET", arity: Arity::Exactly(2), usage: "HGET key field", run: Run::Inline(CommandHandler::cmd_hget) },
    CommandDef { name: "HGETALL", arity: Arity::Exactly(1), usage: "HGETALL key", run: Run::Inline(CommandHandler::cmd_hgetall) },
    CommandDef { name: "HDEL", arity: Arity::AtLeast(2), usage: "HDEL key field [field ...]", run: Run::Inline(CommandHandler::cmd_hdel) },
    // Server commands
    CommandDef { name: "PING", arity: Arity::AtLeast(0), usage: "PING [message]", run: Run::Inline(CommandHandler::cmd_ping) },
    CommandDef { name: "DBSIZE", arity: Arity::Exactly(0), usage: "DBSIZE", run: Run::Inline(CommandHandler::cmd_dbsize) },
    CommandDef { name: "FLUSHDB", arity: Arity::Exactly(0), usage: "FLUSHDB", run: Run::Inline(CommandHandler::cmd_flushdb) },
    CommandDef { name: "INFO", arity: Arity::Exactly(0), usage: "INFO", run: Run::Inline(CommandHandler::cmd_info) },
    CommandDef { name: "SAVE", arity: Arity::Exactly(0), usage: "SAVE", run: Run::Save },
];

fn lookup(name: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|def| def.name.eq_ignore_ascii_case(name))
}

/// Executes commands against a storage engine.
///
/// Cheap to clone; every connection task holds its own copy.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Server start time for INFO
    start_time: Instant,
    /// Snapshot target for SAVE (None = persistence disabled)
    snapshots: Option<SnapshotManager>,
}

impl CommandHandler {
    /// Creates a handler without persistence; `SAVE` reports an error.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            start_time: Instant::now(),
            snapshots: None,
        }
    }

    /// Creates a handler whose `SAVE` command writes through `snapshots`.
    pub fn with_snapshots(storage: Arc<StorageEngine>, snapshots: SnapshotManager) -> Self {
        Self {
            snapshots: Some(snapshots),
            ..Self::new(storage)
        }
    }

    /// Executes one tokenized command line and returns its reply.
    ///
    /// Failures are turned into [`Reply::Error`]; this never panics on
    /// client input.
    pub async fn execute(&self, tokens: Vec<String>) -> Reply {
        let Some((name, args)) = tokens.split_first() else {
            return Reply::error(CommandError::EmptyCommand.to_string());
        };

        match self.dispatch(name, args).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(command = %name, error = %e, "Command failed");
                Reply::error(e.to_string())
            }
        }
    }

    /// Looks up `name` (case-insensitive), validates arity and runs it.
    pub async fn dispatch(&self, name: &str, args: &[String]) -> CommandResult {
        let def = lookup(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        if !def.arity.accepts(args.len()) {
            return Err(CommandError::WrongArity {
                command: def.name,
                usage: def.usage,
            });
        }

        match def.run {
            Run::Inline(run) => run(self, args),
            Run::Save => self.cmd_save().await,
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn parse_integer(token: &str) -> Result<i64, CommandError> {
        token
            .parse()
            .map_err(|_| CommandError::InvalidInteger(token.to_string()))
    }

    /// Parses the TTL suffix of SET. `EX <seconds>` right after the value
    /// sets a TTL and any tokens after it are ignored; every other suffix
    /// means no TTL.
    fn parse_set_ttl(options: &[String]) -> Result<Option<Duration>, CommandError> {
        match options {
            [flag, seconds, ..] if flag.eq_ignore_ascii_case("EX") => match seconds.parse::<i64>() {
                Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs as u64))),
                _ => Err(CommandError::InvalidExpireTime),
            },
            _ => Ok(None),
        }
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [EX seconds]
    fn cmd_set(&self, args: &[String]) -> CommandResult {
        let ttl = Self::parse_set_ttl(&args[2..])?;
        Ok(Reply::Bool(self.storage.set(&args[0], args[1].as_str(), ttl)))
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> CommandResult {
        Ok(Reply::optional(self.storage.get(&args[0])?))
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.delete_many(args)))
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.exists_many(args)))
    }

    /// INCR key
    fn cmd_incr(&self, args: &[String]) -> CommandResult {
        Ok(Reply::Integer(self.storage.incr(&args[0])?))
    }

    /// APPEND key value
    fn cmd_append(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.append(&args[0], &args[1])?))
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[String]) -> CommandResult {
        let seconds = Self::parse_integer(&args[1])?;
        Ok(Reply::Bool(self.storage.expire(&args[0], seconds)))
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> CommandResult {
        Ok(Reply::Integer(self.storage.ttl(&args[0])))
    }

    /// TYPE key
    fn cmd_type(&self, args: &[String]) -> CommandResult {
        let kind = self.storage.key_type(&args[0]);
        Ok(Reply::text(kind.map_or("none", |k| Kind::as_str(&k))))
    }

    /// KEYS [pattern]
    fn cmd_keys(&self, args: &[String]) -> CommandResult {
        let pattern = args.first().map_or("*", String::as_str);
        Ok(Reply::List(self.storage.keys(pattern)))
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH key value [value ...]
    fn cmd_lpush(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.lpush(&args[0], args[1..].to_vec())?))
    }

    /// RPUSH key value [value ...]
    fn cmd_rpush(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.rpush(&args[0], args[1..].to_vec())?))
    }

    /// LPOP key
    fn cmd_lpop(&self, args: &[String]) -> CommandResult {
        Ok(Reply::optional(self.storage.lpop(&args[0])?))
    }

    /// RPOP key
    fn cmd_rpop(&self, args: &[String]) -> CommandResult {
        Ok(Reply::optional(self.storage.rpop(&args[0])?))
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, args: &[String]) -> CommandResult {
        let start = Self::parse_integer(&args[1])?;
        let stop = Self::parse_integer(&args[2])?;
        Ok(Reply::List(self.storage.lrange(&args[0], start, stop)?))
    }

    /// LSIZE key
    fn cmd_lsize(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.lsize(&args[0])?))
    }

    // ========================================================================
    // Hash Commands
    // ========================================================================

    /// HSET key field value
    fn cmd_hset(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.hset(&args[0], &args[1], &args[2])?))
    }

    /// HGET key field
    fn cmd_hget(&self, args: &[String]) -> CommandResult {
        Ok(Reply::optional(self.storage.hget(&args[0], &args[1])?))
    }

    /// HGETALL key
    fn cmd_hgetall(&self, args: &[String]) -> CommandResult {
        Ok(Reply::Map(self.storage.hgetall(&args[0])?))
    }

    /// HDEL key field [field ...]
    fn cmd_hdel(&self, args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.hdel(&args[0], &args[1..])?))
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            Ok(Reply::text("PONG"))
        } else {
            Ok(Reply::text(args.join(" ")))
        }
    }

    /// DBSIZE
    fn cmd_dbsize(&self, _args: &[String]) -> CommandResult {
        Ok(Reply::count(self.storage.dbsize()))
    }

    /// FLUSHDB
    fn cmd_flushdb(&self, _args: &[String]) -> CommandResult {
        self.storage.flushdb();
        Ok(Reply::ok())
    }

    /// INFO
    fn cmd_info(&self, _args: &[String]) -> CommandResult {
        let stats = self.storage.stats();
        let persistence = if self.snapshots.is_some() {
            "enabled"
        } else {
            "disabled"
        };

        let info = format!(
            "# Server\n\
             photonkv_version:{}\n\
             os:{}\n\
             uptime_in_seconds:{}\n\
             persistence:{}\n\
             # Keyspace\n\
             keys:{}\n\
             pending_expiries:{}\n\
             # Operations\n\
             get_ops:{}\n\
             set_ops:{}\n\
             del_ops:{}\n\
             list_ops:{}\n\
             hash_ops:{}\n\
             expired_keys:{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            self.start_time.elapsed().as_secs(),
            persistence,
            stats.keys,
            stats.pending_expiries,
            stats.get_ops,
            stats.set_ops,
            stats.del_ops,
            stats.list_ops,
            stats.hash_ops,
            stats.expired,
        );

        Ok(Reply::Text(info))
    }

    /// SAVE
    ///
    /// The store lock is only held while entries are copied; serialization
    /// and the file write happen on the blocking pool.
    async fn cmd_save(&self) -> CommandResult {
        let snapshots = self
            .snapshots
            .as_ref()
            .ok_or(CommandError::SnapshotsDisabled)?;

        match persistence::save_snapshot(&self.storage, snapshots).await {
            Ok(keys) => {
                info!(keys, path = %snapshots.path().display(), "Snapshot saved on request");
                Ok(Reply::Bool(true))
            }
            Err(e) => {
                error!(error = %e, path = %snapshots.path().display(), "Requested snapshot failed");
                Ok(Reply::Bool(false))
            }
        }
    }
}
