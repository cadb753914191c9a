//! # PhotonKV - An In-Memory Key-Value Store
//!
//! PhotonKV is a single-node, in-memory key-value store with a Redis-like
//! command set (strings, lists, hashes), TTL expiry and periodic JSON
//! snapshots. Clients talk to it over a newline-delimited text protocol,
//! so `telnet` or `nc` is enough to use it.
//!
//! ## Features
//!
//! - **Typed values**: strings, lists and hashes; a key never changes kind in place
//! - **TTL Support**: lazy expiry on access plus a background sweeper
//! - **Snapshots**: the whole store is saved to `dump.rdb` on an interval and on shutdown
//! - **Async I/O**: one Tokio task per client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              PhotonKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                     ┌──────▼──────┐    ┌──────▼──────────────────────┐  │
//! │                     │ LineParser  │    │        StorageEngine        │  │
//! │                     │ Reply       │    │  Mutex<entries + expiries>  │  │
//! │                     └─────────────┘    └──────▲───────────────▲──────┘  │
//! │                                               │               │         │
//! │                                    ┌──────────┴───┐   ┌───────┴──────┐  │
//! │                                    │ExpirySweeper │   │SnapshotSaver │  │
//! │                                    └──────────────┘   └──────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use photonkv::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - Strings: `SET key value [EX seconds]`, `GET`, `DEL`, `EXISTS`, `INCR`, `APPEND`
//! - Keys: `EXPIRE`, `TTL`, `TYPE`, `KEYS [pattern]`
//! - Lists: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LRANGE`, `LSIZE`
//! - Hashes: `HSET`, `HGET`, `HGETALL`, `HDEL`
//! - Server: `PING`, `DBSIZE`, `FLUSHDB`, `INFO`, `SAVE`
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, tokenizing and reply encoding
//! - [`storage`]: the keyspace with TTL support and the expiry sweeper
//! - [`commands`]: command dispatch and arity validation
//! - [`connection`]: per-client read/execute/reply loop
//! - [`persistence`]: JSON snapshots and the background saver
//! - [`server`]: accept loop and shutdown orchestration
//! - [`config`]: server settings
//!
//! ## Design Highlights
//!
//! ### One Lock, Short Critical Sections
//!
//! The keyspace sits behind a single mutex taken once per operation and never
//! held across an `.await`. Snapshots copy the entries under the lock and do
//! all serialization and file I/O after releasing it.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A background task drains a min-heap of expiry deadlines
//!
//! This ensures memory is reclaimed even for keys that are never accessed again.

pub mod commands;
pub mod config;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{SnapshotError, SnapshotManager, SnapshotSaver};
pub use protocol::{LineParser, Reply};
pub use server::Server;
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port PhotonKV listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host PhotonKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of PhotonKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
