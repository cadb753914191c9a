//! Storage Engine Module
//!
//! The in-memory keyspace with typed entries, TTL support and a background
//! expiry sweeper.
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │           StorageEngine            │
//! │   Mutex<entries + expiry_queue>    │
//! └────────────────────────────────────┘
//!                  ▲
//!                  │ cleanup_expired_keys()
//!     ┌────────────┴────────────┐
//!     │      ExpirySweeper      │
//!     │  (Background Tokio Task)│
//!     └─────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use photonkv::storage::{Kind, StorageEngine};
//!
//! let engine = StorageEngine::new();
//!
//! engine.rpush("queue", vec!["a".into(), "b".into()]).unwrap();
//! assert_eq!(engine.key_type("queue"), Some(Kind::List));
//! assert_eq!(engine.lrange("queue", 0, -1).unwrap(), vec!["a", "b"]);
//!
//! // Lists refuse to be read as strings
//! assert!(engine.get("queue").is_err());
//! ```

pub mod engine;
pub mod expiry;

pub use engine::{now_ms, Entry, Kind, StorageEngine, StorageStats, StoreError, Value};
pub use expiry::{ExpiryConfig, ExpirySweeper};
