//! Command Handler Module
//!
//! This module implements the command processing layer for PhotonKV.
//! It receives tokenized command lines, executes them against the storage
//! engine, and returns typed replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   LineParser    │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<String>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Arity check  │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

pub use handler::{CommandError, CommandHandler};
