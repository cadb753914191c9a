//! Persistence Module
//!
//! Point-in-time JSON snapshots of the whole store.
//!
//! - `snapshot`: the file format and atomic save/load
//! - `saver`: the background task that saves on an interval and on shutdown
//!
//! ```text
//!  StorageEngine ──export()──► Vec<(key, Entry)> ──spawn_blocking──► dump.rdb.tmp
//!                                                                       │ rename
//!                                                                       ▼
//!  StorageEngine ◄──import()── validated entries ◄──────────────── dump.rdb
//! ```

pub mod saver;
pub mod snapshot;

pub use saver::{save_snapshot, SnapshotSaver};
pub use snapshot::{SnapshotError, SnapshotManager, SNAPSHOT_FILE, SNAPSHOT_VERSION};
