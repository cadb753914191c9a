//! Snapshot File I/O
//!
//! A snapshot is a full point-in-time copy of the store written as pretty
//! JSON to `<data_dir>/dump.rdb`:
//!
//! ```text
//! {
//!   "version": "1.0.0",
//!   "timestamp": "2026-01-01T12:00:00+00:00",
//!   "keys": {
//!     "name":  { "data": "Ada",        "type": "string", "ttl_ms": null, ... },
//!     "queue": { "data": ["a", "b"],   "type": "list",   "ttl_ms": 1767268800000, ... },
//!     "user":  { "data": {"lang":"en"}, "type": "hash",  "ttl_ms": null, ... }
//!   }
//! }
//! ```
//!
//! Saving writes `dump.rdb.tmp`, syncs it and renames it over the previous
//! snapshot, so a crash mid-write never leaves a truncated `dump.rdb`.
//! Clones of one [`SnapshotManager`] share a write lock, so the periodic
//! saver and any number of `SAVE` commands take turns on the temp file.

use crate::storage::{Entry, Kind, StorageEngine, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILE: &str = "dump.rdb";

/// Errors that can occur while saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry whose payload doesn't match its declared type
    #[error("corrupt snapshot entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    timestamp: String,
    keys: BTreeMap<String, SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    data: Payload,
    #[serde(rename = "type")]
    kind: Kind,
    ttl_ms: Option<u64>,
    #[serde(default)]
    created_at: u64,
    #[serde(default)]
    last_accessed: u64,
    #[serde(default)]
    access_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Payload {
    String(String),
    List(Vec<String>),
    Hash(BTreeMap<String, String>),
}

impl From<Entry> for SnapshotEntry {
    fn from(entry: Entry) -> Self {
        let kind = entry.kind();
        let data = match entry.value {
            Value::String(s) => Payload::String(s),
            Value::List(list) => Payload::List(list.into()),
            Value::Hash(map) => Payload::Hash(map.into_iter().collect()),
        };

        Self {
            data,
            kind,
            ttl_ms: entry.expires_at,
            created_at: entry.created_at,
            last_accessed: entry.last_accessed,
            access_count: entry.access_count,
        }
    }
}

impl TryFrom<SnapshotEntry> for Entry {
    type Error = String;

    fn try_from(saved: SnapshotEntry) -> Result<Self, Self::Error> {
        let value = match (saved.kind, saved.data) {
            (Kind::String, Payload::String(s)) => Value::String(s),
            (Kind::List, Payload::List(items)) => Value::List(items.into()),
            (Kind::Hash, Payload::Hash(map)) => Value::Hash(map.into_iter().collect::<HashMap<_, _>>()),
            // Tolerate `{}` written for an empty list
            (Kind::List, Payload::Hash(map)) if map.is_empty() => Value::List(Default::default()),
            (kind, _) => return Err(format!("data does not match type '{}'", kind)),
        };

        Ok(Entry {
            value,
            expires_at: saved.ttl_ms,
            created_at: saved.created_at,
            last_accessed: saved.last_accessed,
            access_count: saved.access_count,
        })
    }
}

/// Reads and writes the snapshot file of one store.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    path: PathBuf,
    /// Held from creating the temp file until it is renamed into place
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotManager {
    /// Creates a manager for `<data_dir>/dump.rdb`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SNAPSHOT_FILE),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies the store and writes it to disk.
    ///
    /// # Returns
    ///
    /// The number of keys written.
    pub fn save(&self, engine: &StorageEngine) -> Result<usize, SnapshotError> {
        self.write(engine.export())
    }

    /// Writes already-copied entries to disk, replacing the previous
    /// snapshot atomically.
    pub fn write(&self, entries: Vec<(String, Entry)>) -> Result<usize, SnapshotError> {
        let count = entries.len();
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            keys: entries
                .into_iter()
                .map(|(key, entry)| (key, SnapshotEntry::from(entry)))
                .collect(),
        };

        let dir = self.path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let tmp_path = self.tmp_path();
        if let Err(e) = write_file(&tmp_path, &snapshot) {
            // The previous snapshot is still in place; only drop the partial file
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &self.path)?;
        if let Some(dir) = dir {
            sync_dir(dir)?;
        }

        debug!(path = %self.path.display(), keys = count, "Snapshot written");
        Ok(count)
    }

    /// Replaces the contents of `engine` with the snapshot on disk.
    ///
    /// The file is fully parsed and validated before the store is touched,
    /// so a failed load leaves the store as it was.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(keys))` if a snapshot was loaded
    /// - `Ok(None)` if there is no snapshot file yet
    pub fn load(&self, engine: &StorageEngine) -> Result<Option<usize>, SnapshotError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SnapshotFile = serde_json::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                version = %snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Loading snapshot written by a different format version"
            );
        }

        let entries = snapshot
            .keys
            .into_iter()
            .map(|(key, saved)| match Entry::try_from(saved) {
                Ok(entry) => Ok((key, entry)),
                Err(reason) => Err(SnapshotError::Corrupt { key, reason }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = entries.len();
        engine.import(entries);

        debug!(path = %self.path.display(), keys = count, saved_at = %snapshot.timestamp, "Snapshot loaded");
        Ok(Some(count))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn write_file(path: &Path, snapshot: &SnapshotFile) -> Result<(), SnapshotError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn populated_engine() -> StorageEngine {
        let engine = StorageEngine::new();
        engine.set("name", "Ada", None);
        engine.set("session", "abc", Some(Duration::from_secs(300)));
        engine
            .rpush("queue", vec!["a".to_string(), "b".to_string()])
            .unwrap();
        engine.hset("user", "lang", "en").unwrap();
        engine.hset("user", "city", "Turin").unwrap();
        engine.get("name").unwrap();
        engine
    }

    fn sorted(mut entries: Vec<(String, Entry)>) -> Vec<(String, Entry)> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        let source = populated_engine();

        assert_eq!(manager.save(&source).unwrap(), 4);

        let target = StorageEngine::new();
        assert_eq!(manager.load(&target).unwrap(), Some(4));

        // Payload, kind, TTL and timestamps all survive
        assert_eq!(sorted(source.export()), sorted(target.export()));
        assert!(target.ttl("session") > 0);
        assert_eq!(target.stats().pending_expiries, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        let engine = StorageEngine::new();

        assert_eq!(manager.load(&engine).unwrap(), None);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_save_creates_data_dir_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let manager = SnapshotManager::new(&data_dir);

        manager.save(&populated_engine()).unwrap();

        assert!(manager.path().exists());
        assert!(!manager.tmp_path().exists());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        manager.save(&populated_engine()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(manager.path()).unwrap()).unwrap();

        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert!(json["timestamp"].is_string());
        assert_eq!(json["keys"]["name"]["data"], "Ada");
        assert_eq!(json["keys"]["name"]["type"], "string");
        assert!(json["keys"]["name"]["ttl_ms"].is_null());
        assert_eq!(json["keys"]["name"]["access_count"], 1);
        assert_eq!(json["keys"]["queue"]["type"], "list");
        assert_eq!(json["keys"]["queue"]["data"][1], "b");
        assert_eq!(json["keys"]["user"]["data"]["city"], "Turin");
        assert!(json["keys"]["session"]["ttl_ms"].is_u64());
    }

    #[test]
    fn test_load_hand_written_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        fs::write(
            manager.path(),
            r#"{
                "version": "1.0.0",
                "timestamp": "2025-01-01T00:00:00",
                "keys": {
                    "counter": {"data": "7", "type": "string", "ttl_ms": null},
                    "empty": {"data": {}, "type": "hash", "ttl_ms": null}
                }
            }"#,
        )
        .unwrap();

        let engine = StorageEngine::new();
        assert_eq!(manager.load(&engine).unwrap(), Some(2));
        assert_eq!(engine.incr("counter"), Ok(8));
        assert_eq!(engine.key_type("empty"), Some(Kind::Hash));
    }

    #[test]
    fn test_load_rejects_mismatched_type() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        fs::write(
            manager.path(),
            r#"{"version": "1.0.0", "timestamp": "x",
                "keys": {"bad": {"data": ["a"], "type": "hash", "ttl_ms": null}}}"#,
        )
        .unwrap();

        let engine = StorageEngine::new();
        engine.set("existing", "kept", None);

        let err = manager.load(&engine).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { ref key, .. } if key == "bad"));

        // A failed load leaves the store untouched
        assert_eq!(engine.get("existing").unwrap(), Some("kept".to_string()));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        fs::write(manager.path(), b"{ not json").unwrap();

        let engine = StorageEngine::new();
        assert!(matches!(
            manager.load(&engine),
            Err(SnapshotError::Json(_))
        ));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        manager.save(&populated_engine()).unwrap();
        let before = fs::read(manager.path()).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(manager.tmp_path()).unwrap();
        assert!(manager.save(&StorageEngine::new()).is_err());

        assert_eq!(fs::read(manager.path()).unwrap(), before);
    }

    #[test]
    fn test_concurrent_saves_all_succeed() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path());
        let engine = Arc::new(StorageEngine::new());
        for i in 0..2000 {
            engine.set(&format!("key:{}", i), i.to_string(), None);
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..10 {
                        assert_eq!(manager.save(&engine).unwrap(), 2000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!manager.tmp_path().exists());
        let restored = StorageEngine::new();
        assert_eq!(manager.load(&restored).unwrap(), Some(2000));
        assert_eq!(restored.get("key:1999").unwrap(), Some("1999".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir() {
        let dir = TempDir::new().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }
}
