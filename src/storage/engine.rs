//! Keyspace and Expiry Engine
//!
//! This module implements the core storage engine for PhotonKV: a mapping
//! from key to typed [`Entry`] plus a min-heap of expiry deadlines used by the
//! proactive sweep.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The keyspace and its expiry queue live behind a single
//!    mutex. Every operation takes it exactly once, so the snapshot task and
//!    client tasks can never observe a half-applied write.
//! 2. **Typed Entries**: A key holds a string, a list or a hash. The kind is
//!    derived from the payload, and list/hash/counter operations refuse keys
//!    of another kind instead of converting them.
//! 3. **Lazy + Proactive Expiry**: Any operation that touches an expired key
//!    removes it first. [`StorageEngine::cleanup_expired_keys`] drains the
//!    expiry queue for keys nobody touches.
//! 4. **Lazy Queue Cleanup**: Deleting or re-setting a key leaves its queue
//!    pair behind. Stale pairs are dropped when popped; the queue only ever
//!    over-approximates the set of keys carrying a TTL.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     StorageEngine                        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ Mutex<Keyspace>                                    │  │
//! │  │   entries:      HashMap<String, Entry>             │  │
//! │  │   expiry_queue: BinaryHeap<Reverse<(u64, String)>> │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │  op counters (AtomicU64)                                 │
//! └──────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Errors returned by typed store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key exists but holds a different kind of value
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored string cannot be parsed as a 64-bit integer
    #[error("value is not an integer or out of range")]
    NotInteger,

    /// The increment would leave the i64 range
    #[error("increment would overflow")]
    Overflow,
}

/// The data-type tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    List,
    Hash,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::List => "list",
            Kind::Hash => "hash",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    /// Stored as a deque for O(1) push/pop on both ends
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::String(_) => Kind::String,
            Value::List(_) => Kind::List,
            Value::Hash(_) => Kind::Hash,
        }
    }
}

/// One stored key's payload plus its access and expiry metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The stored payload
    pub value: Value,
    /// Absolute expiry in Unix milliseconds (None = never expires)
    pub expires_at: Option<u64>,
    /// Creation time in Unix milliseconds
    pub created_at: u64,
    /// Last read or write in Unix milliseconds
    pub last_accessed: u64,
    /// Number of reads and writes that touched this entry
    pub access_count: u64,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Value) -> Self {
        let now = now_ms();
        Self {
            value,
            expires_at: None,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    /// Checks if this entry has expired at the given instant.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Records a read or write.
    pub fn touch(&mut self) {
        self.last_accessed = now_ms();
        self.access_count += 1;
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    expiry_queue: BinaryHeap<Reverse<(u64, String)>>,
}

impl Keyspace {
    fn schedule(&mut self, key: &str, expires_at: u64) {
        self.expiry_queue.push(Reverse((expires_at, key.to_owned())));
    }

    /// Removes `key` if its TTL has passed. Returns true when it was removed.
    fn evict_if_expired(&mut self, key: &str, now: u64) -> bool {
        if self.entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }
}

/// The main storage engine for PhotonKV.
///
/// Wrap it in an `Arc` and share it between the connection tasks, the
/// expiry sweeper and the snapshot saver. There is no process-wide
/// instance; every engine is independent.
///
/// # Example
///
/// ```
/// use photonkv::storage::StorageEngine;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", "Ada", None);
/// assert_eq!(engine.get("name").unwrap(), Some("Ada".to_string()));
///
/// engine.set("session", "abc123", Some(Duration::from_secs(60)));
/// assert!(engine.ttl("session") > 0);
/// ```
pub struct StorageEngine {
    keyspace: Mutex<Keyspace>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total string writes (SET, INCR, APPEND)
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: total list operations
    list_op_count: AtomicU64,

    /// Statistics: total hash operations
    hash_op_count: AtomicU64,

    /// Statistics: number of expired keys removed (lazily or by sweep)
    expired_count: AtomicU64,
}

impl fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.dbsize())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            list_op_count: AtomicU64::new(0),
            hash_op_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Every operation leaves the keyspace consistent before it can panic,
    /// so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Keyspace> {
        self.keyspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_expired(&self, ks: &mut Keyspace, key: &str) {
        if ks.evict_if_expired(key, now_ms()) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Looks up a live entry, lazily removing it if it has expired.
    fn live<'a>(&self, ks: &'a mut Keyspace, key: &str) -> Option<&'a mut Entry> {
        self.evict_expired(ks, key);
        ks.entries.get_mut(key)
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Creates or replaces a string entry, whatever kind the key held before.
    ///
    /// With a TTL the absolute deadline is registered in the expiry queue.
    pub fn set(&self, key: &str, value: impl Into<String>, ttl: Option<Duration>) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut entry = Entry::new(Value::String(value.into()));
        let mut ks = self.lock();

        if let Some(ttl) = ttl {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            let expires_at = entry.created_at.saturating_add(ttl_ms);
            entry.expires_at = Some(expires_at);
            ks.schedule(key, expires_at);
        }

        ks.entries.insert(key.to_owned(), entry);
        true
    }

    /// Gets the string stored at `key`.
    ///
    /// Returns `None` if the key doesn't exist or has expired, and a type
    /// error if it holds a list or a hash.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(None);
        };
        let Value::String(s) = &entry.value else {
            return Err(StoreError::WrongType);
        };
        let value = s.clone();
        entry.touch();
        Ok(Some(value))
    }

    /// Deletes a key. The expiry queue keeps any pair for it until popped.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live key was deleted.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        self.evict_expired(&mut ks, key);
        ks.entries.remove(key).is_some()
    }

    /// Deletes multiple keys, returning how many existed.
    pub fn delete_many<S: AsRef<str>>(&self, keys: &[S]) -> u64 {
        keys.iter().filter(|k| self.delete(k.as_ref())).count() as u64
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &str) -> bool {
        let mut ks = self.lock();
        self.live(&mut ks, key).is_some()
    }

    /// Counts how many of the given keys exist.
    pub fn exists_many<S: AsRef<str>>(&self, keys: &[S]) -> u64 {
        keys.iter().filter(|k| self.exists(k.as_ref())).count() as u64
    }

    /// Increments the integer stored at `key` by one.
    ///
    /// An absent key is treated as 0, so the first call stores `"1"`. An
    /// existing value keeps its TTL and creation time.
    pub fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        match self.live(&mut ks, key) {
            None => {
                ks.entries
                    .insert(key.to_owned(), Entry::new(Value::String("1".to_owned())));
                Ok(1)
            }
            Some(entry) => {
                let Value::String(s) = &mut entry.value else {
                    return Err(StoreError::WrongType);
                };
                let current: i64 = s.parse().map_err(|_| StoreError::NotInteger)?;
                let next = current.checked_add(1).ok_or(StoreError::Overflow)?;
                *s = next.to_string();
                entry.touch();
                Ok(next)
            }
        }
    }

    /// Appends to the string at `key`, creating it if absent.
    ///
    /// # Returns
    ///
    /// The byte length of the string after the append.
    pub fn append(&self, key: &str, suffix: &str) -> Result<usize, StoreError> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        match self.live(&mut ks, key) {
            None => {
                ks.entries
                    .insert(key.to_owned(), Entry::new(Value::String(suffix.to_owned())));
                Ok(suffix.len())
            }
            Some(entry) => {
                let Value::String(s) = &mut entry.value else {
                    return Err(StoreError::WrongType);
                };
                s.push_str(suffix);
                let len = s.len();
                entry.touch();
                Ok(len)
            }
        }
    }

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    /// Sets or overwrites the TTL of an existing key.
    ///
    /// A non-positive TTL deletes the key right away. The previous queue
    /// pair, if any, becomes stale.
    ///
    /// # Returns
    ///
    /// Returns `false` if the key doesn't exist.
    pub fn expire(&self, key: &str, ttl_seconds: i64) -> bool {
        let now = now_ms();
        let mut ks = self.lock();

        let Some(entry) = self.live(&mut ks, key) else {
            return false;
        };

        if ttl_seconds <= 0 {
            ks.entries.remove(key);
            return true;
        }

        let expires_at = now.saturating_add((ttl_seconds as u64).saturating_mul(1000));
        entry.expires_at = Some(expires_at);
        ks.schedule(key, expires_at);
        true
    }

    /// Gets the remaining TTL for a key in seconds, rounded up.
    ///
    /// # Returns
    ///
    /// - the remaining seconds if the key has an expiry
    /// - `-1` if the key exists but has no expiry
    /// - `-2` if the key doesn't exist
    pub fn ttl(&self, key: &str) -> i64 {
        let mut ks = self.lock();
        match self.live(&mut ks, key) {
            None => -2,
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(exp) => exp.saturating_sub(now_ms()).div_ceil(1000) as i64,
            },
        }
    }

    /// Returns the kind of a live key.
    pub fn key_type(&self, key: &str) -> Option<Kind> {
        let mut ks = self.lock();
        self.live(&mut ks, key).map(|e| e.kind())
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes values one by one at the head of a list, creating it if
    /// needed. `LPUSH key a b` leaves `b` at the head.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn lpush(&self, key: &str, values: Vec<String>) -> Result<usize, StoreError> {
        self.push(key, values, true)
    }

    /// Pushes values in order at the tail of a list, creating it if needed.
    pub fn rpush(&self, key: &str, values: Vec<String>) -> Result<usize, StoreError> {
        self.push(key, values, false)
    }

    fn push(&self, key: &str, values: Vec<String>, head: bool) -> Result<usize, StoreError> {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        self.evict_expired(&mut ks, key);

        let entry = ks
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(Value::List(VecDeque::new())));
        let Value::List(list) = &mut entry.value else {
            return Err(StoreError::WrongType);
        };

        for value in values {
            if head {
                list.push_front(value);
            } else {
                list.push_back(value);
            }
        }

        let len = list.len();
        entry.touch();
        Ok(len)
    }

    /// Removes and returns the first element of a list.
    pub fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.pop(key, true)
    }

    /// Removes and returns the last element of a list.
    pub fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.pop(key, false)
    }

    fn pop(&self, key: &str, head: bool) -> Result<Option<String>, StoreError> {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(None);
        };
        let Value::List(list) = &mut entry.value else {
            return Err(StoreError::WrongType);
        };

        let popped = if head { list.pop_front() } else { list.pop_back() };
        let emptied = list.is_empty();
        if popped.is_some() {
            entry.touch();
        }

        // An empty list is never kept around
        if emptied {
            ks.entries.remove(key);
        }

        Ok(popped)
    }

    /// Returns a range of elements from a list.
    ///
    /// Both start and stop are inclusive. Negative indices count from the
    /// end; out-of-range bounds are clamped.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(Vec::new());
        };
        let Value::List(list) = &entry.value else {
            return Err(StoreError::WrongType);
        };

        let len = list.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

        let range = if start > stop || start >= len {
            Vec::new()
        } else {
            list.iter()
                .skip(start as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .collect()
        };

        entry.touch();
        Ok(range)
    }

    /// Returns the length of a list, or 0 if it doesn't exist.
    pub fn lsize(&self, key: &str) -> Result<usize, StoreError> {
        self.list_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(0);
        };
        let Value::List(list) = &entry.value else {
            return Err(StoreError::WrongType);
        };
        let len = list.len();
        entry.touch();
        Ok(len)
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets a field in a hash, creating the hash if needed.
    ///
    /// # Returns
    /// `1` if the field is new, `0` if an existing value was overwritten.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<usize, StoreError> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        self.evict_expired(&mut ks, key);

        let entry = ks
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        let Value::Hash(map) = &mut entry.value else {
            return Err(StoreError::WrongType);
        };

        let created = map.insert(field.to_owned(), value.to_owned()).is_none();
        entry.touch();
        Ok(usize::from(created))
    }

    /// Gets a field from a hash.
    pub fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(None);
        };
        let Value::Hash(map) = &entry.value else {
            return Err(StoreError::WrongType);
        };
        let value = map.get(field).cloned();
        entry.touch();
        Ok(value)
    }

    /// Returns every field of a hash, sorted by field name.
    pub fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(Vec::new());
        };
        let Value::Hash(map) = &entry.value else {
            return Err(StoreError::WrongType);
        };

        let mut pairs: Vec<(String, String)> = map
            .iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect();
        pairs.sort_unstable();
        entry.touch();
        Ok(pairs)
    }

    /// Removes fields from a hash.
    ///
    /// # Returns
    /// The number of fields that were actually present.
    pub fn hdel<S: AsRef<str>>(&self, key: &str, fields: &[S]) -> Result<usize, StoreError> {
        self.hash_op_count.fetch_add(1, Ordering::Relaxed);

        let mut ks = self.lock();
        let Some(entry) = self.live(&mut ks, key) else {
            return Ok(0);
        };
        let Value::Hash(map) = &mut entry.value else {
            return Err(StoreError::WrongType);
        };

        let removed = fields
            .iter()
            .filter(|f| {
                let field: &str = f.as_ref();
                map.remove(field).is_some()
            })
            .count();
        let emptied = map.is_empty();
        entry.touch();

        if emptied {
            ks.entries.remove(key);
        }

        Ok(removed)
    }

    // ========================================================================
    // BULK OPERATIONS
    // ========================================================================

    /// Proactively removes expired keys by draining the expiry queue.
    ///
    /// The queue is a min-heap, so the sweep stops at the first deadline
    /// still in the future. A popped pair only deletes its key if the key is
    /// still present and actually expired; stale pairs are simply dropped.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were removed.
    pub fn cleanup_expired_keys(&self) -> u64 {
        let now = now_ms();
        let mut ks = self.lock();
        let mut removed = 0u64;

        loop {
            match ks.expiry_queue.peek() {
                Some(Reverse((expires_at, _))) if *expires_at <= now => {}
                _ => break,
            }
            let Some(Reverse((_, key))) = ks.expiry_queue.pop() else {
                break;
            };
            if ks.evict_if_expired(&key, now) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }

        removed
    }

    /// Returns the number of resident entries.
    ///
    /// Expired entries not yet collected by lazy expiry or the sweep are
    /// still counted.
    pub fn dbsize(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the database holds no entries.
    pub fn is_empty(&self) -> bool {
        self.dbsize() == 0
    }

    /// Clears all entries and the expiry queue.
    pub fn flushdb(&self) {
        let mut ks = self.lock();
        ks.entries.clear();
        ks.expiry_queue.clear();
    }

    /// Returns all live keys matching a glob pattern, sorted.
    ///
    /// Supported patterns:
    /// - `*` matches everything
    /// - `h?llo` matches hello and hallo, but not hllo
    /// - `h[ae]llo` / `h[a-e]llo` / `h[^e]llo` character classes
    /// - `\` escapes the next character
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let now = now_ms();
        let ks = self.lock();

        let mut keys: Vec<String> = ks
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired_at(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        let (keys, pending_expiries) = {
            let ks = self.lock();
            (ks.entries.len(), ks.expiry_queue.len())
        };

        StorageStats {
            keys,
            pending_expiries,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            list_ops: self.list_op_count.load(Ordering::Relaxed),
            hash_ops: self.hash_op_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // SNAPSHOT SUPPORT
    // ========================================================================

    /// Copies every live entry out of the store under one lock acquisition.
    pub fn export(&self) -> Vec<(String, Entry)> {
        let now = now_ms();
        let ks = self.lock();

        ks.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Replaces the whole store with `entries`, metadata included, and
    /// registers every TTL in the expiry queue.
    pub fn import(&self, entries: Vec<(String, Entry)>) {
        let mut ks = self.lock();
        ks.entries.clear();
        ks.expiry_queue.clear();

        for (key, entry) in entries {
            if let Some(expires_at) = entry.expires_at {
                ks.schedule(&key, expires_at);
            }
            ks.entries.insert(key, entry);
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of resident entries
    pub keys: usize,
    /// Pairs waiting in the expiry queue, stale ones included
    pub pending_expiries: usize,
    /// Total GET operations
    pub get_ops: u64,
    /// Total string writes
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total list operations
    pub list_ops: u64,
    /// Total hash operations
    pub hash_ops: u64,
    /// Total expired keys removed
    pub expired: u64,
}

/// Simple glob matcher for the KEYS command.
fn glob_match(pattern: &str, text: &str) -> bool {
    glob_match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn glob_match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return text.is_empty();
    };

    match first {
        b'*' => (0..=text.len()).any(|i| glob_match_bytes(rest, &text[i..])),
        b'?' => !text.is_empty() && glob_match_bytes(rest, &text[1..]),
        b'[' => {
            let Some((&c, text_rest)) = text.split_first() else {
                return false;
            };

            let negate = rest.first() == Some(&b'^');
            let mut i = usize::from(negate);
            let mut matched = false;

            while i < rest.len() && rest[i] != b']' {
                if i + 2 < rest.len() && rest[i + 1] == b'-' && rest[i + 2] != b']' {
                    matched |= (rest[i]..=rest[i + 2]).contains(&c);
                    i += 3;
                } else {
                    matched |= rest[i] == c;
                    i += 1;
                }
            }

            // Unterminated class never matches
            if i >= rest.len() {
                return false;
            }

            matched != negate && glob_match_bytes(&rest[i + 1..], text_rest)
        }
        b'\\' if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_match_bytes(&rest[1..], &text[1..])
        }
        c => text.first() == Some(&c) && glob_match_bytes(rest, &text[1..]),
    }
}
