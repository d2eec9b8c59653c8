use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::command::{Command, HashRecord, Pipeline, Reply, ScanPage, SCAN_START};
use crate::error::{StoreError, StoreResult};
use crate::pattern::glob_match;
use crate::traits::HashStore;

/// One stored hash plus its bookkeeping.
#[derive(Debug)]
struct Entry {
    /// Position in scan order. Never reused, so removals do not shift cursors.
    seq: u64,
    fields: HashRecord,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    /// Scan order: sequence number to key.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Keyspace {
    fn live(&self, key: &str, now: Instant) -> Option<&Entry> {
        self.entries.get(key).filter(|e| e.is_live(now))
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    /// Drop `key` if it has expired, so a following write starts fresh.
    fn purge_if_expired(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.remove(key);
        }
    }

    fn entry_mut(&mut self, key: &str) -> &mut Entry {
        let Keyspace {
            entries,
            order,
            next_seq,
        } = self;
        entries.entry(key.to_string()).or_insert_with(|| {
            *next_seq += 1;
            order.insert(*next_seq, key.to_string());
            Entry {
                seq: *next_seq,
                fields: HashRecord::new(),
                expires_at: None,
            }
        })
    }

    fn apply(&mut self, command: &Command, now: Instant) -> Reply {
        match command {
            Command::HSet { key, field, value } => {
                self.purge_if_expired(key, now);
                let entry = self.entry_mut(key);
                let added = entry.fields.insert(field.clone(), value.clone()).is_none();
                Reply::Integer(i64::from(added))
            }
            Command::HDel { key, field } => {
                self.purge_if_expired(key, now);
                let Some(entry) = self.entries.get_mut(key) else {
                    return Reply::Integer(0);
                };
                let removed = entry.fields.remove(field).is_some();
                if entry.fields.is_empty() {
                    self.remove(key);
                }
                Reply::Integer(i64::from(removed))
            }
            Command::HGet { key, field } => Reply::Value(
                self.live(key, now)
                    .and_then(|e| e.fields.get(field).cloned()),
            ),
            Command::HGetAll { key } => Reply::Hash(
                self.live(key, now)
                    .map(|e| e.fields.clone())
                    .unwrap_or_default(),
            ),
            Command::Exists { key } => Reply::Integer(i64::from(self.live(key, now).is_some())),
            Command::Expire { key, ttl } => {
                self.purge_if_expired(key, now);
                if !self.entries.contains_key(key) {
                    return Reply::Integer(0);
                }
                if ttl.is_zero() {
                    self.remove(key);
                } else {
                    self.entry_mut(key).expires_at = Some(now + *ttl);
                }
                Reply::Integer(1)
            }
        }
    }
}

/// In-memory, HashMap-based hash store.
///
/// Intended for tests and embedding. The keyspace is held behind a `RwLock`;
/// a pipeline is applied under a single write lock, so it is atomic with
/// respect to every other caller. Expired keys are removed lazily.
pub struct InMemoryHashStore {
    keyspace: RwLock<Keyspace>,
    fail_next: Mutex<Option<StoreError>>,
    closed: AtomicBool,
    pipelines: AtomicUsize,
    scans: AtomicUsize,
}

impl InMemoryHashStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            fail_next: Mutex::new(None),
            closed: AtomicBool::new(false),
            pipelines: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let keyspace = self.keyspace.read().expect("lock poisoned");
        keyspace.entries.values().filter(|e| e.is_live(now)).count()
    }

    /// Returns `true` if no live key exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of all live keys.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let keyspace = self.keyspace.read().expect("lock poisoned");
        let mut keys: Vec<String> = keyspace
            .entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Copy of the hash stored at `key`, if it is live.
    pub fn snapshot(&self, key: &str) -> Option<HashRecord> {
        let keyspace = self.keyspace.read().expect("lock poisoned");
        keyspace.live(key, Instant::now()).map(|e| e.fields.clone())
    }

    /// Remaining time-to-live of `key`, or `None` if it has no expiry or is absent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let keyspace = self.keyspace.read().expect("lock poisoned");
        keyspace
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Remove every key.
    pub fn clear(&self) {
        *self.keyspace.write().expect("lock poisoned") = Keyspace::default();
    }

    /// Make the next `execute` call fail with `error` without applying anything.
    pub fn fail_next_pipeline(&self, error: StoreError) {
        *self.fail_next.lock().expect("lock poisoned") = Some(error);
    }

    /// Reject every subsequent call with [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of pipelines submitted so far, including failed ones.
    pub fn pipelines_executed(&self) -> usize {
        self.pipelines.load(Ordering::SeqCst)
    }

    /// Number of scan pages served so far.
    pub fn scans_executed(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryHashStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HashStore for InMemoryHashStore {
    async fn execute(&self, pipeline: &Pipeline) -> StoreResult<Vec<Reply>> {
        self.ensure_open()?;
        self.pipelines.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_next.lock().expect("lock poisoned").take() {
            debug!(commands = pipeline.len(), error = %err, "injected pipeline failure");
            return Err(err);
        }

        let now = Instant::now();
        let mut keyspace = self.keyspace.write().expect("lock poisoned");
        let replies: Vec<Reply> = pipeline
            .commands()
            .iter()
            .map(|cmd| keyspace.apply(cmd, now))
            .collect();
        debug!(
            commands = pipeline.len(),
            writes = pipeline.write_count(),
            "pipeline executed"
        );
        Ok(replies)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        self.ensure_open()?;
        self.scans.fetch_add(1, Ordering::SeqCst);

        let now = Instant::now();
        let keyspace = self.keyspace.read().expect("lock poisoned");
        let mut visited = keyspace.order.range(cursor..);
        let mut keys = Vec::new();
        for (_, key) in visited.by_ref().take(count.max(1)) {
            let live = keyspace.live(key, now).is_some();
            if live && glob_match(pattern, key) {
                keys.push(key.clone());
            }
        }
        let next = visited.next().map_or(SCAN_START, |(seq, _)| *seq);
        Ok(ScanPage { keys, cursor: next })
    }
}

impl std::fmt::Debug for InMemoryHashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryHashStore")
            .field("key_count", &count)
            .finish()
    }
}
