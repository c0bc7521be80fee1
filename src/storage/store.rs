//! Concurrent Key-Value Store
//!
//! This module implements the shared map every connection operates on.
//! One `HashMap<String, String>` holds the data; who may touch it, and
//! when, is decided by an explicit readers/writers protocol built from
//! two semaphores and a reader count.
//!
//! ## Access Protocol
//!
//! ```text
//!              readers (GET)                    writers (PUT/DELETE)
//!  ┌────────────────────────────────┐      ┌──────────────────────────┐
//!  │ acquire entry                  │      │ acquire write_gate       │
//!  │   readers += 1                 │      │   mutate the map         │
//!  │   first in? acquire write_gate │      │ release write_gate       │
//!  │ release entry                  │      └──────────────────────────┘
//!  │                                │
//!  │ ... read the map ...           │   The first reader in takes the
//!  │                                │   write gate for the whole
//!  │ acquire entry                  │   cohort; the last reader out
//!  │   readers -= 1                 │   hands it back. Writers wait
//!  │   last out? release write_gate │   until the cohort is empty.
//!  │ release entry                  │
//!  └────────────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One map, two semaphores**: concurrency policy lives in the
//!    permits, not in a fairness-managed lock. Readers overlap freely;
//!    writers get the map alone.
//! 2. **Reader preference**: while any reader is inside, new readers
//!    join without waiting on parked writers. A steady stream of readers
//!    can keep a writer waiting indefinitely; that trade-off is part of
//!    the protocol.
//! 3. **Async permits**: `tokio::sync::Semaphore` makes every wait a
//!    cancellation point. [`Store::close`] closes both semaphores, which
//!    wakes all blocked waiters and fails all later acquisitions with
//!    [`StoreError::Shutdown`].
//! 4. **Inner `RwLock`**: the map itself sits behind a `std::sync::RwLock`
//!    so the fast-path probes below are memory-safe without permits. The
//!    lock is held only for single map calls, never across an await.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::{AcquireError, Semaphore};

/// Errors that can occur while operating on the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store has been closed; permit waits were interrupted
    #[error("store is shut down")]
    Shutdown,
}

impl From<AcquireError> for StoreError {
    fn from(_: AcquireError) -> Self {
        StoreError::Shutdown
    }
}

/// The shared key-value store.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```ignore
/// use latchkv::storage::Store;
///
/// let store = Store::new();
/// store.put("name".to_string(), "kv".to_string()).await?;
/// assert_eq!(store.get("name").await?, Some("kv".to_string()));
/// store.delete("name").await?;
/// ```
pub struct Store {
    /// The key-value data itself
    map: RwLock<HashMap<String, String>>,

    /// General-purpose permit serializing reader bookkeeping (1 permit)
    entry: Semaphore,

    /// Writer-exclusion permit, held by a writer or by the reader cohort
    write_gate: Semaphore,

    /// Readers currently inside the read section. Only mutated while
    /// holding the entry permit.
    readers: AtomicUsize,

    /// Statistics: total PUT operations
    put_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total DELETE operations
    delete_count: AtomicU64,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.len())
            .field("active_readers", &self.readers.load(Ordering::Relaxed))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty store with room for `capacity` keys before the
    /// map reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity(capacity)),
            entry: Semaphore::new(1),
            write_gate: Semaphore::new(1),
            readers: AtomicUsize::new(0),
            put_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
        }
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// Waits until no readers and no other writer are inside.
    pub async fn put(&self, key: String, value: String) -> Result<(), StoreError> {
        self.put_count.fetch_add(1, Ordering::Relaxed);

        let _gate = self.write_gate.acquire().await?;
        self.map.write().unwrap().insert(key, value);
        Ok(())
    }

    /// Returns the value stored under `key`, or `None`.
    ///
    /// An absent key is answered from a lock-only probe without engaging
    /// the permit protocol. The probe races with concurrent writers:
    /// a key can appear or vanish between the probe and the protected
    /// read below. The protected read re-checks and answers `None` for a
    /// vanished key, so the race costs at most a stale answer, which a
    /// concurrent world permits anyway.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        if !self.map.read().unwrap().contains_key(key) {
            return Ok(None);
        }

        self.reader_enter().await?;
        let value = self.map.read().unwrap().get(key).cloned();
        self.reader_exit().await?;

        Ok(value)
    }

    /// Removes `key` from the store.
    ///
    /// Deleting an absent key is a no-op that never waits for writer
    /// access. Returns whether a value was actually removed.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);

        if !self.map.read().unwrap().contains_key(key) {
            return Ok(false);
        }

        let _gate = self.write_gate.acquire().await?;
        Ok(self.map.write().unwrap().remove(key).is_some())
    }

    /// Shuts the store down.
    ///
    /// Every task currently blocked on a permit wakes up with
    /// [`StoreError::Shutdown`], and every later operation that needs a
    /// permit fails the same way. Operations that never touch a permit,
    /// the absent-key fast paths of [`Store::get`] and [`Store::delete`],
    /// still complete. The data is left in whatever consistent state the
    /// last completed write produced.
    pub fn close(&self) {
        self.entry.close();
        self.write_gate.close();
    }

    /// Returns true once [`Store::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.entry.is_closed()
    }

    /// Number of keys currently stored. Observational; takes no permits.
    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Readers currently inside the read section.
    pub fn active_readers(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time view of store activity.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.len(),
            puts: self.put_count.load(Ordering::Relaxed),
            gets: self.get_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
            active_readers: self.readers.load(Ordering::Relaxed),
        }
    }

    /// First half of the read protocol: joins the reader cohort.
    ///
    /// The first reader in acquires the write gate on behalf of the
    /// cohort and forgets the permit so it outlives this call; the last
    /// reader out returns it in [`Store::reader_exit`].
    async fn reader_enter(&self) -> Result<(), StoreError> {
        let _entry = self.entry.acquire().await?;

        if self.readers.fetch_add(1, Ordering::Relaxed) == 0 {
            match self.write_gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(e) => {
                    // Undo the join before surfacing the interruption.
                    self.readers.fetch_sub(1, Ordering::Relaxed);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Second half of the read protocol: leaves the reader cohort.
    ///
    /// The last reader out adds the write gate permit back, reopening
    /// the map to writers. If the store closes while a reader is waiting
    /// for the entry permit here, the interruption surfaces instead of
    /// being swallowed; the gate stays taken, which no longer matters
    /// because every later acquisition fails anyway.
    async fn reader_exit(&self) -> Result<(), StoreError> {
        let _entry = self.entry.acquire().await?;

        if self.readers.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.write_gate.add_permits(1);
        }

        Ok(())
    }
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Number of keys currently stored
    pub keys: usize,
    /// Total PUT operations
    pub puts: u64,
    /// Total GET operations
    pub gets: u64,
    /// Total DELETE operations
    pub deletes: u64,
    /// Readers currently inside the read section
    pub active_readers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = Store::new();

        store.put("name".to_string(), "kv".to_string()).await.unwrap();
        assert_eq!(store.get("name").await.unwrap(), Some("kv".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = Store::new();
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = Store::new();

        store.put("key".to_string(), "old".to_string()).await.unwrap();
        store.put("key".to_string(), "new".to_string()).await.unwrap();

        assert_eq!(store.get("key").await.unwrap(), Some("new".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_put_same_value() {
        let store = Store::new();

        store.put("key".to_string(), "same".to_string()).await.unwrap();
        store.put("key".to_string(), "same".to_string()).await.unwrap();

        assert_eq!(store.get("key").await.unwrap(), Some("same".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_and_value() {
        let store = Store::new();

        store.put(String::new(), String::new()).await.unwrap();
        assert_eq!(store.get("").await.unwrap(), Some(String::new()));

        store.put("key".to_string(), String::new()).await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Store::new();

        store.put("key".to_string(), "value".to_string()).await.unwrap();
        assert!(store.delete("key").await.unwrap());
        assert_eq!(store.get("key").await.unwrap(), None);
        assert!(!store.delete("key").await.unwrap()); // Already deleted
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let store = Store::new();
        assert!(!store.delete("never-stored").await.unwrap());
        assert!(!store.delete("never-stored").await.unwrap());
    }

    #[tokio::test]
    async fn test_with_capacity_starts_empty() {
        let store = Store::with_capacity(128);
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_stats_counting() {
        let store = Store::new();

        store.put("a".to_string(), "1".to_string()).await.unwrap();
        store.put("b".to_string(), "2".to_string()).await.unwrap();
        store.get("a").await.unwrap();
        store.get("missing").await.unwrap();
        store.delete("b").await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.active_readers, 0);
    }

    #[tokio::test]
    async fn test_writer_waits_for_reader_cohort() {
        let store = Store::new();
        store.put("key".to_string(), "old".to_string()).await.unwrap();

        // A reader is inside; the cohort holds the write gate.
        store.reader_enter().await.unwrap();

        let put = store.put("key".to_string(), "new".to_string());
        tokio::pin!(put);
        assert!(timeout(Duration::from_millis(50), &mut put).await.is_err());

        // Value is unchanged while the writer is parked.
        assert_eq!(
            store.map.read().unwrap().get("key"),
            Some(&"old".to_string())
        );

        store.reader_exit().await.unwrap();
        put.await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_new_readers_admitted_while_writer_parked() {
        let store = Store::new();
        store.put("key".to_string(), "value".to_string()).await.unwrap();

        store.reader_enter().await.unwrap();

        let put = store.put("key".to_string(), "update".to_string());
        tokio::pin!(put);
        assert!(timeout(Duration::from_millis(50), &mut put).await.is_err());

        // A second reader joins and leaves without waiting on the parked
        // writer; reader preference in action.
        assert_eq!(store.get("key").await.unwrap(), Some("value".to_string()));

        store.reader_exit().await.unwrap();
        put.await.unwrap();
    }

    #[tokio::test]
    async fn test_writers_exclude_each_other() {
        let store = Store::new();
        store.put("key".to_string(), "a".to_string()).await.unwrap();

        // Simulate a writer holding the gate the raw way.
        let permit = store.write_gate.acquire().await.unwrap();

        let put = store.put("key".to_string(), "b".to_string());
        tokio::pin!(put);
        assert!(timeout(Duration::from_millis(50), &mut put).await.is_err());

        drop(permit);
        put.await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_and_gets() {
        let store = Arc::new(Store::new());
        let mut handles = Vec::new();

        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i);
                store.put(key.clone(), format!("value-{}", i)).await.unwrap();
                store.get(&key).await.unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(format!("value-{}", i)));
        }
        assert_eq!(store.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_key_put_delete() {
        let store = Arc::new(Store::new());
        let mut handles = Vec::new();

        for i in 0..25 {
            let writer = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                writer
                    .put("contested".to_string(), format!("v{}", i))
                    .await
                    .unwrap();
            }));

            let deleter = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                deleter.delete("contested").await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever interleaving happened, the key either holds one of the
        // written values or is gone; never a torn state.
        if let Some(value) = store.get("contested").await.unwrap() {
            assert!(value.starts_with('v'));
        }
        assert_eq!(store.active_readers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reader_count_settles_after_storm() {
        let store = Arc::new(Store::with_capacity(8));
        for i in 0..8 {
            store.put(format!("k{}", i), "v".to_string()).await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.get(&format!("k{}", i % 8)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.active_readers(), 0);

        // The gate came back: a writer gets in without waiting.
        store.put("k0".to_string(), "w".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_fails_blocked_and_new_operations() {
        let store = Arc::new(Store::new());
        store.put("key".to_string(), "value".to_string()).await.unwrap();

        // Park a writer behind an open reader cohort.
        store.reader_enter().await.unwrap();
        let blocked = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put("key".to_string(), "late".to_string()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.close();

        assert!(matches!(
            blocked.await.unwrap(),
            Err(StoreError::Shutdown)
        ));
        assert_err!(store.put("x".to_string(), "y".to_string()).await);
        assert_err!(store.get("key").await);
        assert_err!(store.delete("key").await);

        // Absent-key fast paths never touch a permit, so they survive.
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(!store.delete("missing").await.unwrap());

        // The data written before shutdown is still there.
        assert_eq!(store.len(), 1);
        assert!(store.is_closed());
    }
}
