//! Query cache: a keyed, deduplicating, staleness-aware store of fetched data.
//!
//! [`QueryCache`] maps a [`QueryKey`] to the latest state of that query:
//! idle, loading, success (with data and fetch time) or error. Consumers read
//! typed [`CacheEntry`] snapshots and ask for data through
//! [`QueryCache::ensure_fresh`]; they never write entries themselves.
//!
//! ## Rules of `ensure_fresh`
//!
//! 1. A successful entry younger than `max_age` (and not invalidated) is
//!    returned as is, without a network call.
//! 2. If a fetch for the key is already in flight, the caller attaches to it.
//!    At most one request per key is outstanding at any time.
//! 3. Otherwise the entry moves to `Loading`, the fetcher runs on its own task,
//!    and every waiter and subscriber sees the settled `Success` or `Error`.
//!
//! Every entry sits behind a [`tokio::sync::watch`] channel, so each status
//! transition is observable through [`QueryCache::subscribe`].

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::FetchError;

pub mod entry;
pub mod key;
pub mod stats;

pub use entry::{CacheEntry, QueryStatus};
pub use key::{KeyParam, QueryKey};
pub use stats::CacheStats;

use entry::{AnyData, RawEntry};

// One key's state plus its observers.
struct Slot {
    tx: watch::Sender<RawEntry>,
}

impl Slot {
    fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(RawEntry::idle());
        Arc::new(Self { tx })
    }
}

struct Inner {
    slots: Mutex<HashMap<QueryKey, Arc<Slot>>>,
    config: CacheConfig,
    stats: CacheStats,
}

// Outcome of the synchronous half of `ensure_fresh`.
enum Begin<T> {
    Fresh(CacheEntry<T>),
    Wait(watch::Receiver<RawEntry>),
}

/// Process-wide query cache.
///
/// Cloning is cheap and every clone shares the same entries, so one cache is
/// constructed at session start and handed to every consumer. [`clear`]
/// tears it down.
///
/// [`clear`]: QueryCache::clear
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use rquery::cache::{QueryCache, QueryKey};
///
/// # async fn demo() {
/// let cache = QueryCache::default();
/// let entry = cache
///     .ensure_fresh(QueryKey::user("u1"), || async { Ok(42u32) }, Duration::from_secs(60))
///     .await;
/// assert_eq!(entry.data.as_deref(), Some(&42));
///
/// // Within the window the fetcher is not called again.
/// let again = cache
///     .ensure_fresh(QueryKey::user("u1"), || async { Ok(0u32) }, Duration::from_secs(60))
///     .await;
/// assert_eq!(again.data.as_deref(), Some(&42));
/// # }
/// ```
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                config,
                stats: CacheStats::new(),
            }),
        }
    }

    /// Returns a snapshot of `key`'s entry, or an `Idle` entry if absent.
    ///
    /// Never waits for a fetch. `T` must be the type the key was fetched
    /// with; any other type yields a snapshot without data (see
    /// [`CacheEntry`]).
    pub fn read<T>(&self, key: &QueryKey) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
    {
        let slots = self.inner.slots.lock();
        match slots.get(key) {
            Some(slot) => slot.tx.borrow().snapshot(key),
            None => RawEntry::idle().snapshot(key),
        }
    }

    /// Returns `key`'s entry, fetching it first unless a fresh copy exists.
    ///
    /// The returned snapshot is settled (`Success` or `Error`) unless the
    /// entry was fresh, in which case it is returned unchanged. `fetcher` is
    /// only called when this call starts a new request; its future runs on a
    /// spawned task and populates the cache even if this call is dropped.
    ///
    /// A failed fetch keeps any data from an earlier success in the entry.
    /// As with [`read`](Self::read), every caller for a key must use the
    /// same `T`.
    pub async fn ensure_fresh<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        max_age: Duration,
    ) -> CacheEntry<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let mut rx = match self.begin(&key, fetcher, max_age) {
            Begin::Fresh(entry) => return entry,
            Begin::Wait(rx) => rx,
        };

        match rx.wait_for(|e| e.status != QueryStatus::Loading).await {
            Ok(entry) => entry.snapshot(&key),
            // Only reachable once the slot is gone; report what is left.
            Err(_) => self.read(&key),
        }
    }

    fn begin<T, F, Fut>(&self, key: &QueryKey, fetcher: F, max_age: Duration) -> Begin<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let slot = Arc::clone(slots.entry(key.clone()).or_insert_with(Slot::new));

        let (fresh, loading) = {
            let current = slot.tx.borrow();
            (
                current.is_fresh(max_age, now),
                current.status == QueryStatus::Loading,
            )
        };
        if fresh {
            self.inner.stats.record_hit();
            trace!(key = %key, "cache hit");
            return Begin::Fresh(slot.tx.borrow().snapshot(key));
        }
        if loading {
            self.inner.stats.record_dedup_join();
            debug!(key = %key, "joining in-flight fetch");
            return Begin::Wait(slot.tx.subscribe());
        }

        self.inner.stats.record_miss();
        debug!(key = %key, "fetch started");

        let rx = slot.tx.subscribe();
        slot.tx.send_modify(|e| {
            e.status = QueryStatus::Loading;
            e.invalidated = false;
        });
        self.prune(&mut slots, key);
        drop(slots);

        let in_flight = InFlight {
            slot,
            key: key.clone(),
            cache: Arc::clone(&self.inner),
            settled: false,
        };
        let fetch = fetcher();
        tokio::spawn(async move {
            let result = fetch.await;
            in_flight.settle(result.map(|data| Arc::new(data) as AnyData));
        });

        Begin::Wait(rx)
    }

    /// Forces the next [`ensure_fresh`](Self::ensure_fresh) for `key` to
    /// fetch regardless of age.
    ///
    /// Applies to a fetch already in flight too: its result is stored but
    /// is not considered fresh. Returns `false` if the key is not cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let slots = self.inner.slots.lock();
        match slots.get(key) {
            Some(slot) => {
                slot.tx.send_modify(|e| e.invalidated = true);
                debug!(key = %key, "invalidated");
                true
            }
            None => false,
        }
    }

    /// Invalidates every key of a resource kind. Returns how many entries
    /// were marked.
    pub fn invalidate_kind(&self, kind: &str) -> usize {
        let slots = self.inner.slots.lock();
        let mut count = 0;
        for (key, slot) in slots.iter().filter(|(key, _)| key.kind() == kind) {
            slot.tx.send_modify(|e| e.invalidated = true);
            trace!(key = %key, "invalidated");
            count += 1;
        }
        debug!(kind, count, "invalidated resource kind");
        count
    }

    /// Observes every status transition of `key`.
    ///
    /// Creates an idle entry when the key is not cached yet.
    pub fn subscribe<T>(&self, key: QueryKey) -> Subscription<T>
    where
        T: Send + Sync + 'static,
    {
        let mut slots = self.inner.slots.lock();
        let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
        Subscription {
            key,
            rx: slot.tx.subscribe(),
            _data: PhantomData,
        }
    }

    /// Drops every entry. Fetches still in flight finish for their current
    /// waiters but are not stored.
    ///
    /// Meant for teardown. A key whose fetch was in flight no longer has an
    /// entry, so the next `ensure_fresh` for it starts a second request while
    /// the first is still outstanding.
    pub fn clear(&self) {
        let mut slots = self.inner.slots.lock();
        let dropped = slots.len();
        slots.clear();
        debug!(dropped, "cache cleared");
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.slots.lock().contains_key(key)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // Enforces `max_entries` by dropping the least recently fetched entries
    // that are settled and unobserved. `keep` is never dropped.
    fn prune(&self, slots: &mut HashMap<QueryKey, Arc<Slot>>, keep: &QueryKey) {
        let Some(max) = self.inner.config.max_entries else {
            return;
        };
        if slots.len() <= max {
            return;
        }

        let mut candidates: Vec<(Option<Instant>, QueryKey)> = slots
            .iter()
            .filter(|(key, slot)| {
                *key != keep
                    && slot.tx.receiver_count() == 0
                    && slot.tx.borrow().status != QueryStatus::Loading
            })
            .map(|(key, slot)| (slot.tx.borrow().fetched_at, key.clone()))
            .collect();
        candidates.sort();

        let excess = slots.len() - max;
        for (_, key) in candidates.into_iter().take(excess) {
            slots.remove(&key);
            self.inner.stats.record_eviction();
            trace!(key = %key, "evicted");
        }
    }
}

// The single outstanding request for one key. Settles the entry exactly once,
// even if the fetch task is torn down before the fetcher resolves.
struct InFlight {
    slot: Arc<Slot>,
    key: QueryKey,
    cache: Arc<Inner>,
    settled: bool,
}

impl InFlight {
    fn settle(mut self, result: Result<AnyData, FetchError>) {
        self.settled = true;
        match &result {
            Ok(_) => debug!(key = %self.key, "fetch succeeded"),
            Err(e) => {
                self.cache.stats.record_failure();
                debug!(key = %self.key, error = %e, "fetch failed");
            }
        }
        self.slot.tx.send_modify(|e| match result {
            Ok(data) => {
                e.status = QueryStatus::Success;
                e.data = Some(data);
                e.error = None;
                e.fetched_at = Some(Instant::now());
            }
            Err(err) => {
                e.status = QueryStatus::Error;
                e.error = Some(err);
            }
        });
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.cache.stats.record_failure();
        debug!(key = %self.key, "fetch task ended without a result");
        self.slot.tx.send_modify(|e| {
            e.status = QueryStatus::Error;
            e.error = Some(FetchError::network(io::Error::new(
                io::ErrorKind::Interrupted,
                "fetch task ended before completing",
            )));
        });
    }
}

/// A live view of one cache entry.
///
/// Created by [`QueryCache::subscribe`].
pub struct Subscription<T> {
    key: QueryKey,
    rx: watch::Receiver<RawEntry>,
    _data: PhantomData<fn() -> T>,
}

impl<T> Subscription<T>
where
    T: Send + Sync + 'static,
{
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The entry as of now.
    pub fn current(&self) -> CacheEntry<T> {
        self.rx.borrow().snapshot(&self.key)
    }

    /// Waits for the next transition and returns the new state.
    ///
    /// Returns `None` once the entry has been dropped from the cache and no
    /// fetch for it is left in flight.
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().snapshot(&self.key))
    }
}
