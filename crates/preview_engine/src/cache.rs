use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use preview_core::ChannelId;
use preview_logging::{preview_debug, preview_warn};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::PageSource;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Freshness of successful pages.
    pub ttl: Duration,
    /// Freshness of cacheable failures (see [`CacheableError::is_cacheable`]).
    pub error_ttl: Duration,
    pub capacity: usize,
    /// An in-flight fetch older than this is aborted and restarted.
    pub in_flight_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            error_ttl: Duration::from_secs(10),
            capacity: 1024,
            in_flight_timeout: Duration::from_secs(90),
        }
    }
}

/// One upstream page of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub channel: ChannelId,
    pub source: PageSource,
}

impl PageKey {
    pub fn new(channel: ChannelId, source: PageSource) -> Self {
        Self { channel, source }
    }
}

pub trait CacheableError: Clone + Send + Sync + 'static {
    /// Whether the failure may be served from cache for the error TTL.
    fn is_cacheable(&self) -> bool;
    /// Handed to waiters when the fetch task died without producing a result.
    fn interrupted() -> Self;
}

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V, E> {
    result: Result<V, E>,
    fetched_at: Instant,
    ttl: Duration,
    /// Milliseconds since the cache epoch; updated under the read lock.
    last_access: AtomicU64,
}

impl<V, E> Entry<V, E> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

struct InFlight<V, E> {
    shared: SharedFetch<V, E>,
    started: Instant,
    abort: AbortHandle,
    generation: u64,
}

struct Inner<V, E> {
    settings: CacheSettings,
    epoch: Instant,
    entries: RwLock<HashMap<PageKey, Entry<V, E>>>,
    in_flight: Mutex<HashMap<PageKey, InFlight<V, E>>>,
    generations: AtomicU64,
}

/// Short-lived page cache with single-flight fetching.
///
/// Lock order is always `in_flight` then `entries`. Hits only take the
/// `entries` read lock, so resolved pages are served concurrently; deciding
/// to start a fetch is serialized by the `in_flight` lock. Fetches run as
/// spawned tasks, so a page is stored and its in-flight marker cleared even
/// when every caller waiting on it has given up.
pub struct ResponseCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for ResponseCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> ResponseCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: CacheableError,
{
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                epoch: Instant::now(),
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Serve `key` from cache, join the fetch already running for it, or
    /// start `fetch`. Every caller joined to one fetch gets the same result.
    pub async fn get_or_fetch<F, Fut>(&self, key: PageKey, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(hit) = self.inner.lookup(&key) {
            return hit;
        }

        let shared = {
            let mut in_flight = lock(&self.inner.in_flight);
            // The fetch may have finished between the lookup and the lock.
            if let Some(hit) = self.inner.lookup(&key) {
                return hit;
            }

            let now = Instant::now();
            let running = in_flight
                .get(&key)
                .filter(|flight| {
                    now.saturating_duration_since(flight.started)
                        < self.inner.settings.in_flight_timeout
                })
                .map(|flight| flight.shared.clone());

            match running {
                Some(shared) => {
                    preview_debug!("joining in-flight fetch {:?}", key);
                    shared
                }
                None => {
                    if let Some(stale) = in_flight.remove(&key) {
                        preview_warn!("aborting stuck fetch {:?}", key);
                        stale.abort.abort();
                    }
                    let flight = self.start(key.clone(), fetch(), now);
                    let shared = flight.shared.clone();
                    in_flight.insert(key, flight);
                    shared
                }
            }
        };

        shared.await
    }

    /// Drop every cached page of `channel` and return how many were dropped.
    ///
    /// Fetches in flight for the channel are detached rather than aborted:
    /// callers already waiting still get their result, but it is not stored,
    /// and the next lookup starts a fresh fetch.
    pub fn invalidate(&self, channel: &ChannelId) -> usize {
        let mut in_flight = lock(&self.inner.in_flight);
        let flights = in_flight.len();
        in_flight.retain(|key, _| key.channel != *channel);
        if in_flight.len() < flights {
            preview_debug!(
                "detached {} in-flight fetches of {}",
                flights - in_flight.len(),
                channel
            );
        }

        let mut entries = write(&self.inner.entries);
        let before = entries.len();
        entries.retain(|key, _| key.channel != *channel);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        read(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }

    fn start<Fut>(&self, key: PageKey, fetch: Fut, now: Instant) -> InFlight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            inner.complete(&task_key, generation, &result);
            result
        });
        let abort = handle.abort_handle();

        let inner = Arc::clone(&self.inner);
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    preview_warn!("fetch task for {:?} ended without result: {}", key, err);
                    inner.clear_in_flight(&key, generation);
                    Err(E::interrupted())
                }
            }
        }
        .boxed()
        .shared();

        InFlight {
            shared,
            started: now,
            abort,
            generation,
        }
    }
}

impl<V, E> Inner<V, E>
where
    V: Clone,
    E: CacheableError,
{
    fn lookup(&self, key: &PageKey) -> Option<Result<V, E>> {
        let entries = read(&self.entries);
        let entry = entries.get(key)?;
        let now = Instant::now();
        if !entry.is_fresh(now) {
            return None;
        }
        entry.last_access.store(self.millis(now), Ordering::Relaxed);
        Some(entry.result.clone())
    }

    fn complete(&self, key: &PageKey, generation: u64, result: &Result<V, E>) {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            // Superseded by a restart or an invalidation.
            return;
        }
        in_flight.remove(key);

        let ttl = match result {
            Ok(_) => self.settings.ttl,
            Err(err) if err.is_cacheable() => self.settings.error_ttl,
            Err(_) => return,
        };
        let now = Instant::now();
        let mut entries = write(&self.entries);
        entries.insert(
            key.clone(),
            Entry {
                result: result.clone(),
                fetched_at: now,
                ttl,
                last_access: AtomicU64::new(self.millis(now)),
            },
        );
        self.evict(&mut entries, now);
    }

    fn clear_in_flight(&self, key: &PageKey, generation: u64) {
        let mut in_flight = lock(&self.in_flight);
        if in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            in_flight.remove(key);
        }
    }

    /// Least recently used expired entry first, then the oldest fetch.
    fn evict(&self, entries: &mut HashMap<PageKey, Entry<V, E>>, now: Instant) {
        while entries.len() > self.settings.capacity {
            let victim = entries
                .iter()
                .filter(|(_, entry)| !entry.is_fresh(now))
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .or_else(|| entries.iter().min_by_key(|(_, entry)| entry.fetched_at))
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    preview_debug!("evicting {:?}", key);
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn millis(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
