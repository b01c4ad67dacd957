//! Query cache storage.
//!
//! One `QueryCache<T>` per resource type. Entries live in an LRU map; reads in
//! progress live in an in-flight table so that identical concurrent fetches
//! share one loader call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use metrics::{counter, histogram};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::error::ApiError;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::keys::QueryKey;
use super::loader::{LoadResult, Loader};
use super::lock::mutex_lock;
use super::registry::{EntryReceiver, SubscriberRegistry};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "patientdesk_cache_hit_total";
const METRIC_MISS: &str = "patientdesk_cache_miss_total";
const METRIC_COALESCED: &str = "patientdesk_cache_coalesced_total";
const METRIC_EVICT: &str = "patientdesk_cache_evict_total";
const METRIC_INVALIDATED: &str = "patientdesk_cache_invalidated_total";
const METRIC_LOAD_MS: &str = "patientdesk_cache_load_ms";

type SharedFetch<T> = Shared<BoxFuture<'static, CacheEntry<T>>>;

struct InFlight<T> {
    request_id: u64,
    future: SharedFetch<T>,
    invalidated: bool,
}

struct CacheState<T> {
    entries: LruCache<QueryKey, CacheEntry<T>>,
    in_flight: HashMap<QueryKey, InFlight<T>>,
    next_request_id: u64,
}

struct Inner<T> {
    name: &'static str,
    ttl: Duration,
    state: Mutex<CacheState<T>>,
    registry: SubscriberRegistry<T>,
}

/// Keyed cache of reads with request coalescing and staleness tracking.
///
/// Cloning is cheap and every clone shares the same entries. State is only
/// touched inside short synchronous sections; no lock is held across an await.
pub struct QueryCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty cache. `name` labels logs and metrics.
    pub fn new(name: &'static str, ttl: Duration, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                ttl,
                state: Mutex::new(CacheState {
                    entries: LruCache::new(config.max_entries_non_zero()),
                    in_flight: HashMap::new(),
                    next_request_id: 0,
                }),
                registry: SubscriberRegistry::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Current entry for `key`, without touching recency or loading anything.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        mutex_lock(&self.inner.state, SOURCE, "get")
            .entries
            .peek(key)
            .cloned()
    }

    /// Serve `key` from cache, joining or starting a load as needed.
    ///
    /// A fresh entry is returned as-is. If a load for `key` is already running
    /// its result is awaited instead of calling `loader` again. Otherwise
    /// `loader` runs and its outcome is stored.
    pub async fn fetch(&self, key: QueryKey, loader: Loader<T>) -> CacheEntry<T> {
        self.run(key, loader, false).await
    }

    /// Like [`fetch`](Self::fetch) but ignores freshness. Still joins a running load.
    pub async fn refetch(&self, key: QueryKey, loader: Loader<T>) -> CacheEntry<T> {
        self.run(key, loader, true).await
    }

    async fn run(&self, key: QueryKey, loader: Loader<T>, force: bool) -> CacheEntry<T> {
        let pending = {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "fetch");

            if !force
                && let Some(entry) = state.entries.get(&key)
                && entry.is_fresh(Instant::now())
            {
                counter!(METRIC_HIT, "cache" => self.inner.name).increment(1);
                debug!(cache = self.inner.name, key = %key, "Query cache hit");
                return entry.clone();
            }

            if let Some(in_flight) = state.in_flight.get(&key) {
                counter!(METRIC_COALESCED, "cache" => self.inner.name).increment(1);
                debug!(
                    cache = self.inner.name,
                    key = %key,
                    request_id = in_flight.request_id,
                    "Joining in-flight query"
                );
                in_flight.future.clone()
            } else {
                counter!(METRIC_MISS, "cache" => self.inner.name).increment(1);
                self.start(&mut state, key, loader)
            }
        };

        pending.await
    }

    /// Register the load for `key` and return its shared future.
    ///
    /// The load runs as its own task and records its outcome there, so the
    /// entry settles even if every caller awaiting it is dropped.
    fn start(&self, state: &mut CacheState<T>, key: QueryKey, loader: Loader<T>) -> SharedFetch<T> {
        let request_id = state.next_request_id;
        state.next_request_id += 1;

        let mut entry = state.entries.pop(&key).unwrap_or_default();
        entry.begin_loading();
        self.store(state, key.clone(), entry.clone());

        let cache = self.clone();
        let task_key = key.clone();
        let load = async move {
            let started_at = Instant::now();
            let outcome = loader().await;
            histogram!(METRIC_LOAD_MS, "cache" => cache.inner.name)
                .record(started_at.elapsed().as_secs_f64() * 1000.0);
            cache.complete(&task_key, request_id, outcome)
        };

        let future = match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(load);
                let cache = self.clone();
                let task_key = key.clone();
                async move {
                    match task.await {
                        Ok(entry) => entry,
                        Err(err) => cache.complete(
                            &task_key,
                            request_id,
                            Err(ApiError::network(format!("query load aborted: {err}"))),
                        ),
                    }
                }
                .boxed()
            }
            // Without a runtime the load only progresses while awaited.
            Err(_) => load.boxed(),
        }
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                request_id,
                future: future.clone(),
                invalidated: false,
            },
        );

        debug!(cache = self.inner.name, key = %key, request_id, "Query load started");
        self.inner.registry.publish(&key, &entry);
        future
    }

    fn complete(&self, key: &QueryKey, request_id: u64, outcome: LoadResult<T>) -> CacheEntry<T> {
        let entry = {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "complete");

            let owned = state
                .in_flight
                .get(key)
                .is_some_and(|in_flight| in_flight.request_id == request_id);
            let invalidated = owned
                && state
                    .in_flight
                    .remove(key)
                    .is_some_and(|in_flight| in_flight.invalidated);

            let mut entry = state.entries.pop(key).unwrap_or_default();
            match outcome {
                Ok(data) => entry.resolve(data, Instant::now(), self.inner.ttl),
                Err(error) => {
                    warn!(
                        cache = self.inner.name,
                        key = %key,
                        request_id,
                        error = %error,
                        kept_data = entry.data().is_some(),
                        "Query load failed"
                    );
                    entry.reject(error);
                }
            }
            entry.set_invalidated(invalidated);
            self.store(&mut state, key.clone(), entry.clone());
            entry
        };

        debug!(
            cache = self.inner.name,
            key = %key,
            request_id,
            status = ?entry.status(),
            "Query load finished"
        );
        self.inner.registry.publish(key, &entry);
        entry
    }

    fn store(&self, state: &mut CacheState<T>, key: QueryKey, entry: CacheEntry<T>) {
        if let Some((evicted, _)) = state.entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_EVICT, "cache" => self.inner.name).increment(1);
            debug!(cache = self.inner.name, key = %evicted, "Query cache entry evicted");
        }
    }

    /// Mark every entry matching `predicate` stale.
    ///
    /// Subscribed keys are refetched in the background; the rest reload on
    /// their next `fetch`. Loads already running for a matching key finish
    /// with their entry still marked stale. Returns the number of entries
    /// marked.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let marked: Vec<QueryKey> = {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "invalidate");
            let mut marked = Vec::new();
            for (key, entry) in state.entries.iter_mut() {
                if predicate(key) {
                    entry.set_invalidated(true);
                    marked.push(key.clone());
                }
            }
            for (key, in_flight) in &mut state.in_flight {
                if predicate(key) {
                    in_flight.invalidated = true;
                }
            }
            marked
        };

        if marked.is_empty() {
            return 0;
        }

        counter!(METRIC_INVALIDATED, "cache" => self.inner.name).increment(marked.len() as u64);

        let refetches = self.inner.registry.loaders_for(&marked);
        info!(
            cache = self.inner.name,
            invalidated = marked.len(),
            refetching = refetches.len(),
            "Query cache entries invalidated"
        );

        for (key, loader) in refetches {
            self.spawn_refresh(key, loader);
        }

        marked.len()
    }

    fn spawn_refresh(&self, key: QueryKey, loader: Loader<T>) {
        let Ok(handle) = Handle::try_current() else {
            warn!(
                cache = self.inner.name,
                key = %key,
                "No async runtime for background refetch; entry reloads on next fetch"
            );
            return;
        };

        let cache = self.clone();
        handle.spawn(async move {
            let entry = cache.refetch(key.clone(), Arc::clone(&loader)).await;
            // A joined load may have started before the write landed.
            if entry.is_invalidated() {
                cache.refetch(key, loader).await;
            }
        });
    }

    /// Watch `key`. Invalidations of a watched key refetch it with `loader`.
    ///
    /// Dropping the returned subscription unregisters it.
    pub fn subscribe(&self, key: QueryKey, loader: Loader<T>) -> Subscription<T> {
        let current = self.get(&key);
        let receiver = self.inner.registry.subscribe(key.clone(), loader, current);
        debug!(cache = self.inner.name, key = %key, "Query subscribed");
        Subscription {
            key,
            cache: self.clone(),
            receiver,
        }
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner.registry.subscriber_count(key)
    }

    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        mutex_lock(&self.inner.state, SOURCE, "is_in_flight")
            .in_flight
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.inner.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Active watcher of one query key.
pub struct Subscription<T: Clone + Send + Sync + 'static> {
    key: QueryKey,
    cache: QueryCache<T>,
    receiver: EntryReceiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest entry published for this key.
    pub fn current(&self) -> Option<CacheEntry<T>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next entry update. `None` once the key is no longer watched.
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.inner.registry.unsubscribe(&self.key);
        debug!(cache = self.cache.inner.name, key = %self.key, "Query unsubscribed");
    }
}
