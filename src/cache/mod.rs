//! Caching tiers.
//!
//! - [`VolatileCache`]: in-process map from [`CacheKey`] to [`AvatarRecord`].
//!   Fastest path, lost on restart. Backed by moka so it is safe to share
//!   across tasks and threads, and bounded so a long-running process with
//!   an unexpectedly large character universe cannot grow without limit.
//!
//! - [`durable::DurableCache`]: best-effort probe/upload against the CDN
//!   store. Survives restarts and is shared across processes.
//!
//! Entries never expire: a portrait is treated as immutable once produced
//! for a given subject. Replacement only happens through an explicit
//! regenerate.

pub mod durable;

pub use durable::DurableCache;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use tracing::error;

use crate::telemetry;
use crate::types::{AvatarRecord, CacheKey};

/// Default maximum number of entries in the volatile cache.
pub const DEFAULT_VOLATILE_CACHE_MAX: u64 = 10_000;

/// A running resolution every caller for the key can await. `None` if the
/// resolving task panicked.
type InFlight = Shared<BoxFuture<'static, Option<AvatarRecord>>>;

type InFlightMap = Arc<Mutex<HashMap<CacheKey, InFlight>>>;

enum Flight {
    /// The record landed after the caller's miss.
    Cached,
    Joined(InFlight),
    Started(InFlight),
}

/// Thread-safe process-local avatar cache.
///
/// Keyed on [`CacheKey`]. LRU-bounded; no TTL.
#[derive(Clone)]
pub struct VolatileCache {
    entries: Cache<CacheKey, AvatarRecord>,
    in_flight: InFlightMap,
}

impl VolatileCache {
    /// Create an empty cache with the default max capacity (10,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_VOLATILE_CACHE_MAX)
    }

    /// Create a cache with a custom max capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::new(max),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Look up a record.
    ///
    /// Returns `None` on cache miss. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &CacheKey) -> Option<AvatarRecord> {
        let hit = self.entries.get(key).await;
        let counter = if hit.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(counter, "tier" => "volatile").increment(1);
        hit
    }

    /// Insert (or replace) the record for its key.
    pub async fn set(&self, record: AvatarRecord) {
        self.entries.insert(record.key.clone(), record).await;
    }

    /// Return the cached record, or resolve one.
    ///
    /// `resolve` runs on its own task, which caches the result before it
    /// leaves the in-flight map. Every caller for the key awaits that one
    /// task, so dropping any caller (the first included) neither cancels it
    /// nor starts another. The flag is true for the caller that started it.
    ///
    /// Returns `None` only if the resolving task panicked.
    pub async fn get_or_resolve<F>(
        &self,
        key: CacheKey,
        resolve: F,
    ) -> Option<(AvatarRecord, bool)>
    where
        F: Future<Output = AvatarRecord> + Send + 'static,
    {
        match self.join_or_start(&key, resolve) {
            Flight::Cached => self.entries.get(&key).await.map(|record| (record, false)),
            Flight::Joined(flight) => flight.await.map(|record| (record, false)),
            Flight::Started(flight) => flight.await.map(|record| (record, true)),
        }
    }

    fn join_or_start<F>(&self, key: &CacheKey, resolve: F) -> Flight
    where
        F: Future<Output = AvatarRecord> + Send + 'static,
    {
        let mut in_flight = lock(&self.in_flight);
        if let Some(flight) = in_flight.get(key) {
            return Flight::Joined(flight.clone());
        }
        // The task writes the record before it unregisters, so an absent
        // entry with a present record means it already finished.
        if self.entries.contains_key(key) {
            return Flight::Cached;
        }

        let entries = self.entries.clone();
        let guard = InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            key: key.clone(),
        };
        let task = tokio::spawn(async move {
            let record = resolve.await;
            entries.insert(guard.key.clone(), record.clone()).await;
            drop(guard);
            record
        });

        let task_key = key.clone();
        let flight = async move {
            match task.await {
                Ok(record) => Some(record),
                Err(e) => {
                    error!(key = %task_key, error = %e, "avatar resolution task failed");
                    None
                }
            }
        }
        .boxed()
        .shared();
        in_flight.insert(key.clone(), flight.clone());
        Flight::Started(flight)
    }

}

/// Unregisters a resolution when its task ends, panics included.
struct InFlightGuard {
    registry: InFlightMap,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.key);
    }
}

fn lock(map: &InFlightMap) -> MutexGuard<'_, HashMap<CacheKey, InFlight>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for VolatileCache {
    fn default() -> Self {
        Self::new()
    }
}
