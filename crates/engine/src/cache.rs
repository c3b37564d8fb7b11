//! Generation cache with per-fingerprint singleflight.
//!
//! [`GenerationCache`] is a cheap `Clone` handle; all clones share one
//! store. For each fingerprint at most one generation is ever in flight:
//! later callers, force refreshes included, join it and receive the same
//! result.
//!
//! Each generation runs on its own tokio task. A caller that is cancelled
//! while waiting only drops its handle on the shared flight; the task keeps
//! running, other waiters are unaffected, and a successful result is stored
//! even if nobody is left to receive it.
//!
//! Ordering: a successful result is stored *before* its in-flight marker is
//! removed, so any lookup that no longer sees the flight sees the entry.
//! Lock order is always `in_flight` then `entries`; neither lock is held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use gencache_config::CacheConfig;
use gencache_core::error::GenerationError;
use gencache_core::generation::{CacheEntry, Fingerprint, GenerationResult};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// What one generation resolves to.
pub type FlightOutput = Result<GenerationResult, GenerationError>;

type SharedFlight = Shared<BoxFuture<'static, FlightOutput>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// When false, lookups always miss and nothing is stored. Singleflight
    /// still applies.
    pub enabled: bool,
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: None,
            max_entries: None,
        }
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs)),
            max_entries: (config.max_entries > 0).then_some(config.max_entries),
        }
    }
}

/// How a [`GenerationCache::get_or_generate`] call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    /// This caller started the generation.
    Generated,
    /// This caller joined a generation already in flight.
    Coalesced,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub stores: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

struct Slot {
    entry: CacheEntry,
    stored_at: Instant,
    seq: u64,
}

struct Flight {
    id: u64,
    future: SharedFlight,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

struct CacheInner {
    settings: CacheSettings,
    entries: RwLock<HashMap<Fingerprint, Slot>>,
    in_flight: Mutex<HashMap<Fingerprint, Flight>>,
    next_seq: AtomicU64,
    counters: Counters,
}

#[derive(Clone)]
pub struct GenerationCache {
    inner: Arc<CacheInner>,
}

impl Default for GenerationCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl GenerationCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                settings,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// The live entry for a fingerprint. Expired entries are evicted and miss.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.inner.lookup(fingerprint)
    }

    /// Store a result, replacing any entry with the same fingerprint.
    pub fn store(&self, fingerprint: Fingerprint, subject_id: &str, result: GenerationResult) {
        self.inner.store(fingerprint, subject_id, result);
    }

    /// Remove every entry belonging to `subject_id`. Returns how many went.
    ///
    /// Generations already in flight are not cancelled and will still store
    /// their result when they finish.
    pub fn invalidate(&self, subject_id: &str) -> usize {
        let removed = {
            let mut entries = self.inner.entries.write();
            let before = entries.len();
            entries.retain(|_, slot| slot.entry.subject_id != subject_id);
            before - entries.len()
        };
        self.inner
            .counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(subject_id, removed, "Cache invalidated for subject");
        removed
    }

    pub fn invalidate_all(&self) -> usize {
        let removed = {
            let mut entries = self.inner.entries.write();
            let n = entries.len();
            entries.clear();
            n
        };
        self.inner
            .counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, "Cache cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a generation for this fingerprint is currently running.
    pub fn is_in_flight(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.in_flight.lock().contains_key(fingerprint)
    }

    pub fn stats(&self) -> CacheStats {
        let in_flight = self.inner.in_flight.lock().len();
        let entries = self.inner.entries.read().len();
        let c = &self.inner.counters;
        CacheStats {
            entries,
            in_flight,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            stores: c.stores.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Serve from the cache, join the flight in progress, or start one.
    ///
    /// `generate` is called at most once, and only when this caller becomes
    /// the leader. With `force_refresh` the lookup is skipped but an existing
    /// flight is still joined.
    pub async fn get_or_generate<F>(
        &self,
        fingerprint: &Fingerprint,
        subject_id: &str,
        force_refresh: bool,
        generate: F,
    ) -> Result<(GenerationResult, CacheOutcome), GenerationError>
    where
        F: FnOnce() -> BoxFuture<'static, FlightOutput>,
    {
        let (flight, outcome) = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(existing) = in_flight.get(fingerprint) {
                self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint.short(), "Joined in-flight generation");
                (existing.future.clone(), CacheOutcome::Coalesced)
            } else {
                if !force_refresh && let Some(entry) = self.inner.lookup(fingerprint) {
                    debug!(fingerprint = %fingerprint.short(), "Cache hit");
                    return Ok((entry.result.as_cached(), CacheOutcome::Hit));
                }
                let flight = self.launch(fingerprint.clone(), subject_id.to_string(), generate());
                let future = flight.future.clone();
                in_flight.insert(fingerprint.clone(), flight);
                (future, CacheOutcome::Generated)
            }
        };

        flight.await.map(|result| (result, outcome))
    }

    /// Spawn the generation task. Called with the `in_flight` lock held; the
    /// task cannot remove its marker before the caller has inserted it.
    fn launch(
        &self,
        fingerprint: Fingerprint,
        subject_id: String,
        work: BoxFuture<'static, FlightOutput>,
    ) -> Flight {
        let id = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let _marker = FlightMarker {
                inner: Arc::clone(&inner),
                fingerprint: fingerprint.clone(),
                id,
            };
            let result = work.await;
            if let Ok(generated) = &result {
                inner.store(fingerprint, &subject_id, generated.clone());
            }
            result
        });

        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Generation task did not complete");
                    Err(GenerationError::TaskFailed(e.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        Flight { id, future }
    }
}

impl std::fmt::Debug for GenerationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

impl CacheInner {
    fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        if !self.settings.enabled {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let expired = {
            let entries = self.entries.read();
            match entries.get(fingerprint) {
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(slot) if !self.is_expired(slot) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(slot.entry.clone());
                }
                Some(slot) => slot.seq,
            }
        };

        // Re-check under the write lock: the entry may have been replaced.
        let mut entries = self.entries.write();
        if entries.get(fingerprint).is_some_and(|s| s.seq == expired) {
            entries.remove(fingerprint);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %fingerprint.short(), "Expired cache entry evicted");
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn store(&self, fingerprint: Fingerprint, subject_id: &str, result: GenerationResult) {
        if !self.settings.enabled {
            return;
        }

        let slot = Slot {
            entry: CacheEntry {
                fingerprint: fingerprint.clone(),
                result: GenerationResult {
                    from_cache: false,
                    ..result
                },
                created_at: Utc::now(),
                subject_id: subject_id.to_string(),
            },
            stored_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = self.entries.write();
        if let Some(max) = self.settings.max_entries
            && !entries.contains_key(&fingerprint)
        {
            while entries.len() >= max {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, s)| s.seq)
                    .map(|(fp, _)| fp.clone())
                else {
                    break;
                };
                entries.remove(&oldest);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        entries.insert(fingerprint.clone(), slot);
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint = %fingerprint.short(), subject_id, "Result cached");
    }

    fn is_expired(&self, slot: &Slot) -> bool {
        self.settings
            .ttl
            .is_some_and(|ttl| slot.stored_at.elapsed() >= ttl)
    }
}

/// Removes the in-flight marker when the generation task ends, including by
/// panic or abort.
struct FlightMarker {
    inner: Arc<CacheInner>,
    fingerprint: Fingerprint,
    id: u64,
}

impl Drop for FlightMarker {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight
            .get(&self.fingerprint)
            .is_some_and(|flight| flight.id == self.id)
        {
            in_flight.remove(&self.fingerprint);
        }
    }
}
