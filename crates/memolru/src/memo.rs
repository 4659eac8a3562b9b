//! Memoizing façades
//!
//! [`Memo`] is shared across threads: the store sits behind one mutex and the
//! wrapped computation always runs with that mutex released.
//! [`LocalMemo`] is the single-threaded variant and takes no locks at all.

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, MissPolicy};
use crate::error::{Error, Result};
use crate::flight::{Flights, Role};
use crate::key::{Args, Fingerprint};
use crate::lru::LruStore;
use crate::stats::CacheStats;

/// Thread-safe memoized function with LRU eviction
///
/// # Example
/// ```
/// use memolru::{Args, Memo};
///
/// let square = Memo::new(
///     |args: &Args| -> Result<i64, memolru::Error> {
///         let n = match args.args() {
///             [memolru::Value::Int(n)] => *n,
///             _ => 0,
///         };
///         Ok(n * n)
///     },
///     2,
/// )
/// .unwrap();
///
/// assert_eq!(square.call(&Args::new().arg(4)).unwrap(), 16);
/// assert_eq!(square.call(&Args::new().arg(4)).unwrap(), 16);
/// assert_eq!(square.stats().hits(), 1);
/// ```
pub struct Memo<F, V> {
    compute: F,
    store: Mutex<LruStore<Fingerprint, V>>,
    flights: Flights<V>,
    policy: MissPolicy,
    stats: CacheStats,
}

impl<F, V: Clone> Memo<F, V> {
    /// Wrap `compute` with a cache of `capacity` results
    ///
    /// # Errors
    /// * [`Error::InvalidConfiguration`] if `capacity` is zero
    pub fn new<E>(compute: F, capacity: usize) -> Result<Self>
    where
        F: Fn(&Args) -> std::result::Result<V, E>,
    {
        Self::with_config(compute, CacheConfig::with_capacity(capacity))
    }

    /// Wrap `compute` using a full [`CacheConfig`]
    pub fn with_config<E>(compute: F, config: CacheConfig) -> Result<Self>
    where
        F: Fn(&Args) -> std::result::Result<V, E>,
    {
        config.validate()?;
        debug!(
            capacity = config.capacity,
            policy = ?config.miss_policy,
            "created memo cache"
        );

        Ok(Self {
            compute,
            store: Mutex::new(LruStore::new(config.capacity)?),
            flights: Flights::new(),
            policy: config.miss_policy,
            stats: CacheStats::new(),
        })
    }

    /// Call the wrapped computation, serving repeated arguments from the cache
    ///
    /// Errors from the computation are returned unchanged and nothing is
    /// stored for them. Arguments that cannot be fingerprinted are rejected
    /// with [`Error::UnhashableArgument`] (converted into `E`) before the
    /// computation runs.
    pub fn call<E>(&self, args: &Args) -> std::result::Result<V, E>
    where
        F: Fn(&Args) -> std::result::Result<V, E>,
        E: From<Error>,
    {
        let key = match args.fingerprint() {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "rejected call");
                self.stats.record_rejected();
                return Err(err.into());
            }
        };

        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        match self.policy {
            MissPolicy::Concurrent => self.compute_and_store(key, args),
            MissPolicy::SingleFlight => self.call_single_flight(key, args),
        }
    }

    fn call_single_flight<E>(&self, key: Fingerprint, args: &Args) -> std::result::Result<V, E>
    where
        F: Fn(&Args) -> std::result::Result<V, E>,
    {
        loop {
            match self.flights.join(&key) {
                Role::Leader(leader) => {
                    // A previous leader may have stored its value after our miss.
                    if let Some(value) = self.recheck(&key) {
                        leader.complete(value.clone());
                        return Ok(value);
                    }

                    return match self.compute_and_store(key, args) {
                        Ok(value) => {
                            leader.complete(value.clone());
                            Ok(value)
                        }
                        Err(err) => {
                            leader.fail();
                            Err(err)
                        }
                    };
                }
                Role::Follower(flight) => {
                    trace!(key = %key, "waiting on in-flight computation");
                    if let Some(value) = flight.wait() {
                        self.stats.record_hit();
                        return Ok(value);
                    }
                    // The leader failed; try again ourselves.
                    if let Some(value) = self.recheck(&key) {
                        return Ok(value);
                    }
                }
            }
        }
    }

    fn lookup(&self, key: &Fingerprint) -> Option<V> {
        let value = self.store.lock().get(key).cloned();
        match &value {
            Some(_) => {
                trace!(key = %key, "cache hit");
                self.stats.record_hit();
            }
            None => {
                trace!(key = %key, "cache miss");
                self.stats.record_miss();
            }
        }
        value
    }

    /// Lookup for a caller whose miss is already counted; records hits only
    fn recheck(&self, key: &Fingerprint) -> Option<V> {
        let value = self.store.lock().get(key).cloned();
        if value.is_some() {
            trace!(key = %key, "cache hit on recheck");
            self.stats.record_hit();
        }
        value
    }

    fn compute_and_store<E>(&self, key: Fingerprint, args: &Args) -> std::result::Result<V, E>
    where
        F: Fn(&Args) -> std::result::Result<V, E>,
    {
        let value = match (self.compute)(args) {
            Ok(value) => value,
            Err(err) => {
                debug!(key = %key, "computation failed, nothing stored");
                self.stats.record_failure();
                return Err(err);
            }
        };

        let evicted = self.store.lock().put(key, value.clone());
        self.stats.record_insert();
        if let Some((old, _)) = evicted {
            debug!(key = %old, "evicted least recently used entry");
            self.stats.record_eviction();
        }
        Ok(value)
    }

    /// Current number of stored results
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Alias of [`Memo::len`]
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Maximum number of stored results
    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    /// Configured miss policy
    pub fn miss_policy(&self) -> MissPolicy {
        self.policy
    }

    /// Check for a stored result without touching recency
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.store.lock().contains(key)
    }

    /// Check for a stored result for `args` without touching recency
    pub fn contains_args(&self, args: &Args) -> Result<bool> {
        Ok(self.contains(&args.fingerprint()?))
    }

    /// Fingerprints from most to least recently used
    pub fn keys(&self) -> Vec<Fingerprint> {
        self.store.lock().keys().cloned().collect()
    }

    /// Drop one stored result; returns whether it was present
    pub fn invalidate(&self, key: &Fingerprint) -> bool {
        let removed = self.store.lock().remove(key).is_some();
        if removed {
            debug!(key = %key, "invalidated entry");
            self.stats.record_invalidation();
        }
        removed
    }

    /// Drop every stored result and reset statistics
    pub fn clear(&self) {
        self.store.lock().clear();
        self.stats.reset();
        debug!("cleared memo cache");
    }

    /// Number of single-flight computations currently running
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Usage statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Single-threaded memoized function with LRU eviction
///
/// Every operation runs to completion on the caller's thread, so no locking
/// or in-flight tracking is needed.
pub struct LocalMemo<F, V> {
    compute: F,
    store: LruStore<Fingerprint, V>,
    stats: CacheStats,
}

impl<F, V: Clone> LocalMemo<F, V> {
    /// Wrap `compute` with a cache of `capacity` results
    ///
    /// # Errors
    /// * [`Error::InvalidConfiguration`] if `capacity` is zero
    pub fn new<E>(compute: F, capacity: usize) -> Result<Self>
    where
        F: FnMut(&Args) -> std::result::Result<V, E>,
    {
        Self::with_config(compute, CacheConfig::with_capacity(capacity))
    }

    /// Wrap `compute` using a [`CacheConfig`]; the miss policy is irrelevant
    /// without concurrent callers and is ignored
    pub fn with_config<E>(compute: F, config: CacheConfig) -> Result<Self>
    where
        F: FnMut(&Args) -> std::result::Result<V, E>,
    {
        config.validate()?;
        debug!(capacity = config.capacity, "created local memo cache");

        Ok(Self {
            compute,
            store: LruStore::new(config.capacity)?,
            stats: CacheStats::new(),
        })
    }

    /// Call the wrapped computation, serving repeated arguments from the cache
    pub fn call<E>(&mut self, args: &Args) -> std::result::Result<V, E>
    where
        F: FnMut(&Args) -> std::result::Result<V, E>,
        E: From<Error>,
    {
        let key = match args.fingerprint() {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "rejected call");
                self.stats.record_rejected();
                return Err(err.into());
            }
        };

        if let Some(value) = self.store.get(&key) {
            trace!(key = %key, "cache hit");
            self.stats.record_hit();
            return Ok(value.clone());
        }
        trace!(key = %key, "cache miss");
        self.stats.record_miss();

        let value = match (self.compute)(args) {
            Ok(value) => value,
            Err(err) => {
                debug!(key = %key, "computation failed, nothing stored");
                self.stats.record_failure();
                return Err(err);
            }
        };

        self.stats.record_insert();
        if let Some((old, _)) = self.store.put(key, value.clone()) {
            debug!(key = %old, "evicted least recently used entry");
            self.stats.record_eviction();
        }
        Ok(value)
    }

    /// Current number of stored results
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Alias of [`LocalMemo::len`]
    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Maximum number of stored results
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Check for a stored result without touching recency
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.store.contains(key)
    }

    /// Check for a stored result for `args` without touching recency
    pub fn contains_args(&self, args: &Args) -> Result<bool> {
        Ok(self.store.contains(&args.fingerprint()?))
    }

    /// Fingerprints from most to least recently used
    pub fn keys(&self) -> Vec<Fingerprint> {
        self.store.keys().cloned().collect()
    }

    /// Drop one stored result; returns whether it was present
    pub fn invalidate(&mut self, key: &Fingerprint) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            debug!(key = %key, "invalidated entry");
            self.stats.record_invalidation();
        }
        removed
    }

    /// Drop every stored result and reset statistics
    pub fn clear(&mut self) {
        self.store.clear();
        self.stats.reset();
        debug!("cleared local memo cache");
    }

    /// Usage statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
