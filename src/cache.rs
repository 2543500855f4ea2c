//! Artifact Cache
//!
//! Clustering artifacts are memoized under a [`CacheKey`] that captures
//! everything the artifact depends on: collection identity, threshold,
//! metric, descriptor selection, forest tuning and the resolved seed.
//!
//! Every cache owns the [`SingleFlight`] guard for its keys, so all
//! contexts sharing one cache also share its in-flight builds. At most one
//! build per key runs at a time. Only complete artifacts are ever `put`.

use crate::artifact::ClusteringArtifact;
use crate::config::LerParams;
use crate::distance::DistanceFunction;
use crate::error::{LerError, Result};
use crate::indexing::forest::ForestConfig;
use crate::single_flight::SingleFlight;
use crate::structure::{hex, Collection};
use lru::LruCache;
use ordered_float::OrderedFloat;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Composite identity of a clustering artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Collection fingerprint
    pub collection: String,
    /// Distance threshold
    pub eps: OrderedFloat<f32>,
    /// Distance function
    pub metric: DistanceFunction,
    /// Canonical JSON of the per-atom descriptor selection
    pub descriptor: String,
    /// Forest tuning
    pub forest: ForestConfig,
    /// Digest of the resolved seed vector
    pub seed: String,
}

impl CacheKey {
    /// Key for building `params` over `collection` from `seed`
    pub fn new(collection: &Collection, params: &LerParams, seed: &[f32]) -> Result<Self> {
        Ok(Self {
            collection: collection.fingerprint(),
            eps: OrderedFloat(params.eps),
            metric: params.metric,
            descriptor: params.soap.canonical_json()?,
            forest: params.forest.clone(),
            seed: seed_digest(seed),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/eps={}/{}/trees={}/seed={}",
            &self.collection[..self.collection.len().min(12)],
            self.eps,
            self.metric,
            self.forest.n_trees,
            &self.seed[..self.seed.len().min(12)]
        )
    }
}

fn seed_digest(seed: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for x in seed {
        hasher.update(x.to_le_bytes());
    }
    hex(&hasher.finalize())
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactCacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Current number of cached artifacts
    pub size: usize,
    /// Maximum number of artifacts, `None` if unbounded
    pub capacity: Option<usize>,
}

impl ArtifactCacheStats {
    /// Returns the cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key/value store for finished artifacts
pub trait ArtifactCache: Send + Sync {
    /// Look up an artifact
    fn get(&self, key: &CacheKey) -> Option<Arc<ClusteringArtifact>>;

    /// Store a complete artifact
    fn put(&self, key: CacheKey, artifact: Arc<ClusteringArtifact>);

    /// Hit/miss counters and occupancy
    fn stats(&self) -> ArtifactCacheStats;

    /// Build guard shared by every user of this cache
    fn flights(&self) -> &SingleFlight<CacheKey>;
}

/// Unbounded in-memory cache
#[derive(Debug, Default)]
pub struct InMemoryArtifactCache {
    entries: RwLock<HashMap<CacheKey, Arc<ClusteringArtifact>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    flights: SingleFlight<CacheKey>,
}

impl InMemoryArtifactCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every artifact
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl ArtifactCache for InMemoryArtifactCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<ClusteringArtifact>> {
        let found = self.entries.read().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, key: CacheKey, artifact: Arc<ClusteringArtifact>) {
        self.entries.write().insert(key, artifact);
    }

    fn stats(&self) -> ArtifactCacheStats {
        ArtifactCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.read().len(),
            capacity: None,
        }
    }

    fn flights(&self) -> &SingleFlight<CacheKey> {
        &self.flights
    }
}

struct LruInner {
    cache: LruCache<CacheKey, Arc<ClusteringArtifact>>,
    hits: u64,
    misses: u64,
}

/// Bounded cache evicting the least recently used artifact
pub struct LruArtifactCache {
    inner: Mutex<LruInner>,
    capacity: usize,
    flights: SingleFlight<CacheKey>,
}

impl fmt::Debug for LruArtifactCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruArtifactCache")
            .field("size", &inner.cache.len())
            .field("capacity", &self.capacity)
            .field("hits", &inner.hits)
            .field("misses", &inner.misses)
            .field("flights", &self.flights)
            .finish()
    }
}

impl LruArtifactCache {
    /// Create a cache holding at most `capacity` artifacts
    pub fn new(capacity: usize) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity)
            .ok_or_else(|| LerError::InvalidConfig("artifact cache capacity must be positive".to_string()))?;
        Ok(Self {
            inner: Mutex::new(LruInner {
                cache: LruCache::new(cap),
                hits: 0,
                misses: 0,
            }),
            capacity,
            flights: SingleFlight::new(),
        })
    }
}

impl ArtifactCache for LruArtifactCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<ClusteringArtifact>> {
        let mut inner = self.inner.lock();
        if let Some(artifact) = inner.cache.get(key).cloned() {
            inner.hits += 1;
            Some(artifact)
        } else {
            inner.misses += 1;
            None
        }
    }

    fn put(&self, key: CacheKey, artifact: Arc<ClusteringArtifact>) {
        self.inner.lock().cache.put(key, artifact);
    }

    fn stats(&self) -> ArtifactCacheStats {
        let inner = self.inner.lock();
        ArtifactCacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.cache.len(),
            capacity: Some(self.capacity),
        }
    }

    fn flights(&self) -> &SingleFlight<CacheKey> {
        &self.flights
    }
}
