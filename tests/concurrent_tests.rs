//! Concurrent access tests for artifact construction
//! Tests the single-flight guard, shared caches and parallel histogram queries

use ler::{
    compute_ler, ArtifactCache, Collection, Configuration, DescriptorContext, DescriptorRows,
    EnvironmentVectorSource, InMemoryArtifactCache, LerError, LerParams, LruArtifactCache,
    PrecomputedVectors, SoapParams, StaticSeeds,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn random_vector(dim: usize) -> Vec<f32> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen::<f32>()).collect()
}

/// Descriptor engine that is slow, counts its calls and can be made to fail
struct SlowSource {
    inner: PrecomputedVectors,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl SlowSource {
    fn new(collection: &Collection, dim: usize) -> Self {
        let inner = PrecomputedVectors::new();
        for configuration in collection.iter() {
            inner.insert(
                configuration.id().clone(),
                (0..configuration.len()).map(|_| random_vector(dim)).collect(),
            );
        }
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }
}

impl EnvironmentVectorSource for SlowSource {
    fn vectors_for(&self, configuration: &Configuration, params: &SoapParams) -> ler::Result<DescriptorRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        if self.failing.load(Ordering::SeqCst) {
            return Err(LerError::Descriptor("engine offline".to_string()));
        }
        self.inner.vectors_for(configuration, params)
    }
}

fn collection(n_configs: usize, atoms: usize) -> Collection {
    Collection::from_configurations(
        "concurrent",
        (0..n_configs).map(|i| Configuration::homogeneous(format!("c{}", i), "Ni", atoms)),
    )
    .unwrap()
}

fn context(source: Arc<SlowSource>, cache: Arc<dyn ArtifactCache>) -> DescriptorContext {
    DescriptorContext::new(
        source,
        Arc::new(StaticSeeds::new().with_seed("Ni", vec![0.5; 8])),
        cache,
    )
}

// ============================================================================
// Single-flight Tests
// ============================================================================

#[test]
fn test_concurrent_callers_share_one_build() {
    let collection = Arc::new(collection(6, 10));
    let source = Arc::new(SlowSource::new(&collection, 8));
    let cache = Arc::new(InMemoryArtifactCache::new());
    let ctx = Arc::new(context(source.clone(), cache.clone()));
    let params = Arc::new(LerParams::new(0.8));

    let mut handles = vec![];
    for _ in 0..16 {
        let ctx = Arc::clone(&ctx);
        let collection = Arc::clone(&collection);
        let params = Arc::clone(&params);
        handles.push(thread::spawn(move || ctx.artifact(&collection, &params).unwrap()));
    }
    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // One build gathers each configuration exactly once.
    assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    assert!(artifacts.iter().all(|a| Arc::ptr_eq(a, &artifacts[0])));
    assert_eq!(cache.stats().size, 1);
}

#[test]
fn test_concurrent_histograms_are_consistent() {
    let collection = Arc::new(collection(8, 12));
    let source = Arc::new(SlowSource::new(&collection, 8));
    let ctx = Arc::new(context(source.clone(), Arc::new(InMemoryArtifactCache::new())));
    let params = Arc::new(LerParams::new(0.7));

    let mut handles = vec![];
    for i in 0..collection.len() {
        let ctx = Arc::clone(&ctx);
        let collection = Arc::clone(&collection);
        let params = Arc::clone(&params);
        handles.push(thread::spawn(move || {
            let id = collection.configurations()[i].id().clone();
            compute_ler(&id, &collection, &params, &ctx).unwrap().unwrap()
        }));
    }

    let histograms: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let bins = histograms[0].len();
    for hist in &histograms {
        assert_eq!(hist.len(), bins);
        assert_eq!(hist.total(), 12);
        assert!((hist.sum() - 1.0).abs() < 1e-9);
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), collection.len());
}

#[test]
fn test_contexts_sharing_a_cache_build_once() {
    let collection = Arc::new(collection(4, 6));
    let source = Arc::new(SlowSource::new(&collection, 8));
    let cache: Arc<dyn ArtifactCache> = Arc::new(LruArtifactCache::new(8).unwrap());
    let params = Arc::new(LerParams::new(0.8));

    let mut handles = vec![];
    for _ in 0..8 {
        let ctx = context(source.clone(), cache.clone());
        let collection = Arc::clone(&collection);
        let params = Arc::clone(&params);
        handles.push(thread::spawn(move || ctx.artifact(&collection, &params).unwrap()));
    }
    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    assert!(artifacts.iter().all(|a| Arc::ptr_eq(a, &artifacts[0])));
    assert_eq!(cache.stats().size, 1);
    assert_eq!(cache.flights().in_flight(), 0);
}

#[test]
fn test_independent_contexts_over_in_memory_cache_build_once() {
    let collection = Arc::new(collection(4, 6));
    let source = Arc::new(SlowSource::new(&collection, 8));
    let cache = Arc::new(InMemoryArtifactCache::new());
    let params = Arc::new(LerParams::new(0.8));

    let mut handles = vec![];
    for _ in 0..8 {
        let ctx = DescriptorContext::new(
            source.clone(),
            Arc::new(StaticSeeds::new().with_seed("Ni", vec![0.5; 8])),
            cache.clone(),
        );
        let collection = Arc::clone(&collection);
        let params = Arc::clone(&params);
        handles.push(thread::spawn(move || ctx.artifact(&collection, &params).unwrap()));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    assert_eq!(cache.stats().size, 1);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_failed_builds_cache_nothing() {
    let collection = Arc::new(collection(3, 4));
    let source = Arc::new(SlowSource::new(&collection, 8));
    source.failing.store(true, Ordering::SeqCst);
    let cache = Arc::new(InMemoryArtifactCache::new());
    let ctx = Arc::new(context(source.clone(), cache.clone()));
    let params = Arc::new(LerParams::new(0.8));

    let mut handles = vec![];
    for _ in 0..6 {
        let ctx = Arc::clone(&ctx);
        let collection = Arc::clone(&collection);
        let params = Arc::clone(&params);
        handles.push(thread::spawn(move || ctx.artifact(&collection, &params)));
    }
    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, LerError::Descriptor(_)));
    }
    assert_eq!(cache.stats().size, 0);
}

#[test]
fn test_build_succeeds_after_failure() {
    let collection = collection(2, 3);
    let source = Arc::new(SlowSource::new(&collection, 8));
    let cache = Arc::new(InMemoryArtifactCache::new());
    let ctx = context(source.clone(), cache.clone());
    let params = LerParams::new(0.8);

    source.failing.store(true, Ordering::SeqCst);
    assert!(ctx.artifact(&collection, &params).is_err());
    assert_eq!(cache.stats().size, 0);

    source.failing.store(false, Ordering::SeqCst);
    let artifact = ctx.artifact(&collection, &params).unwrap();
    assert_eq!(artifact.vector_count(), 6);
    assert_eq!(cache.stats().size, 1);
}
