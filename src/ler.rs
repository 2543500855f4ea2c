//! The LER Pipeline
//!
//! Computing a configuration's LER takes four phases:
//!
//! 1. Resolve the seed vector and derive the artifact's [`CacheKey`].
//! 2. On a cache miss, under the single-flight guard for that key:
//!    gather every local environment of the collection, discover centers
//!    greedily, build a forest over them, assign every environment, and
//!    cache the finished artifact.
//! 3. Release the forest. It never outlives the build.
//! 4. Read the configuration's histogram off the shared artifact.
//!
//! Phases 2 and 3 run at most once per key, however many callers ask
//! concurrently. A failed build caches nothing and the error reaches every
//! caller that led a build attempt.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ler::{compute_ler, Collection, Configuration, DescriptorContext, InMemoryArtifactCache,
//!           LerParams, PrecomputedVectors, StaticSeeds};
//!
//! let vectors = PrecomputedVectors::new();
//! vectors.insert("A", vec![vec![0.1, 0.1], vec![5.0, 5.0], vec![5.1, 5.1]]);
//! vectors.insert("B", vec![vec![0.0, 0.2], vec![5.0, 5.2]]);
//! let collection = Collection::from_configurations(
//!     "demo",
//!     vec![Configuration::homogeneous("A", "Ni", 3), Configuration::homogeneous("B", "Ni", 2)],
//! )?;
//!
//! let ctx = DescriptorContext::new(
//!     Arc::new(vectors),
//!     Arc::new(StaticSeeds::new().with_seed("Ni", vec![0.0, 0.0])),
//!     Arc::new(InMemoryArtifactCache::new()),
//! );
//! let params = LerParams::new(1.0);
//!
//! let b = compute_ler(&"B".into(), &collection, &params, &ctx)?.expect("B has atoms");
//! assert_eq!(b.values(), &[0.5, 0.5]);
//! # Ok::<(), ler::LerError>(())
//! ```

use crate::artifact::ClusteringArtifact;
use crate::assign::Assigner;
use crate::cache::CacheKey;
use crate::clustering::ClusterBuilder;
use crate::config::LerParams;
use crate::descriptor::DescriptorContext;
use crate::environment::{EnvironmentTable, EnvironmentVectorSource, SeedProvider};
use crate::error::{LerError, Result};
use crate::histogram::Histogram;
use crate::indexing::forest::ForestIndex;
use crate::structure::{Collection, ConfigurationId};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The seed override from `params`, or the provider's seed for the requested
/// species (the collection's first species when none is given).
pub fn resolve_seed(collection: &Collection, params: &LerParams, seeds: &dyn SeedProvider) -> Result<Vec<f32>> {
    if let Some(seed) = &params.seed {
        return Ok(seed.clone());
    }
    let species = params
        .species
        .as_deref()
        .or_else(|| collection.first_species())
        .ok_or_else(|| {
            LerError::SeedUnavailable(format!(
                "collection '{}' has no atoms and no species was given",
                collection.name()
            ))
        })?;
    debug!(species, "Requesting seed vector");
    seeds.seed_for(species, &params.soap)
}

/// Build the clustering artifact of `collection` from scratch.
///
/// Gathers every local environment, discovers centers, classifies every
/// environment with a scoped forest index and checks the partition. Any
/// absent or malformed vector aborts the build.
#[instrument(skip_all, fields(collection = %collection.name(), eps = params.eps, metric = %params.metric))]
pub fn build_artifact(
    collection: &Collection,
    params: &LerParams,
    seed: Vec<f32>,
    source: &dyn EnvironmentVectorSource,
) -> Result<ClusteringArtifact> {
    let table = EnvironmentTable::gather(collection, source, &params.soap)?;
    let centers = ClusterBuilder::build_from_table(seed, &table, params.eps, params.metric)?;
    info!(
        environments = table.len(),
        centers = centers.len(),
        "Discovered cluster centers"
    );

    let buckets = ForestIndex::scoped(&centers, params.metric, params.forest.clone(), |index| {
        Assigner::new(&centers, index)?.assign(&table)
    })?;

    let artifact = ClusteringArtifact::new(centers, buckets)?;
    artifact.validate(&table)?;
    Ok(artifact)
}

impl DescriptorContext {
    /// The shared artifact for `params` over `collection`, built at most once per key
    pub fn artifact(&self, collection: &Collection, params: &LerParams) -> Result<Arc<ClusteringArtifact>> {
        params.validate()?;
        let seed = resolve_seed(collection, params, self.seeds.as_ref())?;
        let key = CacheKey::new(collection, params, &seed)?;

        self.cache.flights().run(
            &key,
            || {
                let hit = self.cache.get(&key);
                if hit.is_some() {
                    debug!(key = %key, "Artifact cache hit");
                }
                hit
            },
            || {
                debug!(key = %key, "Artifact cache miss; building");
                let artifact = Arc::new(build_artifact(collection, params, seed, self.source.as_ref())?);
                self.cache.put(key.clone(), Arc::clone(&artifact));
                info!(
                    key = %key,
                    centers = artifact.center_count(),
                    environments = artifact.vector_count(),
                    "Cached clustering artifact"
                );
                Ok(artifact)
            },
        )
    }
}

/// LER histogram of `configuration` within `collection`.
///
/// Returns `Ok(None)` when the configuration has no local environments.
pub fn compute_ler(
    configuration: &ConfigurationId,
    collection: &Collection,
    params: &LerParams,
    ctx: &DescriptorContext,
) -> Result<Option<Histogram>> {
    if !collection.contains(configuration) {
        return Err(LerError::ConfigurationNotFound(configuration.to_string()));
    }
    let artifact = ctx.artifact(collection, params)?;
    Ok(artifact.histogram(configuration))
}
