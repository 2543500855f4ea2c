//! # LER - Local Environment Representation
//!
//! Computes a compact statistical fingerprint of atomic configurations.
//! Across a whole collection, a small set of representative local
//! environment vectors is discovered greedily under a distance threshold.
//! Every atom's environment is then classified against that set with an
//! approximate nearest-neighbor forest, and each configuration is summarized
//! as the normalized histogram of its atoms over the representatives.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ler::prelude::*;
//!
//! fn main() -> ler::Result<()> {
//!     // Precomputed per-atom vectors stand in for a descriptor engine
//!     let vectors = PrecomputedVectors::new();
//!     vectors.insert("A", vec![vec![0.1, 0.1], vec![5.0, 5.0], vec![5.1, 5.1]]);
//!     vectors.insert("B", vec![vec![0.0, 0.2], vec![5.0, 5.2]]);
//!
//!     let collection = Collection::from_configurations(
//!         "grain_boundaries",
//!         vec![
//!             Configuration::homogeneous("A", "Ni", 3),
//!             Configuration::homogeneous("B", "Ni", 2),
//!         ],
//!     )?;
//!
//!     let ctx = DescriptorContext::new(
//!         Arc::new(vectors),
//!         Arc::new(StaticSeeds::new().with_seed("Ni", vec![0.0, 0.0])),
//!         Arc::new(InMemoryArtifactCache::new()),
//!     );
//!
//!     let params = LerParams::new(1.0);
//!     let a = compute_ler(&"A".into(), &collection, &params, &ctx)?;
//!     let a = a.expect("A has atoms");
//!     assert_eq!(a.len(), 2);
//!     assert!((a.sum() - 1.0).abs() < 1e-9);
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Clustering** ([`clustering`]): one ordered, greedy pass; the seed is
//!   always center 0 and traversal order is part of the result.
//! - **Indexing** ([`indexing::forest`]): random projection trees built in
//!   parallel over the centers, scoped to the build.
//! - **Assignment** ([`assign`]): every environment lands in exactly one bucket.
//! - **Histograms** ([`histogram`]): per-configuration bucket shares.
//! - **Caching** ([`cache`], [`single_flight`]): one artifact per parameter
//!   set, built at most once even under concurrent requests.

#![warn(missing_docs)]

// ── Core ──────────────────────────────────────────────────────────────────────
pub mod distance;
pub mod error;
pub mod structure;
pub mod environment;
pub mod config;

// ── Clustering & Indexing ─────────────────────────────────────────────────────
pub mod clustering;
pub mod indexing;
pub use indexing::forest;
pub mod assign;
pub mod histogram;
pub mod artifact;

// ── Memoization ───────────────────────────────────────────────────────────────
pub mod cache;
pub mod single_flight;

// ── Descriptors ───────────────────────────────────────────────────────────────
pub mod descriptor;
pub mod ler;

// ── Stable API ───────────────────────────────────────────────────────────────
pub use artifact::ClusteringArtifact;
pub use assign::{Assigner, Buckets};
pub use cache::{ArtifactCache, ArtifactCacheStats, CacheKey, InMemoryArtifactCache, LruArtifactCache};
pub use clustering::{CenterId, ClusterBuilder, ClusterCenter, ClusterCenters};
pub use config::{AsrParams, LerParams, SoapParams};
pub use descriptor::{describe, Descriptor, DescriptorContext, DescriptorKind, DescriptorValue};
pub use distance::DistanceFunction;
pub use environment::{
    DescriptorRows, EnvironmentId, EnvironmentTable, EnvironmentVectorSource, LocalEnvironment,
    PrecomputedVectors, SeedProvider, StaticSeeds,
};
pub use error::{ErrorCode, LerError, Recoverable, RecoveryHint, Result};
pub use forest::{ForestConfig, ForestIndex, ForestStats};
pub use histogram::{Histogram, HistogramBuilder};
pub use ler::{build_artifact, compute_ler, resolve_seed};
pub use single_flight::SingleFlight;
pub use structure::{Atom, Collection, Configuration, ConfigurationId};

/// Prelude module for convenient imports.
///
/// ```rust
/// use ler::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{ArtifactCache, InMemoryArtifactCache, LruArtifactCache};
    pub use crate::config::{LerParams, SoapParams};
    pub use crate::descriptor::{describe, DescriptorContext, DescriptorKind, DescriptorValue};
    pub use crate::distance::DistanceFunction;
    pub use crate::environment::{EnvironmentVectorSource, PrecomputedVectors, SeedProvider, StaticSeeds};
    pub use crate::error::{LerError, Result};
    pub use crate::forest::ForestConfig;
    pub use crate::histogram::Histogram;
    pub use crate::ler::compute_ler;
    pub use crate::structure::{Atom, Collection, Configuration, ConfigurationId};
}
