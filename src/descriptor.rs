//! Descriptor Registry
//!
//! Every structural descriptor the crate can produce is one variant of
//! [`DescriptorKind`], carrying its own typed parameters. Each variant has a
//! [`Descriptor`] implementation, and [`describe`] dispatches between them.
//!
//! | Kind | Output |
//! |------|--------|
//! | `Soap` | Per-atom local environment vectors from the descriptor engine |
//! | `Asr` | Mean of the per-atom vectors, optionally unit-normalized |
//! | `Ler` | Histogram over cluster centers discovered across the collection |
//!
//! Collaborators (the descriptor engine, the seed provider, the artifact
//! cache) are injected through a [`DescriptorContext`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ler::descriptor::{describe, DescriptorContext, DescriptorKind, DescriptorValue};
//! use ler::config::AsrParams;
//! use ler::{Collection, Configuration, InMemoryArtifactCache, PrecomputedVectors, StaticSeeds};
//!
//! let vectors = PrecomputedVectors::new();
//! vectors.insert("a", vec![vec![1.0, 0.0], vec![3.0, 0.0]]);
//! let ctx = DescriptorContext::new(
//!     Arc::new(vectors),
//!     Arc::new(StaticSeeds::new()),
//!     Arc::new(InMemoryArtifactCache::new()),
//! );
//!
//! let collection = Collection::from_configurations("c", vec![Configuration::homogeneous("a", "Ni", 2)])?;
//! let kind = DescriptorKind::Asr(AsrParams::default());
//! let value = describe(&kind, &collection.configurations()[0], &collection, &ctx)?;
//! assert_eq!(value, DescriptorValue::Vector(vec![2.0, 0.0]));
//! # Ok::<(), ler::LerError>(())
//! ```

use crate::cache::ArtifactCache;
use crate::config::{AsrParams, LerParams, SoapParams};
use crate::environment::{EnvironmentVectorSource, SeedProvider};
use crate::error::{LerError, Result};
use crate::histogram::Histogram;
use crate::ler::compute_ler;
use crate::structure::{Collection, Configuration};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Descriptor selection with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorKind {
    /// Per-atom SOAP vectors
    Soap(SoapParams),
    /// Average SOAP representation
    Asr(AsrParams),
    /// Local environment representation histogram
    Ler(LerParams),
}

impl DescriptorKind {
    /// Stable name of the selected descriptor
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Soap(_) => "soap",
            DescriptorKind::Asr(_) => "asr",
            DescriptorKind::Ler(_) => "ler",
        }
    }

    /// Check the parameters of the selected descriptor
    pub fn validate(&self) -> Result<()> {
        match self {
            DescriptorKind::Soap(params) => params.validate(),
            DescriptorKind::Asr(params) => params.soap.validate(),
            DescriptorKind::Ler(params) => params.validate(),
        }
    }
}

/// Result of computing a descriptor for one configuration
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValue {
    /// One vector per atom
    PerAtom(Vec<Vec<f32>>),
    /// A single vector for the whole configuration
    Vector(Vec<f32>),
    /// An LER histogram
    Histogram(Histogram),
    /// No value is defined, e.g. for a configuration without atoms
    Empty,
}

impl DescriptorValue {
    /// True if no value is defined
    pub fn is_empty(&self) -> bool {
        matches!(self, DescriptorValue::Empty)
    }
}

/// Injected collaborators shared by every descriptor computation
#[derive(Clone)]
pub struct DescriptorContext {
    pub(crate) source: Arc<dyn EnvironmentVectorSource>,
    pub(crate) seeds: Arc<dyn SeedProvider>,
    pub(crate) cache: Arc<dyn ArtifactCache>,
}

impl fmt::Debug for DescriptorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorContext")
            .field("cache", &self.cache.stats())
            .field("flights", self.cache.flights())
            .finish()
    }
}

impl DescriptorContext {
    /// Create a context; contexts over the same cache share its in-flight builds
    pub fn new(
        source: Arc<dyn EnvironmentVectorSource>,
        seeds: Arc<dyn SeedProvider>,
        cache: Arc<dyn ArtifactCache>,
    ) -> Self {
        Self {
            source,
            seeds,
            cache,
        }
    }

    /// The artifact cache
    pub fn cache(&self) -> &dyn ArtifactCache {
        self.cache.as_ref()
    }

    /// The descriptor engine
    pub fn source(&self) -> &dyn EnvironmentVectorSource {
        self.source.as_ref()
    }

    /// The seed provider
    pub fn seeds(&self) -> &dyn SeedProvider {
        self.seeds.as_ref()
    }
}

/// A structural descriptor computed per configuration
pub trait Descriptor {
    /// Compute the descriptor of `configuration`, a member of `collection`
    fn compute(
        &self,
        configuration: &Configuration,
        collection: &Collection,
        ctx: &DescriptorContext,
    ) -> Result<DescriptorValue>;
}

/// Per-atom vectors straight from the descriptor engine
pub struct SoapDescriptor<'a>(pub &'a SoapParams);

impl SoapDescriptor<'_> {
    fn rows(&self, configuration: &Configuration, ctx: &DescriptorContext) -> Result<Vec<Vec<f32>>> {
        let mut rows = ctx.source.vectors_for(configuration, self.0)?;
        rows.truncate(configuration.len());
        let present = rows.len();
        let mut vectors = Vec::with_capacity(present);
        for (atom, row) in rows.into_iter().enumerate() {
            vectors.push(row.ok_or_else(|| missing(configuration, atom))?);
        }
        if present < configuration.len() {
            return Err(missing(configuration, present));
        }
        Ok(vectors)
    }
}

fn missing(configuration: &Configuration, atom: usize) -> LerError {
    LerError::MissingDescriptor {
        configuration: configuration.id().to_string(),
        atom,
    }
}

impl Descriptor for SoapDescriptor<'_> {
    fn compute(&self, configuration: &Configuration, _: &Collection, ctx: &DescriptorContext) -> Result<DescriptorValue> {
        Ok(DescriptorValue::PerAtom(self.rows(configuration, ctx)?))
    }
}

/// Mean of the per-atom vectors
pub struct AsrDescriptor<'a>(pub &'a AsrParams);

impl Descriptor for AsrDescriptor<'_> {
    fn compute(&self, configuration: &Configuration, _: &Collection, ctx: &DescriptorContext) -> Result<DescriptorValue> {
        let rows = SoapDescriptor(&self.0.soap).rows(configuration, ctx)?;
        let Some(first) = rows.first() else {
            return Ok(DescriptorValue::Empty);
        };

        let dims = first.len();
        let mut mean = vec![0.0f32; dims];
        for row in &rows {
            if row.len() != dims {
                return Err(LerError::DimensionMismatch {
                    expected: dims,
                    got: row.len(),
                });
            }
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        let n = rows.len() as f32;
        mean.iter_mut().for_each(|m| *m /= n);

        if self.0.normalize {
            let norm = mean.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                mean.iter_mut().for_each(|m| *m /= norm);
            }
        }
        Ok(DescriptorValue::Vector(mean))
    }
}

/// LER histogram against the collection's clustering artifact
pub struct LerDescriptor<'a>(pub &'a LerParams);

impl Descriptor for LerDescriptor<'_> {
    fn compute(
        &self,
        configuration: &Configuration,
        collection: &Collection,
        ctx: &DescriptorContext,
    ) -> Result<DescriptorValue> {
        Ok(match compute_ler(configuration.id(), collection, self.0, ctx)? {
            Some(histogram) => DescriptorValue::Histogram(histogram),
            None => DescriptorValue::Empty,
        })
    }
}

/// Compute the descriptor selected by `kind`
pub fn describe(
    kind: &DescriptorKind,
    configuration: &Configuration,
    collection: &Collection,
    ctx: &DescriptorContext,
) -> Result<DescriptorValue> {
    match kind {
        DescriptorKind::Soap(params) => SoapDescriptor(params).compute(configuration, collection, ctx),
        DescriptorKind::Asr(params) => AsrDescriptor(params).compute(configuration, collection, ctx),
        DescriptorKind::Ler(params) => LerDescriptor(params).compute(configuration, collection, ctx),
    }
}
