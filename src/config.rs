//! Descriptor and LER Parameters
//!
//! [`SoapParams`] selects the per-atom descriptor the external engine
//! computes. [`LerParams`] adds everything the clustering pipeline needs on
//! top of it: the distance threshold, the metric, forest tuning and the
//! optional seed override.
//!
//! # Example
//!
//! ```
//! use ler::config::LerParams;
//! use ler::DistanceFunction;
//! use ler::indexing::forest::ForestConfig;
//!
//! let params = LerParams::new(0.5)
//!     .with_metric(DistanceFunction::Cosine)
//!     .with_forest(ForestConfig::new(20).with_seed(7));
//! params.validate()?;
//!
//! let loaded = LerParams::from_json(r#"{"eps": 0.5, "metric": "cosine"}"#)?;
//! assert_eq!(loaded.metric, DistanceFunction::Cosine);
//! assert_eq!(loaded.forest.n_trees, 10);
//! # Ok::<(), ler::LerError>(())
//! ```

use crate::distance::DistanceFunction;
use crate::error::{LerError, Result};
use crate::indexing::forest::ForestConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of the SOAP per-atom descriptor.
///
/// Passed through to the descriptor engine untouched, and part of the
/// artifact cache key in canonical JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapParams {
    /// Local environment cutoff radius
    pub rcut: f64,
    /// Radial basis bandwidth
    pub nmax: u32,
    /// Spherical harmonics bandwidth
    pub lmax: u32,
    /// Engine-specific options, forwarded as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for SoapParams {
    fn default() -> Self {
        Self {
            rcut: 5.0,
            nmax: 9,
            lmax: 9,
            extra: BTreeMap::new(),
        }
    }
}

impl SoapParams {
    /// Create parameters with the given cutoff and bandwidths
    pub fn new(rcut: f64, nmax: u32, lmax: u32) -> Self {
        Self {
            rcut,
            nmax,
            lmax,
            extra: BTreeMap::new(),
        }
    }

    /// Attach an engine-specific option
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !self.rcut.is_finite() || self.rcut <= 0.0 {
            return Err(LerError::InvalidConfig(format!(
                "rcut must be positive and finite, got {}",
                self.rcut
            )));
        }
        Ok(())
    }

    /// Deterministic JSON rendering; `extra` keys are sorted.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parameters of the average local environment representation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AsrParams {
    /// Per-atom descriptor to average
    #[serde(default)]
    pub soap: SoapParams,
    /// Scale the mean to unit L2 norm
    #[serde(default)]
    pub normalize: bool,
}

impl AsrParams {
    /// Unnormalized mean over `soap` rows
    pub fn new(soap: SoapParams) -> Self {
        Self { soap, normalize: false }
    }

    /// Enable unit-norm scaling
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }
}

/// Full parameter set of an LER computation.
///
/// Together with the collection identity and the resolved seed, these
/// fields form the artifact cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LerParams {
    /// Distance threshold for discovering a new center
    pub eps: f32,
    /// Distance function for clustering and the index
    #[serde(default)]
    pub metric: DistanceFunction,
    /// Per-atom descriptor selection
    #[serde(default)]
    pub soap: SoapParams,
    /// Approximate index tuning
    #[serde(default)]
    pub forest: ForestConfig,
    /// Explicit seed vector, bypassing the seed provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Vec<f32>>,
    /// Species to request a seed for; defaults to the collection's first atom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
}

impl LerParams {
    /// Parameters with the given threshold and defaults elsewhere
    pub fn new(eps: f32) -> Self {
        Self {
            eps,
            metric: DistanceFunction::default(),
            soap: SoapParams::default(),
            forest: ForestConfig::default(),
            seed: None,
            species: None,
        }
    }

    /// Set the distance function
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceFunction) -> Self {
        self.metric = metric;
        self
    }

    /// Set the forest tuning
    #[must_use]
    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Use `seed` instead of asking the seed provider
    #[must_use]
    pub fn with_seed_vector(mut self, seed: Vec<f32>) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Request the seed for `species`
    #[must_use]
    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Set the per-atom descriptor selection
    #[must_use]
    pub fn with_soap(mut self, soap: SoapParams) -> Self {
        self.soap = soap;
        self
    }

    /// Check every parameter range
    pub fn validate(&self) -> Result<()> {
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(LerError::InvalidConfig(format!(
                "eps must be finite and non-negative, got {}",
                self.eps
            )));
        }
        if !self.metric.is_distance() {
            return Err(LerError::InvalidConfig(format!(
                "metric {} is not a distance; use euclidean, manhattan or cosine",
                self.metric
            )));
        }
        self.forest.validate()?;
        self.soap.validate()?;
        if let Some(seed) = &self.seed {
            if seed.is_empty() {
                return Err(LerError::InvalidConfig("seed vector override is empty".to_string()));
            }
            if seed.iter().any(|x| !x.is_finite()) {
                return Err(LerError::InvalidConfig(
                    "seed vector override has a non-finite component".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate parameters from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
