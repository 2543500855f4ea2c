//! Greedy Cluster-Center Discovery
//!
//! Discovers a small set of representative local environments in one online
//! pass over a collection. The seed is always the first center. Every vector
//! is then compared to every center registered so far: if some center lies
//! closer than `eps` the vector is covered, otherwise it becomes a new center
//! under its own id.
//!
//! # Order Dependence
//!
//! The pass is sequential and stateful. Changing the traversal order changes
//! which vectors become centers and, in general, how many there are. The
//! creation order of centers is part of the output: histogram bin `i`
//! corresponds to the `i`-th registered center.
//!
//! # Complexity
//!
//! O(N * C) distance evaluations for N vectors and C final centers.
//!
//! # Example
//!
//! ```
//! use ler::clustering::ClusterBuilder;
//! use ler::{DistanceFunction, EnvironmentId};
//!
//! let mut builder = ClusterBuilder::new(vec![0.0, 0.0], 1.0, DistanceFunction::Euclidean)?;
//! assert!(!builder.observe(EnvironmentId::new("a", 0), Some(&[0.1, 0.1]))?);
//! assert!(builder.observe(EnvironmentId::new("a", 1), Some(&[5.0, 5.0]))?);
//! assert_eq!(builder.centers().len(), 2);
//! # Ok::<(), ler::LerError>(())
//! ```

use crate::distance::DistanceFunction;
use crate::environment::{EnvironmentId, EnvironmentTable};
use crate::error::{LerError, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a cluster center: the seed, or the environment it was promoted from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterId {
    /// The reference seed, always center 0
    Seed,
    /// A local environment promoted to a center
    Environment(EnvironmentId),
}

impl fmt::Display for CenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CenterId::Seed => f.write_str("(seed, 0)"),
            CenterId::Environment(id) => write!(f, "{}", id),
        }
    }
}

/// A representative local environment vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCenter {
    /// Where the center came from
    pub id: CenterId,
    /// Its feature vector
    pub vector: Vec<f32>,
}

/// Centers in creation order. Never empty: the seed is always first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCenters {
    centers: Vec<ClusterCenter>,
}

impl ClusterCenters {
    /// A center set holding only the seed
    pub fn seeded(seed: Vec<f32>) -> Self {
        Self {
            centers: vec![ClusterCenter {
                id: CenterId::Seed,
                vector: seed,
            }],
        }
    }

    /// Rebuild from stored centers, checking the seed-first invariant
    pub fn from_centers(centers: Vec<ClusterCenter>) -> Result<Self> {
        match centers.first() {
            Some(first) if first.id == CenterId::Seed => {}
            _ => {
                return Err(LerError::InvalidConfig(
                    "center list must start with the seed".to_string(),
                ))
            }
        }
        let dims = centers[0].vector.len();
        for center in &centers {
            if center.vector.len() != dims {
                return Err(LerError::DimensionMismatch {
                    expected: dims,
                    got: center.vector.len(),
                });
            }
        }
        Ok(Self { centers })
    }

    fn push(&mut self, id: CenterId, vector: Vec<f32>) {
        self.centers.push(ClusterCenter { id, vector });
    }

    /// Number of centers (at least 1)
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Whether there are no centers; `false` once seeded
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Vector dimensionality shared by all centers
    pub fn dimensions(&self) -> usize {
        self.seed().len()
    }

    /// The seed vector
    pub fn seed(&self) -> &[f32] {
        &self.centers[0].vector
    }

    /// Center at a creation-order position
    pub fn get(&self, index: usize) -> Option<&ClusterCenter> {
        self.centers.get(index)
    }

    /// Creation-order position of a center
    pub fn position(&self, id: &CenterId) -> Option<usize> {
        self.centers.iter().position(|c| &c.id == id)
    }

    /// Centers in creation order
    pub fn iter(&self) -> impl Iterator<Item = &ClusterCenter> {
        self.centers.iter()
    }

    /// Center ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = &CenterId> {
        self.centers.iter().map(|c| &c.id)
    }

    /// Exact nearest center by brute force: (position, distance)
    pub fn nearest_exact(&self, vector: &[f32], metric: DistanceFunction) -> (usize, f32) {
        self.centers
            .iter()
            .enumerate()
            .map(|(i, c)| (i, metric.compute(vector, &c.vector)))
            .min_by_key(|(_, d)| OrderedFloat(*d))
            .unwrap_or((0, f32::INFINITY))
    }
}

/// Check a vector against the expected dimensionality and for non-finite values
pub(crate) fn check_vector(id: &EnvironmentId, vector: &[f32], dims: usize) -> Result<()> {
    if vector.len() != dims {
        return Err(LerError::DimensionMismatch {
            expected: dims,
            got: vector.len(),
        });
    }
    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(LerError::InvalidVector(format!(
            "environment {} has a non-finite component at index {}",
            id, pos
        )));
    }
    Ok(())
}

/// Online greedy center discovery under a distance threshold
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    eps: f32,
    metric: DistanceFunction,
    centers: ClusterCenters,
    observed: usize,
}

impl ClusterBuilder {
    /// Start a pass with `seed` as center 0.
    ///
    /// `eps` must be finite and non-negative; the seed must be non-empty and finite.
    pub fn new(seed: Vec<f32>, eps: f32, metric: DistanceFunction) -> Result<Self> {
        if !eps.is_finite() || eps < 0.0 {
            return Err(LerError::InvalidConfig(format!(
                "eps must be finite and non-negative, got {}",
                eps
            )));
        }
        if !metric.is_distance() {
            return Err(LerError::InvalidConfig(format!(
                "{} is not a distance; clustering needs euclidean, manhattan or cosine",
                metric
            )));
        }
        if seed.is_empty() {
            return Err(LerError::InvalidConfig("seed vector is empty".to_string()));
        }
        if seed.iter().any(|x| !x.is_finite()) {
            return Err(LerError::InvalidVector("seed has a non-finite component".to_string()));
        }
        Ok(Self {
            eps,
            metric,
            centers: ClusterCenters::seeded(seed),
            observed: 0,
        })
    }

    /// Process the next vector of the traversal.
    ///
    /// Returns `true` when the vector was registered as a new center. An
    /// absent vector fails with `MissingDescriptor`; it is never skipped.
    pub fn observe(&mut self, id: EnvironmentId, vector: Option<&[f32]>) -> Result<bool> {
        let vector = vector.ok_or_else(|| LerError::MissingDescriptor {
            configuration: id.configuration.to_string(),
            atom: id.atom,
        })?;
        check_vector(&id, vector, self.centers.dimensions())?;
        self.observed += 1;

        let covered = self
            .centers
            .iter()
            .any(|center| self.metric.compute(&center.vector, vector) < self.eps);
        if covered {
            return Ok(false);
        }

        self.centers.push(CenterId::Environment(id), vector.to_vec());
        Ok(true)
    }

    /// Centers registered so far
    pub fn centers(&self) -> &ClusterCenters {
        &self.centers
    }

    /// Number of vectors processed so far
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// End the pass
    pub fn finish(self) -> ClusterCenters {
        self.centers
    }

    /// Run a full pass over `stream` in its iteration order
    pub fn build<'a, I>(seed: Vec<f32>, stream: I, eps: f32, metric: DistanceFunction) -> Result<ClusterCenters>
    where
        I: IntoIterator<Item = (EnvironmentId, Option<&'a [f32]>)>,
    {
        let mut builder = Self::new(seed, eps, metric)?;
        for (id, vector) in stream {
            builder.observe(id, vector)?;
        }
        Ok(builder.finish())
    }

    /// Run a full pass over every environment of `table`
    pub fn build_from_table(
        seed: Vec<f32>,
        table: &EnvironmentTable,
        eps: f32,
        metric: DistanceFunction,
    ) -> Result<ClusterCenters> {
        Self::build(
            seed,
            table.iter().map(|e| (e.id.clone(), e.vector.as_deref())),
            eps,
            metric,
        )
    }
}
