//! Distance Functions for Local Environment Vectors
//!
//! The metric is a tuning parameter of the whole pipeline: the greedy
//! clustering pass compares every vector to every registered center with it,
//! and the approximate index ranks candidate centers with it. It is also part
//! of the artifact cache key.
//!
//! # Supported Distance Functions
//!
//! - **Euclidean (L2)**: Standard geometric distance. The default, and the
//!   natural choice for SOAP-like power spectra.
//! - **Manhattan (L1)**: Sum of absolute differences.
//! - **Cosine**: 1 - cosine similarity; insensitive to vector magnitude.
//! - **Dot Product**: Inner product (negated).
//!
//! # Example
//!
//! ```
//! use ler::DistanceFunction;
//!
//! let a = vec![0.0, 0.0];
//! let b = vec![3.0, 4.0];
//! assert!((DistanceFunction::Euclidean.compute(&a, &b) - 5.0).abs() < 1e-6);
//! assert!((DistanceFunction::Manhattan.compute(&a, &b) - 7.0).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LerError;

/// Distance function types for comparing local environment vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    /// Euclidean (L2) distance
    #[default]
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Dot product (negative, so smaller = more similar)
    DotProduct,
}

impl DistanceFunction {
    /// Compute distance between two vectors
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => euclidean_distance(a, b),
            Self::Manhattan => manhattan_distance(a, b),
            Self::Cosine => cosine_distance(a, b),
            Self::DotProduct => dot_product_distance(a, b),
        }
    }

    /// Whether the metric compares directions only.
    ///
    /// Space-partitioning structures split on normalized vectors for these.
    pub fn is_angular(&self) -> bool {
        matches!(self, Self::Cosine)
    }

    /// Whether the value is a non-negative dissimilarity that is zero for
    /// identical vectors. Threshold clustering needs this; `DotProduct` is
    /// a negated similarity and does not qualify.
    pub fn is_distance(&self) -> bool {
        !matches!(self, Self::DotProduct)
    }

    /// Stable lowercase name, used in cache keys and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Cosine => "cosine",
            Self::DotProduct => "dot",
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceFunction {
    type Err = LerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            "cosine" | "angular" => Ok(Self::Cosine),
            "dot" | "dot_product" => Ok(Self::DotProduct),
            other => Err(LerError::InvalidConfig(format!("unknown metric '{}'", other))),
        }
    }
}

/// Compute Euclidean (L2) distance
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Compute squared Euclidean distance (faster, for comparisons)
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have equal length for euclidean distance");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Compute Manhattan (L1) distance
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have equal length for manhattan distance");
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Compute cosine distance (1 - cosine similarity)
///
/// Zero vectors are treated as orthogonal to everything.
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - (dot / (norm_a * norm_b))
}

/// Compute dot product distance (negative dot product)
#[inline]
pub fn dot_product_distance(a: &[f32], b: &[f32]) -> f32 {
    -dot_product(a, b)
}

/// Compute dot product of two vectors
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vectors must have equal length for dot product");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Normalize a vector in-place; zero vectors are left unchanged
pub fn normalize(vector: &mut [f32]) {
    let norm = dot_product(vector, vector).sqrt();
    if norm > 0.0 {
        let inv_norm = 1.0 / norm;
        for x in vector.iter_mut() {
            *x *= inv_norm;
        }
    }
}

/// Normalize a vector, returning a new vector
pub fn normalized(vector: &[f32]) -> Vec<f32> {
    let mut result = vector.to_vec();
    normalize(&mut result);
    result
}
