//! LER Histograms
//!
//! A configuration's LER is the share of its local environments owned by
//! each cluster center, in center creation order. Built from an artifact
//! with no I/O; cheap enough to run on every query.
//!
//! A configuration with no local environments has no distribution. That
//! case yields `None` instead of dividing zero by zero.

use crate::assign::Buckets;
use crate::clustering::ClusterCenters;
use crate::structure::ConfigurationId;
use serde::{Deserialize, Serialize};

/// Normalized bucket-membership distribution of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    configuration: ConfigurationId,
    counts: Vec<usize>,
    total: usize,
    values: Vec<f64>,
}

impl Histogram {
    /// Configuration this histogram describes
    pub fn configuration(&self) -> &ConfigurationId {
        &self.configuration
    }

    /// Fractions per center; sums to 1
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Raw membership counts per center
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Number of local environments counted
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of bins, equal to the center count
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no bins; `false` for any built histogram
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of all bins
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Take the bin values
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

/// Converts bucket membership into per-configuration histograms
pub struct HistogramBuilder;

impl HistogramBuilder {
    /// Histogram of `configuration` over `centers`, or `None` when it owns no
    /// local environments.
    pub fn histogram(
        configuration: &ConfigurationId,
        centers: &ClusterCenters,
        buckets: &Buckets,
    ) -> Option<Histogram> {
        let mut counts = buckets.counts_for(configuration);
        counts.resize(centers.len(), 0);

        let total: usize = counts.iter().sum();
        if total == 0 {
            return None;
        }

        let values = counts.iter().map(|&c| c as f64 / total as f64).collect();
        Some(Histogram {
            configuration: configuration.clone(),
            counts,
            total,
            values,
        })
    }
}
