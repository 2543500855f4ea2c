//! The Clustering Artifact
//!
//! Centers plus bucket membership: the single canonical result of a build
//! for one cache key. Immutable once constructed and shared behind `Arc`
//! by every histogram query against the same parameter set.
//!
//! The index used to produce the buckets is not part of the artifact.

use crate::assign::Buckets;
use crate::clustering::{CenterId, ClusterCenters};
use crate::environment::{EnvironmentId, EnvironmentTable};
use crate::error::{LerError, Result};
use crate::histogram::{Histogram, HistogramBuilder};
use crate::structure::ConfigurationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Centers in creation order and the environments each one owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringArtifact {
    centers: ClusterCenters,
    buckets: Buckets,
}

impl ClusteringArtifact {
    /// Pair centers with buckets laid out for them
    pub fn new(centers: ClusterCenters, buckets: Buckets) -> Result<Self> {
        let artifact = Self { centers, buckets };
        artifact.check_layout()?;
        Ok(artifact)
    }

    fn check_layout(&self) -> Result<()> {
        if self.buckets.center_count() != self.centers.len() {
            return Err(LerError::InvalidArtifact(format!(
                "{} bucket slots for {} centers",
                self.buckets.center_count(),
                self.centers.len()
            )));
        }
        if self.centers.get(0).map(|c| &c.id) != Some(&CenterId::Seed) {
            return Err(LerError::InvalidArtifact("first center is not the seed".to_string()));
        }
        Ok(())
    }

    /// Centers in creation order
    pub fn centers(&self) -> &ClusterCenters {
        &self.centers
    }

    /// Bucket membership
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Members of a center's bucket, `None` if the center owns nothing or is unknown
    pub fn bucket(&self, center: &CenterId) -> Option<&[EnvironmentId]> {
        let members = self.buckets.bucket(self.centers.position(center)?);
        (!members.is_empty()).then_some(members)
    }

    /// Bucket sizes in center order
    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.sizes()
    }

    /// Number of centers, seed included
    pub fn center_count(&self) -> usize {
        self.centers.len()
    }

    /// Number of assigned local environments
    pub fn vector_count(&self) -> usize {
        self.buckets.total()
    }

    /// Histogram of one configuration, `None` if it owns no environments
    pub fn histogram(&self, configuration: &ConfigurationId) -> Option<Histogram> {
        HistogramBuilder::histogram(configuration, &self.centers, &self.buckets)
    }

    /// Check that the buckets partition every environment of `table`
    pub fn validate(&self, table: &EnvironmentTable) -> Result<()> {
        self.check_layout()?;

        let mut owners: HashMap<&EnvironmentId, usize> = HashMap::with_capacity(self.vector_count());
        for center in 0..self.center_count() {
            for id in self.buckets.bucket(center) {
                if let Some(previous) = owners.insert(id, center) {
                    return Err(LerError::InvalidArtifact(format!(
                        "environment {} is in buckets {} and {}",
                        id, previous, center
                    )));
                }
            }
        }

        for env in table.iter() {
            if !owners.contains_key(&env.id) {
                return Err(LerError::InvalidArtifact(format!(
                    "environment {} is not assigned to any bucket",
                    env.id
                )));
            }
        }
        if owners.len() != table.len() {
            return Err(LerError::InvalidArtifact(format!(
                "buckets hold {} environments but the collection has {}",
                owners.len(),
                table.len()
            )));
        }
        Ok(())
    }

    /// Serialize for an external store
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize and check the center/bucket layout
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(json)?;
        let centers = ClusterCenters::from_centers(artifact.centers.iter().cloned().collect())
            .map_err(|e| LerError::InvalidArtifact(e.to_string()))?;
        Self::new(centers, artifact.buckets)
    }
}
