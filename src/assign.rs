//! Classification of Local Environments Against Cluster Centers
//!
//! Every local environment of the collection, center vectors included, is
//! sent to the approximate index and appended to the bucket of the center it
//! lands on. The result partitions the traversal: each environment is in
//! exactly one bucket.
//!
//! Queries are read-only, so configurations are classified in parallel with
//! rayon. Per-configuration results are merged in collection order, which
//! keeps bucket contents identical to a sequential run.
//!
//! Approximate search may occasionally send a center's own vector to a
//! neighboring center. That is accepted, not corrected.

use crate::clustering::{CenterId, ClusterCenters};
use crate::environment::{EnvironmentId, EnvironmentTable};
use crate::error::{LerError, Result};
use crate::indexing::forest::ForestIndex;
use crate::structure::ConfigurationId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct BucketsRepr {
    members: Vec<Vec<EnvironmentId>>,
}

/// Bucket membership per center, indexed by center creation order.
///
/// Each bucket holds environment ids in traversal order. A center whose
/// bucket is empty has no bucket entry in the map view. Per-configuration
/// counts are indexed as members are inserted and rebuilt on deserialize,
/// so histogram lookups never rescan the buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BucketsRepr", into = "BucketsRepr")]
pub struct Buckets {
    members: Vec<Vec<EnvironmentId>>,
    counts: HashMap<ConfigurationId, Vec<usize>>,
}

impl From<BucketsRepr> for Buckets {
    fn from(repr: BucketsRepr) -> Self {
        Self::from_members(repr.members)
    }
}

impl From<Buckets> for BucketsRepr {
    fn from(buckets: Buckets) -> Self {
        Self {
            members: buckets.members,
        }
    }
}

impl Buckets {
    /// Empty buckets for `n_centers` centers
    pub fn new(n_centers: usize) -> Self {
        Self {
            members: vec![Vec::new(); n_centers],
            counts: HashMap::new(),
        }
    }

    pub(crate) fn from_members(members: Vec<Vec<EnvironmentId>>) -> Self {
        let mut buckets = Self::new(members.len());
        for (center, ids) in members.into_iter().enumerate() {
            for id in ids {
                buckets.insert(center, id);
            }
        }
        buckets
    }

    fn insert(&mut self, center: usize, id: EnvironmentId) {
        let n_centers = self.members.len();
        self.counts
            .entry(id.configuration.clone())
            .or_insert_with(|| vec![0; n_centers])[center] += 1;
        self.members[center].push(id);
    }

    /// Members of the bucket at a center position (empty if none)
    pub fn bucket(&self, center: usize) -> &[EnvironmentId] {
        self.members.get(center).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of centers the buckets are laid out for
    pub fn center_count(&self) -> usize {
        self.members.len()
    }

    /// Total assigned environments
    pub fn total(&self) -> usize {
        self.members.iter().map(Vec::len).sum()
    }

    /// Bucket sizes in center order
    pub fn sizes(&self) -> Vec<usize> {
        self.members.iter().map(Vec::len).collect()
    }

    /// Non-empty buckets keyed by center id, in center order
    pub fn non_empty<'a>(
        &'a self,
        centers: &'a ClusterCenters,
    ) -> impl Iterator<Item = (&'a CenterId, &'a [EnvironmentId])> + 'a {
        centers
            .ids()
            .zip(self.members.iter())
            .filter(|(_, m)| !m.is_empty())
            .map(|(id, m)| (id, m.as_slice()))
    }

    /// Per-center membership counts for one configuration
    pub fn counts_for(&self, configuration: &ConfigurationId) -> Vec<usize> {
        self.counts
            .get(configuration)
            .cloned()
            .unwrap_or_else(|| vec![0; self.members.len()])
    }

    /// Center position owning an environment, if assigned
    pub fn owner_of(&self, id: &EnvironmentId) -> Option<usize> {
        self.members.iter().position(|m| m.contains(id))
    }
}

/// Classifies every environment of a table against an index over the centers
pub struct Assigner<'a> {
    centers: &'a ClusterCenters,
    index: &'a ForestIndex,
}

impl<'a> Assigner<'a> {
    /// Pair centers with an index built over them, in the same order
    pub fn new(centers: &'a ClusterCenters, index: &'a ForestIndex) -> Result<Self> {
        if centers.len() != index.len() {
            return Err(LerError::Index(format!(
                "index holds {} points but there are {} centers",
                index.len(),
                centers.len()
            )));
        }
        Ok(Self { centers, index })
    }

    /// Assign every environment of `table` to exactly one center
    pub fn assign(&self, table: &EnvironmentTable) -> Result<Buckets> {
        let groups: Vec<_> = table.by_configuration().collect();
        let assigned: Vec<Vec<(usize, EnvironmentId)>> = groups
            .par_iter()
            .map(|(_, environments)| {
                environments
                    .iter()
                    .map(|env| Ok((self.index.nearest(env.require()?)?, env.id.clone())))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut buckets = Buckets::new(self.centers.len());
        for (center, id) in assigned.into_iter().flatten() {
            buckets.insert(center, id);
        }

        debug!(
            environments = buckets.total(),
            centers = self.centers.len(),
            non_empty = buckets.sizes().iter().filter(|&&s| s > 0).count(),
            "Assigned environments to centers"
        );
        Ok(buckets)
    }
}
