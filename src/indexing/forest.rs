//! # Random Projection Forest
//!
//! Approximate nearest-neighbor index over the discovered cluster centers.
//! Each tree recursively splits the point set with a hyperplane placed
//! halfway between two randomly chosen points, until a node holds at most
//! `leaf_size` points. Queries walk all trees at once with a priority queue
//! ordered by the distance to the splitting planes, collect candidates until
//! `search_k` of them have been seen, and rank the candidates exactly.
//!
//! ## Parameters
//!
//! - **n_trees**: more trees give better recall and cost more to build.
//! - **search_k**: candidates gathered per query; `None` means
//!   `n_trees * leaf_size * k`, roughly one leaf per tree.
//! - **leaf_size**: maximum points in a leaf. A set no larger than this is a
//!   single leaf and every query is exact.
//! - **seed**: pins the random splits. Without it, two builds over the same
//!   centers can disagree for queries near a boundary between two centers.
//!
//! ## Example
//!
//! ```rust
//! use ler::indexing::forest::{ForestConfig, ForestIndex};
//! use ler::DistanceFunction;
//!
//! let points = vec![vec![0.0, 0.0], vec![5.0, 5.0]];
//! let config = ForestConfig::default().with_seed(7);
//! let index = ForestIndex::build(points, DistanceFunction::Euclidean, config)?;
//! assert_eq!(index.nearest(&[4.0, 4.5])?, 1);
//! # Ok::<(), ler::LerError>(())
//! ```
//!
//! ## Lifetime
//!
//! The index is a transient build resource held entirely in memory.
//! [`ForestIndex::scoped`] builds it, lends it to a closure and drops it on
//! every exit path.

use crate::clustering::ClusterCenters;
use crate::distance::{dot_product, normalized, DistanceFunction};
use crate::error::{LerError, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use tracing::debug;

/// Forest tuning parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees (default: 10)
    pub n_trees: usize,
    /// Candidates examined per query; `None` uses the structure default
    #[serde(default)]
    pub search_k: Option<usize>,
    /// Maximum points per leaf (default: 16)
    pub leaf_size: usize,
    /// Seed for split selection; `None` draws from entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 10,
            search_k: None,
            leaf_size: 16,
            seed: None,
        }
    }
}

impl ForestConfig {
    /// Create a config with the given number of trees
    pub fn new(n_trees: usize) -> Self {
        Self {
            n_trees,
            ..Default::default()
        }
    }

    /// Set the number of candidates examined per query
    #[must_use]
    pub fn with_search_k(mut self, search_k: usize) -> Self {
        self.search_k = Some(search_k);
        self
    }

    /// Set `search_k` from a signed value where any negative value means "default"
    #[must_use]
    pub fn with_search_k_raw(mut self, search_k: i64) -> Self {
        self.search_k = usize::try_from(search_k).ok();
        self
    }

    /// Set the maximum number of points per leaf
    #[must_use]
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Pin the random seed used to choose splits
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(LerError::InvalidConfig("n_trees must be at least 1".to_string()));
        }
        if self.leaf_size == 0 {
            return Err(LerError::InvalidConfig("leaf_size must be at least 1".to_string()));
        }
        if self.search_k == Some(0) {
            return Err(LerError::InvalidConfig("search_k must be positive when set".to_string()));
        }
        Ok(())
    }

    /// Candidates to gather for a `k`-nearest query
    pub fn effective_search_k(&self, k: usize) -> usize {
        self.search_k
            .unwrap_or_else(|| self.n_trees.saturating_mul(self.leaf_size).saturating_mul(k.max(1)))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<usize>),
    /// Points with `dot(normal, v) - offset > 0` go right. A zero normal
    /// marks a split that could not separate its points.
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

/// Forest statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestStats {
    /// Indexed points
    pub n_items: usize,
    /// Trees in the forest
    pub n_trees: usize,
    /// Total nodes across trees
    pub n_nodes: usize,
    /// Total leaves across trees
    pub n_leaves: usize,
}

/// Approximate nearest-neighbor index over a fixed point set
#[derive(Debug)]
pub struct ForestIndex {
    dimensions: usize,
    metric: DistanceFunction,
    config: ForestConfig,
    items: Vec<Vec<f32>>,
    trees: Vec<Tree>,
}

impl ForestIndex {
    /// Build a forest over `items`. Trees are built in parallel.
    pub fn build(items: Vec<Vec<f32>>, metric: DistanceFunction, config: ForestConfig) -> Result<Self> {
        config.validate()?;
        if !metric.is_distance() {
            return Err(LerError::InvalidConfig(format!(
                "forest splits need a distance metric, got {}",
                metric
            )));
        }
        let dimensions = match items.first() {
            Some(first) => first.len(),
            None => return Err(LerError::Index("cannot build a forest over zero points".to_string())),
        };
        for item in &items {
            if item.len() != dimensions {
                return Err(LerError::DimensionMismatch {
                    expected: dimensions,
                    got: item.len(),
                });
            }
        }

        // Split geometry for angular metrics lives on the unit sphere.
        let split_space: Vec<Vec<f32>> = if metric.is_angular() {
            items.iter().map(|v| normalized(v)).collect()
        } else {
            items.clone()
        };

        let trees: Vec<Tree> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = match config.seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(t as u64)),
                    None => StdRng::from_entropy(),
                };
                let mut builder = TreeBuilder {
                    points: &split_space,
                    leaf_size: config.leaf_size,
                    angular: metric.is_angular(),
                    nodes: Vec::new(),
                };
                let root = builder.grow((0..items.len()).collect(), &mut rng);
                Tree {
                    nodes: builder.nodes,
                    root,
                }
            })
            .collect();

        let index = Self {
            dimensions,
            metric,
            config,
            items,
            trees,
        };
        let stats = index.stats();
        debug!(
            items = stats.n_items,
            trees = stats.n_trees,
            nodes = stats.n_nodes,
            seeded = index.config.seed.is_some(),
            "Forest index built"
        );
        Ok(index)
    }

    /// Build a forest over cluster centers; item `i` is center `i` in creation order
    pub fn from_centers(centers: &ClusterCenters, metric: DistanceFunction, config: ForestConfig) -> Result<Self> {
        Self::build(centers.iter().map(|c| c.vector.clone()).collect(), metric, config)
    }

    /// Build over `centers`, run `f` with the index, and release it on every exit path
    pub fn scoped<T, F>(centers: &ClusterCenters, metric: DistanceFunction, config: ForestConfig, f: F) -> Result<T>
    where
        F: FnOnce(&ForestIndex) -> Result<T>,
    {
        let index = Self::from_centers(centers, metric, config)?;
        f(&index)
        // `index` is dropped here whether `f` succeeded or failed.
    }

    /// Position of the (approximately) nearest indexed point
    pub fn nearest(&self, query: &[f32]) -> Result<usize> {
        self.search(query, 1)?
            .first()
            .map(|(i, _)| *i)
            .ok_or_else(|| LerError::Index("query produced no candidates".to_string()))
    }

    /// Up to `k` (approximately) nearest points as (position, distance), closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(LerError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let routed = if self.metric.is_angular() {
            normalized(query)
        } else {
            query.to_vec()
        };
        let search_k = self.config.effective_search_k(k);

        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize, usize)> = self
            .trees
            .iter()
            .enumerate()
            .map(|(t, tree)| (OrderedFloat(f32::INFINITY), t, tree.root))
            .collect();
        let mut seen = vec![false; self.items.len()];
        let mut candidates = Vec::new();

        while candidates.len() < search_k {
            let Some((OrderedFloat(priority), t, node)) = heap.pop() else {
                break;
            };
            match &self.trees[t].nodes[node] {
                Node::Leaf(points) => {
                    for &p in points {
                        if !seen[p] {
                            seen[p] = true;
                            candidates.push(p);
                        }
                    }
                }
                Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    let margin = dot_product(normal, &routed) - offset;
                    heap.push((OrderedFloat(priority.min(margin)), t, *right));
                    heap.push((OrderedFloat(priority.min(-margin)), t, *left));
                }
            }
        }

        let mut ranked: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|p| (p, self.metric.compute(query, &self.items[p])))
            .collect();
        ranked.sort_by_key(|&(p, d)| (OrderedFloat(d), p));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no points are indexed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Vector dimensionality
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Tuning parameters in use
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Structure statistics
    pub fn stats(&self) -> ForestStats {
        let n_leaves = self
            .trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count();
        ForestStats {
            n_items: self.items.len(),
            n_trees: self.trees.len(),
            n_nodes: self.trees.iter().map(|t| t.nodes.len()).sum(),
            n_leaves,
        }
    }
}

impl Drop for ForestIndex {
    fn drop(&mut self) {
        debug!(items = self.items.len(), trees = self.trees.len(), "Forest index released");
    }
}

struct TreeBuilder<'a> {
    points: &'a [Vec<f32>],
    leaf_size: usize,
    angular: bool,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, mut members: Vec<usize>, rng: &mut StdRng) -> usize {
        if members.len() <= self.leaf_size {
            return self.push(Node::Leaf(members));
        }

        let (normal, offset) = self.pick_plane(&members, rng);
        let (mut left, mut right): (Vec<usize>, Vec<usize>) = members
            .iter()
            .partition(|&&p| dot_product(&normal, &self.points[p]) - offset <= 0.0);

        let (normal, offset) = if left.is_empty() || right.is_empty() {
            // Coincident points: divide at random and let queries visit both halves.
            members.shuffle(rng);
            right = members.split_off(members.len() / 2);
            left = members;
            (vec![0.0; normal.len()], 0.0)
        } else {
            (normal, offset)
        };

        let left = self.grow(left, rng);
        let right = self.grow(right, rng);
        self.push(Node::Split {
            normal,
            offset,
            left,
            right,
        })
    }

    /// Hyperplane equidistant from two random members, with unit normal
    fn pick_plane(&self, members: &[usize], rng: &mut StdRng) -> (Vec<f32>, f32) {
        let i = members[rng.gen_range(0..members.len())];
        let mut j = members[rng.gen_range(0..members.len())];
        if i == j {
            j = members[(members.iter().position(|&m| m == i).unwrap_or(0) + 1) % members.len()];
        }
        let (p, q) = (&self.points[i], &self.points[j]);

        let mut normal: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
        let norm = dot_product(&normal, &normal).sqrt();
        if norm == 0.0 {
            return (normal, 0.0);
        }
        for x in normal.iter_mut() {
            *x /= norm;
        }

        let offset = if self.angular {
            0.0
        } else {
            let midpoint: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| (a + b) * 0.5).collect();
            dot_product(&normal, &midpoint)
        };
        (normal, offset)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.gen::<f32>() * 10.0).collect())
            .collect()
    }

    fn exact_nearest(points: &[Vec<f32>], query: &[f32]) -> usize {
        points
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (OrderedFloat(DistanceFunction::Euclidean.compute(query, p)), *i))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_small_set_is_single_leaf_and_exact() {
        let points = vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![-3.0, 1.0]];
        let index = ForestIndex::build(points.clone(), DistanceFunction::Euclidean, ForestConfig::default()).unwrap();
        let stats = index.stats();
        assert_eq!(stats.n_trees, 10);
        assert_eq!(stats.n_nodes, 10);
        assert_eq!(stats.n_leaves, 10);
        assert_eq!(index.nearest(&[4.0, 4.0]).unwrap(), 1);
        assert_eq!(index.nearest(&[-2.0, 0.5]).unwrap(), 2);
    }

    #[test]
    fn test_exhaustive_search_k_is_exact() {
        let points = random_points(200, 8, 1);
        let config = ForestConfig::new(4).with_leaf_size(4).with_search_k(200).with_seed(3);
        let index = ForestIndex::build(points.clone(), DistanceFunction::Euclidean, config).unwrap();
        assert!(index.stats().n_nodes > 4);

        for query in random_points(25, 8, 2) {
            assert_eq!(index.nearest(&query).unwrap(), exact_nearest(&points, &query));
        }
    }

    #[test]
    fn test_indexed_points_find_themselves() {
        let points = random_points(300, 6, 5);
        let config = ForestConfig::new(10).with_leaf_size(8).with_seed(11);
        let index = ForestIndex::build(points.clone(), DistanceFunction::Euclidean, config).unwrap();
        let hits = points
            .iter()
            .enumerate()
            .filter(|(i, p)| index.nearest(p).unwrap() == *i)
            .count();
        assert!(hits >= 290, "only {} of 300 points found themselves", hits);
    }

    #[test]
    fn test_pinned_seed_is_reproducible() {
        let points = random_points(150, 4, 9);
        let config = ForestConfig::new(3).with_leaf_size(4).with_search_k(6).with_seed(42);
        let a = ForestIndex::build(points.clone(), DistanceFunction::Euclidean, config.clone()).unwrap();
        let b = ForestIndex::build(points, DistanceFunction::Euclidean, config).unwrap();
        for query in random_points(40, 4, 10) {
            assert_eq!(a.search(&query, 3).unwrap(), b.search(&query, 3).unwrap());
        }
    }

    #[test]
    fn test_duplicate_points_still_split() {
        let points = vec![vec![1.0, 1.0]; 40];
        let config = ForestConfig::new(2).with_leaf_size(4).with_seed(1);
        let index = ForestIndex::build(points, DistanceFunction::Euclidean, config).unwrap();
        assert!(index.stats().n_leaves > 2);
        assert!(index.nearest(&[1.0, 1.0]).unwrap() < 40);
    }

    #[test]
    fn test_cosine_metric() {
        let points = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]];
        let index = ForestIndex::build(points, DistanceFunction::Cosine, ForestConfig::default()).unwrap();
        assert_eq!(index.nearest(&[0.1, 3.0]).unwrap(), 1);
    }

    #[test]
    fn test_search_returns_sorted_results() {
        let points = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let index = ForestIndex::build(points, DistanceFunction::Euclidean, ForestConfig::default()).unwrap();
        let results = index.search(&[2.2], 3).unwrap();
        let order: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(index.search(&[2.2], 0).unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            ForestIndex::build(vec![], DistanceFunction::Euclidean, ForestConfig::default()),
            Err(LerError::Index(_))
        ));
        assert!(matches!(
            ForestIndex::build(vec![vec![0.0], vec![0.0, 1.0]], DistanceFunction::Euclidean, ForestConfig::default()),
            Err(LerError::DimensionMismatch { expected: 1, got: 2 })
        ));
        assert!(ForestIndex::build(vec![vec![0.0]], DistanceFunction::Euclidean, ForestConfig::new(0)).is_err());
        assert!(matches!(
            ForestIndex::build(vec![vec![1.0, 1.0]], DistanceFunction::DotProduct, ForestConfig::default()),
            Err(LerError::InvalidConfig(_))
        ));

        let index = ForestIndex::build(vec![vec![0.0, 0.0]], DistanceFunction::Euclidean, ForestConfig::default()).unwrap();
        assert!(matches!(index.nearest(&[0.0]), Err(LerError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_search_k_raw_sentinel() {
        assert_eq!(ForestConfig::default().with_search_k_raw(-1).search_k, None);
        assert_eq!(ForestConfig::default().with_search_k_raw(50).search_k, Some(50));
        assert_eq!(ForestConfig::new(10).with_leaf_size(16).effective_search_k(1), 160);
        assert!(ForestConfig::default().with_search_k(0).validate().is_err());
    }

    #[test]
    fn test_scoped_releases_on_error() {
        let centers = ClusterCenters::seeded(vec![0.0, 0.0]);
        let result: Result<()> = ForestIndex::scoped(&centers, DistanceFunction::Euclidean, ForestConfig::default(), |index| {
            index.nearest(&[1.0])?;
            Ok(())
        });
        assert!(matches!(result, Err(LerError::DimensionMismatch { .. })));

        let found = ForestIndex::scoped(&centers, DistanceFunction::Euclidean, ForestConfig::default(), |index| {
            index.nearest(&[1.0, 1.0])
        })
        .unwrap();
        assert_eq!(found, 0);
    }
}
