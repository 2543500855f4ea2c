//! Local Environment Vectors and Their Sources
//!
//! Raw per-atom feature vectors come from an external descriptor engine,
//! reached through [`EnvironmentVectorSource`]. The reference vector for an
//! unperturbed structure comes from a [`SeedProvider`]. This module defines
//! both collaborator traits, simple in-memory implementations of each, and
//! the [`EnvironmentTable`]: the ordered traversal of every
//! `(configuration, atom, vector)` triple of a collection that the clustering
//! and assignment phases consume.
//!
//! Absent rows are kept as `None` in the table. They are a fatal condition
//! for artifact construction, reported by the phase that reaches them.

use crate::config::SoapParams;
use crate::error::{LerError, Result};
use crate::structure::{Collection, Configuration, ConfigurationId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Identity of a local environment: the configuration and the atom's position in it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvironmentId {
    /// Owning configuration
    pub configuration: ConfigurationId,
    /// Index of the atom within the configuration
    pub atom: usize,
}

impl EnvironmentId {
    /// Create an environment id
    pub fn new(configuration: impl Into<ConfigurationId>, atom: usize) -> Self {
        Self {
            configuration: configuration.into(),
            atom,
        }
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.configuration, self.atom)
    }
}

/// Per-atom feature vectors for one configuration, as produced by the descriptor engine.
///
/// `None` marks a row the engine has not computed.
pub type DescriptorRows = Vec<Option<Vec<f32>>>;

/// External descriptor engine: yields one local environment vector per atom.
pub trait EnvironmentVectorSource: Send + Sync {
    /// Rows for `configuration` in atom order, computed with `params`.
    fn vectors_for(&self, configuration: &Configuration, params: &SoapParams) -> Result<DescriptorRows>;
}

/// External provider of the idealized reference vector for a species.
pub trait SeedProvider: Send + Sync {
    /// Reference vector for `species`, computed with `params`.
    fn seed_for(&self, species: &str, params: &SoapParams) -> Result<Vec<f32>>;
}

/// In-memory table of precomputed descriptor rows, keyed by configuration.
///
/// Serves a single descriptor selection: `params` is not consulted on lookup.
/// Configurations that were never inserted yield all-absent rows.
#[derive(Debug, Default)]
pub struct PrecomputedVectors {
    rows: RwLock<HashMap<ConfigurationId, DescriptorRows>>,
    fetches: AtomicUsize,
}

impl PrecomputedVectors {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Store fully computed rows for a configuration
    pub fn insert(&self, configuration: impl Into<ConfigurationId>, vectors: Vec<Vec<f32>>) {
        self.insert_rows(configuration, vectors.into_iter().map(Some).collect());
    }

    /// Store rows, some of which may be absent
    pub fn insert_rows(&self, configuration: impl Into<ConfigurationId>, rows: DescriptorRows) {
        self.rows.write().insert(configuration.into(), rows);
    }

    /// Number of `vectors_for` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl EnvironmentVectorSource for PrecomputedVectors {
    fn vectors_for(&self, configuration: &Configuration, _params: &SoapParams) -> Result<DescriptorRows> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .rows
            .read()
            .get(configuration.id())
            .cloned()
            .unwrap_or_else(|| vec![None; configuration.len()]))
    }
}

/// Seed vectors looked up by species
#[derive(Debug, Clone, Default)]
pub struct StaticSeeds {
    seeds: HashMap<String, Vec<f32>>,
}

impl StaticSeeds {
    /// Create an empty seed table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the seed for a species
    #[must_use]
    pub fn with_seed(mut self, species: impl Into<String>, seed: Vec<f32>) -> Self {
        self.seeds.insert(species.into(), seed);
        self
    }
}

impl SeedProvider for StaticSeeds {
    fn seed_for(&self, species: &str, _params: &SoapParams) -> Result<Vec<f32>> {
        self.seeds
            .get(species)
            .cloned()
            .ok_or_else(|| LerError::SeedUnavailable(format!("no seed registered for species '{}'", species)))
    }
}

/// One entry of the traversal: an environment id and its vector, if computed
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEnvironment {
    /// Environment identity
    pub id: EnvironmentId,
    /// Feature vector, `None` when the engine did not produce it
    pub vector: Option<Vec<f32>>,
}

impl LocalEnvironment {
    /// The vector, or a `MissingDescriptor` error naming this environment
    pub fn require(&self) -> Result<&[f32]> {
        self.vector.as_deref().ok_or_else(|| LerError::MissingDescriptor {
            configuration: self.id.configuration.to_string(),
            atom: self.id.atom,
        })
    }
}

/// The ordered traversal of all local environments of a collection:
/// configuration order first, then atom order.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentTable {
    entries: Vec<LocalEnvironment>,
    /// (configuration, start, len) into `entries`, in collection order
    spans: Vec<(ConfigurationId, usize, usize)>,
}

impl EnvironmentTable {
    /// Fetch every configuration's rows from `source`, in collection order.
    ///
    /// Rows beyond a configuration's atom count are ignored; missing trailing
    /// rows are recorded as absent.
    pub fn gather(
        collection: &Collection,
        source: &dyn EnvironmentVectorSource,
        params: &SoapParams,
    ) -> Result<Self> {
        let mut table = Self::default();
        for configuration in collection.iter() {
            let mut rows = source.vectors_for(configuration, params)?;
            if rows.len() > configuration.len() {
                warn!(
                    configuration = %configuration.id(),
                    rows = rows.len(),
                    atoms = configuration.len(),
                    "Descriptor engine returned more rows than atoms; extra rows ignored"
                );
            }
            rows.resize(configuration.len(), None);
            table.push_configuration(configuration.id().clone(), rows);
        }
        debug!(
            configurations = table.spans.len(),
            environments = table.entries.len(),
            "Gathered local environments"
        );
        Ok(table)
    }

    /// Build a table directly from rows, in the given order
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (ConfigurationId, DescriptorRows)>,
    {
        let mut table = Self::default();
        for (configuration, rows) in rows {
            table.push_configuration(configuration, rows);
        }
        table
    }

    fn push_configuration(&mut self, configuration: ConfigurationId, rows: DescriptorRows) {
        let start = self.entries.len();
        let len = rows.len();
        self.entries.extend(rows.into_iter().enumerate().map(|(atom, vector)| LocalEnvironment {
            id: EnvironmentId::new(configuration.clone(), atom),
            vector,
        }));
        self.spans.push((configuration, start, len));
    }

    /// All entries in traversal order
    pub fn iter(&self) -> impl Iterator<Item = &LocalEnvironment> {
        self.entries.iter()
    }

    /// Entries grouped by configuration, in collection order
    pub fn by_configuration(&self) -> impl Iterator<Item = (&ConfigurationId, &[LocalEnvironment])> {
        self.spans
            .iter()
            .map(move |(id, start, len)| (id, &self.entries[*start..*start + *len]))
    }

    /// Number of local environments of one configuration
    pub fn configuration_len(&self, configuration: &ConfigurationId) -> Option<usize> {
        self.spans
            .iter()
            .find(|(id, _, _)| id == configuration)
            .map(|(_, _, len)| *len)
    }

    /// Total number of local environments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no local environments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of configurations
    pub fn configuration_count(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Configuration;

    fn collection() -> Collection {
        Collection::from_configurations(
            "c",
            vec![
                Configuration::homogeneous("a", "Ni", 2),
                Configuration::homogeneous("b", "Ni", 3),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_gather_preserves_order_and_pads_missing_rows() {
        let source = PrecomputedVectors::new();
        source.insert("a", vec![vec![0.0], vec![1.0]]);
        source.insert("b", vec![vec![2.0]]);

        let table = EnvironmentTable::gather(&collection(), &source, &SoapParams::default()).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.configuration_count(), 2);
        assert_eq!(source.fetch_count(), 2);

        let ids: Vec<String> = table.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["(a, 0)", "(a, 1)", "(b, 0)", "(b, 1)", "(b, 2)"]);

        let b: Vec<_> = table.by_configuration().nth(1).unwrap().1.to_vec();
        assert!(b[0].vector.is_some());
        assert!(b[1].vector.is_none());
        assert!(matches!(
            b[2].require(),
            Err(LerError::MissingDescriptor { atom: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_configuration_is_all_absent() {
        let source = PrecomputedVectors::new();
        let table = EnvironmentTable::gather(&collection(), &source, &SoapParams::default()).unwrap();
        assert!(table.iter().all(|e| e.vector.is_none()));
        assert_eq!(table.configuration_len(&"b".into()), Some(3));
        assert_eq!(table.configuration_len(&"z".into()), None);
    }

    #[test]
    fn test_extra_rows_are_dropped() {
        let source = PrecomputedVectors::new();
        source.insert("a", vec![vec![0.0], vec![1.0], vec![9.0]]);
        source.insert("b", vec![vec![2.0], vec![3.0], vec![4.0]]);
        let table = EnvironmentTable::gather(&collection(), &source, &SoapParams::default()).unwrap();
        assert_eq!(table.configuration_len(&"a".into()), Some(2));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_static_seeds() {
        let seeds = StaticSeeds::new().with_seed("Ni", vec![1.0, 2.0]);
        assert_eq!(seeds.seed_for("Ni", &SoapParams::default()).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            seeds.seed_for("Cu", &SoapParams::default()),
            Err(LerError::SeedUnavailable(_))
        ));
    }
}
