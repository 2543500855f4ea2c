//! Atomic Configurations and Collections
//!
//! A [`Configuration`] is an ordered list of atoms, each carrying its chemical
//! species and a stable per-configuration identifier. A [`Collection`] is an
//! ordered list of configurations; its order is the traversal order of the
//! greedy clustering pass, so reordering a collection changes its identity.
//!
//! # Example
//!
//! ```
//! use ler::{Atom, Collection, Configuration};
//!
//! let mut collection = Collection::new("nickel_grain_boundaries");
//! collection.push(Configuration::homogeneous("gb_0", "Ni", 4))?;
//! collection.push(Configuration::new("gb_1", vec![Atom::new("Ni", 0), Atom::new("Ni", 1)]))?;
//!
//! assert_eq!(collection.len(), 2);
//! assert_eq!(collection.first_species(), Some("Ni"));
//! # Ok::<(), ler::LerError>(())
//! ```

use crate::error::{LerError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

/// Identifier of a configuration within a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(String);

impl ConfigurationId {
    /// Create an identifier from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigurationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConfigurationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single atom: its chemical species and stable identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Chemical symbol, e.g. `"Ni"`
    pub species: String,
    /// Identifier stable within the owning configuration
    pub id: usize,
}

impl Atom {
    /// Create an atom
    pub fn new(species: impl Into<String>, id: usize) -> Self {
        Self {
            species: species.into(),
            id,
        }
    }
}

/// An atomic configuration: an identifier plus an ordered list of atoms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    id: ConfigurationId,
    atoms: Vec<Atom>,
}

impl Configuration {
    /// Create a configuration from its atoms
    pub fn new(id: impl Into<ConfigurationId>, atoms: Vec<Atom>) -> Self {
        Self {
            id: id.into(),
            atoms,
        }
    }

    /// Create a single-species configuration with atoms numbered `0..n_atoms`
    pub fn homogeneous(id: impl Into<ConfigurationId>, species: &str, n_atoms: usize) -> Self {
        Self::new(id, (0..n_atoms).map(|i| Atom::new(species, i)).collect())
    }

    /// Configuration identifier
    pub fn id(&self) -> &ConfigurationId {
        &self.id
    }

    /// Atoms in order
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// True if the configuration has no atoms
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Species of the first atom, if any
    pub fn first_species(&self) -> Option<&str> {
        self.atoms.first().map(|a| a.species.as_str())
    }
}

/// An ordered, named collection of configurations.
///
/// Configuration identifiers are unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    configurations: Vec<Configuration>,
}

impl Collection {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configurations: Vec::new(),
        }
    }

    /// Create a collection from configurations, rejecting duplicate identifiers
    pub fn from_configurations(
        name: impl Into<String>,
        configurations: impl IntoIterator<Item = Configuration>,
    ) -> Result<Self> {
        let mut collection = Self::new(name);
        for configuration in configurations {
            collection.push(configuration)?;
        }
        Ok(collection)
    }

    /// Append a configuration at the end of the traversal order
    pub fn push(&mut self, configuration: Configuration) -> Result<()> {
        if self.get(configuration.id()).is_some() {
            return Err(LerError::InvalidConfig(format!(
                "configuration '{}' already present in collection '{}'",
                configuration.id(),
                self.name
            )));
        }
        self.configurations.push(configuration);
        Ok(())
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configurations in traversal order
    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Iterate over configurations in traversal order
    pub fn iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }

    /// Look up a configuration by identifier
    pub fn get(&self, id: &ConfigurationId) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.id() == id)
    }

    /// True if the collection contains the configuration
    pub fn contains(&self, id: &ConfigurationId) -> bool {
        self.get(id).is_some()
    }

    /// Number of configurations
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// True if the collection has no configurations
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Total number of atoms across all configurations
    pub fn atom_count(&self) -> usize {
        self.configurations.iter().map(Configuration::len).sum()
    }

    /// Species of the first atom of the first non-empty configuration
    pub fn first_species(&self) -> Option<&str> {
        self.configurations.iter().find_map(Configuration::first_species)
    }

    /// Stable identity digest of the collection.
    ///
    /// SHA-256 over the name, every configuration id in order, and every
    /// atom's species and id. Any change to membership or order changes it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        for configuration in &self.configurations {
            hasher.update(configuration.id().as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update((configuration.len() as u64).to_le_bytes());
            for atom in configuration.atoms() {
                hasher.update(atom.species.as_bytes());
                hasher.update([0u8]);
                hasher.update((atom.id as u64).to_le_bytes());
            }
        }
        hex(&hasher.finalize())
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}
