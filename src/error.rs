//! Error Types and Handling
//!
//! Error types for local environment clustering and LER computation, with
//! structured error codes for programmatic handling and recovery hints for
//! debugging.
//!
//! # Error Categories
//!
//! | Range | Category | Examples |
//! |-------|----------|----------|
//! | 2xxx | Serialization | Serialize, Deserialize |
//! | 3xxx | Collection | ConfigurationNotFound, SeedUnavailable |
//! | 4xxx | Vector | MissingDescriptor, DimensionMismatch, InvalidVector |
//! | 5xxx | Artifact | InvalidArtifact |
//! | 6xxx | Index | IndexError |
//! | 7xxx | Configuration | InvalidConfig |
//! | 14xxx | Descriptor | DescriptorEngine |
//!
//! Every error raised while an artifact is being built aborts the build.
//! Nothing is cached and the error reaches the caller unchanged. The core
//! never retries.
//!
//! # Example
//!
//! ```rust
//! use ler::error::{LerError, ErrorCode, Recoverable};
//!
//! let err = LerError::MissingDescriptor {
//!     configuration: "grain_17".to_string(),
//!     atom: 4,
//! };
//! assert_eq!(err.error_code(), ErrorCode::MissingDescriptor);
//! assert_eq!(err.error_code().category(), "Vector");
//! ```

use thiserror::Error;

/// Error code categories for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failed to serialize or deserialize an artifact or parameter set
    SerializationFailed = 2001,

    /// Referenced configuration is not part of the collection
    ConfigurationNotFound = 3001,
    /// No reference seed could be resolved for the collection
    SeedUnavailable = 3002,

    /// A local environment vector was never computed
    MissingDescriptor = 4001,
    /// Vector dimensions do not match the seed
    DimensionMismatch = 4003,
    /// Vector contains invalid values (NaN, Infinity)
    InvalidVector = 4004,

    /// A clustering artifact violates its partition invariants
    InvalidArtifact = 5001,

    /// Approximate index construction or query failed
    IndexError = 6001,

    /// Parameter value is invalid
    InvalidConfig = 7001,

    /// The external descriptor engine reported a failure
    DescriptorEngine = 14001,
}

impl ErrorCode {
    /// Get the numeric error code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a brief description of the error category
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::SerializationFailed => "Serialization",
            ErrorCode::ConfigurationNotFound | ErrorCode::SeedUnavailable => "Collection",
            ErrorCode::MissingDescriptor | ErrorCode::DimensionMismatch | ErrorCode::InvalidVector => "Vector",
            ErrorCode::InvalidArtifact => "Artifact",
            ErrorCode::IndexError => "Index",
            ErrorCode::InvalidConfig => "Configuration",
            ErrorCode::DescriptorEngine => "Descriptor",
        }
    }
}

/// A recovery hint providing actionable guidance for resolving errors
#[derive(Debug, Clone)]
pub struct RecoveryHint {
    /// Short summary of the recovery action
    pub summary: String,
    /// Detailed steps or explanation
    pub details: Option<String>,
}

impl RecoveryHint {
    /// Create a new recovery hint with just a summary
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: None,
        }
    }

    /// Add detailed recovery steps
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for RecoveryHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        if let Some(details) = &self.details {
            write!(f, "\n  Details: {}", details)?;
        }
        Ok(())
    }
}

/// Trait for errors that can provide recovery hints
pub trait Recoverable {
    /// Get the error code for this error
    fn error_code(&self) -> ErrorCode;

    /// Get recovery hints for this error
    fn recovery_hints(&self) -> Vec<RecoveryHint>;
}

/// Error types for LER operations
#[must_use]
#[derive(Error, Debug)]
pub enum LerError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration '{0}' not found in collection")]
    ConfigurationNotFound(String),

    #[error("No seed available: {0}")]
    SeedUnavailable(String),

    #[error("Missing local environment descriptor for configuration '{configuration}', atom {atom}")]
    MissingDescriptor { configuration: String, atom: usize },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Descriptor engine error: {0}")]
    Descriptor(String),
}

impl Recoverable for LerError {
    fn error_code(&self) -> ErrorCode {
        match self {
            LerError::Serialization(_) => ErrorCode::SerializationFailed,
            LerError::ConfigurationNotFound(_) => ErrorCode::ConfigurationNotFound,
            LerError::SeedUnavailable(_) => ErrorCode::SeedUnavailable,
            LerError::MissingDescriptor { .. } => ErrorCode::MissingDescriptor,
            LerError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            LerError::InvalidVector(_) => ErrorCode::InvalidVector,
            LerError::InvalidArtifact(_) => ErrorCode::InvalidArtifact,
            LerError::Index(_) => ErrorCode::IndexError,
            LerError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            LerError::Descriptor(_) => ErrorCode::DescriptorEngine,
        }
    }

    fn recovery_hints(&self) -> Vec<RecoveryHint> {
        match self {
            LerError::Serialization(_) => vec![
                RecoveryHint::new("Check that the artifact or parameter JSON was produced by a compatible version"),
                RecoveryHint::new("Verify numeric fields are finite and lists are well formed"),
            ],

            LerError::ConfigurationNotFound(id) => vec![
                RecoveryHint::new(format!("Add configuration '{}' to the collection before requesting its histogram", id)),
                RecoveryHint::new("LER histograms are collection specific; query with the collection that was clustered"),
            ],

            LerError::SeedUnavailable(reason) => vec![
                RecoveryHint::new("Pass an explicit seed vector with LerParams::with_seed_vector()")
                    .with_details(reason.clone()),
                RecoveryHint::new("Or set the species explicitly with LerParams::with_species()"),
            ],

            LerError::MissingDescriptor { configuration, atom } => vec![
                RecoveryHint::new(format!(
                    "Compute local environment vectors for configuration '{}' first (atom {} is absent)",
                    configuration, atom
                ))
                .with_details("Clustering never skips absent vectors; every atom needs a descriptor row"),
                RecoveryHint::new("Check that the descriptor selection matches the one used to precompute vectors"),
            ],

            LerError::DimensionMismatch { expected, got } => vec![
                RecoveryHint::new(format!("Resize vector to {} dimensions (currently {})", expected, got))
                    .with_details("All local vectors must share the seed's dimensionality"),
                RecoveryHint::new("Make sure the seed was generated with the same descriptor parameters"),
            ],

            LerError::InvalidVector(reason) => vec![
                RecoveryHint::new(format!("Fix vector data: {}", reason)),
                RecoveryHint::new("Ensure vectors contain no NaN or Infinity values"),
            ],

            LerError::InvalidArtifact(reason) => vec![
                RecoveryHint::new("Discard the stored artifact and rebuild it").with_details(reason.clone()),
                RecoveryHint::new("Validate artifacts against the collection they were built from"),
            ],

            LerError::Index(reason) => vec![
                RecoveryHint::new("Rebuild the index").with_details(reason.clone()),
                RecoveryHint::new("Check forest parameters (n_trees, leaf_size) are positive"),
            ],

            LerError::InvalidConfig(reason) => vec![
                RecoveryHint::new(format!("Fix configuration: {}", reason)),
                RecoveryHint::new("Use LerParams::new(eps) defaults as a starting point"),
            ],

            LerError::Descriptor(reason) => vec![
                RecoveryHint::new(format!("Descriptor engine failed: {}", reason)),
                RecoveryHint::new("Verify the descriptor engine accepts the requested parameters"),
            ],
        }
    }
}

impl LerError {
    /// Get a formatted error message with recovery hints
    pub fn format_with_hints(&self) -> String {
        let hints = self.recovery_hints();
        let mut output = format!("Error [{}]: {}", self.error_code().code(), self);

        if !hints.is_empty() {
            output.push_str("\n\nRecovery suggestions:");
            for (i, hint) in hints.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, hint));
            }
        }

        output
    }

    /// True for errors that abort an artifact build because an input vector is unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            LerError::MissingDescriptor { .. }
                | LerError::DimensionMismatch { .. }
                | LerError::InvalidVector(_)
        )
    }
}

/// Result type alias for LER operations
pub type Result<T> = std::result::Result<T, LerError>;
