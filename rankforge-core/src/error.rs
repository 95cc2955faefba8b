//! Error types for the Rankforge core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration resolution, registry lookups and sweeps.

use std::path::PathBuf;

/// Top-level error type for the Rankforge core library.
#[derive(Debug, thiserror::Error)]
pub enum RankforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("Settings error: {0}")]
    Settings(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors from loading and merging configuration layers.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Malformed configuration in {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Unknown algorithm '{name}': no configuration at {}", path.display())]
    UnknownAlgorithm { name: String, path: PathBuf },

    #[error("No algorithm selected: 'algo_name' is missing from both the base config and the arguments")]
    MissingAlgorithmName,

    #[error("Invalid value for '{key}': expected {expected}, found {found}")]
    InvalidValue {
        key: String,
        expected: String,
        found: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::InvalidValue`] describing `found` as JSON.
    pub fn invalid_value(
        key: impl Into<String>,
        expected: impl Into<String>,
        found: &serde_json::Value,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// True for the file-not-found family: a missing base file or an
    /// algorithm name with no configuration on disk.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MissingFile { .. } | Self::UnknownAlgorithm { .. })
    }
}

/// Errors from the static algorithm, metric and initializer registries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown algorithm: {name}")]
    UnknownAlgorithm { name: String },

    #[error("Unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("Unknown hyperparameter: {name}")]
    UnknownHyperparam { name: String },

    #[error("Unknown initializer: {name}")]
    UnknownInitializer { name: String },

    #[error("Hyperparameter '{param}' is not tunable for algorithm '{algorithm}'")]
    NotTunable { algorithm: String, param: String },
}

/// Errors from building or expanding a hyperparameter sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Search space is empty for algorithm '{algorithm}'")]
    EmptySpace { algorithm: String },

    #[error("Domain for '{param}' is not supported by the {strategy} strategy")]
    UnsupportedDomain { param: String, strategy: String },

    #[error("Invalid domain for '{param}': {reason}")]
    InvalidDomain { param: String, reason: String },

    #[error("No trial {trial_number} in a sweep of {trials}")]
    UnknownTrial { trial_number: usize, trials: usize },
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, RankforgeError>;
