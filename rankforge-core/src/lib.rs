//! # rankforge-core: Experiment Configuration for Recommender Research
//!
//! Resolves the configuration of a recommender experiment from layered
//! sources and seeds the random state the experiment runs with:
//!
//! - [`config`]: base YAML → algorithm YAML → command line → overrides,
//!   shallow overwrite with strictly increasing precedence
//! - [`seed`]: one seed applied to every random stream of a run
//! - [`registry`]: algorithms, hyperparameters, metrics, initializers
//! - [`sweep`]: hyperparameter search trials fed through the override layer
//! - [`reproducibility`]: run manifests for repeating an experiment

pub mod config;
pub mod error;
pub mod registry;
pub mod reproducibility;
pub mod seed;
pub mod sweep;

// Re-exports
pub use config::{
    ConfigMap, ConfigResolver, Configuration, LayerSource, Settings, get_config, load_settings,
};
pub use error::{ConfigError, RankforgeError, RegistryError, SweepError};
pub use registry::{Algorithm, Hyperparam, Initializer, Metric, ParamType};
pub use reproducibility::{EnvironmentSnapshot, RunManifest};
pub use seed::{BackendFlags, RngStream, RngSuite, init_seed};
pub use sweep::{HyperparamSweep, ParamDomain, SearchSpace, SweepStrategy, SweepTrial};
