//! Static registries joining config keys to models, hyperparameters,
//! metrics and initializers.

pub mod algorithm;
pub mod hyperparam;
pub mod initializer;
pub mod metric;

pub use algorithm::{Algorithm, ModelDescriptor, ModelFamily};
pub use hyperparam::{Hyperparam, ParamType};
pub use initializer::Initializer;
pub use metric::{Metric, MetricKind};
