//! The resolved, flat experiment configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigError, RankforgeError};
use crate::registry::{Algorithm, Hyperparam, Initializer, Metric};

/// One configuration layer: string keys to arbitrary YAML/JSON values.
pub type ConfigMap = BTreeMap<String, Value>;

/// Key naming the active algorithm.
pub const ALGO_NAME_KEY: &str = "algo_name";

/// Where a key's final value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSource {
    Base,
    Algorithm,
    CommandLine,
    Override,
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSource::Base => write!(f, "base"),
            LayerSource::Algorithm => write!(f, "algorithm"),
            LayerSource::CommandLine => write!(f, "command_line"),
            LayerSource::Override => write!(f, "override"),
        }
    }
}

/// Flat mapping produced by [`ConfigResolver`](super::ConfigResolver).
///
/// Built by shallow overlay: a key present in a later layer replaces the
/// earlier value wholesale, nested mappings and sequences included. There
/// are no public mutators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Configuration {
    values: ConfigMap,
    #[serde(skip)]
    sources: BTreeMap<String, LayerSource>,
}

impl Configuration {
    pub(crate) fn overlay(&mut self, source: LayerSource, layer: &ConfigMap) {
        for (key, value) in layer {
            self.values.insert(key.clone(), value.clone());
            self.sources.insert(key.clone(), source);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn as_map(&self) -> &ConfigMap {
        &self.values
    }

    pub fn into_map(self) -> ConfigMap {
        self.values
    }

    /// Layer that supplied the final value of `key`.
    pub fn source(&self, key: &str) -> Option<LayerSource> {
        self.sources.get(key).copied()
    }

    /// String value of `key`; `Ok(None)` if absent.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ConfigError::invalid_value(key, "a string", other)),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| ConfigError::invalid_value(key, "an integer", value)),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| ConfigError::invalid_value(key, "a number", value)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| ConfigError::invalid_value(key, "a boolean", value)),
        }
    }

    /// The active algorithm, looked up in the registry.
    pub fn algorithm(&self) -> Result<Algorithm, RankforgeError> {
        let name = self
            .get_str(ALGO_NAME_KEY)?
            .ok_or(ConfigError::MissingAlgorithmName)?;
        Ok(name.parse()?)
    }

    /// Metrics listed under `metrics`, empty when the key is absent.
    pub fn metrics(&self) -> Result<Vec<Metric>, RankforgeError> {
        match self.values.get("metrics") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => Metric::parse_list("metrics", value),
        }
    }

    /// Initializer named by `init_method` with optional `init_params`.
    ///
    /// An absent `init_method`, or `default`, selects the default normal
    /// initializer.
    pub fn initializer(&self) -> Result<Initializer, RankforgeError> {
        match self.get_str("init_method")? {
            None | Some("default") => Ok(Initializer::default()),
            Some(name) => Initializer::from_name(name, self.values.get("init_params")),
        }
    }

    /// The active algorithm's tunable hyperparameters present in this
    /// configuration, coerced to their declared types.
    pub fn typed_hyperparams(&self) -> Result<BTreeMap<Hyperparam, Value>, RankforgeError> {
        let algorithm = self.algorithm()?;
        let mut typed = BTreeMap::new();
        for &param in algorithm.tunable_params() {
            if let Some(value) = self.values.get(param.key()) {
                typed.insert(param, param.coerce(value)?);
            }
        }
        Ok(typed)
    }

    pub fn to_yaml(&self) -> Result<String, RankforgeError> {
        Ok(serde_yaml::to_string(&self.values)?)
    }

    /// Hex SHA-256 of the canonical (key-sorted) JSON encoding.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(&self.values).unwrap_or_default();
        format!("{:x}", Sha256::digest(&canonical))
    }
}
