//! Layered configuration resolution.
//!
//! Layers, lowest precedence first:
//! 1. Base defaults (`<root>/basic.yaml`)
//! 2. Algorithm defaults (`<root>/model/<algo_name>.yaml`)
//! 3. Command-line arguments
//! 4. Programmatic overrides (e.g. hyperparameter search trials)
//!
//! The algorithm is chosen before its file is read: the command-line
//! `algo_name` if given, otherwise the base file's.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::configuration::{ALGO_NAME_KEY, ConfigMap, Configuration, LayerSource};
use crate::error::ConfigError;

/// Directory searched when no config root is given.
pub const DEFAULT_CONFIG_ROOT: &str = "config";
/// Base defaults file name, relative to the config root.
pub const BASE_CONFIG_FILE: &str = "basic.yaml";
/// Directory of per-algorithm defaults, relative to the config root.
pub const MODEL_CONFIG_DIR: &str = "model";

/// Merges the configuration layers found under one config root.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    root: PathBuf,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_ROOT)
    }
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_path(&self) -> PathBuf {
        self.root.join(BASE_CONFIG_FILE)
    }

    pub fn algorithm_path(&self, algo_name: &str) -> PathBuf {
        self.root
            .join(MODEL_CONFIG_DIR)
            .join(format!("{algo_name}.yaml"))
    }

    /// Resolve the final configuration.
    ///
    /// `args` holds only the command-line options the user actually gave.
    /// `param_dict`, when present, is applied last and wins over everything.
    /// Any failure aborts resolution; no partial configuration is returned.
    pub fn resolve(
        &self,
        args: &ConfigMap,
        param_dict: Option<&ConfigMap>,
    ) -> Result<Configuration, ConfigError> {
        let base_path = self.base_path();
        let base = load_layer(&base_path)?;

        let algo_name = active_algorithm(&base, args)?;
        let algorithm_path = self.algorithm_path(&algo_name);
        if !is_plain_name(&algo_name) {
            return Err(ConfigError::UnknownAlgorithm {
                name: algo_name,
                path: algorithm_path,
            });
        }
        let algorithm = load_layer(&algorithm_path).map_err(|e| match e {
            ConfigError::MissingFile { path } => ConfigError::UnknownAlgorithm {
                name: algo_name.clone(),
                path,
            },
            other => other,
        })?;

        let mut config = Configuration::default();
        config.overlay(LayerSource::Base, &base);
        config.overlay(LayerSource::Algorithm, &algorithm);
        config.overlay(LayerSource::CommandLine, args);
        if let Some(overrides) = param_dict {
            if let Some(name) = overrides.get(ALGO_NAME_KEY).and_then(Value::as_str)
                && name != algo_name
            {
                tracing::warn!(
                    algorithm = %algo_name,
                    override_name = name,
                    "Override layer sets algo_name, but defaults were loaded for the active algorithm"
                );
            }
            config.overlay(LayerSource::Override, overrides);
        }

        tracing::debug!(
            algorithm = %algo_name,
            keys = config.len(),
            args = args.len(),
            overrides = param_dict.map_or(0, |p| p.len()),
            "Resolved configuration"
        );
        Ok(config)
    }
}

/// Resolve against the default config root (`./config`).
pub fn get_config(
    args: &ConfigMap,
    param_dict: Option<&ConfigMap>,
) -> Result<Configuration, ConfigError> {
    ConfigResolver::default().resolve(args, param_dict)
}

/// Load one YAML layer. The top level must be a mapping with string keys;
/// an empty document is an empty layer.
pub fn load_layer(path: &Path) -> Result<ConfigMap, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::MissingFile {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let layer = parse_layer(&content).map_err(|message| ConfigError::Malformed {
        path: path.to_path_buf(),
        message,
    })?;
    tracing::debug!(path = %path.display(), keys = layer.len(), "Loaded configuration layer");
    Ok(layer)
}

/// Parse YAML text into a layer, returning the parser message on failure.
pub fn parse_layer(content: &str) -> Result<ConfigMap, String> {
    let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    match document {
        serde_yaml::Value::Null => Ok(ConfigMap::new()),
        mut mapping @ serde_yaml::Value::Mapping(_) => {
            normalize_yaml(&mut mapping)?;
            serde_yaml::from_value(mapping).map_err(|e| e.to_string())
        }
        other => Err(format!(
            "expected a mapping at the top level, found {}",
            yaml_kind(&other)
        )),
    }
}

/// Apply `<<` merge keys and reject values with no JSON form.
///
/// `.inf` and `.nan` are errors rather than silently becoming null.
pub fn normalize_yaml(value: &mut serde_yaml::Value) -> Result<(), String> {
    value.apply_merge().map_err(|e| e.to_string())?;
    reject_non_finite(value, &mut Vec::new())
}

fn reject_non_finite(value: &serde_yaml::Value, path: &mut Vec<String>) -> Result<(), String> {
    match value {
        serde_yaml::Value::Number(n) if n.is_nan() || n.is_infinite() => {
            let at = if path.is_empty() {
                String::new()
            } else {
                format!(" at '{}'", path.join("."))
            };
            Err(format!("non-finite number {n}{at} is not supported"))
        }
        serde_yaml::Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                reject_non_finite(item, path)?;
                path.pop();
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(map) => {
            for (key, item) in map {
                path.push(key.as_str().map_or_else(|| "?".to_string(), str::to_string));
                reject_non_finite(item, path)?;
                path.pop();
            }
            Ok(())
        }
        serde_yaml::Value::Tagged(tagged) => reject_non_finite(&tagged.value, path),
        _ => Ok(()),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn active_algorithm(base: &ConfigMap, args: &ConfigMap) -> Result<String, ConfigError> {
    let value = args
        .get(ALGO_NAME_KEY)
        .filter(|v| !v.is_null())
        .or_else(|| base.get(ALGO_NAME_KEY).filter(|v| !v.is_null()))
        .ok_or(ConfigError::MissingAlgorithmName)?;
    match value {
        Value::String(name) => Ok(name.clone()),
        other => Err(ConfigError::invalid_value(
            ALGO_NAME_KEY,
            "an algorithm name",
            other,
        )),
    }
}

// Algorithm names select a file; anything that could escape `model/` is
// treated as unknown.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1
}
