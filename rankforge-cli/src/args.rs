//! Run arguments: command-line flags that become the command-line config layer.

use rankforge_core::ConfigMap;
use rankforge_core::config::normalize_yaml;
use serde_json::{Value, json};

/// Flags named after the configuration keys they set.
///
/// Only flags the user actually passes end up in the layer, so an omitted
/// flag never masks a value from the YAML files.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Algorithm to configure (selects config/model/<ALGO>.yaml)
    #[arg(long = "algo_name", alias = "algo-name", value_name = "ALGO")]
    pub algo_name: Option<String>,

    /// Dataset name
    #[arg(long)]
    pub dataset: Option<String>,

    /// Random seed applied to every stream
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// Pin the backend to deterministic kernels (true/false)
    #[arg(long)]
    pub reproducibility: Option<bool>,

    /// Training epochs
    #[arg(long)]
    pub epochs: Option<u64>,

    /// Learning rate
    #[arg(long, value_parser = parse_finite)]
    pub lr: Option<f64>,

    /// Latent factors
    #[arg(long)]
    pub factors: Option<u64>,

    /// Training batch size
    #[arg(long = "batch_size", alias = "batch-size")]
    pub batch_size: Option<u64>,

    /// Negative samples per positive
    #[arg(long = "num_ng", alias = "num-ng")]
    pub num_ng: Option<u64>,

    /// Ranking cutoff
    #[arg(long)]
    pub topk: Option<u64>,

    /// Set any key; VALUE is parsed as YAML (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, Value)>,
}

impl RunArgs {
    /// Build the command-line layer. `--set` entries are applied after the
    /// named flags, in order, so a later `--set` wins.
    pub fn to_layer(&self) -> ConfigMap {
        let mut layer = ConfigMap::new();
        let named = [
            ("algo_name", self.algo_name.as_ref().map(|v| json!(v))),
            ("dataset", self.dataset.as_ref().map(|v| json!(v))),
            ("seed", self.seed.map(|v| json!(v))),
            ("reproducibility", self.reproducibility.map(|v| json!(v))),
            ("epochs", self.epochs.map(|v| json!(v))),
            ("lr", self.lr.map(|v| json!(v))),
            ("factors", self.factors.map(|v| json!(v))),
            ("batch_size", self.batch_size.map(|v| json!(v))),
            ("num_ng", self.num_ng.map(|v| json!(v))),
            ("topk", self.topk.map(|v| json!(v))),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                layer.insert(key.to_string(), value);
            }
        }
        for (key, value) in &self.set {
            layer.insert(key.clone(), value.clone());
        }
        layer
    }
}

fn parse_finite(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{s}' is not a finite number"))
    }
}

/// Parse `KEY=VALUE`, reading VALUE as a YAML document (`0.01`, `true`,
/// `[ndcg, recall]`, `BPR`, ...). An empty VALUE is null.
pub fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    let mut yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| format!("invalid value for '{key}': {e}"))?;
    normalize_yaml(&mut yaml).map_err(|e| format!("invalid value for '{key}': {e}"))?;
    let value = serde_json::to_value(yaml).map_err(|e| format!("invalid value for '{key}': {e}"))?;
    Ok((key.to_string(), value))
}
