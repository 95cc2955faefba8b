//! Evaluation metric registry.
//!
//! Keys are the strings used in the `metrics` config list; every key has
//! exactly one display label.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, RankforgeError, RegistryError};

/// What a metric measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Per-user ranking accuracy, computed at a cutoff `k`.
    Ranking,
    /// Pairwise classification accuracy over the whole ranking.
    Classification,
    /// Properties of the recommendation lists as a whole.
    BeyondAccuracy,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Ranking => write!(f, "ranking"),
            MetricKind::Classification => write!(f, "classification"),
            MetricKind::BeyondAccuracy => write!(f, "beyond_accuracy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Recall,
    Mrr,
    Ndcg,
    Hr,
    Map,
    Precision,
    F1,
    Auc,
    Coverage,
    Diversity,
    Popularity,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Recall,
        Metric::Mrr,
        Metric::Ndcg,
        Metric::Hr,
        Metric::Map,
        Metric::Precision,
        Metric::F1,
        Metric::Auc,
        Metric::Coverage,
        Metric::Diversity,
        Metric::Popularity,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Recall => "recall",
            Metric::Mrr => "mrr",
            Metric::Ndcg => "ndcg",
            Metric::Hr => "hr",
            Metric::Map => "map",
            Metric::Precision => "precision",
            Metric::F1 => "f1",
            Metric::Auc => "auc",
            Metric::Coverage => "coverage",
            Metric::Diversity => "diversity",
            Metric::Popularity => "popularity",
        }
    }

    /// Label used in result tables.
    pub fn display_name(self) -> &'static str {
        match self {
            Metric::Recall => "Recall",
            Metric::Mrr => "MRR",
            Metric::Ndcg => "NDCG",
            Metric::Hr => "Hit Ratio",
            Metric::Map => "MAP",
            Metric::Precision => "Precision",
            Metric::F1 => "F1-score",
            Metric::Auc => "AUC",
            Metric::Coverage => "Coverage",
            Metric::Diversity => "Diversity",
            Metric::Popularity => "Average Popularity",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::Recall
            | Metric::Mrr
            | Metric::Ndcg
            | Metric::Hr
            | Metric::Map
            | Metric::Precision
            | Metric::F1 => MetricKind::Ranking,
            Metric::Auc => MetricKind::Classification,
            Metric::Coverage | Metric::Diversity | Metric::Popularity => {
                MetricKind::BeyondAccuracy
            }
        }
    }

    /// Whether a larger value means a better model.
    pub fn higher_is_better(self) -> bool {
        // Recommending popular items is the behaviour this metric penalizes.
        !matches!(self, Metric::Popularity)
    }

    /// Parse the `metrics` config value: a list of metric keys, or a single
    /// key. Duplicates are dropped, order is kept.
    pub fn parse_list(key: &str, value: &Value) -> Result<Vec<Metric>, RankforgeError> {
        let names: Vec<&str> = match value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| ConfigError::invalid_value(key, "a metric key", item))
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(ConfigError::invalid_value(key, "a list of metric keys", other).into());
            }
        };

        let mut metrics = Vec::with_capacity(names.len());
        for name in names {
            let metric: Metric = name.parse()?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        Ok(metrics)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| RegistryError::UnknownMetric {
                name: s.to_string(),
            })
    }
}
