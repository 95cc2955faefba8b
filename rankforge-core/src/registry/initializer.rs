//! Weight initializers and their default parameters.
//!
//! Initializers draw from the tensor stream of an [`RngSuite`](crate::seed::RngSuite)
//! so embeddings are reproducible under a fixed seed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigError, RankforgeError, RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Initializer {
    /// N(mean, std).
    Normal { mean: f64, std: f64 },
    /// U(a, b).
    Uniform { a: f64, b: f64 },
    /// N(0, gain * sqrt(2 / (fan_in + fan_out))).
    XavierNormal { gain: f64 },
    /// U(-r, r) with r = gain * sqrt(6 / (fan_in + fan_out)).
    XavierUniform { gain: f64 },
}

impl Default for Initializer {
    fn default() -> Self {
        Initializer::Normal {
            mean: 0.0,
            std: 0.01,
        }
    }
}

impl Initializer {
    pub const NAMES: [&'static str; 4] = ["normal", "uniform", "xavier_normal", "xavier_uniform"];

    pub fn name(&self) -> &'static str {
        match self {
            Initializer::Normal { .. } => "normal",
            Initializer::Uniform { .. } => "uniform",
            Initializer::XavierNormal { .. } => "xavier_normal",
            Initializer::XavierUniform { .. } => "xavier_uniform",
        }
    }

    /// Default parameters of the named initializer.
    pub fn default_params(name: &str) -> Result<BTreeMap<&'static str, f64>, RegistryError> {
        let params: &[(&'static str, f64)] = match name {
            "normal" => &[("mean", 0.0), ("std", 0.01)],
            "uniform" => &[("a", 0.0), ("b", 1.0)],
            "xavier_normal" | "xavier_uniform" => &[("gain", 1.0)],
            other => {
                return Err(RegistryError::UnknownInitializer {
                    name: other.to_string(),
                });
            }
        };
        Ok(params.iter().copied().collect())
    }

    /// Build the named initializer, overlaying `params` on its defaults.
    ///
    /// `params` must be a mapping whose keys are a subset of the defaults.
    pub fn from_name(name: &str, params: Option<&Value>) -> Result<Self, RankforgeError> {
        let mut resolved = Self::default_params(name)?;

        if let Some(params) = params {
            let map = params
                .as_object()
                .ok_or_else(|| ConfigError::invalid_value("init_params", "a mapping", params))?;
            for (key, value) in map {
                let slot = resolved.get_mut(key.as_str()).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        key: format!("init_params.{key}"),
                        expected: format!("a parameter of the '{name}' initializer"),
                        found: key.clone(),
                    }
                })?;
                *slot = value.as_f64().ok_or_else(|| {
                    ConfigError::invalid_value(format!("init_params.{key}"), "a number", value)
                })?;
            }
        }

        let get = |key: &str| resolved.get(key).copied().unwrap_or_default();
        let init = match name {
            "normal" => Initializer::Normal {
                mean: get("mean"),
                std: get("std"),
            },
            "uniform" => Initializer::Uniform {
                a: get("a"),
                b: get("b"),
            },
            "xavier_normal" => Initializer::XavierNormal { gain: get("gain") },
            _ => Initializer::XavierUniform { gain: get("gain") },
        };
        init.validate()?;
        Ok(init)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |expected: &str, found: f64| ConfigError::InvalidValue {
            key: "init_params".to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        };
        match *self {
            Initializer::Normal { mean, .. } if !mean.is_finite() => {
                Err(invalid("a finite mean", mean))
            }
            Initializer::Normal { std, .. } if !std.is_finite() || std < 0.0 => {
                Err(invalid("a finite, non-negative std", std))
            }
            Initializer::Uniform { a, b } if !a.is_finite() || !(b - a).is_finite() || a >= b => {
                Err(invalid("finite a < b", b))
            }
            Initializer::XavierNormal { gain } | Initializer::XavierUniform { gain }
                if !gain.is_finite() || gain <= 0.0 =>
            {
                Err(invalid("a finite, positive gain", gain))
            }
            _ => Ok(()),
        }
    }

    /// Draw `len` weights for a layer with the given fan-in and fan-out.
    ///
    /// Fans are only consulted by the Xavier variants, which require
    /// `fan_in + fan_out > 0`.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fan_in: usize,
        fan_out: usize,
        len: usize,
    ) -> Result<Vec<f64>, ConfigError> {
        self.validate()?;
        let fan_sum = (fan_in + fan_out) as f64;
        if matches!(
            self,
            Initializer::XavierNormal { .. } | Initializer::XavierUniform { .. }
        ) && fan_sum == 0.0
        {
            return Err(ConfigError::InvalidValue {
                key: "fan_in + fan_out".to_string(),
                expected: "a positive value".to_string(),
                found: "0".to_string(),
            });
        }

        let weights = match *self {
            Initializer::Normal { mean, std } => {
                (0..len).map(|_| mean + std * standard_normal(rng)).collect()
            }
            Initializer::Uniform { a, b } => (0..len).map(|_| rng.gen_range(a..b)).collect(),
            Initializer::XavierNormal { gain } => {
                let std = finite_bound("xavier std", gain * (2.0 / fan_sum).sqrt())?;
                (0..len).map(|_| std * standard_normal(rng)).collect()
            }
            Initializer::XavierUniform { gain } => {
                // The sampled span is 2 * bound.
                let bound = finite_bound("xavier bound", gain * (6.0 / fan_sum).sqrt())?;
                finite_bound("xavier bound", 2.0 * bound)?;
                (0..len).map(|_| rng.gen_range(-bound..=bound)).collect()
            }
        };
        Ok(weights)
    }
}

fn finite_bound(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "a finite value".to_string(),
            found: value.to_string(),
        })
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Normal { mean, std } => write!(f, "normal(mean={mean}, std={std})"),
            Initializer::Uniform { a, b } => write!(f, "uniform(a={a}, b={b})"),
            Initializer::XavierNormal { gain } => write!(f, "xavier_normal(gain={gain})"),
            Initializer::XavierUniform { gain } => write!(f, "xavier_uniform(gain={gain})"),
        }
    }
}

// Box-Muller transform
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
