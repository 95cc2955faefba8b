//! Tunable hyperparameters and their expected scalar types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, RegistryError};

/// Scalar type a hyperparameter value must have after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Int,
    Float,
}

impl ParamType {
    /// Convert `value` into this type.
    ///
    /// Integers accept integral floats and numeric strings; floats accept
    /// any number or numeric string. Everything else is rejected.
    pub fn coerce(self, key: &str, value: &Value) -> Result<Value, ConfigError> {
        match self {
            ParamType::Int => coerce_int(value)
                .map(Value::from)
                .ok_or_else(|| ConfigError::invalid_value(key, "an integer", value)),
            ParamType::Float => coerce_float(value)
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ConfigError::invalid_value(key, "a finite float", value)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Int => write!(f, "int"),
            ParamType::Float => write!(f, "float"),
        }
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Every hyperparameter some algorithm exposes for tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hyperparam {
    NumLayers,
    Maxk,
    Factors,
    Alpha,
    Elastic,
    NumNg,
    Lr,
    BatchSize,
    #[serde(rename = "reg_1")]
    Reg1,
    #[serde(rename = "reg_2")]
    Reg2,
    Dropout,
    NodeDropout,
    MessDropout,
    LatentDim,
    AnnealCap,
    Reg,
    ContextWindow,
    Rho,
}

impl Hyperparam {
    pub const ALL: [Hyperparam; 18] = [
        Hyperparam::NumLayers,
        Hyperparam::Maxk,
        Hyperparam::Factors,
        Hyperparam::Alpha,
        Hyperparam::Elastic,
        Hyperparam::NumNg,
        Hyperparam::Lr,
        Hyperparam::BatchSize,
        Hyperparam::Reg1,
        Hyperparam::Reg2,
        Hyperparam::Dropout,
        Hyperparam::NodeDropout,
        Hyperparam::MessDropout,
        Hyperparam::LatentDim,
        Hyperparam::AnnealCap,
        Hyperparam::Reg,
        Hyperparam::ContextWindow,
        Hyperparam::Rho,
    ];

    /// Configuration key for this hyperparameter.
    pub fn key(self) -> &'static str {
        match self {
            Hyperparam::NumLayers => "num_layers",
            Hyperparam::Maxk => "maxk",
            Hyperparam::Factors => "factors",
            Hyperparam::Alpha => "alpha",
            Hyperparam::Elastic => "elastic",
            Hyperparam::NumNg => "num_ng",
            Hyperparam::Lr => "lr",
            Hyperparam::BatchSize => "batch_size",
            Hyperparam::Reg1 => "reg_1",
            Hyperparam::Reg2 => "reg_2",
            Hyperparam::Dropout => "dropout",
            Hyperparam::NodeDropout => "node_dropout",
            Hyperparam::MessDropout => "mess_dropout",
            Hyperparam::LatentDim => "latent_dim",
            Hyperparam::AnnealCap => "anneal_cap",
            Hyperparam::Reg => "reg",
            Hyperparam::ContextWindow => "context_window",
            Hyperparam::Rho => "rho",
        }
    }

    pub fn param_type(self) -> ParamType {
        match self {
            Hyperparam::NumLayers
            | Hyperparam::Maxk
            | Hyperparam::Factors
            | Hyperparam::NumNg
            | Hyperparam::BatchSize
            | Hyperparam::LatentDim
            | Hyperparam::ContextWindow => ParamType::Int,
            Hyperparam::Alpha
            | Hyperparam::Elastic
            | Hyperparam::Lr
            | Hyperparam::Reg1
            | Hyperparam::Reg2
            | Hyperparam::Dropout
            | Hyperparam::NodeDropout
            | Hyperparam::MessDropout
            | Hyperparam::AnnealCap
            | Hyperparam::Reg
            | Hyperparam::Rho => ParamType::Float,
        }
    }

    /// Coerce a raw value to this parameter's type.
    pub fn coerce(self, value: &Value) -> Result<Value, ConfigError> {
        self.param_type().coerce(self.key(), value)
    }
}

impl fmt::Display for Hyperparam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Hyperparam {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hyperparam::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| RegistryError::UnknownHyperparam {
                name: s.to_string(),
            })
    }
}
