//! Hyperparameter sweeps over an algorithm's tunable parameters.
//!
//! A sweep expands a [`SearchSpace`] into trials. Each trial is a mapping of
//! typed hyperparameter values that is fed to the resolver as the override
//! layer, so it wins over every file and command-line value.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{ConfigMap, ConfigResolver, Configuration};
use crate::error::{ConfigError, RankforgeError, SweepError};
use crate::registry::{Algorithm, Hyperparam, Metric, ParamType};
use crate::seed::RngSuite;

/// Config key holding the search space.
pub const TUNE_SPACE_KEY: &str = "tune_space";

/// Values a single hyperparameter may take.
///
/// In YAML a plain list is shorthand for `choice`:
///
/// ```yaml
/// tune_space:
///   factors: [16, 32, 64]
///   lr: {type: log_uniform, min: 0.0001, max: 0.1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDomain {
    Choice { values: Vec<Value> },
    Uniform { min: f64, max: f64 },
    LogUniform { min: f64, max: f64 },
    IntRange { min: i64, max: i64 },
}

impl ParamDomain {
    /// Parse a domain for `param` and coerce choice values to its type.
    pub fn from_value(param: Hyperparam, value: &Value) -> Result<Self, RankforgeError> {
        let domain = match value {
            Value::Array(values) => ParamDomain::Choice {
                values: values.clone(),
            },
            Value::Object(_) => serde_json::from_value(value.clone()).map_err(|e| {
                SweepError::InvalidDomain {
                    param: param.key().to_string(),
                    reason: e.to_string(),
                }
            })?,
            other => {
                return Err(ConfigError::invalid_value(
                    format!("{TUNE_SPACE_KEY}.{param}"),
                    "a list of values or a domain mapping",
                    other,
                )
                .into());
            }
        };
        domain.validated(param)
    }

    fn validated(self, param: Hyperparam) -> Result<Self, RankforgeError> {
        let invalid = |reason: &str| SweepError::InvalidDomain {
            param: param.key().to_string(),
            reason: reason.to_string(),
        };
        match self {
            ParamDomain::Choice { values } => {
                if values.is_empty() {
                    return Err(invalid("choice needs at least one value").into());
                }
                let values = values
                    .iter()
                    .map(|v| param.coerce(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ParamDomain::Choice { values })
            }
            ParamDomain::Uniform { min, max } if !finite_span(min, max) || min >= max => {
                Err(invalid("uniform needs finite min < max").into())
            }
            ParamDomain::LogUniform { min, max }
                if !finite_span(min, max) || min <= 0.0 || min >= max =>
            {
                Err(invalid("log_uniform needs finite 0 < min < max").into())
            }
            ParamDomain::IntRange { min, max } if min > max => {
                Err(invalid("int_range needs min <= max").into())
            }
            domain => Ok(domain),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, param: Hyperparam, rng: &mut R) -> Value {
        let continuous = |x: f64| match param.param_type() {
            ParamType::Int => Value::from(x.round() as i64),
            ParamType::Float => serde_json::Number::from_f64(x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        };
        match self {
            ParamDomain::Choice { values } => values[rng.gen_range(0..values.len())].clone(),
            ParamDomain::Uniform { min, max } => continuous(rng.gen_range(*min..*max)),
            ParamDomain::LogUniform { min, max } => {
                continuous(rng.gen_range(min.ln()..max.ln()).exp())
            }
            ParamDomain::IntRange { min, max } => {
                let drawn = rng.gen_range(*min..=*max);
                match param.param_type() {
                    ParamType::Int => Value::from(drawn),
                    ParamType::Float => continuous(drawn as f64),
                }
            }
        }
    }
}

// Bounds and their difference must all be finite for `gen_range`.
fn finite_span(min: f64, max: f64) -> bool {
    min.is_finite() && max.is_finite() && (max - min).is_finite()
}

/// Domains for some of an algorithm's tunable hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSpace {
    algorithm: Algorithm,
    params: BTreeMap<Hyperparam, ParamDomain>,
}

impl SearchSpace {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            params: BTreeMap::new(),
        }
    }

    /// Add a domain. Fails unless `param` is tunable for the algorithm.
    pub fn with(mut self, param: Hyperparam, domain: ParamDomain) -> Result<Self, RankforgeError> {
        self.algorithm.ensure_tunable(param)?;
        self.params.insert(param, domain.validated(param)?);
        Ok(self)
    }

    /// Read the space from the `tune_space` mapping of a configuration.
    pub fn from_config(config: &Configuration) -> Result<Self, RankforgeError> {
        let algorithm = config.algorithm()?;
        let mut space = Self::new(algorithm);
        let Some(raw) = config.get(TUNE_SPACE_KEY).filter(|v| !v.is_null()) else {
            return Ok(space);
        };
        let entries = raw
            .as_object()
            .ok_or_else(|| ConfigError::invalid_value(TUNE_SPACE_KEY, "a mapping", raw))?;
        for (name, value) in entries {
            let param: Hyperparam = name.parse()?;
            algorithm.ensure_tunable(param)?;
            space
                .params
                .insert(param, ParamDomain::from_value(param, value)?);
        }
        Ok(space)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> impl Iterator<Item = (Hyperparam, &ParamDomain)> {
        self.params.iter().map(|(p, d)| (*p, d))
    }
}

/// How trials are drawn from the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SweepStrategy {
    /// Cartesian product of choice domains.
    Grid,
    /// Independent draws from every domain.
    Random { n_trials: usize },
}

impl SweepStrategy {
    fn name(&self) -> &'static str {
        match self {
            SweepStrategy::Grid => "grid",
            SweepStrategy::Random { .. } => "random",
        }
    }
}

/// One point of the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepTrial {
    pub trial_number: usize,
    pub params: ConfigMap,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HyperparamSweep {
    pub id: String,
    pub space: SearchSpace,
    pub strategy: SweepStrategy,
    pub trials: Vec<SweepTrial>,
}

impl HyperparamSweep {
    pub fn new(space: SearchSpace, strategy: SweepStrategy) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            space,
            strategy,
            trials: Vec::new(),
        }
    }

    /// Expand the space into trials, replacing any previous ones.
    ///
    /// Random sweeps draw from `rng.fork("sweep")`, so the same seed yields
    /// the same trials and the run's own streams are left untouched.
    pub fn generate_trials(&mut self, rng: &RngSuite) -> Result<&[SweepTrial], RankforgeError> {
        if self.space.is_empty() {
            return Err(SweepError::EmptySpace {
                algorithm: self.space.algorithm.key().to_string(),
            }
            .into());
        }

        let param_sets: Vec<ConfigMap> = match self.strategy {
            SweepStrategy::Grid => self.grid()?,
            SweepStrategy::Random { n_trials } => {
                let mut sweep_rng = rng.fork("sweep");
                (0..n_trials)
                    .map(|_| {
                        self.space
                            .params()
                            .map(|(param, domain)| {
                                (param.key().to_string(), domain.sample(param, &mut sweep_rng))
                            })
                            .collect()
                    })
                    .collect()
            }
        };

        self.trials = param_sets
            .into_iter()
            .enumerate()
            .map(|(trial_number, params)| SweepTrial {
                trial_number,
                params,
                score: None,
            })
            .collect();
        tracing::info!(
            sweep_id = %self.id,
            algorithm = %self.space.algorithm,
            strategy = self.strategy.name(),
            trials = self.trials.len(),
            "Generated sweep trials"
        );
        Ok(&self.trials)
    }

    fn grid(&self) -> Result<Vec<ConfigMap>, SweepError> {
        let mut configs = vec![ConfigMap::new()];
        for (param, domain) in self.space.params() {
            let ParamDomain::Choice { values } = domain else {
                return Err(SweepError::UnsupportedDomain {
                    param: param.key().to_string(),
                    strategy: self.strategy.name().to_string(),
                });
            };
            let mut expanded = Vec::with_capacity(configs.len() * values.len());
            for config in &configs {
                for value in values {
                    let mut c = config.clone();
                    c.insert(param.key().to_string(), value.clone());
                    expanded.push(c);
                }
            }
            configs = expanded;
        }
        Ok(configs)
    }

    /// Resolve one configuration per trial, with the trial's parameters as
    /// the highest-precedence layer.
    pub fn resolve_trials(
        &self,
        resolver: &ConfigResolver,
        args: &ConfigMap,
    ) -> Result<Vec<Configuration>, ConfigError> {
        self.trials
            .iter()
            .map(|trial| resolver.resolve(args, Some(&trial.params)))
            .collect()
    }

    /// Record the evaluation score of a trial.
    pub fn record_score(&mut self, trial_number: usize, score: f64) -> Result<(), SweepError> {
        let trials = self.trials.len();
        let trial = self
            .trials
            .get_mut(trial_number)
            .ok_or(SweepError::UnknownTrial {
                trial_number,
                trials,
            })?;
        trial.score = Some(score);
        Ok(())
    }

    /// Best scored trial for the metric being optimized.
    pub fn best_trial(&self, metric: Metric) -> Option<&SweepTrial> {
        let scored = self
            .trials
            .iter()
            .filter_map(|t| t.score.filter(|s| !s.is_nan()).map(|s| (t, s)));
        let best = if metric.higher_is_better() {
            scored.max_by(|a, b| a.1.total_cmp(&b.1))
        } else {
            scored.min_by(|a, b| a.1.total_cmp(&b.1))
        };
        best.map(|(trial, _)| trial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerSource;
    use crate::error::RegistryError;
    use crate::seed::init_seed;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config_with(value: Value) -> Configuration {
        let mut config = Configuration::default();
        let layer: ConfigMap = serde_json::from_value(value).unwrap();
        config.overlay(LayerSource::Base, &layer);
        config
    }

    fn mf_space() -> SearchSpace {
        SearchSpace::new(Algorithm::Mf)
            .with(
                Hyperparam::Factors,
                ParamDomain::Choice {
                    values: vec![json!(16), json!(32)],
                },
            )
            .unwrap()
            .with(
                Hyperparam::Lr,
                ParamDomain::Choice {
                    values: vec![json!(0.01), json!("0.001"), json!(1)],
                },
            )
            .unwrap()
    }

    #[test]
    fn test_grid_is_cartesian_product() {
        let mut sweep = HyperparamSweep::new(mf_space(), SweepStrategy::Grid);
        let trials = sweep.generate_trials(&init_seed(0, true)).unwrap();
        assert_eq!(trials.len(), 6);
        assert_eq!(trials[0].params["factors"], json!(16));
        assert_eq!(trials[0].params["lr"], json!(0.01));
        // Choice values are coerced to the parameter type.
        assert_eq!(trials[1].params["lr"], json!(0.001));
        assert_eq!(trials[2].params["lr"], json!(1.0));
        assert_eq!(trials[5].params["factors"], json!(32));
        assert!(trials.iter().enumerate().all(|(i, t)| t.trial_number == i));
    }

    #[test]
    fn test_grid_rejects_continuous_domain() {
        let space = SearchSpace::new(Algorithm::Mf)
            .with(Hyperparam::Lr, ParamDomain::Uniform { min: 0.0, max: 1.0 })
            .unwrap();
        let mut sweep = HyperparamSweep::new(space, SweepStrategy::Grid);
        let err = sweep.generate_trials(&init_seed(0, true)).unwrap_err();
        assert!(matches!(
            err,
            RankforgeError::Sweep(SweepError::UnsupportedDomain { .. })
        ));
    }

    #[test]
    fn test_random_is_seeded() {
        let space = SearchSpace::new(Algorithm::Ngcf)
            .with(
                Hyperparam::Lr,
                ParamDomain::LogUniform {
                    min: 1e-4,
                    max: 1e-1,
                },
            )
            .unwrap()
            .with(Hyperparam::Factors, ParamDomain::IntRange { min: 8, max: 128 })
            .unwrap()
            .with(
                Hyperparam::NodeDropout,
                ParamDomain::Uniform { min: 0.0, max: 0.5 },
            )
            .unwrap();

        let strategy = SweepStrategy::Random { n_trials: 10 };
        let mut a = HyperparamSweep::new(space.clone(), strategy);
        let mut b = HyperparamSweep::new(space.clone(), strategy);
        let trials_a = a.generate_trials(&init_seed(42, true)).unwrap().to_vec();
        let trials_b = b.generate_trials(&init_seed(42, true)).unwrap().to_vec();
        assert_eq!(trials_a, trials_b);
        assert_eq!(trials_a.len(), 10);

        for trial in &trials_a {
            let lr = trial.params["lr"].as_f64().unwrap();
            assert!((1e-4..1e-1).contains(&lr), "lr {lr}");
            let factors = trial.params["factors"].as_i64().unwrap();
            assert!((8..=128).contains(&factors));
            let dropout = trial.params["node_dropout"].as_f64().unwrap();
            assert!((0.0..0.5).contains(&dropout));
        }

        let mut c = HyperparamSweep::new(space, strategy);
        let trials_c = c.generate_trials(&init_seed(43, true)).unwrap().to_vec();
        assert_ne!(trials_a, trials_c);
    }

    #[test]
    fn test_continuous_domain_on_int_param_rounds() {
        let space = SearchSpace::new(Algorithm::PureSvd)
            .with(
                Hyperparam::Factors,
                ParamDomain::Uniform {
                    min: 10.0,
                    max: 20.0,
                },
            )
            .unwrap();
        let mut sweep = HyperparamSweep::new(space, SweepStrategy::Random { n_trials: 5 });
        for trial in sweep.generate_trials(&init_seed(1, true)).unwrap() {
            assert!(trial.params["factors"].is_i64());
        }
    }

    #[test]
    fn test_empty_space() {
        let mut sweep = HyperparamSweep::new(
            SearchSpace::new(Algorithm::MostPop),
            SweepStrategy::Grid,
        );
        let err = sweep.generate_trials(&init_seed(0, true)).unwrap_err();
        assert!(err.to_string().contains("mostpop"));
    }

    #[test]
    fn test_with_rejects_untunable_param() {
        let err = SearchSpace::new(Algorithm::Ease)
            .with(Hyperparam::Lr, ParamDomain::Uniform { min: 0.0, max: 1.0 })
            .unwrap_err();
        assert!(matches!(
            err,
            RankforgeError::Registry(RegistryError::NotTunable { .. })
        ));
    }

    #[test]
    fn test_domain_validation() {
        let bad = [
            ParamDomain::Choice { values: vec![] },
            ParamDomain::Uniform { min: 1.0, max: 1.0 },
            ParamDomain::LogUniform { min: 0.0, max: 1.0 },
            ParamDomain::IntRange { min: 5, max: 4 },
        ];
        for domain in bad {
            assert!(domain.clone().validated(Hyperparam::Reg).is_err(), "{domain:?}");
        }
        assert!(
            ParamDomain::Choice {
                values: vec![json!("many")]
            }
            .validated(Hyperparam::Factors)
            .is_err()
        );
    }

    #[test]
    fn test_domain_rejects_unsampleable_ranges() {
        let bad = [
            ParamDomain::Uniform {
                min: -1.0e308,
                max: 1.0e308,
            },
            ParamDomain::Uniform {
                min: 0.0,
                max: f64::INFINITY,
            },
            ParamDomain::LogUniform {
                min: 1.0,
                max: f64::INFINITY,
            },
        ];
        for domain in bad {
            assert!(
                matches!(
                    domain.clone().validated(Hyperparam::Reg),
                    Err(RankforgeError::Sweep(SweepError::InvalidDomain { .. }))
                ),
                "{domain:?}"
            );
        }

        let config = config_with(json!({
            "algo_name": "slim",
            "tune_space": {"elastic": {"type": "uniform", "min": -1.0e308, "max": 1.0e308}}
        }));
        assert!(matches!(
            SearchSpace::from_config(&config),
            Err(RankforgeError::Sweep(SweepError::InvalidDomain { .. }))
        ));
    }

    #[test]
    fn test_wide_int_range_samples() {
        let space = SearchSpace::new(Algorithm::PureSvd)
            .with(
                Hyperparam::Factors,
                ParamDomain::IntRange {
                    min: i64::MIN,
                    max: i64::MAX,
                },
            )
            .unwrap();
        let mut sweep = HyperparamSweep::new(space, SweepStrategy::Random { n_trials: 3 });
        assert_eq!(sweep.generate_trials(&init_seed(1, true)).unwrap().len(), 3);
    }

    #[test]
    fn test_record_score_unknown_trial() {
        let mut sweep = HyperparamSweep::new(mf_space(), SweepStrategy::Grid);
        sweep.generate_trials(&init_seed(0, true)).unwrap();
        let err = sweep.record_score(6, 0.5).unwrap_err();
        assert!(matches!(
            err,
            SweepError::UnknownTrial {
                trial_number: 6,
                trials: 6
            }
        ));
        sweep.record_score(5, 0.5).unwrap();
        assert_eq!(sweep.trials[5].score, Some(0.5));
    }

    #[test]
    fn test_space_from_config() {
        let config = config_with(json!({
            "algo_name": "mf",
            "tune_space": {
                "factors": [16, 32, 64],
                "lr": {"type": "log_uniform", "min": 0.0001, "max": 0.1}
            }
        }));
        let space = SearchSpace::from_config(&config).unwrap();
        assert_eq!(space.algorithm(), Algorithm::Mf);
        let params: Vec<_> = space.params().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(
            params[1],
            (
                Hyperparam::Lr,
                &ParamDomain::LogUniform {
                    min: 0.0001,
                    max: 0.1
                }
            )
        );
    }

    #[test]
    fn test_space_from_config_errors() {
        let untunable = config_with(json!({"algo_name": "mf", "tune_space": {"dropout": [0.1]}}));
        assert!(SearchSpace::from_config(&untunable).is_err());

        let unknown = config_with(json!({"algo_name": "mf", "tune_space": {"momentum": [0.9]}}));
        assert!(SearchSpace::from_config(&unknown).is_err());

        let bad_type =
            config_with(json!({"algo_name": "mf", "tune_space": {"lr": {"type": "gaussian"}}}));
        assert!(matches!(
            SearchSpace::from_config(&bad_type),
            Err(RankforgeError::Sweep(SweepError::InvalidDomain { .. }))
        ));

        let scalar = config_with(json!({"algo_name": "mf", "tune_space": {"lr": 0.1}}));
        assert!(SearchSpace::from_config(&scalar).is_err());

        let absent = config_with(json!({"algo_name": "mf"}));
        assert!(SearchSpace::from_config(&absent).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_trials_uses_override_layer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("basic.yaml"), "algo_name: mf\nlr: 0.01\n").unwrap();
        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        std::fs::write(dir.path().join("model/mf.yaml"), "factors: 64\nlr: 0.005\n").unwrap();
        let resolver = ConfigResolver::new(dir.path());

        let mut sweep = HyperparamSweep::new(mf_space(), SweepStrategy::Grid);
        sweep.generate_trials(&init_seed(0, true)).unwrap();
        let args: ConfigMap = serde_json::from_value(json!({"factors": 8})).unwrap();
        let configs = sweep.resolve_trials(&resolver, &args).unwrap();

        assert_eq!(configs.len(), 6);
        for (config, trial) in configs.iter().zip(&sweep.trials) {
            assert_eq!(config.get("factors"), trial.params.get("factors"));
            assert_eq!(config.get("lr"), trial.params.get("lr"));
            assert_eq!(config.source("factors"), Some(LayerSource::Override));
        }
    }

    #[test]
    fn test_best_trial() {
        let mut sweep = HyperparamSweep::new(mf_space(), SweepStrategy::Grid);
        sweep.generate_trials(&init_seed(0, true)).unwrap();
        assert!(sweep.best_trial(Metric::Ndcg).is_none());

        sweep.record_score(0, 0.2).unwrap();
        sweep.record_score(3, 0.4).unwrap();
        sweep.record_score(4, f64::NAN).unwrap();
        assert!(sweep.record_score(99, 1.0).is_err());

        assert_eq!(sweep.best_trial(Metric::Ndcg).unwrap().trial_number, 3);
        assert_eq!(sweep.best_trial(Metric::Popularity).unwrap().trial_number, 0);
    }
}
