//! Algorithm registry: algorithm keys, model descriptors and tunable parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hyperparam::Hyperparam;
use crate::error::RegistryError;

/// Broad family a recommender model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Non-personalized baselines.
    Baseline,
    /// Neighbourhood and item-item regression models.
    Neighborhood,
    /// Matrix factorization and factorization machines.
    LatentFactor,
    /// Neural and graph models trained by gradient descent.
    Neural,
    /// Autoencoders, linear or variational.
    Autoencoder,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Baseline => write!(f, "baseline"),
            ModelFamily::Neighborhood => write!(f, "neighborhood"),
            ModelFamily::LatentFactor => write!(f, "latent_factor"),
            ModelFamily::Neural => write!(f, "neural"),
            ModelFamily::Autoencoder => write!(f, "autoencoder"),
        }
    }
}

/// Descriptor of the model an algorithm key constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Model type name used by the model layer.
    pub name: &'static str,
    pub family: ModelFamily,
    /// Whether training draws negative samples (`num_ng`).
    pub negative_sampling: bool,
}

/// Every algorithm the toolkit knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "mostpop")]
    MostPop,
    #[serde(rename = "itemknn")]
    ItemKnn,
    #[serde(rename = "puresvd")]
    PureSvd,
    #[serde(rename = "slim")]
    Slim,
    #[serde(rename = "mf")]
    Mf,
    #[serde(rename = "fm")]
    Fm,
    #[serde(rename = "neumf")]
    NeuMf,
    #[serde(rename = "nfm")]
    Nfm,
    #[serde(rename = "ngcf")]
    Ngcf,
    #[serde(rename = "multi-vae")]
    MultiVae,
    #[serde(rename = "item2vec")]
    Item2Vec,
    #[serde(rename = "ease")]
    Ease,
    #[serde(rename = "infae")]
    InfAe,
}

const NONE: &[Hyperparam] = &[];
const ITEMKNN: &[Hyperparam] = &[Hyperparam::Maxk];
const PURESVD: &[Hyperparam] = &[Hyperparam::Factors];
const SLIM: &[Hyperparam] = &[Hyperparam::Alpha, Hyperparam::Elastic];
const FACTORIZATION: &[Hyperparam] = &[
    Hyperparam::NumNg,
    Hyperparam::Factors,
    Hyperparam::Lr,
    Hyperparam::BatchSize,
    Hyperparam::Reg1,
    Hyperparam::Reg2,
];
const DEEP_FACTORIZATION: &[Hyperparam] = &[
    Hyperparam::NumNg,
    Hyperparam::Factors,
    Hyperparam::NumLayers,
    Hyperparam::Dropout,
    Hyperparam::Lr,
    Hyperparam::BatchSize,
    Hyperparam::Reg1,
    Hyperparam::Reg2,
];
const NGCF: &[Hyperparam] = &[
    Hyperparam::NumNg,
    Hyperparam::Factors,
    Hyperparam::NodeDropout,
    Hyperparam::MessDropout,
    Hyperparam::BatchSize,
    Hyperparam::Lr,
    Hyperparam::Reg1,
    Hyperparam::Reg2,
];
const MULTI_VAE: &[Hyperparam] = &[
    Hyperparam::LatentDim,
    Hyperparam::Dropout,
    Hyperparam::BatchSize,
    Hyperparam::Lr,
    Hyperparam::AnnealCap,
];
const EASE: &[Hyperparam] = &[Hyperparam::Reg];
const ITEM2VEC: &[Hyperparam] = &[
    Hyperparam::ContextWindow,
    Hyperparam::Rho,
    Hyperparam::Lr,
    Hyperparam::Factors,
];

impl Algorithm {
    pub const ALL: [Algorithm; 13] = [
        Algorithm::MostPop,
        Algorithm::ItemKnn,
        Algorithm::PureSvd,
        Algorithm::Slim,
        Algorithm::Mf,
        Algorithm::Fm,
        Algorithm::NeuMf,
        Algorithm::Nfm,
        Algorithm::Ngcf,
        Algorithm::MultiVae,
        Algorithm::Item2Vec,
        Algorithm::Ease,
        Algorithm::InfAe,
    ];

    /// Key used in `algo_name` and in the per-algorithm config file name.
    pub fn key(self) -> &'static str {
        match self {
            Algorithm::MostPop => "mostpop",
            Algorithm::ItemKnn => "itemknn",
            Algorithm::PureSvd => "puresvd",
            Algorithm::Slim => "slim",
            Algorithm::Mf => "mf",
            Algorithm::Fm => "fm",
            Algorithm::NeuMf => "neumf",
            Algorithm::Nfm => "nfm",
            Algorithm::Ngcf => "ngcf",
            Algorithm::MultiVae => "multi-vae",
            Algorithm::Item2Vec => "item2vec",
            Algorithm::Ease => "ease",
            Algorithm::InfAe => "infae",
        }
    }

    pub fn model(self) -> ModelDescriptor {
        use ModelFamily::*;
        let (name, family, negative_sampling) = match self {
            Algorithm::MostPop => ("MostPop", Baseline, false),
            Algorithm::ItemKnn => ("ItemKNNCF", Neighborhood, false),
            Algorithm::PureSvd => ("PureSVD", LatentFactor, false),
            Algorithm::Slim => ("SLiM", Neighborhood, false),
            Algorithm::Mf => ("MF", LatentFactor, true),
            Algorithm::Fm => ("FM", LatentFactor, true),
            Algorithm::NeuMf => ("NeuMF", Neural, true),
            Algorithm::Nfm => ("NFM", Neural, true),
            Algorithm::Ngcf => ("NGCF", Neural, true),
            Algorithm::MultiVae => ("VAECF", Autoencoder, false),
            Algorithm::Item2Vec => ("Item2Vec", Neural, false),
            Algorithm::Ease => ("EASE", Autoencoder, false),
            Algorithm::InfAe => ("InfAE", Autoencoder, false),
        };
        ModelDescriptor {
            name,
            family,
            negative_sampling,
        }
    }

    /// Hyperparameters a search may vary for this algorithm, in the order
    /// they are presented to the tuner.
    pub fn tunable_params(self) -> &'static [Hyperparam] {
        match self {
            Algorithm::MostPop | Algorithm::InfAe => NONE,
            Algorithm::ItemKnn => ITEMKNN,
            Algorithm::PureSvd => PURESVD,
            Algorithm::Slim => SLIM,
            Algorithm::Mf | Algorithm::Fm => FACTORIZATION,
            Algorithm::NeuMf | Algorithm::Nfm => DEEP_FACTORIZATION,
            Algorithm::Ngcf => NGCF,
            Algorithm::MultiVae => MULTI_VAE,
            Algorithm::Ease => EASE,
            Algorithm::Item2Vec => ITEM2VEC,
        }
    }

    pub fn is_tunable(self, param: Hyperparam) -> bool {
        self.tunable_params().contains(&param)
    }

    /// Fails with [`RegistryError::NotTunable`] unless `param` is tunable here.
    pub fn ensure_tunable(self, param: Hyperparam) -> Result<(), RegistryError> {
        if self.is_tunable(param) {
            Ok(())
        } else {
            Err(RegistryError::NotTunable {
                algorithm: self.key().to_string(),
                param: param.key().to_string(),
            })
        }
    }

    /// File name of the algorithm's defaults under `model/`.
    pub fn config_file_name(self) -> String {
        format!("{}.yaml", self.key())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Algorithm {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| RegistryError::UnknownAlgorithm {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_round_trip() {
        for algo in Algorithm::ALL {
            assert_eq!(algo.key().parse::<Algorithm>().unwrap(), algo);
            assert_eq!(
                serde_json::to_value(algo).unwrap(),
                serde_json::json!(algo.key())
            );
        }
    }

    #[test]
    fn test_keys_unique() {
        let keys: HashSet<_> = Algorithm::ALL.iter().map(|a| a.key()).collect();
        assert_eq!(keys.len(), Algorithm::ALL.len());
    }

    #[test]
    fn test_unknown_algorithm() {
        assert_eq!(
            "doesnotexist".parse::<Algorithm>().unwrap_err(),
            RegistryError::UnknownAlgorithm {
                name: "doesnotexist".into()
            }
        );
        // Keys are case-sensitive.
        assert!("MF".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_tunable_params() {
        assert!(Algorithm::MostPop.tunable_params().is_empty());
        assert!(Algorithm::InfAe.tunable_params().is_empty());
        assert_eq!(Algorithm::ItemKnn.tunable_params(), &[Hyperparam::Maxk]);
        assert_eq!(Algorithm::Ease.tunable_params(), &[Hyperparam::Reg]);
        assert_eq!(Algorithm::Mf.tunable_params().len(), 6);
        assert_eq!(Algorithm::NeuMf.tunable_params().len(), 8);
        assert!(Algorithm::Ngcf.is_tunable(Hyperparam::MessDropout));
        assert!(!Algorithm::Mf.is_tunable(Hyperparam::Dropout));
    }

    #[test]
    fn test_tunable_params_have_no_duplicates() {
        for algo in Algorithm::ALL {
            let params = algo.tunable_params();
            let unique: HashSet<_> = params.iter().collect();
            assert_eq!(unique.len(), params.len(), "duplicate param for {algo}");
        }
    }

    #[test]
    fn test_ensure_tunable() {
        assert!(Algorithm::Slim.ensure_tunable(Hyperparam::Alpha).is_ok());
        let err = Algorithm::Slim.ensure_tunable(Hyperparam::Lr).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotTunable {
                algorithm: "slim".into(),
                param: "lr".into()
            }
        );
    }

    #[test]
    fn test_model_descriptors() {
        assert_eq!(Algorithm::ItemKnn.model().name, "ItemKNNCF");
        assert_eq!(Algorithm::MultiVae.model().name, "VAECF");
        assert_eq!(Algorithm::MultiVae.model().family, ModelFamily::Autoencoder);
        // Only algorithms that tune `num_ng` sample negatives.
        for algo in Algorithm::ALL {
            assert_eq!(
                algo.model().negative_sampling,
                algo.is_tunable(Hyperparam::NumNg),
                "{algo}"
            );
        }
    }

    #[test]
    fn test_config_file_name() {
        assert_eq!(Algorithm::MultiVae.config_file_name(), "multi-vae.yaml");
    }
}
