//! Reproducibility tracking: environment snapshots and run manifests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config::{ALGO_NAME_KEY, ConfigMap, Configuration};
use crate::error::{ConfigError, RankforgeError};
use crate::seed::{BackendFlags, RngSuite};

/// Environment variables whose values can change numeric results.
const TRACKED_ENV_VARS: &[&str] = &[
    "CUDA_VISIBLE_DEVICES",
    "OMP_NUM_THREADS",
    "MKL_NUM_THREADS",
    "RAYON_NUM_THREADS",
];

/// Snapshot of the machine a run was prepared on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub platform: String,
    pub arch: String,
    pub tool_version: String,
    /// Hash of [`TRACKED_ENV_VARS`].
    pub env_vars_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl EnvironmentSnapshot {
    pub fn capture() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            env_vars_hash: Self::compute_env_vars_hash(),
            timestamp: Utc::now(),
        }
    }

    fn compute_env_vars_hash() -> String {
        let mut hasher = Sha256::new();
        for var in TRACKED_ENV_VARS {
            let value = std::env::var(var).unwrap_or_default();
            hasher.update(var.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Everything needed to repeat a run: the resolved configuration, the seed
/// and backend flags it was seeded with, and where it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub algorithm: Option<String>,
    pub seed: i64,
    pub backend: BackendFlags,
    pub config_digest: String,
    pub config: ConfigMap,
    pub environment: EnvironmentSnapshot,
    pub created_at: DateTime<Utc>,
}

impl RunManifest {
    /// Capture `config` and the seeding of `rng`. A present but non-string
    /// `algo_name` is rejected.
    pub fn new(config: &Configuration, rng: &RngSuite) -> Result<Self, ConfigError> {
        let algorithm = config.get_str(ALGO_NAME_KEY)?.map(str::to_string);
        Ok(Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            algorithm,
            seed: rng.seed(),
            backend: rng.backend(),
            config_digest: config.digest(),
            config: config.as_map().clone(),
            environment: EnvironmentSnapshot::capture(),
            created_at: Utc::now(),
        })
    }

    /// Whether `config` is the configuration this manifest recorded.
    pub fn matches(&self, config: &Configuration) -> bool {
        self.config_digest == config.digest()
    }

    /// Write `<dir>/<run_id>.json`, creating `dir` if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, RankforgeError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(
            run_id = %self.run_id,
            path = %path.display(),
            "Wrote run manifest"
        );
        Ok(path)
    }

    pub fn read_from(path: &Path) -> Result<Self, RankforgeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerSource;
    use crate::seed::init_seed;
    use serde_json::json;

    fn config() -> Configuration {
        let mut config = Configuration::default();
        let layer: ConfigMap =
            serde_json::from_value(json!({"algo_name": "ease", "reg": 200.0, "seed": 7}))
                .unwrap();
        config.overlay(LayerSource::Base, &layer);
        config
    }

    #[test]
    fn test_snapshot_capture() {
        let snapshot = EnvironmentSnapshot::capture();
        assert_eq!(snapshot.platform, std::env::consts::OS);
        assert_eq!(snapshot.env_vars_hash.len(), 64);
    }

    #[test]
    fn test_manifest_fields() {
        let config = config();
        let manifest = RunManifest::new(&config, &init_seed(7, true)).unwrap();
        assert_eq!(manifest.algorithm.as_deref(), Some("ease"));
        assert_eq!(manifest.seed, 7);
        assert!(manifest.backend.deterministic);
        assert_eq!(manifest.config, *config.as_map());
        assert!(manifest.matches(&config));
    }

    #[test]
    fn test_manifest_rejects_non_string_algo_name() {
        let mut config = Configuration::default();
        let layer: ConfigMap = serde_json::from_value(json!({"algo_name": 42})).unwrap();
        config.overlay(LayerSource::Base, &layer);
        let err = RunManifest::new(&config, &init_seed(7, true)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "algo_name"));
    }

    #[test]
    fn test_manifest_ids_unique() {
        let config = config();
        let rng = init_seed(7, true);
        assert_ne!(
            RunManifest::new(&config, &rng).unwrap().run_id,
            RunManifest::new(&config, &rng).unwrap().run_id
        );
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunManifest::new(&config(), &init_seed(7, false)).unwrap();
        let path = manifest.write_to(&dir.path().join("runs")).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));

        let loaded = RunManifest::read_from(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(!loaded.backend.deterministic);
    }

    #[test]
    fn test_read_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunManifest::read_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, RankforgeError::Io(_)));
    }
}
