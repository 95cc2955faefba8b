//! Seeding of every random stream a run draws from.
//!
//! There is no process-wide RNG: [`init_seed`] builds an [`RngSuite`] that
//! owns one generator per subsystem, and callers hand the relevant stream to
//! whatever needs randomness. Seed once, early, before any draw that must be
//! reproducible.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Configuration;
use crate::error::ConfigError;

/// Seed used when the configuration does not set `seed`.
pub const DEFAULT_SEED: i64 = 2022;

/// The independent random streams of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngStream {
    /// General-purpose draws (shuffling, sampling).
    General,
    /// Numeric-array draws (negative sampling, data splits).
    Array,
    /// Tensor initialization on the CPU.
    TensorCpu,
    /// Tensor initialization on an accelerator device.
    TensorDevice,
}

impl RngStream {
    pub const ALL: [RngStream; 4] = [
        RngStream::General,
        RngStream::Array,
        RngStream::TensorCpu,
        RngStream::TensorDevice,
    ];
}

/// Numeric backend kernel-selection flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFlags {
    /// Let the backend auto-tune kernels, possibly nondeterministically.
    pub benchmark: bool,
    /// Restrict the backend to deterministic kernels.
    pub deterministic: bool,
}

impl BackendFlags {
    pub fn for_reproducibility(reproducibility: bool) -> Self {
        Self {
            benchmark: !reproducibility,
            deterministic: reproducibility,
        }
    }
}

/// All random state of one run.
#[derive(Debug, Clone)]
pub struct RngSuite {
    seed: i64,
    general: StdRng,
    array: StdRng,
    tensor_cpu: StdRng,
    tensor_device: StdRng,
    backend: BackendFlags,
}

/// Seed every stream with `seed` and set the backend flags.
///
/// Any integer is accepted; negative seeds are reinterpreted bit-for-bit.
/// With `reproducibility` the backend is pinned to deterministic kernels;
/// without it auto-tuning is enabled and bitwise repeatability is not
/// guaranteed downstream.
pub fn init_seed(seed: i64, reproducibility: bool) -> RngSuite {
    let suite = RngSuite {
        seed,
        general: seeded(seed),
        array: seeded(seed),
        tensor_cpu: seeded(seed),
        tensor_device: seeded(seed),
        backend: BackendFlags::for_reproducibility(reproducibility),
    };
    tracing::info!(seed, reproducibility, "Initialized random streams");
    suite
}

fn seeded(seed: i64) -> StdRng {
    StdRng::seed_from_u64(seed as u64)
}

impl RngSuite {
    /// Seed from the `seed` and `reproducibility` keys of a configuration.
    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        let seed = config.get_i64("seed")?.unwrap_or(DEFAULT_SEED);
        let reproducibility = config.get_bool("reproducibility")?.unwrap_or(true);
        Ok(init_seed(seed, reproducibility))
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn backend(&self) -> BackendFlags {
        self.backend
    }

    pub fn is_reproducible(&self) -> bool {
        self.backend.deterministic
    }

    pub fn stream(&mut self, stream: RngStream) -> &mut StdRng {
        match stream {
            RngStream::General => &mut self.general,
            RngStream::Array => &mut self.array,
            RngStream::TensorCpu => &mut self.tensor_cpu,
            RngStream::TensorDevice => &mut self.tensor_device,
        }
    }

    /// Re-apply a new seed to all four streams, keeping the backend flags.
    pub fn reseed(&mut self, seed: i64) {
        self.seed = seed;
        for stream in RngStream::ALL {
            *self.stream(stream) = seeded(seed);
        }
        tracing::debug!(seed, "Reseeded random streams");
    }

    /// Derive a child generator from the seed and `label`.
    ///
    /// Forks never advance the four main streams, so a subsystem that forks
    /// cannot shift the draws of another.
    pub fn fork(&self, label: &str) -> StdRng {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(b"/");
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        StdRng::from_seed(key)
    }
}
