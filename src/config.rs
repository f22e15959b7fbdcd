//! Batch descriptions loaded from TOML.
//!
//! ```toml
//! total-showers = 999
//! max-generation = 4
//! max-step-per-body = [1e-4, 1e-3]
//!
//! [beam]
//! energy = 15e3
//! position = [0.0, 0.0, 1e-3]
//! direction = [0.0, 0.0, -1.0]
//!
//! [seeds]
//! seed1 = 12345
//! seed2 = 54321
//!
//! [[forcing]]
//! body = 1
//! kind = "electron"
//! weight-low = 0.1
//! weight-high = 2.0
//! ```

use crate::core::forcing::{self, ForcingSpec};
use crate::core::kernel::RandomSeedPair;
use crate::core::particle::{ParticleKind, DIM};
use crate::core::sim::{BatchSpec, Beam, DEFAULT_MAX_GENERATION};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BeamConfig {
    /// Kinetic energy of the primary electron, eV
    pub energy: f64,
    pub position: [f64; DIM],
    pub direction: [f64; DIM],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ForcingConfig {
    pub body: u32,
    pub kind: ParticleKind,
    #[serde(default)]
    pub weight_low: f64,
    #[serde(default = "default_weight_high")]
    pub weight_high: f64,
}

fn default_weight_high() -> f64 {
    forcing::DEFAULT_WEIGHT_HIGH
}

fn default_max_generation() -> i32 {
    DEFAULT_MAX_GENERATION
}

/// On-disk form of a [`BatchSpec`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BatchConfig {
    /// Index of the last shower; the batch runs `total-showers + 1` showers.
    pub total_showers: u64,
    pub beam: BeamConfig,
    #[serde(default)]
    pub max_step_per_body: Vec<f64>,
    #[serde(default)]
    pub forcing: Vec<ForcingConfig>,
    #[serde(default)]
    pub seeds: RandomSeedPair,
    /// Deepest secondary generation tracked; `0` disables the limit.
    #[serde(default = "default_max_generation")]
    pub max_generation: i32,
}

impl BatchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Convert into a batch, checked against a geometry with `body_count` bodies.
    pub fn into_spec(self, body_count: usize) -> Result<BatchSpec> {
        if self.max_generation < 0 {
            return Err(Error::InvalidParam(format!(
                "max-generation must be >= 0, got {}",
                self.max_generation
            )));
        }
        let spec = BatchSpec {
            total_showers: self.total_showers,
            beam: Beam {
                energy: self.beam.energy,
                position: self.beam.position,
                direction: self.beam.direction,
            },
            max_step_per_body: self.max_step_per_body,
            forcing: self
                .forcing
                .into_iter()
                .map(|f| ForcingSpec {
                    body: f.body,
                    kind: f.kind,
                    weight_low: f.weight_low,
                    weight_high: f.weight_high,
                })
                .collect(),
            seeds: self.seeds,
            max_generation: (self.max_generation > 0).then_some(self.max_generation),
        };
        spec.validate(body_count)?;
        Ok(spec)
    }
}
