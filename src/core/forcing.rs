use crate::core::particle::ParticleKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound of the default weight window.
pub const DEFAULT_WEIGHT_HIGH: f64 = 1.0e6;

/// Which free-path / interaction sampling routine the kernel should use for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Unforced,
    Forced,
}

impl SamplingMode {
    #[inline]
    pub fn is_forced(self) -> bool {
        matches!(self, SamplingMode::Forced)
    }
}

/// Interaction-forcing configuration for one (body, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcingEntry {
    pub enabled: bool,
    pub weight_low: f64,
    pub weight_high: f64,
}

impl Default for ForcingEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            weight_low: 0.0,
            weight_high: DEFAULT_WEIGHT_HIGH,
        }
    }
}

impl ForcingEntry {
    /// Forcing applies when enabled and `low <= weight <= high`.
    #[inline]
    pub fn applies_to(&self, weight: f64) -> bool {
        self.enabled && weight >= self.weight_low && weight <= self.weight_high
    }
}

/// One element of a batch's forcing specification list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForcingSpec {
    /// Body index, `1..=body_count`.
    pub body: u32,
    pub kind: ParticleKind,
    /// Inclusive weight window inside which forcing applies.
    pub weight_low: f64,
    pub weight_high: f64,
}

impl ForcingSpec {
    pub fn validate(&self, body_count: usize) -> Result<()> {
        if self.body == 0 || self.body as usize > body_count {
            return Err(Error::InvalidParam(format!(
                "forcing body {} out of range (1..={body_count})",
                self.body
            )));
        }
        if !self.weight_low.is_finite() || !self.weight_high.is_finite() {
            return Err(Error::InvalidParam("forcing weight window must be finite".into()));
        }
        if self.weight_low < 0.0 || self.weight_low > self.weight_high {
            return Err(Error::InvalidParam(format!(
                "forcing weight window [{}, {}] is empty or negative",
                self.weight_low, self.weight_high
            )));
        }
        Ok(())
    }
}

/// Forcing table keyed by (body, particle kind). Missing keys use [`ForcingEntry::default`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcingPolicy {
    entries: HashMap<(u32, ParticleKind), ForcingEntry>,
}

impl ForcingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from a validated specification list; later entries override earlier ones.
    pub fn from_specs(specs: &[ForcingSpec]) -> Self {
        let mut policy = Self::new();
        for spec in specs {
            policy.enable(spec.body, spec.kind, spec.weight_low, spec.weight_high);
        }
        policy
    }

    pub fn enable(&mut self, body: u32, kind: ParticleKind, weight_low: f64, weight_high: f64) {
        self.entries.insert(
            (body, kind),
            ForcingEntry {
                enabled: true,
                weight_low,
                weight_high,
            },
        );
    }

    pub fn disable(&mut self, body: u32, kind: ParticleKind) {
        self.entries.remove(&(body, kind));
    }

    pub fn entry(&self, body: u32, kind: ParticleKind) -> ForcingEntry {
        self.entries.get(&(body, kind)).copied().unwrap_or_default()
    }

    /// Sampling mode for a particle of `kind` and `weight` currently in `body`.
    #[inline]
    pub fn select(&self, body: u32, kind: ParticleKind, weight: f64) -> SamplingMode {
        if self.entry(body, kind).applies_to(weight) {
            SamplingMode::Forced
        } else {
            SamplingMode::Unforced
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
