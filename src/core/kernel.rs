//! Boundary to the external transport kernel and the mutable simulation context.
//!
//! The kernel owns the physics (cross sections, scattering, geometry). The context
//! owns everything the orchestration needs around it: the kernel itself, the material
//! parameter table, the forcing policy and the per-body step limits of the current batch.

use crate::core::forcing::{ForcingPolicy, SamplingMode};
use crate::core::material::{MaterialSimulationParameters, MaterialTable};
use crate::core::particle::{ParticleKind, ParticleState};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Step limit used for bodies without an explicit entry.
pub const DEFAULT_MAX_STEP: f64 = 1.0e35;

/// Result of advancing a particle through the geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Distance actually traveled (may be shorter than requested at an interface).
    pub distance: f64,
    /// Number of interfaces crossed during the step.
    pub crossings: u32,
}

/// Result of sampling an interaction ("knock").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    /// Energy deposited by the interaction, in eV.
    pub energy_loss: f64,
    /// Kernel collision-type code.
    pub collision: i32,
}

/// Seeds of the kernel's random number generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RandomSeedPair {
    pub seed1: i32,
    pub seed2: i32,
}

impl RandomSeedPair {
    pub fn new(seed1: i32, seed2: i32) -> Self {
        Self { seed1, seed2 }
    }
}

impl Default for RandomSeedPair {
    fn default() -> Self {
        Self::new(12345, 54321)
    }
}

/// Operations the shower engine consumes from the physics kernel.
///
/// Every call that samples random numbers advances the kernel's seed pair. Geometry
/// calls update `body` and `material` of the particle in place.
pub trait TransportKernel {
    /// Number of materials loaded by the kernel (indices `1..=material_count`).
    fn material_count(&self) -> usize;

    /// Number of bodies of the loaded geometry (indices `1..=body_count`).
    fn body_count(&self) -> usize;

    /// Forget every pending secondary and any per-shower bookkeeping.
    fn reset_secondary_stack(&mut self);

    /// Find the body and material containing the particle; returns the material index.
    ///
    /// Also sets [`last_surface`](TransportKernel::last_surface) to the surface the
    /// particle counts as having entered through, or `None` when there is none. For a
    /// primary born inside the system this is the reference surface for backscatter:
    /// with `None`, every electron leaving such a shower is reported as transmitted.
    fn locate(&mut self, particle: &mut ParticleState) -> Result<u32>;

    /// Prepare the kernel for a new track segment in the particle's current body.
    fn start_track(&mut self, _particle: &mut ParticleState) -> Result<()> {
        Ok(())
    }

    /// Move the particle by at most `max_distance`, stopping at interfaces.
    fn step(&mut self, particle: &mut ParticleState, max_distance: f64) -> Result<StepOutcome>;

    /// Surface crossed by the most recent `step`, or the entry surface set by `locate`
    /// if no step crossed one since.
    fn last_surface(&self) -> Option<u32>;

    /// Sample the distance to the next interaction, capped at `max_distance`.
    fn sample_free_path(
        &mut self,
        particle: &ParticleState,
        max_distance: f64,
        mode: SamplingMode,
    ) -> Result<f64>;

    /// Sample an interaction at the current position; updates energy and direction.
    fn sample_interaction(
        &mut self,
        particle: &mut ParticleState,
        mode: SamplingMode,
    ) -> Result<Interaction>;

    /// Retrieve the most recently produced pending secondary, if any.
    fn pop_secondary(&mut self) -> Result<Option<ParticleState>>;

    /// CSDA range of a particle of `kind` and `energy` in `material`.
    fn range(&self, energy: f64, kind: ParticleKind, material: u32) -> Result<f64>;

    /// Mean free path between collisions of type `collision`.
    fn mean_free_path(
        &self,
        energy: f64,
        kind: ParticleKind,
        material: u32,
        collision: i32,
    ) -> Result<f64>;

    fn seeds(&self) -> RandomSeedPair;

    fn set_seeds(&mut self, seeds: RandomSeedPair);

    /// Interaction forcing factor for (body, kind, collision).
    fn forcing_factor(&self, body: u32, kind: ParticleKind, collision: i32) -> Result<f64>;

    fn set_forcing_factor(
        &mut self,
        body: u32,
        kind: ParticleKind,
        collision: i32,
        factor: f64,
    ) -> Result<()>;

    /// Notification that the parameters of `material` changed.
    fn material_parameters_changed(
        &mut self,
        _material: u32,
        _parameters: &MaterialSimulationParameters,
    ) {
    }
}

/// The single mutable simulation context of one batch run.
#[derive(Debug)]
pub struct SimulationContext<K: TransportKernel> {
    kernel: K,
    materials: MaterialTable,
    forcing: ForcingPolicy,
    max_steps: Vec<f64>,
}

impl<K: TransportKernel> SimulationContext<K> {
    /// Wrap a kernel, with default parameters for every material it knows.
    pub fn new(kernel: K) -> Self {
        let materials = MaterialTable::new(kernel.material_count());
        Self {
            kernel,
            materials,
            forcing: ForcingPolicy::new(),
            max_steps: Vec::new(),
        }
    }

    /// Wrap a kernel with an explicit material table; its size must match the kernel's.
    pub fn with_materials(mut kernel: K, materials: MaterialTable) -> Result<Self> {
        if materials.len() != kernel.material_count() {
            return Err(Error::InvalidParam(format!(
                "material table has {} entries but the kernel loaded {} materials",
                materials.len(),
                kernel.material_count()
            )));
        }
        for m in 1..=materials.len() as u32 {
            kernel.material_parameters_changed(m, materials.get(m)?);
        }
        Ok(Self {
            kernel,
            materials,
            forcing: ForcingPolicy::new(),
            max_steps: Vec::new(),
        })
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn into_kernel(self) -> K {
        self.kernel
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn forcing(&self) -> &ForcingPolicy {
        &self.forcing
    }

    pub fn absorption_energies(&self, material: u32) -> Result<[f64; 3]> {
        self.materials.absorption_energies(material)
    }

    pub fn set_absorption_energies(
        &mut self,
        material: u32,
        electron: Option<f64>,
        photon: Option<f64>,
        positron: Option<f64>,
    ) -> Result<()> {
        self.materials
            .set_absorption_energies(material, electron, photon, positron)?;
        self.notify_material(material)
    }

    pub fn constants(&self, material: u32) -> Result<(f64, f64)> {
        self.materials.constants(material)
    }

    pub fn set_constants(&mut self, material: u32, c1: Option<f64>, c2: Option<f64>) -> Result<()> {
        self.materials.set_constants(material, c1, c2)?;
        self.notify_material(material)
    }

    pub fn cutoffs(&self, material: u32) -> Result<(f64, f64)> {
        self.materials.cutoffs(material)
    }

    pub fn set_cutoffs(&mut self, material: u32, wcc: Option<f64>, wcr: Option<f64>) -> Result<()> {
        self.materials.set_cutoffs(material, wcc, wcr)?;
        self.notify_material(material)
    }

    pub fn seeds(&self) -> RandomSeedPair {
        self.kernel.seeds()
    }

    pub fn set_seeds(&mut self, seeds: RandomSeedPair) {
        self.kernel.set_seeds(seeds);
    }

    pub fn forcing_factor(&self, body: u32, kind: ParticleKind, collision: i32) -> Result<f64> {
        self.check_body(body)?;
        self.kernel.forcing_factor(body, kind, collision)
    }

    pub fn set_forcing_factor(
        &mut self,
        body: u32,
        kind: ParticleKind,
        collision: i32,
        factor: f64,
    ) -> Result<()> {
        self.check_body(body)?;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::InvalidParam(format!(
                "forcing factor must be finite and > 0, got {factor}"
            )));
        }
        self.kernel.set_forcing_factor(body, kind, collision, factor)
    }

    pub fn range(&self, energy: f64, kind: ParticleKind, material: u32) -> Result<f64> {
        self.materials.get(material)?;
        self.kernel.range(energy, kind, material)
    }

    pub fn mean_free_path(
        &self,
        energy: f64,
        kind: ParticleKind,
        material: u32,
        collision: i32,
    ) -> Result<f64> {
        self.materials.get(material)?;
        self.kernel.mean_free_path(energy, kind, material, collision)
    }

    /// Maximum step length allowed in `body` for the running batch.
    #[inline]
    pub fn max_step(&self, body: u32) -> f64 {
        body.checked_sub(1)
            .and_then(|slot| self.max_steps.get(slot as usize))
            .copied()
            .unwrap_or(DEFAULT_MAX_STEP)
    }

    /// Install the batch-level configuration (step limits, forcing table, seeds).
    pub(crate) fn install_batch(
        &mut self,
        max_steps: Vec<f64>,
        forcing: ForcingPolicy,
        seeds: RandomSeedPair,
    ) {
        self.max_steps = max_steps;
        self.forcing = forcing;
        self.kernel.set_seeds(seeds);
    }

    fn check_body(&self, body: u32) -> Result<()> {
        let count = self.kernel.body_count();
        if body == 0 || body as usize > count {
            return Err(Error::InvalidParam(format!(
                "body {body} out of range (1..={count})"
            )));
        }
        Ok(())
    }

    fn notify_material(&mut self, material: u32) -> Result<()> {
        let params = *self.materials.get(material)?;
        self.kernel.material_parameters_changed(material, &params);
        Ok(())
    }
}
