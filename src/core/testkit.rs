//! Scripted kernel for unit tests: geometry and physics answers are queued up front.

use crate::core::forcing::SamplingMode;
use crate::core::kernel::{Interaction, RandomSeedPair, StepOutcome, TransportKernel};
use crate::core::particle::{ParticleKind, ParticleState};
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// Where a scripted step leaves the particle.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedStep {
    pub body: u32,
    pub material: u32,
    pub crossings: u32,
    pub surface: Option<u32>,
}

impl ScriptedStep {
    /// Full step inside body 1, material 1.
    pub fn stay() -> Self {
        Self {
            body: 1,
            material: 1,
            crossings: 0,
            surface: None,
        }
    }

    /// Full step inside `body`, now filled with `material`, without crossing anything.
    pub fn within(body: u32, material: u32) -> Self {
        Self {
            body,
            material,
            crossings: 0,
            surface: None,
        }
    }

    /// Leave the system through `surface`.
    pub fn exit(surface: u32) -> Self {
        Self {
            body: 0,
            material: 0,
            crossings: 1,
            surface: Some(surface),
        }
    }

    /// Stop on `surface` after entering `body` of `material`.
    pub fn cross(body: u32, material: u32, surface: u32) -> Self {
        Self {
            body,
            material,
            crossings: 1,
            surface: Some(surface),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedKnock {
    pub energy_loss: f64,
    pub collision: i32,
    pub secondaries: Vec<ParticleState>,
}

#[derive(Debug, Default)]
pub struct ScriptedKernel {
    pub materials: usize,
    pub bodies: usize,
    pub locate_to: (u32, u32, Option<u32>),
    pub steps: VecDeque<ScriptedStep>,
    pub knocks: VecDeque<ScriptedKnock>,
    pub stack: Vec<ParticleState>,
    pub last_surface: Option<u32>,
    pub seeds: RandomSeedPair,
    pub forcing: HashMap<(u32, ParticleKind, i32), f64>,
    /// Calls in order, e.g. "jump:forced", "knock:unforced", "step".
    pub calls: Vec<String>,
    pub resets: u32,
    pub fail_knock: bool,
}

impl ScriptedKernel {
    pub fn new(materials: usize, bodies: usize) -> Self {
        Self {
            materials,
            bodies,
            locate_to: (1, 1, None),
            ..Self::default()
        }
    }

    pub fn knock(mut self, energy_loss: f64, collision: i32) -> Self {
        self.knocks.push_back(ScriptedKnock {
            energy_loss,
            collision,
            secondaries: Vec::new(),
        });
        self
    }

    pub fn step(mut self, step: ScriptedStep) -> Self {
        self.steps.push_back(step);
        self
    }
}

fn mode_name(mode: SamplingMode) -> &'static str {
    if mode.is_forced() {
        "forced"
    } else {
        "unforced"
    }
}

impl TransportKernel for ScriptedKernel {
    fn material_count(&self) -> usize {
        self.materials
    }

    fn body_count(&self) -> usize {
        self.bodies
    }

    fn reset_secondary_stack(&mut self) {
        self.resets += 1;
        self.stack.clear();
    }

    fn locate(&mut self, particle: &mut ParticleState) -> Result<u32> {
        let (body, material, surface) = self.locate_to;
        particle.body = body;
        particle.material = material;
        self.last_surface = surface;
        self.calls.push("locate".into());
        Ok(material)
    }

    fn step(&mut self, particle: &mut ParticleState, max_distance: f64) -> Result<StepOutcome> {
        self.calls.push("step".into());
        // An exhausted script leaves the system through surface 0.
        let s = self.steps.pop_front().unwrap_or(ScriptedStep::exit(0));
        particle.body = s.body;
        particle.material = s.material;
        if s.surface.is_some() {
            self.last_surface = s.surface;
        }
        Ok(StepOutcome {
            distance: max_distance.min(1.0),
            crossings: s.crossings,
        })
    }

    fn last_surface(&self) -> Option<u32> {
        self.last_surface
    }

    fn sample_free_path(
        &mut self,
        _particle: &ParticleState,
        max_distance: f64,
        mode: SamplingMode,
    ) -> Result<f64> {
        self.calls.push(format!("jump:{}", mode_name(mode)));
        Ok(max_distance.min(1.0))
    }

    fn sample_interaction(
        &mut self,
        particle: &mut ParticleState,
        mode: SamplingMode,
    ) -> Result<Interaction> {
        self.calls.push(format!("knock:{}", mode_name(mode)));
        if self.fail_knock {
            return Err(Error::kernel("scripted knock failure"));
        }
        let k = self.knocks.pop_front().unwrap_or(ScriptedKnock {
            energy_loss: particle.energy,
            collision: 1,
            secondaries: Vec::new(),
        });
        particle.energy -= k.energy_loss;
        self.stack.extend(k.secondaries);
        Ok(Interaction {
            energy_loss: k.energy_loss,
            collision: k.collision,
        })
    }

    fn pop_secondary(&mut self) -> Result<Option<ParticleState>> {
        Ok(self.stack.pop())
    }

    fn range(&self, energy: f64, _kind: ParticleKind, _material: u32) -> Result<f64> {
        Ok(energy * 1e-6)
    }

    fn mean_free_path(
        &self,
        _energy: f64,
        _kind: ParticleKind,
        _material: u32,
        _collision: i32,
    ) -> Result<f64> {
        Ok(1.0)
    }

    fn seeds(&self) -> RandomSeedPair {
        self.seeds
    }

    fn set_seeds(&mut self, seeds: RandomSeedPair) {
        self.seeds = seeds;
    }

    fn forcing_factor(&self, body: u32, kind: ParticleKind, collision: i32) -> Result<f64> {
        Ok(self.forcing.get(&(body, kind, collision)).copied().unwrap_or(1.0))
    }

    fn set_forcing_factor(
        &mut self,
        body: u32,
        kind: ParticleKind,
        collision: i32,
        factor: f64,
    ) -> Result<()> {
        self.forcing.insert((body, kind, collision), factor);
        Ok(())
    }
}
