#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use showersim::core::{
    EventKind, Interaction, Labels, ParticleKind, ParticleState, RandomSeedPair, SamplingMode,
    ShowerEvent, ShowerObserver, StepOutcome, TransportKernel,
};
use showersim::error::{Error, Result};
use std::collections::{HashMap, VecDeque};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Surface of the slab at z = 0.
pub const TOP: u32 = 1;
/// Surface of the slab at z = -thickness.
pub const BOTTOM: u32 = 2;

/// Toy kernel: a single homogeneous slab (body 1, material 1) between z = -thickness
/// and z = 0, in vacuum.
///
/// Electrons lose a random fraction of their energy per interaction and scatter
/// isotropically; some interactions emit a photon (collision 4 or 5). Photons are either
/// absorbed (emitting an electron) or Compton-scattered (collision 2).
#[derive(Debug)]
pub struct SlabKernel {
    pub thickness: f64,
    /// Mean free path between interactions, per particle kind index.
    pub mean_free_path: [f64; 3],
    /// Probability that an electron interaction emits a photon.
    pub emission_probability: f64,
    /// Free paths sampled in forced mode are divided by this.
    pub forcing_boost: f64,
    rng: StdRng,
    seeds: RandomSeedPair,
    stack: Vec<ParticleState>,
    last_surface: Option<u32>,
    forcing: HashMap<(u32, ParticleKind, i32), f64>,
    pub material_updates: u32,
}

impl SlabKernel {
    pub fn new(thickness: f64) -> Self {
        let seeds = RandomSeedPair::default();
        Self {
            thickness,
            mean_free_path: [thickness / 10.0, thickness / 2.0, thickness / 10.0],
            emission_probability: 0.2,
            forcing_boost: 4.0,
            rng: rng_from(seeds),
            seeds,
            stack: Vec::new(),
            last_surface: None,
            forcing: HashMap::new(),
            material_updates: 0,
        }
    }

    fn inside(&self, z: f64) -> bool {
        z <= 0.0 && z >= -self.thickness
    }

    /// Distance to the slab boundary along w, and the surface hit.
    fn boundary(&self, z: f64, w: f64) -> Option<(f64, u32)> {
        if w > 0.0 {
            Some(((0.0 - z) / w, TOP))
        } else if w < 0.0 {
            Some(((-self.thickness - z) / w, BOTTOM))
        } else {
            None
        }
    }

    fn isotropic(&mut self) -> [f64; 3] {
        let w: f64 = 2.0 * self.rng.random::<f64>() - 1.0;
        let phi = 2.0 * std::f64::consts::PI * self.rng.random::<f64>();
        let s = (1.0 - w * w).max(0.0).sqrt();
        [s * phi.cos(), s * phi.sin(), w]
    }

    fn emit(
        &mut self,
        parent: &ParticleState,
        kind: ParticleKind,
        energy: f64,
        collision: i32,
    ) -> Result<()> {
        if energy <= 0.0 {
            return Ok(());
        }
        let direction = self.isotropic();
        let mut p = ParticleState::new(kind, energy, parent.position, direction, parent.weight)?;
        p.body = parent.body;
        p.material = parent.material;
        p.labels = Labels([
            parent.labels.generation() + 1,
            parent.kind.code(),
            collision,
            0,
            1,
        ]);
        self.stack.push(p);
        Ok(())
    }
}

fn rng_from(seeds: RandomSeedPair) -> StdRng {
    let seed = ((seeds.seed1 as u32 as u64) << 32) | seeds.seed2 as u32 as u64;
    StdRng::seed_from_u64(seed)
}

impl TransportKernel for SlabKernel {
    fn material_count(&self) -> usize {
        1
    }

    fn body_count(&self) -> usize {
        1
    }

    fn reset_secondary_stack(&mut self) {
        self.stack.clear();
    }

    fn locate(&mut self, particle: &mut ParticleState) -> Result<u32> {
        let inside = self.inside(particle.position[2]);
        particle.body = inside as u32;
        particle.material = inside as u32;
        // Born inside: entered through the face it is moving away from.
        self.last_surface = match (inside, particle.direction[2] < 0.0) {
            (false, _) => None,
            (true, true) => Some(TOP),
            (true, false) => Some(BOTTOM),
        };
        Ok(particle.material)
    }

    fn step(&mut self, particle: &mut ParticleState, max_distance: f64) -> Result<StepOutcome> {
        let z = particle.position[2];
        let w = particle.direction[2];
        if !particle.is_inside() {
            // Only straight flight towards the slab can enter it.
            let target = if z > 0.0 && w < 0.0 {
                Some((z / -w, TOP))
            } else if z < -self.thickness && w > 0.0 {
                Some(((-self.thickness - z) / w, BOTTOM))
            } else {
                None
            };
            return match target {
                Some((d, surface)) if d <= max_distance => {
                    advance(particle, d);
                    particle.position[2] = if surface == TOP { 0.0 } else { -self.thickness };
                    particle.body = 1;
                    particle.material = 1;
                    self.last_surface = Some(surface);
                    Ok(StepOutcome {
                        distance: d,
                        crossings: 1,
                    })
                }
                _ => Ok(StepOutcome {
                    distance: max_distance,
                    crossings: 0,
                }),
            };
        }
        match self.boundary(z, w) {
            Some((d, surface)) if d <= max_distance => {
                advance(particle, d);
                particle.body = 0;
                particle.material = 0;
                self.last_surface = Some(surface);
                Ok(StepOutcome {
                    distance: d,
                    crossings: 1,
                })
            }
            _ => {
                advance(particle, max_distance);
                Ok(StepOutcome {
                    distance: max_distance,
                    crossings: 0,
                })
            }
        }
    }

    fn last_surface(&self) -> Option<u32> {
        self.last_surface
    }

    fn sample_free_path(
        &mut self,
        particle: &ParticleState,
        max_distance: f64,
        mode: SamplingMode,
    ) -> Result<f64> {
        let mut lambda = self.mean_free_path[particle.kind.index()];
        if mode.is_forced() {
            lambda /= self.forcing_boost;
        }
        let u: f64 = self.rng.random::<f64>();
        Ok((-lambda * (1.0 - u).ln()).min(max_distance))
    }

    fn sample_interaction(
        &mut self,
        particle: &mut ParticleState,
        _mode: SamplingMode,
    ) -> Result<Interaction> {
        if particle.energy <= 0.0 {
            return Err(Error::kernel("interaction sampled for a particle without energy"));
        }
        let parent = particle.clone();
        let (loss, collision) = match particle.kind {
            ParticleKind::Photon => {
                if self.rng.random::<f64>() < 0.5 {
                    self.emit(&parent, ParticleKind::Electron, parent.energy * 0.9, 3)?;
                    (parent.energy, 3)
                } else {
                    let loss = parent.energy * self.rng.random_range(0.1..0.5);
                    self.emit(&parent, ParticleKind::Electron, loss, 2)?;
                    (loss, 2)
                }
            }
            ParticleKind::Electron | ParticleKind::Positron => {
                let loss = parent.energy * self.rng.random_range(0.05..0.3);
                if self.rng.random::<f64>() < self.emission_probability {
                    let collision = if self.rng.random::<bool>() { 4 } else { 5 };
                    self.emit(&parent, ParticleKind::Photon, loss * 0.5, collision)?;
                    (loss, collision)
                } else {
                    (loss, 1)
                }
            }
        };
        particle.energy = (particle.energy - loss).max(0.0);
        particle.direction = self.isotropic();
        Ok(Interaction {
            energy_loss: loss,
            collision,
        })
    }

    fn pop_secondary(&mut self) -> Result<Option<ParticleState>> {
        Ok(self.stack.pop())
    }

    fn range(&self, energy: f64, _kind: ParticleKind, _material: u32) -> Result<f64> {
        Ok(energy * 1e-9)
    }

    fn mean_free_path(
        &self,
        _energy: f64,
        kind: ParticleKind,
        _material: u32,
        _collision: i32,
    ) -> Result<f64> {
        Ok(self.mean_free_path[kind.index()])
    }

    fn seeds(&self) -> RandomSeedPair {
        self.seeds
    }

    fn set_seeds(&mut self, seeds: RandomSeedPair) {
        self.seeds = seeds;
        self.rng = rng_from(seeds);
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

    fn material_parameters_changed(
        &mut self,
        _material: u32,
        _parameters: &showersim::core::MaterialSimulationParameters,
    ) {
        self.material_updates += 1;
    }
}

fn advance(p: &mut ParticleState, d: f64) {
    for i in 0..3 {
        p.position[i] += d * p.direction[i];
    }
}

/// Kernel whose geometry answers are queued up front; interactions absorb the particle.
#[derive(Debug, Default)]
pub struct StubKernel {
    /// (material, last surface) reported by `locate`.
    pub locate_to: (u32, Option<u32>),
    /// (material after the step, surface crossed).
    pub steps: VecDeque<(u32, Option<u32>)>,
    last_surface: Option<u32>,
    seeds: RandomSeedPair,
    pub step_calls: u32,
}

impl StubKernel {
    pub fn new(locate_to: (u32, Option<u32>)) -> Self {
        Self {
            locate_to,
            ..Self::default()
        }
    }

    pub fn then_step(mut self, material: u32, surface: Option<u32>) -> Self {
        self.steps.push_back((material, surface));
        self
    }
}

impl TransportKernel for StubKernel {
    fn material_count(&self) -> usize {
        1
    }

    fn body_count(&self) -> usize {
        1
    }

    fn reset_secondary_stack(&mut self) {}

    fn locate(&mut self, particle: &mut ParticleState) -> Result<u32> {
        let (material, surface) = self.locate_to;
        particle.material = material;
        particle.body = material;
        self.last_surface = surface;
        Ok(material)
    }

    fn step(&mut self, particle: &mut ParticleState, max_distance: f64) -> Result<StepOutcome> {
        self.step_calls += 1;
        let (material, surface) = self
            .steps
            .pop_front()
            .ok_or_else(|| Error::kernel("stub ran out of scripted steps"))?;
        particle.material = material;
        particle.body = material;
        if surface.is_some() {
            self.last_surface = surface;
        }
        Ok(StepOutcome {
            distance: max_distance.min(1.0),
            crossings: surface.is_some() as u32,
        })
    }

    fn last_surface(&self) -> Option<u32> {
        self.last_surface
    }

    fn sample_free_path(
        &mut self,
        _particle: &ParticleState,
        max_distance: f64,
        _mode: SamplingMode,
    ) -> Result<f64> {
        Ok(max_distance.min(1.0))
    }

    fn sample_interaction(
        &mut self,
        particle: &mut ParticleState,
        _mode: SamplingMode,
    ) -> Result<Interaction> {
        let loss = particle.energy;
        particle.energy = 0.0;
        Ok(Interaction {
            energy_loss: loss,
            collision: 1,
        })
    }

    fn pop_secondary(&mut self) -> Result<Option<ParticleState>> {
        Ok(None)
    }

    fn range(&self, _energy: f64, _kind: ParticleKind, _material: u32) -> Result<f64> {
        Ok(0.0)
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

    fn forcing_factor(&self, _body: u32, _kind: ParticleKind, _collision: i32) -> Result<f64> {
        Ok(1.0)
    }

    fn set_forcing_factor(
        &mut self,
        _body: u32,
        _kind: ParticleKind,
        _collision: i32,
        _factor: f64,
    ) -> Result<()> {
        Ok(())
    }
}

/// One dispatched event, copied out of the borrowed particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub shower: u64,
    pub kind: EventKind,
    pub particle: ParticleKind,
    pub energy: f64,
    pub weight: f64,
    pub labels: Labels,
    pub collision: Option<i32>,
}

/// Records every event and trajectory end.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Recorded>,
    pub trajectory_ends: Vec<u64>,
}

impl Recorder {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

impl ShowerObserver for Recorder {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        self.events.push(Recorded {
            shower: event.shower,
            kind: event.kind,
            particle: event.particle.kind,
            energy: event.particle.energy,
            weight: event.particle.weight,
            labels: event.particle.labels,
            collision: event.knock.map(|k| k.collision),
        });
        Ok(())
    }

    fn trajectory_end(&mut self, shower: u64) -> Result<bool> {
        self.trajectory_ends.push(shower);
        Ok(true)
    }
}

/// Gatekeeper that counts its calls and answers `false` (or fails) from shower `stop_at` on.
#[derive(Debug, Default)]
pub struct Gate {
    pub calls: u32,
    pub stop_at: Option<u64>,
    pub fail: bool,
}

impl ShowerObserver for Gate {
    fn trajectory_end(&mut self, shower: u64) -> Result<bool> {
        self.calls += 1;
        match self.stop_at {
            Some(n) if shower >= n && self.fail => Err(Error::observer("gate failed")),
            Some(n) if shower >= n => Ok(false),
            _ => Ok(true),
        }
    }
}
