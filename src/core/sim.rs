use crate::core::dispatch::{EventDispatcher, GateDecision};
use crate::core::event::{EventKind, ShowerEvent};
use crate::core::forcing::{ForcingPolicy, ForcingSpec};
use crate::core::kernel::{RandomSeedPair, SimulationContext, TransportKernel};
use crate::core::particle::{
    ParticleKind, ParticleState, PhotonOrigin, COLLISION_BREMSSTRAHLUNG,
    COLLISION_SHELL_IONISATION, DIM, VACUUM,
};
use crate::core::track::{TrackDriver, TrackEnd, TrackOutcome};
use crate::error::{Error, Result};
use log::{debug, info, trace};

/// Length of the single step used to bring a primary born in vacuum into the system.
pub const ENTRY_STEP: f64 = 1.0e30;

/// Generation limit applied when a batch does not choose one.
pub const DEFAULT_MAX_GENERATION: i32 = 4;

/// Primary beam: every shower starts with one electron of this energy, position and direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    /// Kinetic energy of every primary, in eV.
    pub energy: f64,
    /// Start point in cm.
    pub position: [f64; DIM],
    /// Unit direction cosines (u, v, w).
    pub direction: [f64; DIM],
}

impl Beam {
    /// Build the (unlocated) primary particle, validating the beam on the way.
    pub fn primary(&self) -> Result<ParticleState> {
        ParticleState::primary(self.energy, self.position, self.direction)
    }
}

/// Everything a batch needs besides the kernel and the observers.
///
/// The batch simulates shower indices `0..=total_showers`: after shower `n` it continues
/// while `n < total_showers`, so the completed count is always `last_index + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSpec {
    /// Index of the last shower; `total_showers + 1` showers run.
    pub total_showers: u64,
    pub beam: Beam,
    /// Maximum step length per body; entry `k` applies to body `k + 1`.
    pub max_step_per_body: Vec<f64>,
    /// Forcing windows installed before the first shower.
    pub forcing: Vec<ForcingSpec>,
    /// Seeds handed to the kernel when the batch starts.
    pub seeds: RandomSeedPair,
    /// Secondaries with a generation label above this are discarded untracked.
    pub max_generation: Option<i32>,
}

impl BatchSpec {
    /// A batch with no step limits or forcing, default seeds and the default generation
    /// limit.
    pub fn new(total_showers: u64, beam: Beam) -> Self {
        Self {
            total_showers,
            beam,
            max_step_per_body: Vec::new(),
            forcing: Vec::new(),
            seeds: RandomSeedPair::default(),
            max_generation: Some(DEFAULT_MAX_GENERATION),
        }
    }

    /// Check the batch against the loaded geometry without touching any state.
    pub fn validate(&self, body_count: usize) -> Result<()> {
        self.beam.primary()?;
        if self.max_step_per_body.len() > body_count {
            return Err(Error::InvalidParam(format!(
                "{} max-step entries given for {body_count} bodies",
                self.max_step_per_body.len()
            )));
        }
        if let Some(bad) = self
            .max_step_per_body
            .iter()
            .position(|&s| !s.is_finite() || s <= 0.0)
        {
            return Err(Error::InvalidParam(format!(
                "max step of body {} must be finite and > 0",
                bad + 1
            )));
        }
        for spec in &self.forcing {
            spec.validate(body_count)?;
        }
        if let Some(limit) = self.max_generation {
            if limit < 1 {
                return Err(Error::InvalidParam(
                    "max_generation must be >= 1 when set".into(),
                ));
            }
        }
        Ok(())
    }
}

/// What a batch run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Showers whose trajectory end was reached, the stopping one included.
    pub showers_completed: u64,
    /// A trajectory-end observer stopped the batch.
    pub aborted: bool,
    /// Failure message of the observer that stopped the batch, if it failed.
    pub stop_reason: Option<String>,
    /// Primaries that never entered the system.
    pub primaries_missed: u64,
    /// Tracks run to completion, primaries and secondaries alike.
    pub tracks: u64,
    pub secondaries_tracked: u64,
    /// Secondaries dropped for exceeding the generation limit.
    pub secondaries_discarded: u64,
    /// Tracks that left the system.
    pub exits: u64,
    /// Tracks that fell below their absorption energy.
    pub absorptions: u64,
    /// Hard interactions, counted whether or not they were reported.
    pub knocks: u64,
    /// Broadcast observer failures that were swallowed.
    pub observer_failures: u64,
}

impl BatchOutcome {
    fn record(&mut self, track: &TrackOutcome) {
        self.tracks += 1;
        self.knocks += track.knocks;
        match track.end {
            TrackEnd::Exited(_) => self.exits += 1,
            TrackEnd::Absorbed(_) => self.absorptions += 1,
        }
    }
}

/// Pending secondaries of the running shower, popped last-in first-out.
#[derive(Debug, Default)]
pub struct SecondaryStack {
    pending: Vec<ParticleState>,
}

impl SecondaryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move every secondary the kernel is holding onto the stack.
    ///
    /// The kernel hands out its newest secondary first; the batch is reversed before
    /// pushing so that popping from this stack yields the same order.
    pub fn absorb_from<K: TransportKernel>(&mut self, kernel: &mut K) -> Result<usize> {
        let start = self.pending.len();
        while let Some(p) = kernel.pop_secondary()? {
            self.pending.push(p);
        }
        self.pending[start..].reverse();
        Ok(self.pending.len() - start)
    }

    /// Put a particle on top; it is the next one popped.
    pub fn push(&mut self, particle: ParticleState) {
        self.pending.push(particle);
    }

    /// Take the most recently pushed particle.
    pub fn pop(&mut self) -> Option<ParticleState> {
        self.pending.pop()
    }

    /// Number of particles still waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending particle, as at the start of a shower.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Tag first-generation photons with their origin so observers can tell
/// characteristic x-rays and bremsstrahlung apart from other photons.
///
/// Returns true when the label changed.
pub fn propagate_labels(particle: &mut ParticleState) -> bool {
    if particle.kind != ParticleKind::Photon
        || particle.labels.generation() > 1
        || particle.labels.subtype() != PhotonOrigin::Unclassified as i32
    {
        return false;
    }
    let origin = match particle.labels.origin_collision() {
        COLLISION_SHELL_IONISATION => PhotonOrigin::Characteristic,
        COLLISION_BREMSSTRAHLUNG => PhotonOrigin::Bremsstrahlung,
        _ => return false,
    };
    particle.labels.set_subtype(origin);
    true
}

/// Outer loop: simulates independent showers and drains the secondaries each one spawns.
#[derive(Debug)]
pub struct ShowerDriver<K: TransportKernel> {
    ctx: SimulationContext<K>,
    stack: SecondaryStack,
}

impl<K: TransportKernel> ShowerDriver<K> {
    pub fn new(ctx: SimulationContext<K>) -> Self {
        Self {
            ctx,
            stack: SecondaryStack::new(),
        }
    }

    pub fn context(&self) -> &SimulationContext<K> {
        &self.ctx
    }

    /// Reconfiguration between batches goes through here.
    pub fn context_mut(&mut self) -> &mut SimulationContext<K> {
        &mut self.ctx
    }

    pub fn into_context(self) -> SimulationContext<K> {
        self.ctx
    }

    /// Run a batch, dispatching exit, absorption and generation events.
    pub fn run(&mut self, batch: &BatchSpec, dispatcher: &mut EventDispatcher<'_>) -> Result<BatchOutcome> {
        self.run_batch(batch, dispatcher, false)
    }

    /// Like [`ShowerDriver::run`], additionally dispatching a knock event per interaction.
    pub fn run_advanced(
        &mut self,
        batch: &BatchSpec,
        dispatcher: &mut EventDispatcher<'_>,
    ) -> Result<BatchOutcome> {
        self.run_batch(batch, dispatcher, true)
    }

    fn run_batch(
        &mut self,
        batch: &BatchSpec,
        dispatcher: &mut EventDispatcher<'_>,
        report_knocks: bool,
    ) -> Result<BatchOutcome> {
        batch.validate(self.ctx.kernel().body_count())?;
        let primary = batch.beam.primary()?;

        self.ctx.install_batch(
            batch.max_step_per_body.clone(),
            ForcingPolicy::from_specs(&batch.forcing),
            batch.seeds,
        );
        info!(
            "starting batch: last shower index {}, beam {} eV, {} forcing entries, {} observers",
            batch.total_showers,
            batch.beam.energy,
            batch.forcing.len(),
            dispatcher.len()
        );

        let swallowed_before = dispatcher.swallowed_failures();
        let mut outcome = BatchOutcome::default();
        let mut n = 0u64;
        loop {
            self.simulate_shower(n, &primary, batch, dispatcher, report_knocks, &mut outcome)?;
            outcome.showers_completed = n + 1;

            if let GateDecision::Stop { observer, reason } = dispatcher.trajectory_end(n) {
                info!("batch stopped by observer #{observer} after shower {n}");
                outcome.aborted = true;
                outcome.stop_reason = reason;
                break;
            }
            if n >= batch.total_showers {
                break;
            }
            n += 1;
        }

        outcome.observer_failures = dispatcher.swallowed_failures() - swallowed_before;
        info!(
            "batch finished: {} showers, {} tracks, {} secondaries discarded",
            outcome.showers_completed, outcome.tracks, outcome.secondaries_discarded
        );
        Ok(outcome)
    }

    fn simulate_shower(
        &mut self,
        n: u64,
        template: &ParticleState,
        batch: &BatchSpec,
        dispatcher: &mut EventDispatcher<'_>,
        report_knocks: bool,
        outcome: &mut BatchOutcome,
    ) -> Result<()> {
        self.ctx.kernel_mut().reset_secondary_stack();
        self.stack.clear();

        let mut primary = template.clone();
        let mut entered = true;
        if self.ctx.kernel_mut().locate(&mut primary)? == VACUUM {
            self.ctx.kernel_mut().step(&mut primary, ENTRY_STEP)?;
            entered = primary.is_inside();
        }
        let first_surface = self.ctx.kernel().last_surface();
        let driver = TrackDriver::new(n, first_surface, report_knocks);

        if entered {
            let track = driver.run(&mut self.ctx, &mut primary, dispatcher)?;
            outcome.record(&track);
        } else {
            trace!("shower {n}: primary never entered the system");
            outcome.primaries_missed += 1;
        }
        self.stack.absorb_from(self.ctx.kernel_mut())?;

        while let Some(mut secondary) = self.stack.pop() {
            if let Some(limit) = batch.max_generation {
                if secondary.labels.generation() > limit {
                    debug!(
                        "shower {n}: discarding generation-{} {}",
                        secondary.labels.generation(),
                        secondary.kind
                    );
                    outcome.secondaries_discarded += 1;
                    continue;
                }
            }
            propagate_labels(&mut secondary);
            dispatcher.broadcast(&ShowerEvent::new(
                n,
                EventKind::generated(secondary.kind),
                &secondary,
            ));
            let track = driver.run(&mut self.ctx, &mut secondary, dispatcher)?;
            outcome.record(&track);
            outcome.secondaries_tracked += 1;
            self.stack.absorb_from(self.ctx.kernel_mut())?;
        }
        Ok(())
    }
}
