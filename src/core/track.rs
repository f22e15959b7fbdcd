use crate::core::dispatch::EventDispatcher;
use crate::core::event::{EventKind, ShowerEvent};
use crate::core::forcing::SamplingMode;
use crate::core::kernel::{SimulationContext, TransportKernel};
use crate::core::particle::{ParticleKind, ParticleState};
use crate::error::{Error, Result};
use log::trace;

/// States of the per-particle transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    /// (Re)start the track segment in the current body.
    Start,
    SampleFreePath,
    Step,
    Interact,
    AbsorptionCheck,
}

/// How a track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEnd {
    /// Left the modeled system; carries the exit classification event.
    Exited(EventKind),
    /// Energy fell below the absorption threshold; carries the absorption event.
    Absorbed(EventKind),
}

impl TrackEnd {
    pub fn event(&self) -> EventKind {
        match *self {
            TrackEnd::Exited(e) | TrackEnd::Absorbed(e) => e,
        }
    }
}

/// Summary of one simulated track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackOutcome {
    pub end: TrackEnd,
    pub steps: u64,
    pub knocks: u64,
    pub forced_steps: u64,
}

/// Simulates one particle from creation to absorption or exit.
#[derive(Debug, Clone, Copy)]
pub struct TrackDriver {
    /// Index of the shower the track belongs to (event payload).
    pub shower: u64,
    /// Surface through which the primary entered; separates backscatter from transmission.
    pub first_surface: Option<u32>,
    /// Emit a knock event after every interaction.
    pub report_knocks: bool,
}

impl TrackDriver {
    pub fn new(shower: u64, first_surface: Option<u32>, report_knocks: bool) -> Self {
        Self {
            shower,
            first_surface,
            report_knocks,
        }
    }

    /// Transport `particle` until it is absorbed or leaves the system.
    ///
    /// Kernel failures abort the track and propagate; observer failures never do.
    pub fn run<K: TransportKernel>(
        &self,
        ctx: &mut SimulationContext<K>,
        particle: &mut ParticleState,
        dispatcher: &mut EventDispatcher<'_>,
    ) -> Result<TrackOutcome> {
        let mut state = TrackState::Start;
        let mut mode = SamplingMode::Unforced;
        let mut free_path = 0.0;
        let mut steps = 0u64;
        let mut knocks = 0u64;
        let mut forced_steps = 0u64;

        loop {
            state = match state {
                TrackState::Start => {
                    ctx.kernel_mut().start_track(particle)?;
                    TrackState::SampleFreePath
                }
                TrackState::SampleFreePath => {
                    let max_step = ctx.max_step(particle.body);
                    mode = ctx
                        .forcing()
                        .select(particle.body, particle.kind, particle.weight);
                    if mode.is_forced() {
                        forced_steps += 1;
                    }
                    free_path = ctx.kernel_mut().sample_free_path(particle, max_step, mode)?;
                    TrackState::Step
                }
                TrackState::Step => {
                    let outcome = ctx.kernel_mut().step(particle, free_path)?;
                    steps += 1;
                    if !particle.is_inside() {
                        let kind = self.classify_exit(ctx, particle);
                        trace!(
                            "shower {}: {} left the system after {steps} steps",
                            self.shower,
                            particle.kind
                        );
                        dispatcher.broadcast(&ShowerEvent::new(self.shower, kind, particle));
                        return Ok(TrackOutcome {
                            end: TrackEnd::Exited(kind),
                            steps,
                            knocks,
                            forced_steps,
                        });
                    }
                    if outcome.crossings > 0 {
                        TrackState::Start
                    } else {
                        TrackState::Interact
                    }
                }
                TrackState::Interact => {
                    let interaction = ctx.kernel_mut().sample_interaction(particle, mode)?;
                    knocks += 1;
                    if self.report_knocks {
                        dispatcher.broadcast(&ShowerEvent::knock(
                            self.shower,
                            particle,
                            interaction.collision,
                            interaction.energy_loss,
                        ));
                    }
                    TrackState::AbsorptionCheck
                }
                TrackState::AbsorptionCheck => {
                    let threshold = ctx
                        .materials()
                        .absorption_energy(particle.material, particle.kind)
                        .map_err(|e| {
                            Error::Kernel(format!("kernel left particle in unknown material: {e}"))
                        })?;
                    if particle.energy < threshold {
                        let kind = EventKind::absorbed(particle.kind);
                        dispatcher.broadcast(&ShowerEvent::new(self.shower, kind, particle));
                        return Ok(TrackOutcome {
                            end: TrackEnd::Absorbed(kind),
                            steps,
                            knocks,
                            forced_steps,
                        });
                    }
                    TrackState::SampleFreePath
                }
            };
        }
    }

    fn classify_exit<K: TransportKernel>(
        &self,
        ctx: &SimulationContext<K>,
        particle: &ParticleState,
    ) -> EventKind {
        match particle.kind {
            ParticleKind::Photon => EventKind::ExitPhoton,
            ParticleKind::Positron => EventKind::ExitPositron,
            ParticleKind::Electron => {
                if ctx.kernel().last_surface() == self.first_surface {
                    EventKind::BackscatteredElectron
                } else {
                    EventKind::TransmittedElectron
                }
            }
        }
    }
}
