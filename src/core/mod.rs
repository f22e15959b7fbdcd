//! Shower/track orchestration engine.
//!
//! The external transport kernel samples physics and walks the geometry; this module
//! owns the control flow around it: per-particle transport states, the secondary stack,
//! interaction-forcing selection and event dispatch to observers.

pub mod dispatch;
pub mod event;
pub mod forcing;
pub mod kernel;
pub mod material;
pub mod particle;
pub mod sim;
pub mod track;

#[cfg(test)]
pub(crate) mod testkit;

pub use dispatch::{EventDispatcher, GateDecision, ShowerObserver};
pub use event::{DispatchMode, EventKind, EventSet, KnockInfo, ShowerEvent};
pub use forcing::{ForcingEntry, ForcingPolicy, ForcingSpec, SamplingMode};
pub use kernel::{Interaction, RandomSeedPair, SimulationContext, StepOutcome, TransportKernel};
pub use material::{MaterialSimulationParameters, MaterialTable};
pub use particle::{Labels, ParticleKind, ParticleState, PhotonOrigin};
pub use sim::{propagate_labels, BatchOutcome, BatchSpec, Beam, SecondaryStack, ShowerDriver};
pub use track::{TrackDriver, TrackEnd, TrackOutcome};
