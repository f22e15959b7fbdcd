//! Shower orchestration for Monte Carlo coupled electron/photon transport.
//!
//! The physics (cross sections, sampling, geometry tracking) lives behind the
//! [`TransportKernel`](core::TransportKernel) trait. This crate drives it: one primary
//! electron per shower, a LIFO stack of secondaries, interaction forcing selection
//! and typed events delivered to observers.
//!
//! ```ignore
//! let mut driver = ShowerDriver::new(SimulationContext::new(kernel));
//! let mut counter = ParticleCounter::new();
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.register(&mut counter);
//! let batch = BatchConfig::load("batch.toml")?.into_spec(driver.context().kernel().body_count())?;
//! let outcome = driver.run(&batch, &mut dispatcher)?;
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod observers;

pub use crate::config::BatchConfig;
pub use crate::core::{
    BatchOutcome, BatchSpec, Beam, EventDispatcher, EventKind, ParticleKind, ParticleState,
    ShowerDriver, ShowerEvent, ShowerObserver, SimulationContext, TransportKernel,
};
pub use crate::error::{Error, Result};
