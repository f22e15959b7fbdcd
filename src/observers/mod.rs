//! Ready-made observers: logging, particle counting, deposited energy, exit
//! distributions and an externally triggered stop.

pub mod histogram;

pub use histogram::SumHistogram;

use crate::core::dispatch::ShowerObserver;
use crate::core::event::{EventKind, ShowerEvent};
use crate::error::{Error, Result};
use log::debug;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ShowerObserver for LoggingObserver {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        match event.knock {
            Some(k) => debug!(
                "{}: n={}, icol={}, de={}",
                event.kind, event.shower, k.collision, k.energy_loss
            ),
            None => debug!("{}: n={}", event.kind, event.shower),
        }
        Ok(())
    }

    fn trajectory_end(&mut self, shower: u64) -> Result<bool> {
        debug!("trajectory_end: n={shower}");
        Ok(true)
    }
}

/// Weighted value and value² accumulators for backscattered, transmitted, absorbed.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ElectronTally {
    pub sum: [f64; 3],
    pub sum_sq: [f64; 3],
}

impl ElectronTally {
    pub const BACKSCATTERED: usize = 0;
    pub const TRANSMITTED: usize = 1;
    pub const ABSORBED: usize = 2;

    fn fold(&mut self, shower: &mut [f64; 3]) {
        for k in 0..3 {
            self.sum[k] += shower[k];
            self.sum_sq[k] += shower[k] * shower[k];
            shower[k] = 0.0;
        }
    }

    /// Mean per shower and its standard error, for slot `k`.
    pub fn mean_and_error(&self, k: usize, showers: u64) -> (f64, f64) {
        if showers == 0 {
            return (0.0, 0.0);
        }
        let n = showers as f64;
        let mean = self.sum[k] / n;
        let var = (self.sum_sq[k] / n - mean * mean).max(0.0);
        (mean, (var / n).sqrt())
    }
}

impl AddAssign<&ElectronTally> for ElectronTally {
    fn add_assign(&mut self, other: &ElectronTally) {
        for k in 0..3 {
            self.sum[k] += other.sum[k];
            self.sum_sq[k] += other.sum_sq[k];
        }
    }
}

/// Counts electron fates, separately for primaries (generation 1) and secondaries.
///
/// Per-shower contributions are folded into the tallies at trajectory end, so the
/// squared sums are per-shower and support error estimates.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParticleCounter {
    pub primary: ElectronTally,
    pub secondary: ElectronTally,
    pub showers: u64,
    shower_primary: [f64; 3],
    shower_secondary: [f64; 3],
}

impl ParticleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of primaries backscattered, with its standard error.
    pub fn backscatter_coefficient(&self) -> (f64, f64) {
        self.primary
            .mean_and_error(ElectronTally::BACKSCATTERED, self.showers)
    }

    /// Add the tallies of a counter fed by an independent batch.
    pub fn merge(&mut self, other: &ParticleCounter) -> Result<()> {
        *self += other;
        Ok(())
    }
}

impl AddAssign<&ParticleCounter> for ParticleCounter {
    fn add_assign(&mut self, other: &ParticleCounter) {
        self.primary += &other.primary;
        self.secondary += &other.secondary;
        self.showers += other.showers;
        for k in 0..3 {
            self.shower_primary[k] += other.shower_primary[k];
            self.shower_secondary[k] += other.shower_secondary[k];
        }
    }
}

impl ShowerObserver for ParticleCounter {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        let slot = match event.kind {
            EventKind::BackscatteredElectron => ElectronTally::BACKSCATTERED,
            EventKind::TransmittedElectron => ElectronTally::TRANSMITTED,
            EventKind::AbsorbedElectron => ElectronTally::ABSORBED,
            _ => return Ok(()),
        };
        let p = event.particle;
        if p.labels.is_primary() {
            self.shower_primary[slot] += p.weight;
        } else {
            self.shower_secondary[slot] += p.weight;
        }
        Ok(())
    }

    fn trajectory_end(&mut self, _shower: u64) -> Result<bool> {
        self.primary.fold(&mut self.shower_primary);
        self.secondary.fold(&mut self.shower_secondary);
        self.showers += 1;
        Ok(true)
    }
}

/// Energy deposited per body: residual energy of absorbed electrons plus knock losses.
///
/// Knock losses are only reported by advanced runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyDeposit {
    deposited: Vec<f64>,
}

impl EnergyDeposit {
    /// Tally for bodies `0..=bodies` (slot 0 collects anything reported outside).
    pub fn new(bodies: usize) -> Self {
        Self {
            deposited: vec![0.0; bodies + 1],
        }
    }

    pub fn deposited(&self, body: u32) -> f64 {
        self.deposited.get(body as usize).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.deposited.iter().sum()
    }

    /// Number of bodies covered, slot 0 excluded.
    pub fn bodies(&self) -> usize {
        self.deposited.len() - 1
    }

    /// Add the deposits of a tally over the same bodies.
    pub fn merge(&mut self, other: &EnergyDeposit) -> Result<()> {
        if self.deposited.len() != other.deposited.len() {
            return Err(Error::InvalidParam(format!(
                "energy tallies cover {} and {} bodies",
                self.bodies(),
                other.bodies()
            )));
        }
        *self += other;
        Ok(())
    }

    fn add(&mut self, body: u32, energy: f64) -> Result<()> {
        let slot = self
            .deposited
            .get_mut(body as usize)
            .ok_or_else(|| Error::observer(format!("body {body} beyond energy tally")))?;
        *slot += energy;
        Ok(())
    }
}

impl AddAssign<&EnergyDeposit> for EnergyDeposit {
    /// Body-wise sum. Callers must ensure equal body counts; see [`EnergyDeposit::merge`].
    fn add_assign(&mut self, other: &EnergyDeposit) {
        debug_assert_eq!(self.deposited.len(), other.deposited.len());
        for (a, b) in self.deposited.iter_mut().zip(&other.deposited) {
            *a += b;
        }
    }
}

impl ShowerObserver for EnergyDeposit {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        let p = event.particle;
        match (event.kind, event.knock) {
            (EventKind::AbsorbedElectron, _) => self.add(p.body, p.energy * p.weight),
            (EventKind::Knock, Some(k)) => self.add(p.body, k.energy_loss * p.weight),
            _ => Ok(()),
        }
    }
}

/// Energy spectra of backscattered and transmitted electrons.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectronEnergyDistribution {
    pub backscattered: SumHistogram,
    pub transmitted: SumHistogram,
}

impl ElectronEnergyDistribution {
    pub fn new(energy_min: f64, energy_max: f64, nbins: usize) -> Result<Self> {
        let h = SumHistogram::uniform(energy_min, energy_max, nbins)?;
        Ok(Self {
            backscattered: h.clone(),
            transmitted: h,
        })
    }

    /// Merge a distribution with identical bins; nothing changes on mismatch.
    pub fn merge(&mut self, other: &ElectronEnergyDistribution) -> Result<()> {
        if self.backscattered.edges() != other.backscattered.edges()
            || self.transmitted.edges() != other.transmitted.edges()
        {
            return Err(Error::InvalidParam("distributions have different bins".into()));
        }
        *self += other;
        Ok(())
    }
}

impl AddAssign<&ElectronEnergyDistribution> for ElectronEnergyDistribution {
    fn add_assign(&mut self, other: &ElectronEnergyDistribution) {
        self.backscattered += &other.backscattered;
        self.transmitted += &other.transmitted;
    }
}

impl ShowerObserver for ElectronEnergyDistribution {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        let p = event.particle;
        match event.kind {
            EventKind::BackscatteredElectron => self.backscattered.add(p.energy, p.weight),
            EventKind::TransmittedElectron => self.transmitted.add(p.energy, p.weight),
            _ => {}
        }
        Ok(())
    }
}

/// Polar-angle distributions (radians, w.r.t. +z) of backscattered and transmitted electrons.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectronPolarDistribution {
    pub backscattered: SumHistogram,
    pub transmitted: SumHistogram,
}

impl ElectronPolarDistribution {
    pub fn new(theta_min: f64, theta_max: f64, nbins: usize) -> Result<Self> {
        let h = SumHistogram::uniform(theta_min, theta_max, nbins)?;
        Ok(Self {
            backscattered: h.clone(),
            transmitted: h,
        })
    }

    /// Merge a distribution with identical bins; nothing changes on mismatch.
    pub fn merge(&mut self, other: &ElectronPolarDistribution) -> Result<()> {
        if self.backscattered.edges() != other.backscattered.edges()
            || self.transmitted.edges() != other.transmitted.edges()
        {
            return Err(Error::InvalidParam("distributions have different bins".into()));
        }
        *self += other;
        Ok(())
    }
}

impl AddAssign<&ElectronPolarDistribution> for ElectronPolarDistribution {
    fn add_assign(&mut self, other: &ElectronPolarDistribution) {
        self.backscattered += &other.backscattered;
        self.transmitted += &other.transmitted;
    }
}

impl ShowerObserver for ElectronPolarDistribution {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        let p = event.particle;
        match event.kind {
            EventKind::BackscatteredElectron => self.backscattered.add(p.polar_angle(), p.weight),
            EventKind::TransmittedElectron => self.transmitted.add(p.polar_angle(), p.weight),
            _ => {}
        }
        Ok(())
    }
}

/// Energy spectrum of photons leaving the system inside a polar-angle window.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonEnergyDistribution {
    theta_min: f64,
    theta_max: f64,
    pub detector: SumHistogram,
}

impl PhotonEnergyDistribution {
    pub fn new(
        theta_min: f64,
        theta_max: f64,
        energy_min: f64,
        energy_max: f64,
        nbins: usize,
    ) -> Result<Self> {
        if theta_min.is_nan() || theta_max.is_nan() || theta_min > theta_max {
            return Err(Error::InvalidParam(format!(
                "detector window [{theta_min}, {theta_max}] is empty"
            )));
        }
        Ok(Self {
            theta_min,
            theta_max,
            detector: SumHistogram::uniform(energy_min, energy_max, nbins)?,
        })
    }

    /// Polar-angle window `[theta_min, theta_max]` of the detector, radians.
    pub fn window(&self) -> (f64, f64) {
        (self.theta_min, self.theta_max)
    }

    /// Merge a distribution recorded with the same detector window and bins.
    pub fn merge(&mut self, other: &PhotonEnergyDistribution) -> Result<()> {
        if self.window() != other.window() {
            return Err(Error::InvalidParam(format!(
                "detector windows differ: {:?} vs {:?}",
                self.window(),
                other.window()
            )));
        }
        self.detector.merge(&other.detector)
    }
}

impl AddAssign<&PhotonEnergyDistribution> for PhotonEnergyDistribution {
    fn add_assign(&mut self, other: &PhotonEnergyDistribution) {
        debug_assert_eq!(self.window(), other.window());
        self.detector += &other.detector;
    }
}

impl ShowerObserver for PhotonEnergyDistribution {
    fn on_event(&mut self, event: &ShowerEvent<'_>) -> Result<()> {
        if event.kind != EventKind::ExitPhoton {
            return Ok(());
        }
        let p = event.particle;
        let theta = p.polar_angle();
        if theta >= self.theta_min && theta <= self.theta_max {
            self.detector.add(p.energy, p.weight);
        }
        Ok(())
    }
}

/// Gatekeeper that stops the batch once the shared flag is raised.
///
/// The flag can be set from any thread; it is read at the next trajectory end.
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    flag: Arc<AtomicBool>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to raise the flag from elsewhere.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl ShowerObserver for CancellationGate {
    fn trajectory_end(&mut self, _shower: u64) -> Result<bool> {
        Ok(!self.flag.load(Ordering::Relaxed))
    }
}
