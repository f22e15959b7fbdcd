use crate::core::particle::{ParticleKind, ParticleState};
use std::fmt;

/// How the dispatcher treats the observers of a given event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Every observer is called; results and failures are ignored.
    Broadcast,
    /// Observers are called in order until one fails or answers `false`.
    Gatekeeper,
}

/// Kinds of events emitted while a batch of showers runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    TrajectoryEnd,
    Knock,
    BackscatteredElectron,
    TransmittedElectron,
    AbsorbedElectron,
    GeneratedElectron,
    ExitPhoton,
    AbsorbedPhoton,
    GeneratedPhoton,
    ExitPositron,
    AbsorbedPositron,
    GeneratedPositron,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::TrajectoryEnd,
        EventKind::Knock,
        EventKind::BackscatteredElectron,
        EventKind::TransmittedElectron,
        EventKind::AbsorbedElectron,
        EventKind::GeneratedElectron,
        EventKind::ExitPhoton,
        EventKind::AbsorbedPhoton,
        EventKind::GeneratedPhoton,
        EventKind::ExitPositron,
        EventKind::AbsorbedPositron,
        EventKind::GeneratedPositron,
    ];

    /// Only the trajectory end can stop a batch.
    #[inline]
    pub fn dispatch_mode(self) -> DispatchMode {
        match self {
            EventKind::TrajectoryEnd => DispatchMode::Gatekeeper,
            _ => DispatchMode::Broadcast,
        }
    }

    /// Stable snake_case name, matching the observer method names of the host API.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::TrajectoryEnd => "trajectory_end",
            EventKind::Knock => "knock",
            EventKind::BackscatteredElectron => "backscattered_electron",
            EventKind::TransmittedElectron => "transmitted_electron",
            EventKind::AbsorbedElectron => "absorbed_electron",
            EventKind::GeneratedElectron => "generated_electron",
            EventKind::ExitPhoton => "exit_photon",
            EventKind::AbsorbedPhoton => "absorbed_photon",
            EventKind::GeneratedPhoton => "generated_photon",
            EventKind::ExitPositron => "exit_positron",
            EventKind::AbsorbedPositron => "absorbed_positron",
            EventKind::GeneratedPositron => "generated_positron",
        }
    }

    /// Absorption event for a particle kind.
    pub fn absorbed(kind: ParticleKind) -> Self {
        match kind {
            ParticleKind::Electron => EventKind::AbsorbedElectron,
            ParticleKind::Photon => EventKind::AbsorbedPhoton,
            ParticleKind::Positron => EventKind::AbsorbedPositron,
        }
    }

    /// Generation event for a particle kind.
    pub fn generated(kind: ParticleKind) -> Self {
        match kind {
            ParticleKind::Electron => EventKind::GeneratedElectron,
            ParticleKind::Photon => EventKind::GeneratedPhoton,
            ParticleKind::Positron => EventKind::GeneratedPositron,
        }
    }

    /// True for the exit classifications (backscattered, transmitted, exit photon/positron).
    pub fn is_exit(self) -> bool {
        matches!(
            self,
            EventKind::BackscatteredElectron
                | EventKind::TransmittedElectron
                | EventKind::ExitPhoton
                | EventKind::ExitPositron
        )
    }

    pub fn is_absorption(self) -> bool {
        matches!(
            self,
            EventKind::AbsorbedElectron | EventKind::AbsorbedPhoton | EventKind::AbsorbedPositron
        )
    }

    #[inline]
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of event kinds an observer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSet(u16);

impl EventSet {
    pub const EMPTY: EventSet = EventSet(0);

    pub fn all() -> Self {
        Self::of(&EventKind::ALL)
    }

    pub fn of(kinds: &[EventKind]) -> Self {
        EventSet(kinds.iter().fold(0, |acc, k| acc | k.bit()))
    }

    #[inline]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<EventKind> for EventSet {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        let mut set = EventSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// A broadcast event as seen by observers.
///
/// - `shower`: index of the shower being simulated
/// - `kind`: what happened
/// - `particle`: the particle register at the moment of the event
/// - `knock`: collision code and energy loss, present only for `EventKind::Knock`
#[derive(Debug, Clone, Copy)]
pub struct ShowerEvent<'a> {
    pub shower: u64,
    pub kind: EventKind,
    pub particle: &'a ParticleState,
    pub knock: Option<KnockInfo>,
}

/// Payload specific to knock events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnockInfo {
    pub collision: i32,
    pub energy_loss: f64,
}

impl<'a> ShowerEvent<'a> {
    pub fn new(shower: u64, kind: EventKind, particle: &'a ParticleState) -> Self {
        Self {
            shower,
            kind,
            particle,
            knock: None,
        }
    }

    pub fn knock(shower: u64, particle: &'a ParticleState, collision: i32, energy_loss: f64) -> Self {
        Self {
            shower,
            kind: EventKind::Knock,
            particle,
            knock: Some(KnockInfo {
                collision,
                energy_loss,
            }),
        }
    }
}
