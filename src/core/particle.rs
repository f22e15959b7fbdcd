use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// Material index reserved for "outside the modeled system".
pub const VACUUM: u32 = 0;

/// Tolerance on |direction| - 1 accepted for caller-supplied direction cosines.
pub const DIRECTION_TOLERANCE: f64 = 1e-6;

/// Collision code the kernel reports for an inner-shell ionisation.
pub const COLLISION_SHELL_IONISATION: i32 = 5;

/// Collision code the kernel reports for bremsstrahlung emission.
pub const COLLISION_BREMSSTRAHLUNG: i32 = 4;

/// Kind of transported particle. Discriminants match the kernel's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    Electron = 1,
    Photon = 2,
    Positron = 3,
}

impl ParticleKind {
    /// All kinds in kernel order.
    pub const ALL: [ParticleKind; 3] = [
        ParticleKind::Electron,
        ParticleKind::Photon,
        ParticleKind::Positron,
    ];

    /// Zero-based slot used by per-kind parameter arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    /// Kernel code (1, 2 or 3).
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ParticleKind {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(ParticleKind::Electron),
            2 => Ok(ParticleKind::Photon),
            3 => Ok(ParticleKind::Positron),
            other => Err(Error::InvalidParam(format!(
                "unknown particle kind code {other} (expected 1, 2 or 3)"
            ))),
        }
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticleKind::Electron => "electron",
            ParticleKind::Photon => "photon",
            ParticleKind::Positron => "positron",
        };
        f.write_str(s)
    }
}

/// Sub-type discriminator stored in the fifth label slot of photons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotonOrigin {
    /// Not yet classified; every photon starts here.
    Unclassified = 1,
    /// Characteristic x-ray following a shell ionisation.
    Characteristic = 2,
    /// Bremsstrahlung continuum photon.
    Bremsstrahlung = 3,
}

/// Five-slot history tag carried by every particle.
///
/// Slots: generation, parent interaction kind, originating collision kind,
/// free slot, photon sub-type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Labels(pub [i32; 5]);

impl Labels {
    /// Labels of a freshly emitted primary: `(1, 0, 0, 0, 1)`.
    pub const PRIMARY: Labels = Labels([1, 0, 0, 0, PhotonOrigin::Unclassified as i32]);

    #[inline]
    pub fn generation(&self) -> i32 {
        self.0[0]
    }

    #[inline]
    pub fn parent_interaction(&self) -> i32 {
        self.0[1]
    }

    /// Collision code of the interaction that created this particle.
    #[inline]
    pub fn origin_collision(&self) -> i32 {
        self.0[2]
    }

    #[inline]
    pub fn subtype(&self) -> i32 {
        self.0[4]
    }

    #[inline]
    pub fn set_subtype(&mut self, origin: PhotonOrigin) {
        self.0[4] = origin as i32;
    }

    /// True for particles emitted by the beam rather than by an interaction.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.generation() == 1
    }
}

impl Default for Labels {
    fn default() -> Self {
        Labels::PRIMARY
    }
}

/// Mutable state of the particle currently exchanged with the transport kernel.
///
/// Fields:
/// - `energy`: kinetic energy in eV
/// - `position`: [x, y, z]
/// - `direction`: direction cosines [u, v, w] (unit vector)
/// - `weight`: variance-reduction weight
/// - `kind`: electron, photon or positron
/// - `body`: current body index (0 = outside)
/// - `material`: current material index (0 = vacuum)
/// - `labels`: history tag, see [`Labels`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub energy: f64,
    pub position: [f64; DIM],
    pub direction: [f64; DIM],
    pub weight: f64,
    pub kind: ParticleKind,
    pub body: u32,
    pub material: u32,
    pub labels: Labels,
}

impl ParticleState {
    /// Create a new particle after validating invariants.
    ///
    /// Body and material start at 0 until the kernel locates the particle.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `energy` or `weight` is non-positive, any component is
    ///   NaN/inf, or `direction` is not a unit vector.
    pub fn new(
        kind: ParticleKind,
        energy: f64,
        position: [f64; DIM],
        direction: [f64; DIM],
        weight: f64,
    ) -> Result<Self> {
        if !energy.is_finite() || energy <= 0.0 {
            return Err(Error::InvalidParam("energy must be finite and > 0".into()));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::InvalidParam("weight must be finite and > 0".into()));
        }
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        validate_direction(&direction)?;
        Ok(Self {
            energy,
            position,
            direction,
            weight,
            kind,
            body: 0,
            material: VACUUM,
            labels: Labels::PRIMARY,
        })
    }

    /// Primary particle of a shower: electron, unit weight, primary labels.
    pub fn primary(energy: f64, position: [f64; DIM], direction: [f64; DIM]) -> Result<Self> {
        Self::new(ParticleKind::Electron, energy, position, direction, 1.0)
    }

    /// True while the particle sits inside a material of the modeled system.
    #[inline]
    pub fn is_inside(&self) -> bool {
        self.material != VACUUM
    }

    /// Polar angle of the direction of flight with respect to +z, in radians.
    #[inline]
    pub fn polar_angle(&self) -> f64 {
        self.direction[2].clamp(-1.0, 1.0).acos()
    }

    /// Set position (validated as finite).
    pub fn set_position(&mut self, position: [f64; DIM]) -> Result<()> {
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.position = position;
        Ok(())
    }

    /// Set direction cosines (validated as a unit vector).
    pub fn set_direction(&mut self, direction: [f64; DIM]) -> Result<()> {
        validate_direction(&direction)?;
        self.direction = direction;
        Ok(())
    }
}

fn validate_direction(direction: &[f64; DIM]) -> Result<()> {
    if !direction.iter().all(|x| x.is_finite()) {
        return Err(Error::InvalidParam("direction must be finite".into()));
    }
    let norm_sq: f64 = direction.iter().map(|&c| c * c).sum();
    if (norm_sq.sqrt() - 1.0).abs() > DIRECTION_TOLERANCE {
        return Err(Error::InvalidParam(format!(
            "direction cosines must form a unit vector, |d| = {}",
            norm_sq.sqrt()
        )));
    }
    Ok(())
}
