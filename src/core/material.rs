use crate::core::particle::{ParticleKind, VACUUM};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Simulation parameters of one material.
///
/// - `absorption_energies`: eV, indexed by [`ParticleKind::index`]
/// - `c1`, `c2`: elastic-scattering constants
/// - `wcc`, `wcr`: cutoff energies for hard inelastic collisions and bremsstrahlung (eV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSimulationParameters {
    pub absorption_energies: [f64; 3],
    pub c1: f64,
    pub c2: f64,
    pub wcc: f64,
    pub wcr: f64,
}

impl Default for MaterialSimulationParameters {
    fn default() -> Self {
        Self {
            absorption_energies: [50.0, 50.0, 50.0],
            c1: 0.05,
            c2: 0.05,
            wcc: 50.0,
            wcr: 50.0,
        }
    }
}

impl MaterialSimulationParameters {
    #[inline]
    pub fn absorption_energy(&self, kind: ParticleKind) -> f64 {
        self.absorption_energies[kind.index()]
    }
}

/// Per-material parameter table. Material indices start at 1; 0 is vacuum.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTable {
    materials: Vec<MaterialSimulationParameters>,
}

impl MaterialTable {
    /// Table with `count` materials, all at default parameters.
    pub fn new(count: usize) -> Self {
        Self {
            materials: vec![MaterialSimulationParameters::default(); count],
        }
    }

    pub fn from_parameters(materials: Vec<MaterialSimulationParameters>) -> Self {
        Self { materials }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Parameters of material `material` (1-based).
    pub fn get(&self, material: u32) -> Result<&MaterialSimulationParameters> {
        let slot = self.slot(material)?;
        Ok(&self.materials[slot])
    }

    /// Absorption threshold for `kind` in `material`, read by the absorption check.
    pub fn absorption_energy(&self, material: u32, kind: ParticleKind) -> Result<f64> {
        Ok(self.get(material)?.absorption_energy(kind))
    }

    pub fn absorption_energies(&self, material: u32) -> Result<[f64; 3]> {
        Ok(self.get(material)?.absorption_energies)
    }

    /// Update absorption energies; `None` leaves the current value untouched.
    pub fn set_absorption_energies(
        &mut self,
        material: u32,
        electron: Option<f64>,
        photon: Option<f64>,
        positron: Option<f64>,
    ) -> Result<()> {
        for (name, v) in [("electron", electron), ("photon", photon), ("positron", positron)] {
            if let Some(v) = v {
                check_non_negative(name, v)?;
            }
        }
        let slot = self.slot(material)?;
        let eabs = &mut self.materials[slot].absorption_energies;
        for (k, v) in [electron, photon, positron].into_iter().enumerate() {
            if let Some(v) = v {
                eabs[k] = v;
            }
        }
        Ok(())
    }

    /// Elastic-scattering constants (C1, C2).
    pub fn constants(&self, material: u32) -> Result<(f64, f64)> {
        let p = self.get(material)?;
        Ok((p.c1, p.c2))
    }

    pub fn set_constants(&mut self, material: u32, c1: Option<f64>, c2: Option<f64>) -> Result<()> {
        if let Some(v) = c1 {
            check_non_negative("c1", v)?;
        }
        if let Some(v) = c2 {
            check_non_negative("c2", v)?;
        }
        let slot = self.slot(material)?;
        let p = &mut self.materials[slot];
        if let Some(v) = c1 {
            p.c1 = v;
        }
        if let Some(v) = c2 {
            p.c2 = v;
        }
        Ok(())
    }

    /// Cutoff energies (WCC, WCR).
    pub fn cutoffs(&self, material: u32) -> Result<(f64, f64)> {
        let p = self.get(material)?;
        Ok((p.wcc, p.wcr))
    }

    pub fn set_cutoffs(&mut self, material: u32, wcc: Option<f64>, wcr: Option<f64>) -> Result<()> {
        if let Some(v) = wcc {
            check_non_negative("wcc", v)?;
        }
        if let Some(v) = wcr {
            check_non_negative("wcr", v)?;
        }
        let slot = self.slot(material)?;
        let p = &mut self.materials[slot];
        if let Some(v) = wcc {
            p.wcc = v;
        }
        if let Some(v) = wcr {
            p.wcr = v;
        }
        Ok(())
    }

    fn slot(&self, material: u32) -> Result<usize> {
        if material == VACUUM {
            return Err(Error::InvalidParam(
                "material 0 is vacuum and has no simulation parameters".into(),
            ));
        }
        let slot = (material - 1) as usize;
        if slot >= self.materials.len() {
            return Err(Error::InvalidParam(format!(
                "material {material} out of range (1..={})",
                self.materials.len()
            )));
        }
        Ok(slot)
    }
}

fn check_non_negative(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(Error::InvalidParam(format!(
            "{name} must be finite and >= 0, got {v}"
        )));
    }
    Ok(())
}
