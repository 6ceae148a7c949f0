use serde::{Deserialize, Serialize};

use crate::constants::*;

/// A known emission line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionLineDef {
    pub name: String,
    /// Rest-frame wavelength in Angstrom.
    pub rest_wavelength: f64,
    /// May be hypothesized as the line observed at the candidate wavelength.
    pub anchor_candidate: bool,
}

impl EmissionLineDef {
    pub fn new(name: impl Into<String>, rest_wavelength: f64, anchor_candidate: bool) -> Self {
        EmissionLineDef { name: name.into(), rest_wavelength, anchor_candidate }
    }

    /// Observed wavelength at redshift `z`.
    pub fn observed_at(&self, z: f64) -> f64 {
        self.rest_wavelength * (1.0 + z)
    }

    /// Redshift at which this line is observed at `wavelength`.
    pub fn redshift_for(&self, wavelength: f64) -> f64 {
        wavelength / self.rest_wavelength - 1.0
    }
}

/// Read-only table of the lines the classifier may use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineCatalog {
    lines: Vec<EmissionLineDef>,
}

impl LineCatalog {
    pub fn new(lines: Vec<EmissionLineDef>) -> Self {
        LineCatalog { lines }
    }

    pub fn lines(&self) -> &[EmissionLineDef] {
        &self.lines
    }

    pub fn anchors(&self) -> impl Iterator<Item = &EmissionLineDef> {
        self.lines.iter().filter(|l| l.anchor_candidate)
    }

    pub fn find(&self, name: &str) -> Option<&EmissionLineDef> {
        self.lines.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LineCatalog {
    fn default() -> Self {
        LineCatalog::new(vec![
            EmissionLineDef::new("Lya", LYA_REST, true),
            EmissionLineDef::new("OII", OII_REST, true),
            EmissionLineDef::new("OIII 4959", OIII_4959_REST, true),
            EmissionLineDef::new("OIII 5007", OIII_5007_REST, true),
            EmissionLineDef::new("CIII", CIII_REST, true),
            EmissionLineDef::new("CIV", CIV_REST, true),
            EmissionLineDef::new("Hb", HBETA_REST, true),
            EmissionLineDef::new("HeII", HEII_REST, true),
            EmissionLineDef::new("MgII", MGII_REST, false),
            EmissionLineDef::new("Hg", HGAMMA_REST, false),
            EmissionLineDef::new("NV", NV_REST, false),
            EmissionLineDef::new("SiII", SI_II_REST, false),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = LineCatalog::default();
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.anchors().count(), 8);
        assert!(!catalog.find("MgII").unwrap().anchor_candidate);
    }

    #[test]
    fn test_redshift_round_trip() {
        let oii = EmissionLineDef::new("OII", 3727.0, true);
        let z = oii.redshift_for(4099.7);
        assert!((z - 0.1).abs() < 1e-12);
        assert!((oii.observed_at(z) - 4099.7).abs() < 1e-9);
    }
}
