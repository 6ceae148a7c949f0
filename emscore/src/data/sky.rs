use serde::{Deserialize, Serialize};

use crate::constants::ARCSEC_PER_DEGREE;

/// A position on the sky, right ascension and declination in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra: f64,
    pub dec: f64,
}

impl SkyPosition {
    pub fn new(ra: f64, dec: f64) -> Self {
        SkyPosition { ra, dec }
    }

    /// Angular separation in arcseconds.
    ///
    /// Flat-sky approximation, with the RA difference compressed by
    /// `cos(dec)` of `self`. Good to well below a fiber diameter over the few
    /// arcseconds a detection spans.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::data::sky::SkyPosition;
    /// let a = SkyPosition::new(150.0, 0.0);
    /// let b = SkyPosition::new(150.0, 1.0 / 3600.0);
    /// assert!((a.separation_arcsec(&b) - 1.0).abs() < 1e-9);
    /// ```
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        let d_ra = self.dec.to_radians().cos() * (self.ra - other.ra);
        let d_dec = self.dec - other.dec;
        (d_ra * d_ra + d_dec * d_dec).sqrt() * ARCSEC_PER_DEGREE
    }

    /// A position offset by the given arcseconds east (RA) and north (Dec).
    pub fn offset_arcsec(&self, east: f64, north: f64) -> SkyPosition {
        let cos_dec = self.dec.to_radians().cos();
        let d_ra = if cos_dec.abs() > f64::EPSILON { east / cos_dec } else { 0.0 };
        SkyPosition {
            ra: self.ra + d_ra / ARCSEC_PER_DEGREE,
            dec: self.dec + north / ARCSEC_PER_DEGREE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separation_is_zero_for_same_point() {
        let p = SkyPosition::new(214.9, 52.8);
        assert_eq!(p.separation_arcsec(&p), 0.0);
    }

    #[test]
    fn test_offset_round_trips_through_separation() {
        let p = SkyPosition::new(214.9, 52.8);
        let q = p.offset_arcsec(1.2, -0.9);
        let d = p.separation_arcsec(&q);
        assert!((d - 1.5).abs() < 1e-6, "got {d}");
    }
}
