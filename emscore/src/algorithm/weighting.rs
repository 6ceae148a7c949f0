use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::FIBER_RADIUS_ARCSEC;

/// Distances (arcsec) bounding the fiber weight falloff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiberWeightConfig {
    /// Fibers at or inside this distance get full weight.
    pub full_weight_distance: f64,
    /// Fibers at or beyond this distance get no weight.
    pub zero_weight_distance: f64,
}

impl Default for FiberWeightConfig {
    fn default() -> Self {
        FiberWeightConfig {
            full_weight_distance: FIBER_RADIUS_ARCSEC,
            zero_weight_distance: 4.0 * FIBER_RADIUS_ARCSEC,
        }
    }
}

/// `a * d^2 + b * d + c`, through (full, 1) and (zero, 0) with zero slope at `zero`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadraticFalloff {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticFalloff {
    pub fn new(full: f64, zero: f64) -> Self {
        let denom = (full - zero).powi(2);
        QuadraticFalloff {
            a: 1.0 / denom,
            b: -2.0 * zero / denom,
            c: zero * zero / denom,
        }
    }

    #[inline]
    pub fn evaluate(&self, d: f64) -> f64 {
        self.a * d * d + self.b * d + self.c
    }
}

impl FiberWeightConfig {
    pub fn falloff(&self) -> QuadraticFalloff {
        QuadraticFalloff::new(self.full_weight_distance, self.zero_weight_distance)
    }

    /// Weight in `[0, 1]` of a fiber `distance` arcseconds from the source.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::algorithm::weighting::FiberWeightConfig;
    /// let config = FiberWeightConfig::default();
    /// assert_eq!(config.weight(0.3), 1.0);
    /// assert_eq!(config.weight(3.0), 0.0);
    /// assert!(config.weight(2.5) > 0.0 && config.weight(2.5) < 1.0);
    /// ```
    pub fn weight(&self, distance: f64) -> f64 {
        if distance.is_nan() {
            warn!("fiber weight requested for a NaN distance");
            return 0.0;
        }
        if distance <= self.full_weight_distance {
            1.0
        } else if distance >= self.zero_weight_distance {
            0.0
        } else {
            self.falloff().evaluate(distance).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falloff_end_points() {
        let f = QuadraticFalloff::new(0.75, 3.0);
        assert!((f.evaluate(0.75) - 1.0).abs() < 1e-12);
        assert!(f.evaluate(3.0).abs() < 1e-12);
        // zero slope at the far end
        assert!((2.0 * f.a * 3.0 + f.b).abs() < 1e-12);
    }

    #[test]
    fn test_weight_is_bounded_and_non_increasing() {
        let config = FiberWeightConfig::default();
        assert_eq!(config.weight(0.0), 1.0);
        let mut last = 1.0;
        for i in 0..=400 {
            let w = config.weight(i as f64 * 0.01);
            assert!((0.0..=1.0).contains(&w));
            assert!(w <= last + 1e-12);
            last = w;
        }
        assert_eq!(config.weight(3.0), 0.0);
        assert_eq!(config.weight(10.0), 0.0);
    }

    #[test]
    fn test_weight_is_continuous_at_full_distance() {
        let config = FiberWeightConfig::default();
        assert!((config.weight(0.75 + 1e-9) - 1.0).abs() < 1e-6);
        assert!(config.weight(3.0 - 1e-9) < 1e-6);
    }

    #[test]
    fn test_nan_distance_has_no_weight() {
        assert_eq!(FiberWeightConfig::default().weight(f64::NAN), 0.0);
    }
}
