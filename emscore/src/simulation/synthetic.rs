use std::sync::Arc;

use log::warn;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::algorithm::utility::gaussian;
use crate::constants::SHAPE_WINDOW_HALF_WIDTH;
use crate::data::fiber::{ExposureKey, Fiber};
use crate::data::sky::SkyPosition;
use crate::data::spectrum::SpectralSample;

/// A Gaussian emission line to paint onto a synthetic spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticLine {
    pub center: f64,
    pub sigma: f64,
    pub amplitude: f64,
}

impl SyntheticLine {
    pub fn new(center: f64, sigma: f64, amplitude: f64) -> Self {
        SyntheticLine { center, sigma, amplitude }
    }

    pub fn value_at(&self, wavelength: f64) -> f64 {
        gaussian(wavelength, self.center, self.sigma, self.amplitude)
    }
}

/// Noiseless spectrum on a regular grid from `start` to `end` (inclusive)
/// with the given lines summed on a zero baseline.
///
/// # Example
///
/// ```rust
/// # use emscore::simulation::synthetic::{gaussian_spectrum, SyntheticLine};
/// let s = gaussian_spectrum(4000.0, 4010.0, 1.0, &[SyntheticLine::new(4005.0, 2.0, 10.0)]);
/// assert_eq!(s.len(), 11);
/// assert_eq!(s.intensity[5], 10.0);
/// ```
pub fn gaussian_spectrum(
    start: f64,
    end: f64,
    step: f64,
    lines: &[SyntheticLine],
) -> SpectralSample {
    if !(step > 0.0) || end < start {
        return SpectralSample::new(Vec::new(), Vec::new());
    }
    let n = ((end - start) / step).round() as usize + 1;
    let wavelength: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    let intensity: Vec<f64> = wavelength
        .iter()
        .map(|&w| lines.iter().map(|l| l.value_at(w)).sum())
        .collect();
    SpectralSample::new(wavelength, intensity)
}

/// Adds zero-mean Gaussian intensity noise, reproducible through `seed`.
pub fn add_intensity_noise(sample: &SpectralSample, std_dev: f64, seed: u64) -> SpectralSample {
    let normal = match Normal::new(0.0, std_dev) {
        Ok(n) if std_dev > 0.0 => n,
        _ => {
            warn!("intensity noise needs a positive standard deviation, got {}", std_dev);
            return sample.clone();
        }
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let intensity: Vec<f64> = sample
        .intensity
        .iter()
        .map(|v| v + normal.sample(&mut rng))
        .collect();
    SpectralSample {
        wavelength: sample.wavelength.clone(),
        intensity: Arc::new(intensity),
    }
}

/// A fiber offset from `source` by (`east`, `north`) arcseconds, carrying a
/// 1 Angstrom central window around `line.center`.
pub fn fiber_with_line(
    id: &str,
    source: &SkyPosition,
    east: f64,
    north: f64,
    signal_to_noise: Option<f64>,
    line: SyntheticLine,
) -> Fiber {
    let half = SHAPE_WINDOW_HALF_WIDTH as f64;
    let window = gaussian_spectrum(line.center - half, line.center + half, 1.0, &[line]);
    Fiber::new(id, Some(source.offset_arcsec(east, north)), signal_to_noise)
        .with_exposure(ExposureKey::new("20180124v010", 1))
        .with_window(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_includes_both_ends() {
        let s = gaussian_spectrum(3500.0, 5500.0, 1.0, &[]);
        assert_eq!(s.len(), 2001);
        assert_eq!(s.wavelength[0], 3500.0);
        assert_eq!(s.wavelength[2000], 5500.0);
        assert!(s.intensity.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_invalid_grid_is_empty() {
        assert!(gaussian_spectrum(4000.0, 3000.0, 1.0, &[]).is_empty());
        assert!(gaussian_spectrum(4000.0, 5000.0, 0.0, &[]).is_empty());
    }

    #[test]
    fn test_noise_is_seeded() {
        let s = gaussian_spectrum(4000.0, 4100.0, 1.0, &[SyntheticLine::new(4050.0, 3.0, 40.0)]);
        let a = add_intensity_noise(&s, 2.0, 7);
        let b = add_intensity_noise(&s, 2.0, 7);
        assert_eq!(a.intensity, b.intensity);
        assert_ne!(a.intensity, s.intensity);
        let unchanged = add_intensity_noise(&s, 0.0, 7);
        assert_eq!(unchanged.intensity, s.intensity);
    }

    #[test]
    fn test_fiber_window_is_centered() {
        let source = SkyPosition::new(150.0, 2.0);
        let line = SyntheticLine::new(4500.0, 2.0, 50.0);
        let f = fiber_with_line("f", &source, 0.3, 0.0, Some(6.0), line);
        let w = f.central_window.as_ref().unwrap();
        assert_eq!(w.len(), 2 * SHAPE_WINDOW_HALF_WIDTH + 1);
        assert_eq!(w.intensity[SHAPE_WINDOW_HALF_WIDTH], 50.0);
        assert!((f.distance_to(&source).unwrap() - 0.3).abs() < 1e-6);
    }
}
