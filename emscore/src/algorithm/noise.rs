use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::peaks::{half_max_extent, simple_peaks, Extremum};
use crate::algorithm::utility::{mean, sigma_clip};
use crate::data::spectrum::SpectralSample;

/// Tuning for the side-band noise estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Width (Angstrom) of each side band.
    pub window_half_width: f64,
    /// Extrema farther than this many standard deviations from their band mean are dropped.
    pub outlier_sigma: f64,
    /// Noise (a power, counts squared) used when no usable estimate can be made.
    pub default_noise: f64,
    /// Minimum number of surviving peak samples for an estimate.
    pub min_samples: usize,
    /// Delta of the ungated extremum scan that samples the noise.
    pub extremum_delta: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            window_half_width: 40.0,
            outlier_sigma: 3.0,
            default_noise: 6.0,
            min_samples: 3,
            extremum_delta: 2.0,
        }
    }
}

/// Local noise level and baseline around a candidate line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseEstimate {
    /// Mean of the squared side-band peak values.
    pub noise: f64,
    /// Mean of the side-band peak and valley values.
    pub zero: f64,
    /// Peak samples the estimate rests on (0 for the fallback).
    pub samples: usize,
    /// True if the default noise floor was returned.
    pub fallback: bool,
}

impl NoiseEstimate {
    fn floor(config: &NoiseConfig) -> Self {
        NoiseEstimate { noise: config.default_noise, zero: 0.0, samples: 0, fallback: true }
    }
}

fn band_values(extrema: &[Extremum], center: f64, window: f64, exclude: f64) -> Vec<f64> {
    extrema
        .iter()
        .filter(|e| {
            let w = e.wavelength;
            (w >= center - exclude - window && w <= center - exclude)
                || (w >= center + exclude && w <= center + exclude + window)
        })
        .map(|e| e.value)
        .collect()
}

/// Estimates noise and a zero baseline from two side bands around `center`.
///
/// The bands are `[center - exclude - window, center - exclude]` and its
/// mirror, so the line itself never enters the estimate. Peak and valley
/// values in the bands are 3-sigma clipped separately (outliers are taken to
/// be other signals or artifacts). If fewer than `min_samples` peaks survive
/// the window is doubled once; after that the default noise floor is used.
///
/// `extrema` may carry precomputed (peaks, valleys); otherwise the ungated
/// scan of [`simple_peaks`] is run.
pub fn estimate_noise(
    samples: &SpectralSample,
    center: f64,
    window_half_width: f64,
    exclude_half_width: f64,
    extrema: Option<(&[Extremum], &[Extremum])>,
    config: &NoiseConfig,
) -> NoiseEstimate {
    if samples.is_empty() || !samples.is_consistent() {
        warn!("noise estimate at {:.2}: unusable sample sequence, using noise floor", center);
        return NoiseEstimate::floor(config);
    }

    let scanned;
    let (peaks, valleys) = match extrema {
        Some(pv) => pv,
        None => {
            scanned = simple_peaks(samples, config.extremum_delta);
            (scanned.0.as_slice(), scanned.1.as_slice())
        }
    };

    let mut window = window_half_width;
    for attempt in 0..2 {
        if window > samples.len() as f64 / 2.0 {
            debug!(
                "noise window {:.1} exceeds half the spectrum ({} samples)",
                window,
                samples.len()
            );
            break;
        }

        let peak_v = band_values(peaks, center, window, exclude_half_width);
        let peak_v = sigma_clip(&peak_v, config.outlier_sigma);
        let valley_v = band_values(valleys, center, window, exclude_half_width);
        let valley_v = sigma_clip(&valley_v, config.outlier_sigma);

        if peak_v.len() >= config.min_samples {
            let noise = peak_v.iter().map(|v| v * v).sum::<f64>() / peak_v.len() as f64;
            let all: Vec<f64> = peak_v.iter().chain(valley_v.iter()).copied().collect();
            let zero = mean(&all).unwrap_or(0.0);
            return NoiseEstimate { noise, zero, samples: peak_v.len(), fallback: false };
        }

        if attempt == 0 {
            debug!(
                "only {} noise peaks around {:.2} within {:.1}, doubling window",
                peak_v.len(),
                center,
                window
            );
        }
        window *= 2.0;
    }

    debug!("noise estimate around {:.2} fell back to the default floor", center);
    NoiseEstimate::floor(config)
}

/// Number of pixels either side of the sample nearest `center` that stay at
/// or above half its value.
pub fn estimate_fwhm(samples: &SpectralSample, center: f64) -> usize {
    match samples.nearest_index(center) {
        Some(idx) if samples.is_consistent() => {
            let half = samples.intensity[idx] / 2.0;
            half_max_extent(&samples.intensity, idx, half).0
        }
        _ => 0,
    }
}

/// Signal-to-noise of a line at `center`, as a power ratio.
///
/// The line's half-max pixel width sets the excluded gap of the noise side
/// bands (one pixel taken as one Angstrom). Signal is the squared intensity
/// of the sample nearest `center`; the result is `(signal - noise) / noise`.
pub fn estimate_snr(samples: &SpectralSample, center: f64, config: &NoiseConfig) -> f64 {
    let idx = match samples.nearest_index(center) {
        Some(i) if samples.is_consistent() => i,
        _ => {
            warn!("snr estimate at {:.2}: empty or malformed sample sequence", center);
            return 0.0;
        }
    };

    let exclude = estimate_fwhm(samples, center) as f64;
    let estimate = estimate_noise(samples, center, config.window_half_width, exclude, None, config);
    let noise = if estimate.noise > 0.0 { estimate.noise } else { config.default_noise };
    let signal = samples.intensity[idx].powi(2);

    (signal - noise) / noise
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Regular 1 AA grid with a +/- `amp` sawtooth every 2 pixels.
    fn sawtooth(n: usize, amp: f64) -> SpectralSample {
        let w: Vec<f64> = (0..n).map(|i| 4000.0 + i as f64).collect();
        let v: Vec<f64> = (0..n)
            .map(|i| match i % 4 {
                1 => amp,
                3 => -amp,
                _ => 0.0,
            })
            .collect();
        SpectralSample::new(w, v)
    }

    #[test]
    fn test_noise_is_mean_square_of_band_peaks() {
        let s = sawtooth(400, 5.0);
        let est = estimate_noise(&s, 4200.0, 40.0, 4.0, None, &NoiseConfig::default());
        assert!(!est.fallback);
        assert!(est.samples >= 3);
        assert!((est.noise - 25.0).abs() < 1e-9);
        // peaks +5 and valleys -5 in equal numbers
        assert!(est.zero.abs() < 1.0);
    }

    #[test]
    fn test_line_inside_gap_does_not_leak() {
        let mut v: Vec<f64> = sawtooth(400, 5.0).intensity.to_vec();
        v[200] = 500.0;
        let w: Vec<f64> = (0..400).map(|i| 4000.0 + i as f64).collect();
        let s = SpectralSample::new(w, v);
        let est = estimate_noise(&s, 4200.0, 40.0, 4.0, None, &NoiseConfig::default());
        assert!((est.noise - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_spectrum_falls_back_to_floor() {
        let s = SpectralSample::new((0..400).map(|i| 4000.0 + i as f64).collect(), vec![3.0; 400]);
        let config = NoiseConfig::default();
        let est = estimate_noise(&s, 4200.0, 40.0, 4.0, None, &config);
        assert!(est.fallback);
        assert_eq!(est.noise, config.default_noise);
    }

    #[test]
    fn test_window_is_doubled_once() {
        // noise peaks only live 50-70 AA from the center: outside the first
        // window (gap 4 + 40), inside the doubled one (gap 4 + 80)
        let n = 400;
        let w: Vec<f64> = (0..n).map(|i| 4000.0 + i as f64).collect();
        let v: Vec<f64> = (0..n)
            .map(|i| {
                let d = (i as f64 - 200.0).abs();
                if (50.0..=70.0).contains(&d) && i % 4 == 1 { 5.0 } else { 0.0 }
            })
            .collect();
        let s = SpectralSample::new(w, v);
        let est = estimate_noise(&s, 4200.0, 40.0, 4.0, None, &NoiseConfig::default());
        assert!(!est.fallback);
        assert!((est.noise - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_fwhm_counts_half_max_pixels() {
        let s = SpectralSample::new(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            vec![0.0, 2.0, 6.0, 10.0, 6.0, 5.0, 0.0],
        );
        assert_eq!(estimate_fwhm(&s, 4.1), 3);
        assert_eq!(estimate_fwhm(&SpectralSample::new(vec![], vec![]), 4.0), 0);
    }

    #[test]
    fn test_snr_of_isolated_line() {
        let mut v: Vec<f64> = sawtooth(400, 5.0).intensity.to_vec();
        v[200] = 50.0;
        let w: Vec<f64> = (0..400).map(|i| 4000.0 + i as f64).collect();
        let s = SpectralSample::new(w, v);
        let snr = estimate_snr(&s, 4200.0, &NoiseConfig::default());
        // (2500 - 25) / 25
        assert!((snr - 99.0).abs() < 1e-9);
    }
}
