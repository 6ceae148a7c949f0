use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::utility::{mean, population_std};
use crate::data::spectrum::SpectralSample;

/// Tuning for the extremum scan and the emission-peak filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// A maximum is only committed if the running maximum reaches this height.
    pub min_height: f64,
    /// Required drop (rise) after a maximum (minimum) before it is committed.
    pub min_delta: f64,
    /// Delta used by the ungated scan that feeds noise estimation.
    pub noise_delta: f64,
    /// Minimum width (pixels above half maximum) of an emission peak.
    pub min_fwhm: usize,
    /// Peaks above `mean + outlier_sigma * std` are left out of the mean peak height.
    pub outlier_sigma: f64,
    /// An emission peak must reach this multiple of the mean peak height.
    pub min_height_over_mean: f64,
    /// An emission peak must reach this multiple of its local side-band mean.
    pub min_local_contrast: f64,
    /// Minimum side-band size, in pixels, for the local contrast check.
    pub side_pixels: usize,
    /// Emission peaks closer than this (Angstrom) are merged, keeping the higher.
    pub merge_distance: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        PeakConfig {
            min_height: 20.0,
            min_delta: 2.0,
            noise_delta: 2.0,
            min_fwhm: 5,
            outlier_sigma: 5.0,
            min_height_over_mean: 1.333,
            min_local_contrast: 2.0,
            side_pixels: 20,
            merge_distance: 6.0,
        }
    }
}

/// A local maximum or minimum of a sample sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub index: usize,
    pub wavelength: f64,
    pub value: f64,
}

/// A maximum that passed the emission-line plausibility filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionPeak {
    pub index: usize,
    pub wavelength: f64,
    pub value: f64,
    /// Pixels (either side, excluding the apex) at or above half height.
    pub pixel_width: usize,
    /// Intensity-weighted wavelength over the half-height pixels.
    pub centroid: f64,
}

fn alternating_extrema(
    samples: &SpectralSample,
    min_height: Option<f64>,
    min_delta: f64,
) -> (Vec<Extremum>, Vec<Extremum>) {
    let mut peaks = Vec::new();
    let mut valleys = Vec::new();

    if !samples.is_consistent() {
        warn!(
            "peak scan: wavelength ({}) and intensity ({}) lengths differ",
            samples.wavelength.len(),
            samples.intensity.len()
        );
        return (peaks, valleys);
    }
    if !(min_delta > 0.0) {
        warn!("peak scan: delta must be positive, got {}", min_delta);
        return (peaks, valleys);
    }
    if samples.len() < 2 {
        return (peaks, valleys);
    }

    let mut max = Extremum { index: 0, wavelength: f64::NAN, value: f64::NEG_INFINITY };
    let mut min = Extremum { index: 0, wavelength: f64::NAN, value: f64::INFINITY };
    let mut look_for_max = true;

    for (i, (&w, &v)) in samples.wavelength.iter().zip(samples.intensity.iter()).enumerate() {
        let here = Extremum { index: i, wavelength: w, value: v };
        if v > max.value {
            max = here;
        }
        if v < min.value {
            min = here;
        }

        if look_for_max {
            let tall_enough = min_height.map_or(true, |h| max.value > h);
            if tall_enough && v < max.value - min_delta {
                peaks.push(max);
                min = here;
                look_for_max = false;
            }
        } else if v > min.value + min_delta {
            valleys.push(min);
            max = here;
            look_for_max = true;
        }
    }

    (peaks, valleys)
}

/// Alternating-extremum peak detector.
///
/// A single left-to-right pass tracks the running maximum and minimum. A peak
/// is committed once the signal falls more than `min_delta` below the running
/// maximum and that maximum exceeds `min_height`; valleys are committed
/// symmetrically on a rise of more than `min_delta`. Strict comparisons keep
/// flat runs from producing duplicate extrema.
///
/// # Example
///
/// ```rust
/// # use emscore::data::spectrum::SpectralSample;
/// # use emscore::algorithm::peaks::find_peaks_and_valleys;
/// let s = SpectralSample::new(
///     vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
///     vec![0.0, 30.0, 0.0, 5.0, 0.0, 40.0, 0.0],
/// );
/// let (peaks, valleys) = find_peaks_and_valleys(&s, 20.0, 2.0);
/// assert_eq!(peaks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 5]);
/// assert_eq!(valleys.len(), 1);
/// ```
pub fn find_peaks_and_valleys(
    samples: &SpectralSample,
    min_height: f64,
    min_delta: f64,
) -> (Vec<Extremum>, Vec<Extremum>) {
    alternating_extrema(samples, Some(min_height), min_delta)
}

/// Same scan as [`find_peaks_and_valleys`] without the height gate.
///
/// Used only to sample the noise; every wiggle larger than `min_delta` counts.
pub fn simple_peaks(samples: &SpectralSample, min_delta: f64) -> (Vec<Extremum>, Vec<Extremum>) {
    alternating_extrema(samples, None, min_delta)
}

/// Pixels at or above `half` walking outward from `index`, and the inclusive index range they span.
pub fn half_max_extent(values: &[f64], index: usize, half: f64) -> (usize, usize, usize) {
    let mut width = 0;
    let mut lo = index;
    while lo > 0 && values[lo - 1] >= half {
        lo -= 1;
        width += 1;
    }
    let mut hi = index;
    while hi + 1 < values.len() && values[hi + 1] >= half {
        hi += 1;
        width += 1;
    }
    (width, lo, hi)
}

/// Maxima that look like emission lines rather than noise.
///
/// Starting from the gated extremum scan, a maximum is kept if it stands
/// above the typical peak height, is wide enough at half height (measured
/// above `zero`), clears its local side bands, and is not within
/// `merge_distance` of a higher kept peak.
pub fn find_emission_peaks(
    samples: &SpectralSample,
    config: &PeakConfig,
    zero: f64,
) -> Vec<EmissionPeak> {
    let (maxima, _) = find_peaks_and_valleys(samples, config.min_height, config.min_delta);
    if maxima.is_empty() {
        return Vec::new();
    }

    let heights: Vec<f64> = maxima.iter().map(|p| p.value).collect();
    let typical = match (mean(&heights), population_std(&heights)) {
        (Some(m), Some(s)) => {
            let trimmed: Vec<f64> = heights
                .iter()
                .copied()
                .filter(|h| *h < m + config.outlier_sigma * s)
                .collect();
            mean(&trimmed).unwrap_or(m)
        }
        _ => return Vec::new(),
    };

    let w = &samples.wavelength;
    let v = &samples.intensity;
    let n = v.len();
    let mut kept: Vec<EmissionPeak> = Vec::new();

    for p in &maxima {
        if p.value < config.min_height_over_mean * typical {
            continue;
        }

        let half = (p.value - zero) / 2.0;
        let (pixel_width, lo, hi) = half_max_extent(v, p.index, half);

        let (mut sum_wv, mut sum_v) = (0.0, 0.0);
        for i in lo..=hi {
            sum_wv += w[i] * v[i];
            sum_v += v[i];
        }
        let centroid = if sum_v != 0.0 { sum_wv / sum_v } else { p.wavelength };

        let side = config.side_pixels.max(pixel_width);
        let body_lo = p.index.saturating_sub(pixel_width);
        let body_hi = (p.index + pixel_width).min(n);
        let left = body_lo.saturating_sub(side);
        let right = (p.index + pixel_width + side + 1).min(n);
        let local: Vec<f64> = v[left..body_lo]
            .iter()
            .chain(v[body_hi..right].iter())
            .copied()
            .collect();
        if let Some(local_mean) = mean(&local) {
            if p.value < config.min_local_contrast * local_mean {
                continue;
            }
        }

        if pixel_width < config.min_fwhm {
            continue;
        }

        let peak = EmissionPeak {
            index: p.index,
            wavelength: p.wavelength,
            value: p.value,
            pixel_width,
            centroid,
        };

        match kept.last() {
            Some(last) if peak.wavelength - last.wavelength <= config.merge_distance => {
                if peak.value > last.value {
                    debug!(
                        "merging emission peak at {:.1} into higher neighbour at {:.1}",
                        last.wavelength, peak.wavelength
                    );
                    kept.pop();
                    kept.push(peak);
                }
            }
            _ => kept.push(peak),
        }
    }

    kept
}
