use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::gaussian::{fit_gaussian, GaussianParams};
use crate::algorithm::noise::estimate_snr;
use crate::algorithm::utility::{excess_kurtosis, linspace, normalized_rms, skewness};
use crate::config::ScoringConfig;
use crate::constants::{ANGSTROM_PER_PIXEL, FIT_CURVE_POINTS, SHAPE_WINDOW_HALF_WIDTH};
use crate::data::spectrum::SpectralSample;
use crate::error::FitError;

/// Thresholds and scales of the line-shape score adjustments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineShapeConfig {
    /// Pixels either side of the center the fit window spans.
    pub window_half_width: usize,
    /// Points the fitted curve is evaluated on for its diagnostics.
    pub curve_points: usize,
    /// Center tolerance (Angstrom) of the narrow fit.
    pub narrow_tolerance: f64,
    /// Center tolerance (Angstrom) of the wide fit.
    pub wide_tolerance: f64,

    // good-fit gate
    pub good_rh_min: f64,
    pub good_rh_max: f64,
    pub good_rms_max: f64,

    pub max_center_offset: f64,
    pub narrow_sigma: f64,
    pub broad_sigma: f64,
    pub wide_sigma: f64,
    pub excess_sigma: f64,

    pub negative_skew: f64,
    pub negative_skew_excess_cap: f64,
    pub negative_skew_penalty_cap: f64,
    pub positive_skew: f64,
    pub positive_skew_bonus_cap: f64,

    // failed-gate penalties
    pub bad_rms: f64,
    pub undershoot_rh: f64,
    pub overshoot_rh: f64,

    /// Observed peak height that corresponds to a penalty scale of 1.
    pub peak_scale: f64,

    /// Stacked fits only pass the good-fit gate below this many edge pixels per fiber.
    pub max_edge_pixels_per_fiber: f64,
    /// A fiber's top window pixel must exceed this to be taken for a hot pixel.
    pub hot_pixel_min_height: f64,
    /// Required ratio of that pixel to the runner-up.
    pub hot_pixel_ratio: f64,
}

impl Default for LineShapeConfig {
    fn default() -> Self {
        LineShapeConfig {
            window_half_width: SHAPE_WINDOW_HALF_WIDTH,
            curve_points: FIT_CURVE_POINTS,
            narrow_tolerance: 1.0,
            wide_tolerance: SHAPE_WINDOW_HALF_WIDTH as f64,
            good_rh_min: 0.75,
            good_rh_max: 1.25,
            good_rms_max: 0.2,
            max_center_offset: ANGSTROM_PER_PIXEL,
            narrow_sigma: 2.0,
            broad_sigma: 2.5,
            wide_sigma: 10.0,
            excess_sigma: 15.0,
            negative_skew: -0.5,
            negative_skew_excess_cap: 0.5,
            negative_skew_penalty_cap: 1.0,
            positive_skew: 2.0,
            positive_skew_bonus_cap: 0.5,
            bad_rms: 0.3,
            undershoot_rh: 0.6,
            overshoot_rh: 1.4,
            peak_scale: 100.0,
            max_edge_pixels_per_fiber: 2.0,
            hot_pixel_min_height: 50.0,
            hot_pixel_ratio: 2.0,
        }
    }
}

/// Diagnostics of a Gaussian fitted to a short window around a line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineShape {
    pub params: GaussianParams,
    /// Fitted center minus expected center.
    pub dx0: f64,
    /// Fitted peak height over observed peak height (0 if nothing was observed above zero).
    pub rh: f64,
    /// Normalised residual, `None` when it cannot be computed.
    pub rms: Option<f64>,
    pub skew: f64,
    pub kurtosis: f64,
    pub observed_peak: f64,
    pub fitted_peak: f64,
    /// Observed peak over `peak_scale`; scales the size-dependent penalties.
    pub scale: f64,
}

impl LineShape {
    pub fn sigma(&self) -> f64 {
        self.params.sigma
    }

    /// True if the fit captures the observed peak with a small residual.
    pub fn is_good_fit(&self, config: &LineShapeConfig) -> bool {
        config.good_rh_min <= self.rh
            && self.rh <= config.good_rh_max
            && self.rms.map_or(false, |r| r < config.good_rms_max)
    }
}

/// Fits a Gaussian to `window` and derives its shape diagnostics.
///
/// Skewness and kurtosis are taken over the fitted curve (evaluated on
/// `curve_points` across the window) rather than the data, so they describe
/// the shape the fit settled on.
pub fn fit_line_shape(
    window: &SpectralSample,
    center: f64,
    tolerance: f64,
    config: &LineShapeConfig,
) -> Result<LineShape, FitError> {
    let x = window.wavelength.as_slice();
    let y = window.intensity.as_slice();
    let fit = fit_gaussian(x, y, center, tolerance)?;
    let params = fit.params;

    let (first, last) = window
        .wavelength_bounds()
        .ok_or(FitError::InsufficientData { needed: 3, got: 0 })?;
    let curve = params.curve(&linspace(first, last, config.curve_points));
    let fitted_peak = curve.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let observed_peak = window.max_intensity().unwrap_or(0.0);

    let rh = if observed_peak > 0.0 { fitted_peak / observed_peak } else { 0.0 };
    let rms = normalized_rms(y, &params.curve(x));

    Ok(LineShape {
        params,
        dx0: params.center - center,
        rh,
        rms,
        skew: skewness(&curve).unwrap_or(0.0),
        kurtosis: excess_kurtosis(&curve).unwrap_or(0.0),
        observed_peak,
        fitted_peak,
        scale: observed_peak / config.peak_scale,
    })
}

/// Applies the shape-based bonuses and penalties to `score`.
///
/// `gate_ok` carries any extra condition the caller puts on the good-fit
/// branch (the stacked-fiber fit requires few edge pixels). A fit that found
/// nothing above zero (`rh <= 0`) zeroes the score.
pub fn apply_shape_adjustments(
    score: f64,
    shape: &LineShape,
    gate_ok: bool,
    config: &LineShapeConfig,
) -> f64 {
    let mut score = score;
    let sigma = shape.sigma();
    let scale = shape.scale;

    if shape.observed_peak <= 0.0 {
        info!("minimum peak height ({:.3}) too small, score zeroed", shape.observed_peak);
        return 0.0;
    }

    if gate_ok && shape.is_good_fit(config) {
        let offset = shape.dx0.abs();
        if offset > config.max_center_offset {
            let val = (offset - config.max_center_offset).powi(2);
            score -= val;
            debug!("penalty for center offset {:.2}: {}", shape.dx0, val);
        }

        if sigma < config.narrow_sigma {
            let val = scale * (config.narrow_sigma - sigma).sqrt();
            score -= val;
            debug!("penalty for low sigma: {}", val);
        } else if sigma < config.broad_sigma {
            // neutral
        } else if sigma < config.wide_sigma {
            let val = (sigma - config.broad_sigma).sqrt();
            score += val;
            debug!("bonus for large sigma: {}", val);
        } else if sigma < config.excess_sigma {
            // unexpected, not yet penalised
        } else {
            let val = (sigma - config.excess_sigma).sqrt();
            score -= val;
            debug!("penalty for excessive sigma: {}", val);
        }

        // skew only means something for narrow lines
        if sigma < config.broad_sigma {
            if shape.skew < config.negative_skew {
                let excess = (shape.skew.abs() - config.negative_skew.abs())
                    .min(config.negative_skew_excess_cap);
                let val = (scale * excess).min(config.negative_skew_penalty_cap);
                score -= val;
                debug!("penalty for low sigma and negative skew: {}", val);
            }
            if shape.skew > config.positive_skew {
                let val = (shape.skew - config.positive_skew).min(config.positive_skew_bonus_cap);
                score += val;
                debug!("bonus for low sigma and positive skew: {}", val);
            }
        }
    } else if shape.rh > 0.0 {
        let captured = config.good_rh_min < shape.rh && shape.rh < config.good_rh_max;
        match shape.rms {
            Some(rms) if rms > config.bad_rms && captured => {
                let val = scale * (rms - config.bad_rms);
                score -= val;
                debug!("penalty for excessively bad rms: {}", val);
            }
            _ if shape.rh < config.undershoot_rh => {
                let val = scale * (config.undershoot_rh - shape.rh);
                score -= val;
                debug!("penalty for undershooting the peak: {}", val);
            }
            _ if shape.rh > config.overshoot_rh => {
                let val = scale * (shape.rh - config.overshoot_rh);
                score -= val;
                debug!("penalty for overshooting the peak: {}", val);
            }
            _ => {}
        }
    } else {
        info!("failed to fit the peak, score zeroed");
        score = 0.0;
    }

    score
}

/// Result of scoring a single line directly on a spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineScore {
    pub snr: f64,
    pub raw: f64,
    pub scaled: f64,
    pub shape: LineShape,
}

/// Fits and scores the line at `center`, or `None` if no fit is possible.
///
/// The starting score is `snr_hint` when given, otherwise the estimated
/// signal-to-noise at `center`.
pub fn score_line(
    samples: &SpectralSample,
    center: f64,
    snr_hint: Option<f64>,
    config: &ScoringConfig,
) -> Option<LineScore> {
    if !samples.is_consistent() {
        warn!("line score at {:.2}: wavelength and intensity lengths differ", center);
        return None;
    }
    let window = samples.window_around(center, config.shape.window_half_width);
    let fitted = fit_line_shape(&window, center, config.shape.narrow_tolerance, &config.shape);
    let shape = match fitted {
        Ok(shape) => shape,
        Err(e) => {
            debug!("could not fit gaussian at {:.2}: {}", center, e);
            return None;
        }
    };

    let snr = snr_hint.unwrap_or_else(|| estimate_snr(samples, center, &config.noise));
    let raw = apply_shape_adjustments(snr, &shape, true, &config.shape);
    let scaled = config.scaled.scale(raw);

    info!(
        "line at {:.2}: dX0 = {:.3}, RH = {:.2}, rms = {:?}, sigma = {:.3}, skew = {:.3}, \
         kurtosis = {:.3}, snr = {:.2} -> {:.2} ({:.1})",
        center,
        shape.dx0,
        shape.rh,
        shape.rms,
        shape.sigma(),
        shape.skew,
        shape.kurtosis,
        snr,
        raw,
        scaled
    );

    Some(LineScore { snr, raw, scaled, shape })
}

/// Scaled score of a single line at `center`; 0 if it cannot be fitted.
///
/// # Example
///
/// ```rust
/// # use emscore::algorithm::line_shape::signal_score;
/// # use emscore::config::ScoringConfig;
/// # use emscore::simulation::synthetic::{gaussian_spectrum, SyntheticLine};
/// let s = gaussian_spectrum(4400.0, 4600.0, 1.0, &[SyntheticLine::new(4500.0, 3.0, 100.0)]);
/// let score = signal_score(&s, 4500.0, None, &ScoringConfig::default());
/// assert!(score >= 4.0);
/// ```
pub fn signal_score(
    samples: &SpectralSample,
    center: f64,
    snr_hint: Option<f64>,
    config: &ScoringConfig,
) -> f64 {
    score_line(samples, center, snr_hint, config).map_or(0.0, |s| s.scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::synthetic::{gaussian_spectrum, SyntheticLine};

    fn shape_with(sigma: f64, rh: f64, rms: f64, skew: f64, dx0: f64) -> LineShape {
        LineShape {
            params: GaussianParams::new(5000.0 + dx0, sigma, 100.0),
            dx0,
            rh,
            rms: Some(rms),
            skew,
            kurtosis: 0.0,
            observed_peak: 100.0,
            fitted_peak: 100.0 * rh,
            scale: 1.0,
        }
    }

    #[test]
    fn test_perfect_gaussian_diagnostics() {
        let s = gaussian_spectrum(4900.0, 5100.0, 1.0, &[SyntheticLine::new(5000.0, 3.0, 100.0)]);
        let window = s.window_around(5000.0, 8);
        let shape = fit_line_shape(&window, 5000.0, 1.0, &LineShapeConfig::default()).unwrap();
        assert!(shape.dx0.abs() < 1e-6);
        assert!((shape.rh - 1.0).abs() < 0.01);
        assert!(shape.rms.unwrap() < 1e-6);
        assert!((shape.sigma() - 3.0).abs() < 1e-6);
        assert!(shape.is_good_fit(&LineShapeConfig::default()));
    }

    #[test]
    fn test_perfect_gaussian_scores_high() {
        let s = gaussian_spectrum(4900.0, 5100.0, 1.0, &[SyntheticLine::new(5000.0, 3.0, 100.0)]);
        let score = signal_score(&s, 5000.0, None, &ScoringConfig::default());
        assert!(score >= 4.0, "got {score}");
    }

    #[test]
    fn test_sigma_bands() {
        let c = LineShapeConfig::default();
        // neutral zones
        let s = apply_shape_adjustments(5.0, &shape_with(2.2, 1.0, 0.0, 0.0, 0.0), true, &c);
        assert_eq!(s, 5.0);
        let s = apply_shape_adjustments(5.0, &shape_with(12.0, 1.0, 0.0, 0.0, 0.0), true, &c);
        assert_eq!(s, 5.0);
        // broad bonus
        let s = apply_shape_adjustments(5.0, &shape_with(6.5, 1.0, 0.0, 0.0, 0.0), true, &c);
        assert!((s - 7.0).abs() < 1e-12);
        // excessive width
        let s = apply_shape_adjustments(5.0, &shape_with(19.0, 1.0, 0.0, 0.0, 0.0), true, &c);
        assert!((s - 3.0).abs() < 1e-12);
        // narrow, scaled by the peak
        let s = apply_shape_adjustments(5.0, &shape_with(1.0, 1.0, 0.0, 0.0, 0.0), true, &c);
        assert!((s - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_center_offset_penalty() {
        let c = LineShapeConfig::default();
        let s = apply_shape_adjustments(5.0, &shape_with(2.2, 1.0, 0.0, 0.0, -2.9), true, &c);
        assert!((s - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_skew_only_for_narrow_lines() {
        let c = LineShapeConfig::default();
        let s = apply_shape_adjustments(5.0, &shape_with(2.2, 1.0, 0.0, 3.0, 0.0), true, &c);
        assert!((s - 5.5).abs() < 1e-12);
        let s = apply_shape_adjustments(5.0, &shape_with(2.2, 1.0, 0.0, -0.8, 0.0), true, &c);
        assert!((s - 4.7).abs() < 1e-12);
        let s = apply_shape_adjustments(5.0, &shape_with(3.5, 1.0, 0.0, 3.0, 0.0), true, &c);
        assert!((s - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_failed_gate_penalties() {
        let c = LineShapeConfig::default();
        let s = apply_shape_adjustments(5.0, &shape_with(3.0, 1.0, 0.5, 0.0, 0.0), true, &c);
        assert!((s - 4.8).abs() < 1e-12);
        let s = apply_shape_adjustments(5.0, &shape_with(3.0, 0.5, 0.1, 0.0, 0.0), true, &c);
        assert!((s - 4.9).abs() < 1e-12);
        let s = apply_shape_adjustments(5.0, &shape_with(3.0, 1.6, 0.1, 0.0, 0.0), true, &c);
        assert!((s - 4.8).abs() < 1e-12);
        // gate closed by the caller: rms fine, rh fine, nothing applies
        let s = apply_shape_adjustments(5.0, &shape_with(6.5, 1.0, 0.0, 0.0, 0.0), false, &c);
        assert_eq!(s, 5.0);
        // nothing fitted
        let s = apply_shape_adjustments(5.0, &shape_with(3.0, 0.0, 0.1, 0.0, 0.0), true, &c);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_flat_window_scores_zero() {
        let s = gaussian_spectrum(4900.0, 5100.0, 1.0, &[]);
        assert_eq!(signal_score(&s, 5000.0, Some(20.0), &ScoringConfig::default()), 0.0);
    }

    #[test]
    fn test_empty_spectrum_scores_zero() {
        let s = SpectralSample::new(vec![], vec![]);
        assert_eq!(signal_score(&s, 5000.0, None, &ScoringConfig::default()), 0.0);
    }
}
