use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::line_shape::{apply_shape_adjustments, fit_line_shape, LineShape};
use crate::config::ScoringConfig;
use crate::constants::ANGSTROM_PER_PIXEL;
use crate::data::detection::DetectionCandidate;
use crate::data::sky::SkyPosition;
use crate::data::spectrum::SpectralSample;
use crate::scoring::fiber::{pairwise_adjustment, sn_score, FiberScore, PairwiseAdjustment};

/// Which fit (if any) the shape stage rests on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Fit with the center free over the whole stacked window.
    Wide,
    /// Wide fit failed, center held near the candidate wavelength.
    Narrow,
    /// Neither fit converged; the shape stage left the score alone.
    Failed,
    /// No fiber had a window and a positive weight.
    NoQualifyingFibers,
    /// The candidate has no source position to measure fiber distances from.
    Unpositioned,
}

/// Fresh, immutable outcome of scoring one detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub raw: f64,
    pub scaled: f64,
    pub fibers: Vec<FiberScore>,
    pub pairwise: PairwiseAdjustment,
    pub shape: Option<LineShape>,
    pub fit_status: FitStatus,
    /// A suspected hot pixel was flagged and the score recomputed.
    pub recomputed: bool,
    /// Ids of fibers flagged bad by this scoring run.
    pub flagged: Vec<String>,
}

impl ScoreResult {
    pub fn could_not_fit(&self) -> bool {
        !matches!(self.fit_status, FitStatus::Wide | FitStatus::Narrow)
    }
}

enum Pass {
    Finished(ScoreResult),
    HotPixels(Vec<usize>),
}

struct Stack {
    sample: SpectralSample,
    fibers: usize,
    edge_pixels: usize,
}

/// Weighted sum of the usable fiber windows on a 1 Angstrom grid around
/// `wavelength`, negatives clipped.
fn stack_fibers(
    candidate: &DetectionCandidate,
    scores: &[FiberScore],
    bad: &[bool],
    half_width: usize,
) -> Stack {
    let half = half_width as f64;
    let grid: Vec<f64> = (0..=2 * half_width)
        .map(|k| candidate.wavelength - half + k as f64)
        .collect();
    let mut counts = vec![0.0; grid.len()];
    let mut fibers = 0;
    let mut edge_pixels = 0;

    for ((fiber, score), &is_bad) in candidate.fibers.iter().zip(scores.iter()).zip(bad.iter()) {
        if is_bad || !(score.weight > 0.0) || !fiber.has_window() {
            continue;
        }
        let window = match &fiber.central_window {
            Some(w) if w.is_consistent() => w,
            _ => continue,
        };
        let Some(values) = window.resample(&grid) else {
            continue;
        };
        fibers += 1;
        edge_pixels += fiber.edge_pixels;
        for (c, v) in counts.iter_mut().zip(values) {
            *c += score.weight * v;
        }
    }

    for c in counts.iter_mut() {
        *c = c.max(0.0);
    }

    Stack { sample: SpectralSample::new(grid, counts), fibers, edge_pixels }
}

/// Fibers whose window is dominated by one tall pixel.
fn hot_pixel_fibers(
    candidate: &DetectionCandidate,
    bad: &[bool],
    config: &ScoringConfig,
) -> Vec<usize> {
    candidate
        .fibers
        .iter()
        .enumerate()
        .filter(|(k, _)| !bad[*k])
        .filter_map(|(k, fiber)| {
            let window = fiber.central_window.as_ref()?;
            let mut values: Vec<f64> = window.intensity.iter().copied().collect();
            if values.len() < 2 {
                return None;
            }
            values.sort_by(|a, b| b.total_cmp(a));
            let (top, second) = (values[0], values[1]);
            let hot = top > config.shape.hot_pixel_min_height
                && top > config.shape.hot_pixel_ratio * second;
            hot.then(|| {
                info!(
                    "detection {}: possible stuck/hot pixel in fiber {} around {:.1}, \
                     peak values {:?}",
                    candidate.id,
                    fiber.id,
                    candidate.wavelength,
                    &values[..values.len().min(3)]
                );
                k
            })
        })
        .collect()
}

fn run_pass(
    candidate: &DetectionCandidate,
    source: &SkyPosition,
    bad: &[bool],
    check_pixels: bool,
    config: &ScoringConfig,
) -> Pass {
    // per-fiber scores
    let scores: Vec<FiberScore> = candidate
        .fibers
        .iter()
        .zip(bad.iter())
        .map(|(fiber, &is_bad)| {
            let distance = fiber.distance_to(source);
            if is_bad {
                return FiberScore {
                    id: fiber.id.clone(),
                    distance,
                    weight: 0.0,
                    raw: 0.0,
                    weighted: 0.0,
                    bad: true,
                };
            }
            let weight = distance.map_or(0.0, |d| config.weight.weight(d));
            let raw = sn_score(fiber.signal_to_noise, &config.fiber);
            debug!(
                "detection {}, fiber {}: dist = {:?}, weight = {:.4}, raw = {:.4}, \
                 weighted = {:.4}",
                candidate.id,
                fiber.id,
                distance,
                weight,
                raw,
                weight * raw
            );
            FiberScore {
                id: fiber.id.clone(),
                distance,
                weight,
                raw,
                weighted: weight * raw,
                bad: false,
            }
        })
        .collect();

    let mut score: f64 = scores.iter().map(|s| s.weighted).sum();

    // pairwise consistency only makes sense around a weighted centroid
    let pairwise = if candidate.position_weighted {
        let adj = pairwise_adjustment(&candidate.fibers, &scores, &config.fiber);
        score -= adj.net();
        info!(
            "detection {}: pairwise penalty {:.4}, bonus {:.4}, score now {:.4}",
            candidate.id, adj.penalty, adj.bonus, score
        );
        adj
    } else {
        PairwiseAdjustment::default()
    };

    // stacked line shape
    let stack = stack_fibers(candidate, &scores, bad, config.shape.window_half_width);
    let mut shape: Option<LineShape> = None;
    let fit_status = if stack.fibers == 0 {
        info!("detection {}: no fibers qualify to make a spectrum", candidate.id);
        FitStatus::NoQualifyingFibers
    } else {
        let w = candidate.wavelength;
        let sub_pixel = |s: &LineShape| s.sigma() * ANGSTROM_PER_PIXEL < 1.0;
        let wide = fit_line_shape(&stack.sample, w, config.shape.wide_tolerance, &config.shape);
        let (status, suspicious) = match wide {
            Ok(s) => {
                let narrow = sub_pixel(&s);
                shape = Some(s);
                (FitStatus::Wide, narrow)
            }
            Err(e) => {
                info!(
                    "detection {}: could not wide fit gaussian ({}), trying narrow",
                    candidate.id, e
                );
                let tolerance = config.shape.narrow_tolerance;
                match fit_line_shape(&stack.sample, w, tolerance, &config.shape) {
                    Ok(s) => {
                        let narrow = sub_pixel(&s);
                        shape = Some(s);
                        (FitStatus::Narrow, narrow)
                    }
                    Err(e) => {
                        info!(
                            "detection {}: could not narrow fit gaussian ({}), possible hot pixel",
                            candidate.id, e
                        );
                        (FitStatus::Failed, true)
                    }
                }
            }
        };

        if suspicious && check_pixels {
            let hot = hot_pixel_fibers(candidate, bad, config);
            if !hot.is_empty() {
                return Pass::HotPixels(hot);
            }
        }
        status
    };

    if let Some(s) = &shape {
        let old = score;
        let edge_ratio = stack.edge_pixels as f64 / stack.fibers as f64;
        let gate_ok = edge_ratio < config.shape.max_edge_pixels_per_fiber;
        score = apply_shape_adjustments(score, s, gate_ok, &config.shape);
        info!(
            "detection {}: fit dX0 = {:.3}, RH = {:.2}, rms = {:?}, sigma = {:.3}, skew = {:.3}, \
             kurtosis = {:.3}: score change {:.4}",
            candidate.id,
            s.dx0,
            s.rh,
            s.rms,
            s.sigma(),
            s.skew,
            s.kurtosis,
            score - old
        );
    }

    let total_edge: usize = candidate.fibers.iter().map(|f| f.edge_pixels).sum();
    let scaled = config
        .scaled
        .cap_for_edge_pixels(config.scaled.scale(score), total_edge, candidate.fibers.len());
    info!("detection {}: raw score {:.4}, scaled {:.1}", candidate.id, score, scaled);

    Pass::Finished(ScoreResult {
        raw: score,
        scaled,
        fibers: scores,
        pairwise,
        shape,
        fit_status,
        recomputed: false,
        flagged: Vec::new(),
    })
}

/// Scores a detection from its fibers.
///
/// Sums the distance-weighted fiber scores, applies the pairwise
/// consistency adjustment (weighted positions only), fits the stacked fiber
/// windows and applies the shape adjustments, then maps the raw score onto
/// the 0 - 5 scale. If the stacked fit points at a hot pixel, the offending
/// fibers are flagged and the whole computation runs once more; the
/// candidate itself is never modified.
pub fn score_detection(candidate: &DetectionCandidate, config: &ScoringConfig) -> ScoreResult {
    let source = match candidate.source_position {
        Some(p) => p,
        None => {
            info!("detection {}: no source position, cannot score", candidate.id);
            return ScoreResult {
                raw: 0.0,
                scaled: 0.0,
                fibers: Vec::new(),
                pairwise: PairwiseAdjustment::default(),
                shape: None,
                fit_status: FitStatus::Unpositioned,
                recomputed: false,
                flagged: Vec::new(),
            };
        }
    };

    let mut bad: Vec<bool> = candidate.fibers.iter().map(|f| f.bad).collect();
    let mut flagged: Vec<String> = Vec::new();
    let mut recomputed = false;

    // at most one retry: the recompute never re-checks pixels
    loop {
        let check_pixels = !recomputed && !bad.iter().any(|b| *b);
        match run_pass(candidate, &source, &bad, check_pixels, config) {
            Pass::Finished(mut result) => {
                result.recomputed = recomputed;
                result.flagged = flagged;
                return result;
            }
            Pass::HotPixels(hot) => {
                for k in hot {
                    bad[k] = true;
                    flagged.push(candidate.fibers[k].id.clone());
                }
                info!("detection {}: triggering recomputation of score", candidate.id);
                recomputed = true;
            }
        }
    }
}
