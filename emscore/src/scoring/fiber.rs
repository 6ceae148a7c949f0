use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::utility::gaussian;
use crate::data::fiber::Fiber;

/// Signal-to-noise curve of a single fiber and the pairwise consistency constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiberScoreConfig {
    /// No score below this SN.
    pub base_sn: f64,
    /// SN span of quadratic growth above `base_sn`.
    pub square_sn: f64,
    /// SN span of linear growth after the quadratic part.
    pub linear_sn: f64,
    /// SN span of square-root growth; beyond it the SN is taken as an artifact.
    pub sqrt_sn: f64,
    /// Raw score given to an implausibly large SN.
    pub artifact_score: f64,

    /// Typical PSF width (arcsec) of the peak model used to compare fibers.
    pub psf_sigma: f64,
    /// SN uncertainty the pairwise limits are expressed in.
    pub gross_noise: f64,
    pub same_observation_penalty_limit: f64,
    pub different_observation_penalty_limit: f64,
    pub bonus_limit: f64,
    pub same_exposure_penalty_scale: f64,
    pub same_observation_penalty_scale: f64,
    pub different_observation_penalty_scale: f64,
}

impl Default for FiberScoreConfig {
    fn default() -> Self {
        FiberScoreConfig {
            base_sn: 3.0,
            square_sn: 2.0,
            linear_sn: 3.0,
            sqrt_sn: 100.0,
            artifact_score: -1.0,
            psf_sigma: 1.5,
            gross_noise: 3.0,
            same_observation_penalty_limit: 1.5,
            different_observation_penalty_limit: 2.0,
            bonus_limit: 1.0,
            same_exposure_penalty_scale: 0.5,
            same_observation_penalty_scale: 0.4,
            different_observation_penalty_scale: 0.3,
        }
    }
}

/// Unweighted score of one fiber from its signal-to-noise.
///
/// Flat below `base_sn`, then quadratic, linear and finally square-root
/// growth; continuous across the joints. An SN beyond the last span scores
/// `artifact_score`.
///
/// # Example
///
/// ```rust
/// # use emscore::scoring::fiber::{sn_score, FiberScoreConfig};
/// let config = FiberScoreConfig::default();
/// assert_eq!(sn_score(Some(2.0), &config), 0.0);
/// assert_eq!(sn_score(Some(4.0), &config), 1.0);
/// assert_eq!(sn_score(Some(6.0), &config), 5.0);
/// assert_eq!(sn_score(Some(11.0), &config), 8.0);
/// assert_eq!(sn_score(None, &config), 0.0);
/// ```
pub fn sn_score(signal_to_noise: Option<f64>, config: &FiberScoreConfig) -> f64 {
    let sn = match signal_to_noise {
        Some(sn) if sn != 0.0 && !sn.is_nan() => sn,
        _ => return 0.0,
    };

    let square_end = config.base_sn + config.square_sn;
    let linear_end = square_end + config.linear_sn;
    let sqrt_end = linear_end + config.sqrt_sn;

    if sn < config.base_sn {
        0.0
    } else if sn < square_end {
        (sn - config.base_sn).powi(2)
    } else if sn < linear_end {
        config.square_sn.powi(2) + (sn - square_end)
    } else if sn < sqrt_end {
        config.square_sn.powi(2) + config.linear_sn + (1.0 + sn - linear_end).sqrt() - 1.0
    } else {
        info!("unexpected, really large S/N ({})", sn);
        config.artifact_score
    }
}

/// Per-fiber record of one scoring pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiberScore {
    pub id: String,
    pub distance: Option<f64>,
    pub weight: f64,
    pub raw: f64,
    pub weighted: f64,
    pub bad: bool,
}

/// Outcome of the pairwise consistency check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairwiseAdjustment {
    pub penalty: f64,
    pub bonus: f64,
}

impl PairwiseAdjustment {
    /// Amount to subtract from the running score.
    pub fn net(&self) -> f64 {
        self.penalty - self.bonus
    }
}

/// Compares the implied peak SN of every fiber pair.
///
/// Each fiber's SN is divided by a Gaussian PSF model evaluated at its
/// distance (widened by the distance itself), giving an estimate of the SN
/// at the source. Pairs that disagree by more than the penalty limit are
/// charged a share of the nearer fiber's weighted score; pairs that agree
/// within the bonus limit earn a bonus. A fiber is charged at most once as
/// the first member of a pair and credited at most once as the second, in
/// list order.
///
/// `fibers` and `scores` are index-aligned. Bad fibers and fibers without a
/// distance or SN take no part.
pub fn pairwise_adjustment(
    fibers: &[Fiber],
    scores: &[FiberScore],
    config: &FiberScoreConfig,
) -> PairwiseAdjustment {
    let mut adjustment = PairwiseAdjustment::default();
    let mut penalized: HashSet<usize> = HashSet::new();
    let mut credited: HashSet<usize> = HashSet::new();

    let usable = |k: usize| -> Option<(f64, f64)> {
        let s = scores.get(k)?;
        if s.bad {
            return None;
        }
        Some((s.distance?, fibers.get(k)?.signal_to_noise?))
    };

    for (i, j) in (0..fibers.len().min(scores.len())).tuple_combinations() {
        let ((di, sni), (dj, snj)) = match (usable(i), usable(j)) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        let (near, far) = if di < dj { (i, j) } else { (j, i) };
        let (d1, sn1, d2, sn2) = if di < dj { (di, sni, dj, snj) } else { (dj, snj, di, sni) };

        let g1 = gaussian(d1, 0.0, config.psf_sigma + d1, 1.0);
        let g2 = gaussian(d2, 0.0, config.psf_sigma + d2, 1.0);
        if !(g1 > 0.0 && g2 > 0.0) {
            debug!("invalid peak model for fibers {} and {}", fibers[i].id, fibers[j].id);
            continue;
        }
        let delta = (sn1 / g1 - sn2 / g2).abs();

        let e1 = &fibers[near].exposure;
        let e2 = &fibers[far].exposure;
        let (penalty_limit, penalty_scale) = if e1.same_observation(e2) {
            let scale = if e1.same_exposure(e2) {
                config.same_exposure_penalty_scale
            } else {
                config.same_observation_penalty_scale
            };
            (config.same_observation_penalty_limit * config.gross_noise, scale)
        } else {
            (
                config.different_observation_penalty_limit * config.gross_noise,
                config.different_observation_penalty_scale,
            )
        };
        let bonus_limit = config.bonus_limit * config.gross_noise;

        if delta > penalty_limit {
            if penalized.insert(i) {
                let excess = ((delta - penalty_limit) / penalty_limit).min(1.0);
                let p = excess * penalty_scale * scores[near].weighted;
                adjustment.penalty += p;
                debug!(
                    "pair penalty {} for fibers {} / {}: peak SN delta {} above {}",
                    p, fibers[near].id, fibers[far].id, delta, penalty_limit
                );
            }
        } else if delta < bonus_limit && credited.insert(j) {
            let b = (bonus_limit - delta) / bonus_limit;
            adjustment.bonus += b;
            debug!(
                "pair bonus {} for fibers {} / {}: peak SN delta {} below {}",
                b, fibers[near].id, fibers[far].id, delta, bonus_limit
            );
        }
    }

    adjustment
}
