use log::debug;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::algorithm::peaks::half_max_extent;
use crate::algorithm::utility::gaussian;
use crate::error::FitError;

const MAX_ITERATIONS: usize = 200;
const MIN_SIGMA: f64 = 1e-6;
const COST_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-10;
const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e10;

/// Parameters of `amplitude * exp(-((x - center) / sigma)^2 / 2)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub center: f64,
    pub sigma: f64,
    pub amplitude: f64,
}

impl GaussianParams {
    pub fn new(center: f64, sigma: f64, amplitude: f64) -> Self {
        GaussianParams { center, sigma, amplitude }
    }

    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        gaussian(x, self.center, self.sigma, self.amplitude)
    }

    pub fn curve(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.evaluate(xi)).collect()
    }

    fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.center, self.sigma, self.amplitude)
    }

    fn from_vector(v: &Vector3<f64>) -> Self {
        GaussianParams { center: v[0], sigma: v[1], amplitude: v[2] }
    }
}

/// A converged least-squares fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianFit {
    pub params: GaussianParams,
    /// Sum of squared residuals at the solution.
    pub cost: f64,
    pub iterations: usize,
}

struct Bounds {
    center_lo: f64,
    center_hi: f64,
}

impl Bounds {
    fn project(&self, p: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(p[0].clamp(self.center_lo, self.center_hi), p[1].max(MIN_SIGMA), p[2])
    }
}

fn cost(x: &[f64], y: &[f64], p: &GaussianParams) -> f64 {
    x.iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| {
            let r = yi - p.evaluate(xi);
            r * r
        })
        .sum()
}

/// Accumulates J^T J and J^T r for the current parameters.
fn normal_equations(x: &[f64], y: &[f64], p: &GaussianParams) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let z = (xi - p.center) / p.sigma;
        let e = (-0.5 * z * z).exp();
        let model = p.amplitude * e;
        let j = Vector3::new(p.amplitude * e * z / p.sigma, p.amplitude * e * z * z / p.sigma, e);
        jtj += j * j.transpose();
        jtr += j * (yi - model);
    }
    (jtj, jtr)
}

fn initial_guess(x: &[f64], y: &[f64], center: f64) -> GaussianParams {
    let (imax, ymax) = y
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
    let step = (x[x.len() - 1] - x[0]).abs() / (x.len() - 1) as f64;
    let (count, _, _) = half_max_extent(y, imax, ymax / 2.0);
    let sigma = ((count + 1) as f64 * step / 2.355).max(0.5 * step).max(MIN_SIGMA);
    GaussianParams::new(center, sigma, ymax)
}

/// Fits a single Gaussian to `(x, y)` by bounded Levenberg-Marquardt.
///
/// The center starts at `center` and is held within `center +/- tolerance`;
/// sigma is kept positive. The starting width comes from the half-maximum
/// extent of the data and the starting amplitude from its maximum.
///
/// # Arguments
///
/// * `x` - sample positions (ascending)
/// * `y` - sample values
/// * `center` - expected line center
/// * `tolerance` - maximum allowed shift of the center
///
/// # Example
///
/// ```rust
/// # use emscore::algorithm::gaussian::{fit_gaussian, GaussianParams};
/// let truth = GaussianParams::new(4500.4, 2.5, 80.0);
/// let x: Vec<f64> = (0..17).map(|i| 4492.0 + i as f64).collect();
/// let y = truth.curve(&x);
/// let fit = fit_gaussian(&x, &y, 4500.0, 1.0).unwrap();
/// assert!((fit.params.center - 4500.4).abs() < 1e-4);
/// assert!((fit.params.sigma - 2.5).abs() < 1e-4);
/// ```
pub fn fit_gaussian(
    x: &[f64],
    y: &[f64],
    center: f64,
    tolerance: f64,
) -> Result<GaussianFit, FitError> {
    let n = x.len().min(y.len());
    if n < 3 || x.len() != y.len() {
        return Err(FitError::InsufficientData { needed: 3, got: n });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) || !center.is_finite() {
        return Err(FitError::NonFinite);
    }

    let bounds = Bounds {
        center_lo: center - tolerance.abs(),
        center_hi: center + tolerance.abs(),
    };
    let mut params = initial_guess(x, y, center);
    let mut current = cost(x, y, &params);
    let mut lambda = LAMBDA_START;

    if current == 0.0 {
        return Ok(GaussianFit { params, cost: current, iterations: 0 });
    }

    for iteration in 1..=MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(x, y, &params);
        if !jtj.iter().all(|v| v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        let p = params.as_vector();

        loop {
            let mut damped = jtj;
            for i in 0..3 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&jtr),
                None => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        debug!("gaussian fit: normal equations stay singular");
                        return Err(FitError::Singular);
                    }
                    continue;
                }
            };

            let candidate_v = bounds.project(&(p + step));
            let candidate = GaussianParams::from_vector(&candidate_v);
            let candidate_cost = cost(x, y, &candidate);

            if candidate_cost.is_finite() && candidate_cost < current {
                let moved = (candidate_v - p).norm();
                let relative = (current - candidate_cost) / current;
                params = candidate;
                current = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if relative < COST_TOLERANCE || moved < STEP_TOLERANCE || current == 0.0 {
                    return Ok(GaussianFit { params, cost: current, iterations: iteration });
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // no downhill step left at any damping: a (bounded) minimum
                return Ok(GaussianFit { params, cost: current, iterations: iteration });
            }
        }
    }

    debug!("gaussian fit around {:.2} did not converge", center);
    Err(FitError::NonConvergence(MAX_ITERATIONS))
}
