use statrs::statistics::Statistics;

/// Unnormalised Gaussian `a * exp(-((x - x0) / sigma)^2 / 2)`.
#[inline]
pub fn gaussian(x: f64, x0: f64, sigma: f64, amplitude: f64) -> f64 {
    let z = (x - x0) / sigma;
    amplitude * (-0.5 * z * z).exp()
}

/// `n` evenly spaced values covering `[start, end]` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.mean())
    }
}

/// Population standard deviation (divides by `n`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.population_std_dev())
    }
}

/// Central moments m2, m3, m4 (population).
fn central_moments(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values)?;
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m2 / n, m3 / n, m4 / n))
}

/// Biased sample skewness `m3 / m2^1.5`; 0 for constant data.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let (m2, m3, _) = central_moments(values)?;
    if m2 <= 0.0 {
        return Some(0.0);
    }
    Some(m3 / m2.powf(1.5))
}

/// Biased excess (Fisher) kurtosis `m4 / m2^2 - 3`; -3 for constant data.
pub fn excess_kurtosis(values: &[f64]) -> Option<f64> {
    let (m2, _, m4) = central_moments(values)?;
    if m2 <= 0.0 {
        return Some(-3.0);
    }
    Some(m4 / (m2 * m2) - 3.0)
}

/// Keeps values no farther than `n_sigma` population standard deviations from the mean.
pub fn sigma_clip(values: &[f64], n_sigma: f64) -> Vec<f64> {
    let (m, s) = match (mean(values), population_std(values)) {
        (Some(m), Some(s)) => (m, s),
        _ => return Vec::new(),
    };
    let limit = (n_sigma * s).abs();
    values.iter().copied().filter(|v| (v - m).abs() <= limit).collect()
}

/// Root-mean-square residual between `data` and `fit`, both divided by the data maximum.
///
/// Returns `None` when the inputs are unusable (length mismatch, NaN, or a
/// non-positive data maximum).
pub fn normalized_rms(data: &[f64], fit: &[f64]) -> Option<f64> {
    if data.is_empty() || data.len() != fit.len() {
        return None;
    }
    if data.iter().chain(fit.iter()).any(|v| v.is_nan()) {
        return None;
    }
    let mx = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if mx <= 0.0 {
        return None;
    }
    let sum: f64 = data
        .iter()
        .zip(fit.iter())
        .map(|(d, f)| {
            let r = f / mx - d / mx;
            r * r
        })
        .sum();
    Some((sum / data.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_peak_and_half_max() {
        assert_eq!(gaussian(5.0, 5.0, 2.0, 3.0), 3.0);
        let hwhm = 2.0 * (2.0 * 2.0f64.ln()).sqrt();
        assert!((gaussian(5.0 + hwhm, 5.0, 2.0, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-8.0, 8.0, 100);
        assert_eq!(v.len(), 100);
        assert_eq!(v[0], -8.0);
        assert!((v[99] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_moments_of_symmetric_data() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&v).unwrap().abs() < 1e-12);
        // uniform-like: excess kurtosis of 1..5 is -1.3
        assert!((excess_kurtosis(&v).unwrap() + 1.3).abs() < 1e-12);
        assert!((population_std(&v).unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sigma_clip_drops_outlier() {
        let mut v = vec![10.0; 20];
        v.push(1000.0);
        let kept = sigma_clip(&v, 3.0);
        assert_eq!(kept.len(), 20);
        assert_eq!(sigma_clip(&[], 3.0).len(), 0);
    }

    #[test]
    fn test_normalized_rms() {
        assert_eq!(normalized_rms(&[1.0, 2.0], &[1.0, 2.0]), Some(0.0));
        assert_eq!(normalized_rms(&[0.0, 0.0], &[0.0, 0.0]), None);
        assert_eq!(normalized_rms(&[1.0], &[1.0, 2.0]), None);
        let r = normalized_rms(&[0.0, 10.0], &[1.0, 10.0]).unwrap();
        assert!((r - (0.01f64 / 2.0).sqrt()).abs() < 1e-12);
    }
}
