use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SpectrumError;

/// An ordered sequence of (wavelength, intensity) samples, ascending in wavelength.
///
/// Spacing may be regular or irregular. Uses `Arc<Vec<f64>>` so clones of a
/// spectrum shared between fibers, hypotheses and worker threads are O(1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectralSample {
    pub wavelength: Arc<Vec<f64>>,
    pub intensity: Arc<Vec<f64>>,
}

impl SpectralSample {
    /// Constructs a new `SpectralSample` without validation.
    ///
    /// Upstream extraction is expected to deliver ascending, equal length
    /// vectors; use [`SpectralSample::try_new`] when that is not guaranteed.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::data::spectrum::SpectralSample;
    /// let sample = SpectralSample::new(vec![4000.0, 4001.0], vec![1.0, 3.0]);
    /// assert_eq!(*sample.wavelength, vec![4000.0, 4001.0]);
    /// assert_eq!(*sample.intensity, vec![1.0, 3.0]);
    /// ```
    pub fn new(wavelength: Vec<f64>, intensity: Vec<f64>) -> Self {
        SpectralSample {
            wavelength: Arc::new(wavelength),
            intensity: Arc::new(intensity),
        }
    }

    /// Constructs a new `SpectralSample`, checking lengths, finiteness and ordering.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::data::spectrum::SpectralSample;
    /// # use emscore::error::SpectrumError;
    /// let bad = SpectralSample::try_new(vec![4001.0, 4000.0], vec![1.0, 3.0]);
    /// assert_eq!(bad.unwrap_err(), SpectrumError::Unsorted(1));
    /// ```
    pub fn try_new(wavelength: Vec<f64>, intensity: Vec<f64>) -> Result<Self, SpectrumError> {
        if wavelength.len() != intensity.len() {
            return Err(SpectrumError::MismatchedLengths {
                wavelengths: wavelength.len(),
                intensities: intensity.len(),
            });
        }
        if wavelength.is_empty() {
            return Err(SpectrumError::Empty);
        }
        for (i, (w, v)) in wavelength.iter().zip(intensity.iter()).enumerate() {
            if !w.is_finite() || !v.is_finite() {
                return Err(SpectrumError::NonFinite(i));
            }
            if i > 0 && *w <= wavelength[i - 1] {
                return Err(SpectrumError::Unsorted(i));
            }
        }
        Ok(SpectralSample::new(wavelength, intensity))
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// True if both axes have the same number of samples.
    pub fn is_consistent(&self) -> bool {
        self.wavelength.len() == self.intensity.len()
    }

    /// Index of the sample whose wavelength is closest to `wavelength`.
    ///
    /// Ties resolve to the lower index. Returns `None` for an empty sample.
    pub fn nearest_index(&self, wavelength: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, w) in self.wavelength.iter().enumerate() {
            let d = (w - wavelength).abs();
            match best {
                Some((_, bd)) if d >= bd => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Smallest and largest wavelength covered.
    pub fn wavelength_bounds(&self) -> Option<(f64, f64)> {
        match (self.wavelength.first(), self.wavelength.last()) {
            (Some(&lo), Some(&hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// True if `wavelength` lies within the covered range, ends included.
    pub fn contains_wavelength(&self, wavelength: f64) -> bool {
        self.wavelength_bounds()
            .map_or(false, |(lo, hi)| lo <= wavelength && wavelength <= hi)
    }

    pub fn max_intensity(&self) -> Option<f64> {
        self.intensity.iter().cloned().reduce(f64::max)
    }

    /// Samples within `half_width` pixels either side of the sample nearest to `center`.
    ///
    /// The window is clipped at the spectrum edges, so it may hold fewer than
    /// `2 * half_width + 1` samples.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::data::spectrum::SpectralSample;
    /// let wavelength = (0..20).map(|i| 4000.0 + i as f64).collect();
    /// let sample = SpectralSample::new(wavelength, vec![0.0; 20]);
    /// let window = sample.window_around(4002.2, 3);
    /// assert_eq!(*window.wavelength, vec![4000.0, 4001.0, 4002.0, 4003.0, 4004.0, 4005.0]);
    /// ```
    pub fn window_around(&self, center: f64, half_width: usize) -> SpectralSample {
        match self.nearest_index(center) {
            Some(idx) if self.is_consistent() => {
                let lo = idx.saturating_sub(half_width);
                let hi = (idx + half_width).min(self.len() - 1);
                SpectralSample::new(
                    self.wavelength[lo..=hi].to_vec(),
                    self.intensity[lo..=hi].to_vec(),
                )
            }
            _ => SpectralSample::new(Vec::new(), Vec::new()),
        }
    }

    /// Linear interpolation of the intensity at `wavelength`.
    ///
    /// Outside the covered range the first / last intensity is returned, so a
    /// short fiber window can be laid onto a wider grid without failing.
    pub fn interpolate(&self, wavelength: f64) -> Option<f64> {
        let n = self.len().min(self.intensity.len());
        if n == 0 {
            return None;
        }
        let w = &self.wavelength;
        let v = &self.intensity;
        if wavelength <= w[0] {
            return Some(v[0]);
        }
        if wavelength >= w[n - 1] {
            return Some(v[n - 1]);
        }
        let hi = w[..n].partition_point(|&x| x < wavelength);
        let lo = hi - 1;
        let span = w[hi] - w[lo];
        if span <= 0.0 {
            return Some(v[hi]);
        }
        let t = (wavelength - w[lo]) / span;
        Some(v[lo] + t * (v[hi] - v[lo]))
    }

    /// Interpolated intensities on an arbitrary wavelength grid.
    pub fn resample(&self, grid: &[f64]) -> Option<Vec<f64>> {
        grid.iter().map(|&w| self.interpolate(w)).collect()
    }
}

impl Display for SpectralSample {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.wavelength_bounds() {
            Some((lo, hi)) => {
                write!(f, "SpectralSample({} samples, {:.1}-{:.1} AA)", self.len(), lo, hi)
            }
            None => write!(f, "SpectralSample(empty)"),
        }
    }
}
