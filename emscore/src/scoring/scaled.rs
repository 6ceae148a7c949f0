use log::info;
use serde::{Deserialize, Serialize};

/// Piecewise-linear map from an unbounded raw score onto the 0 - 5 scale.
///
/// Breakpoints are `(raw, scaled)` pairs, ascending in both. Raw scores at
/// or below the first breakpoint map to its scaled value, above the last to
/// `max_score`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaledScoreTable {
    pub breakpoints: Vec<(f64, f64)>,
    pub max_score: f64,
    /// Scaled score ceiling when the edge-pixel ratio is exceeded.
    pub edge_cap: f64,
    /// Edge pixels per fiber above which `edge_cap` applies.
    pub max_edge_pixels_per_fiber: f64,
}

impl Default for ScaledScoreTable {
    fn default() -> Self {
        ScaledScoreTable {
            // F, D, D+, C, C+, B, B+, A-, A, A+
            breakpoints: vec![
                (0.0, 0.0),
                (2.0, 0.5),
                (3.0, 1.0),
                (4.0, 1.5),
                (5.0, 2.0),
                (6.0, 2.5),
                (7.0, 3.0),
                (8.0, 3.5),
                (11.0, 4.0),
                (12.5, 4.5),
                (14.0, 5.0),
            ],
            max_score: 5.0,
            edge_cap: 3.5,
            max_edge_pixels_per_fiber: 1.0,
        }
    }
}

impl ScaledScoreTable {
    /// Maps `raw` onto the table, rounded to one decimal.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emscore::scoring::scaled::ScaledScoreTable;
    /// let table = ScaledScoreTable::default();
    /// assert_eq!(table.scale(-3.0), 0.0);
    /// assert_eq!(table.scale(1.0), 0.3);
    /// assert_eq!(table.scale(9.5), 3.8);
    /// assert_eq!(table.scale(40.0), 5.0);
    /// ```
    pub fn scale(&self, raw: f64) -> f64 {
        if raw.is_nan() {
            return 0.0;
        }
        let (first, last) = match (self.breakpoints.first(), self.breakpoints.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return 0.0,
        };

        let scaled = if raw <= first.0 {
            first.1
        } else if raw > last.0 {
            self.max_score
        } else {
            self.breakpoints
                .windows(2)
                .find(|seg| raw <= seg[1].0)
                .map(|seg| {
                    let (x0, y0) = seg[0];
                    let (x1, y1) = seg[1];
                    if x1 > x0 {
                        y0 + (y1 - y0) * (raw - x0) / (x1 - x0)
                    } else {
                        y1
                    }
                })
                .unwrap_or(self.max_score)
        };

        (scaled * 10.0).round() / 10.0
    }

    /// Applies the edge-pixel ceiling to an already scaled score.
    pub fn cap_for_edge_pixels(&self, scaled: f64, edge_pixels: usize, fibers: usize) -> f64 {
        if fibers == 0 {
            return scaled;
        }
        let ratio = edge_pixels as f64 / fibers as f64;
        if ratio > self.max_edge_pixels_per_fiber && scaled > self.edge_cap {
            info!(
                "{} edge pixels over {} fibers, capping scaled score {:.1} at {:.1}",
                edge_pixels, fibers, scaled, self.edge_cap
            );
            return self.edge_cap;
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        let t = ScaledScoreTable::default();
        assert_eq!(t.scale(0.0), 0.0);
        assert_eq!(t.scale(2.0), 0.5);
        assert_eq!(t.scale(5.0), 2.0);
        assert_eq!(t.scale(7.0), 3.0);
        assert_eq!(t.scale(12.5), 4.5);
        assert_eq!(t.scale(14.0), 5.0);
        assert_eq!(t.scale(14.1), 5.0);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let t = ScaledScoreTable::default();
        let mut last = -1.0;
        for i in -100..=400 {
            let s = t.scale(i as f64 * 0.05);
            assert!((0.0..=5.0).contains(&s));
            assert!(s >= last);
            assert_eq!(s, t.scale(i as f64 * 0.05));
            last = s;
        }
    }

    #[test]
    fn test_nan_scales_to_zero() {
        assert_eq!(ScaledScoreTable::default().scale(f64::NAN), 0.0);
    }

    #[test]
    fn test_edge_pixel_cap() {
        let t = ScaledScoreTable::default();
        assert_eq!(t.cap_for_edge_pixels(4.6, 3, 2), 3.5);
        assert_eq!(t.cap_for_edge_pixels(4.6, 2, 2), 4.6);
        assert_eq!(t.cap_for_edge_pixels(2.0, 10, 2), 2.0);
        assert_eq!(t.cap_for_edge_pixels(4.6, 10, 0), 4.6);
    }
}
