use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::line_shape::signal_score;
use crate::classify::lines::{EmissionLineDef, LineCatalog};
use crate::config::ScoringConfig;
use crate::data::spectrum::SpectralSample;

/// Classifier limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Hypotheses below this redshift are not considered.
    pub min_redshift: f64,
    /// A companion line counts only if its scaled score is above this.
    pub min_companion_score: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig { min_redshift: 0.0, min_companion_score: 0.0 }
    }
}

/// A catalog line found where a hypothesis predicts it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanionLine {
    pub line: EmissionLineDef,
    pub observed_wavelength: f64,
    pub score: f64,
}

/// One redshift hypothesis for the line at the candidate wavelength.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSolution {
    pub z: f64,
    /// Line assumed to be the one observed at the candidate wavelength.
    pub anchor: EmissionLineDef,
    /// Sum of the companion line scores.
    pub score: f64,
    /// `score` over the summed scores of all hypotheses.
    pub fractional_score: f64,
    pub lines: Vec<CompanionLine>,
}

/// Ranks redshift hypotheses for the line at `center`, best first.
///
/// Every anchor-eligible catalog line is tried as the observed line; the
/// redshift it implies predicts where every other catalog line should fall,
/// and each prediction inside the spectrum is scored with [`signal_score`].
/// Hypotheses with no supporting companion are dropped.
///
/// # Example
///
/// ```rust
/// # use emscore::classify::classifier::classify;
/// # use emscore::classify::lines::LineCatalog;
/// # use emscore::config::ScoringConfig;
/// # use emscore::simulation::synthetic::{gaussian_spectrum, SyntheticLine};
/// let s = gaussian_spectrum(3500.0, 5500.0, 1.0, &[SyntheticLine::new(3727.0, 3.0, 100.0)]);
/// let solutions = classify(&s, 3727.0, &LineCatalog::default(), &ScoringConfig::default());
/// assert!(solutions.is_empty());
/// ```
pub fn classify(
    samples: &SpectralSample,
    center: f64,
    catalog: &LineCatalog,
    config: &ScoringConfig,
) -> Vec<ClassifierSolution> {
    if samples.is_empty() {
        warn!("classify at {:.2}: empty spectrum", center);
        return Vec::new();
    }
    if !samples.is_consistent() {
        warn!("classify at {:.2}: wavelength and intensity lengths differ", center);
        return Vec::new();
    }

    let mut solutions: Vec<ClassifierSolution> = Vec::new();
    let mut total_score = 0.0;

    for (ai, anchor) in catalog.lines().iter().enumerate() {
        if !anchor.anchor_candidate {
            continue;
        }
        let z = anchor.redshift_for(center);
        if z < config.classifier.min_redshift {
            debug!("{} at {:.2} implies z = {:.4}, skipped", anchor.name, center, z);
            continue;
        }

        let mut solution = ClassifierSolution {
            z,
            anchor: anchor.clone(),
            score: 0.0,
            fractional_score: 0.0,
            lines: Vec::new(),
        };

        for (ci, companion) in catalog.lines().iter().enumerate() {
            if ci == ai {
                continue;
            }
            let predicted = companion.observed_at(z);
            if !samples.contains_wavelength(predicted) {
                continue;
            }

            let score = signal_score(samples, predicted, None, config);
            if score > config.classifier.min_companion_score {
                debug!(
                    "{} hypothesis: {} found at {:.2} with score {}",
                    anchor.name, companion.name, predicted, score
                );
                total_score += score;
                solution.score += score;
                solution.lines.push(CompanionLine {
                    line: companion.clone(),
                    observed_wavelength: predicted,
                    score,
                });
            }
        }

        if solution.score > 0.0 {
            solutions.push(solution);
        }
    }

    for s in solutions.iter_mut() {
        s.fractional_score = s.score / total_score;
    }
    solutions.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.score)));

    for s in &solutions {
        info!(
            "line at {:.2} as {} (z = {:.4}): score {:.2}, fraction {:.3}, {} companion(s)",
            center,
            s.anchor.name,
            s.z,
            s.score,
            s.fractional_score,
            s.lines.len()
        );
    }

    solutions
}

/// A catalog and scoring configuration bundled for repeated classification.
#[derive(Clone, Debug, Default)]
pub struct LineClassifier {
    pub catalog: LineCatalog,
    pub config: ScoringConfig,
}

impl LineClassifier {
    pub fn new(catalog: LineCatalog, config: ScoringConfig) -> Self {
        LineClassifier { catalog, config }
    }

    pub fn classify(&self, samples: &SpectralSample, center: f64) -> Vec<ClassifierSolution> {
        classify(samples, center, &self.catalog, &self.config)
    }

    /// Best hypothesis, if any line supports one.
    pub fn best(&self, samples: &SpectralSample, center: f64) -> Option<ClassifierSolution> {
        self.classify(samples, center).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::synthetic::{gaussian_spectrum, SyntheticLine};

    #[test]
    fn test_single_line_has_no_companions() {
        let s = gaussian_spectrum(3500.0, 5500.0, 1.0, &[SyntheticLine::new(3727.0, 3.0, 100.0)]);
        let solutions = LineClassifier::default().classify(&s, 3727.0);
        assert!(solutions.iter().all(|sol| sol.lines.iter().all(|l| l.score == 0.0)));
        assert!(solutions.is_empty());
    }

    #[test]
    fn test_oii_with_oiii_companion() {
        let z = 0.1;
        let s = gaussian_spectrum(
            3500.0,
            5600.0,
            1.0,
            &[
                SyntheticLine::new(3727.0 * (1.0 + z), 3.0, 100.0),
                SyntheticLine::new(5007.0 * (1.0 + z), 3.0, 100.0),
            ],
        );
        let classifier = LineClassifier::default();
        let best = classifier.best(&s, 3727.0 * (1.0 + z)).unwrap();
        assert_eq!(best.anchor.name, "OII");
        assert!((best.z - z).abs() < 1e-9);
        assert!(best.lines.iter().any(|l| l.line.name == "OIII 5007"));
        assert!(best.fractional_score > 0.0 && best.fractional_score <= 1.0);
    }

    #[test]
    fn test_fractions_sum_to_one() {
        let z = 0.1;
        let s = gaussian_spectrum(
            3500.0,
            5600.0,
            1.0,
            &[
                SyntheticLine::new(3727.0 * (1.0 + z), 3.0, 100.0),
                SyntheticLine::new(5007.0 * (1.0 + z), 3.0, 100.0),
            ],
        );
        let solutions = LineClassifier::default().classify(&s, 3727.0 * (1.0 + z));
        let sum: f64 = solutions.iter().map(|s| s.fractional_score).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(solutions.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_custom_catalog_without_anchors() {
        let catalog = LineCatalog::new(vec![EmissionLineDef::new("MgII", 2798.0, false)]);
        let s = gaussian_spectrum(3500.0, 5500.0, 1.0, &[SyntheticLine::new(4000.0, 3.0, 100.0)]);
        assert!(classify(&s, 4000.0, &catalog, &ScoringConfig::default()).is_empty());
    }

    #[test]
    fn test_empty_spectrum() {
        let s = SpectralSample::new(vec![], vec![]);
        assert!(LineClassifier::default().classify(&s, 4000.0).is_empty());
    }
}
