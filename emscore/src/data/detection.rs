use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::data::fiber::Fiber;
use crate::data::sky::SkyPosition;
use crate::data::spectrum::SpectralSample;
use crate::scoring::detection::{score_detection, ScoreResult};

/// A candidate emission line: a wavelength, where on the sky it sits, and
/// the fibers that saw it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub id: u64,
    /// Observed wavelength of the candidate line, Angstrom.
    pub wavelength: f64,
    pub source_position: Option<SkyPosition>,
    /// `source_position` is a flux-weighted centroid rather than a catalog position.
    pub position_weighted: bool,
    pub fibers: Vec<Fiber>,
    /// Full extracted spectrum, used for classification.
    pub spectrum: Option<SpectralSample>,
    #[serde(skip)]
    result: Option<ScoreResult>,
}

impl DetectionCandidate {
    pub fn new(id: u64, wavelength: f64) -> Self {
        DetectionCandidate {
            id,
            wavelength,
            source_position: None,
            position_weighted: false,
            fibers: Vec::new(),
            spectrum: None,
            result: None,
        }
    }

    pub fn with_source(mut self, position: SkyPosition, weighted: bool) -> Self {
        self.source_position = Some(position);
        self.position_weighted = weighted;
        self
    }

    pub fn with_fibers(mut self, fibers: Vec<Fiber>) -> Self {
        self.fibers = fibers;
        self
    }

    pub fn with_spectrum(mut self, spectrum: SpectralSample) -> Self {
        self.spectrum = Some(spectrum);
        self
    }

    /// Scores the candidate, reusing the last result unless `force` is set.
    ///
    /// A forced rescore starts again from the stored inputs; it never builds
    /// on the cached result.
    pub fn score(&mut self, force: bool, config: &ScoringConfig) -> &ScoreResult {
        let result = match self.result.take() {
            Some(cached) if !force => cached,
            _ => score_detection(self, config),
        };
        self.result.insert(result)
    }

    /// Last computed result, if any.
    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    /// Copies distance, weight, weighted score and bad flags of the last result onto the fibers.
    ///
    /// Returns false if the candidate has not been scored.
    pub fn apply(&mut self) -> bool {
        let Some(result) = &self.result else {
            return false;
        };
        for (fiber, score) in self.fibers.iter_mut().zip(result.fibers.iter()) {
            fiber.distance = score.distance;
            fiber.weight = Some(score.weight);
            fiber.weighted_score = Some(score.weighted);
            fiber.bad = fiber.bad || score.bad;
        }
        true
    }
}
