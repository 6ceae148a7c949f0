use serde::{Deserialize, Serialize};

use crate::data::sky::SkyPosition;
use crate::data::spectrum::SpectralSample;

/// Identifies the observation (shot) and exposure a fiber spectrum came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExposureKey {
    /// Observation identifier, e.g. "20180124v010".
    pub observation: String,
    /// Exposure (dither) number within the observation.
    pub exposure: u32,
}

impl ExposureKey {
    pub fn new(observation: impl Into<String>, exposure: u32) -> Self {
        ExposureKey { observation: observation.into(), exposure }
    }

    pub fn same_observation(&self, other: &ExposureKey) -> bool {
        self.observation == other.observation
    }

    pub fn same_exposure(&self, other: &ExposureKey) -> bool {
        self.same_observation(other) && self.exposure == other.exposure
    }
}

/// One fiber contributing to a detection.
///
/// Inputs come from the fiber/astrometry collaborator. `distance`, `weight`
/// and `weighted_score` are written back by
/// [`DetectionCandidate::apply`](crate::data::detection::DetectionCandidate::apply)
/// for the reporting layer; scoring itself never reads them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fiber {
    pub id: String,
    pub position: Option<SkyPosition>,
    pub exposure: ExposureKey,
    pub signal_to_noise: Option<f64>,
    /// Short intensity-vs-wavelength cut around the candidate wavelength.
    pub central_window: Option<SpectralSample>,
    /// Pixels of the central window that fell off the detector edge.
    pub edge_pixels: usize,
    /// Suspected hot/stuck pixel or otherwise unusable.
    pub bad: bool,

    pub distance: Option<f64>,
    pub weight: Option<f64>,
    pub weighted_score: Option<f64>,
}

impl Fiber {
    pub fn new(
        id: impl Into<String>,
        position: Option<SkyPosition>,
        signal_to_noise: Option<f64>,
    ) -> Self {
        Fiber {
            id: id.into(),
            position,
            exposure: ExposureKey::default(),
            signal_to_noise,
            central_window: None,
            edge_pixels: 0,
            bad: false,
            distance: None,
            weight: None,
            weighted_score: None,
        }
    }

    pub fn with_exposure(mut self, exposure: ExposureKey) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_window(mut self, window: SpectralSample) -> Self {
        self.central_window = Some(window);
        self
    }

    pub fn with_edge_pixels(mut self, edge_pixels: usize) -> Self {
        self.edge_pixels = edge_pixels;
        self
    }

    /// Angular distance in arcseconds to `source`, `None` without a fiber position.
    pub fn distance_to(&self, source: &SkyPosition) -> Option<f64> {
        self.position.map(|p| source.separation_arcsec(&p))
    }

    pub fn has_window(&self) -> bool {
        self.central_window.as_ref().map_or(false, |w| !w.is_empty())
    }
}
