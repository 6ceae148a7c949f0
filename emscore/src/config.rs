use serde::{Deserialize, Serialize};

use crate::algorithm::line_shape::LineShapeConfig;
use crate::algorithm::noise::NoiseConfig;
use crate::algorithm::peaks::PeakConfig;
use crate::algorithm::weighting::FiberWeightConfig;
use crate::classify::classifier::ClassifierConfig;
use crate::error::ConfigError;
use crate::scoring::fiber::FiberScoreConfig;
use crate::scoring::scaled::ScaledScoreTable;

/// All tuning tables of the scoring core.
///
/// Every field falls back to its default, so a JSON document only needs to
/// name the values it overrides.
///
/// # Example
///
/// ```rust
/// # use emscore::config::ScoringConfig;
/// let json = r#"{ "weight": { "zero_weight_distance": 2.5 } }"#;
/// let config = ScoringConfig::from_json_str(json).unwrap();
/// assert_eq!(config.weight.zero_weight_distance, 2.5);
/// assert_eq!(config.weight.full_weight_distance, 0.75);
/// assert_eq!(config.noise.default_noise, 6.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub peaks: PeakConfig,
    pub noise: NoiseConfig,
    pub shape: LineShapeConfig,
    pub weight: FiberWeightConfig,
    pub fiber: FiberScoreConfig,
    pub scaled: ScaledScoreTable,
    pub classifier: ClassifierConfig,
}

impl ScoringConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_keeps_defaults() {
        let config = ScoringConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(ScoringConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ScoringConfig::from_json_str("{}").unwrap(), ScoringConfig::default());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = ScoringConfig::from_json_str("{ \"noise\": 3 }").unwrap_err();
        assert!(err.to_string().starts_with("invalid scoring configuration"));
    }
}
