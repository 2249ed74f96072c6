//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::baseline::{DEFAULT_CALIBRATION_SAMPLES, MIN_ADAPTATION_SAMPLES};
use crate::error::EngineError;
use crate::nudges::Language;
use crate::projection::{DEFAULT_TREND_WINDOW, MIN_TREND_POINTS};
use crate::scoring::ScoringWeights;

/// Default cap on per-session sample and score history
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Default cap on retained alert history per session
pub const DEFAULT_MAX_ALERT_HISTORY: usize = 500;

/// Tunables shared by every session an engine owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Readings collected before the first calibration attempt
    pub calibration_samples: usize,
    /// Maximum samples and score snapshots kept per session
    pub max_history: usize,
    /// Maximum alerts kept in a session's history
    pub max_alert_history: usize,
    pub default_language: Language,
    pub weights: ScoringWeights,
    /// Score history points fed to the trend fit
    pub trend_window: usize,
    /// Samples required before an explicit baseline adaptation applies
    pub adaptation_min_samples: usize,
    /// EMA rate used by baseline adaptation
    pub adaptation_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calibration_samples: DEFAULT_CALIBRATION_SAMPLES,
            max_history: DEFAULT_MAX_HISTORY,
            max_alert_history: DEFAULT_MAX_ALERT_HISTORY,
            default_language: Language::English,
            weights: ScoringWeights::default(),
            trend_window: DEFAULT_TREND_WINDOW,
            adaptation_min_samples: MIN_ADAPTATION_SAMPLES,
            adaptation_rate: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.calibration_samples == 0 {
            return Err(EngineError::InvalidConfig(
                "calibration_samples must be at least 1".to_string(),
            ));
        }
        if self.max_history == 0 {
            return Err(EngineError::InvalidConfig(
                "max_history must be at least 1".to_string(),
            ));
        }
        if self.max_alert_history == 0 {
            return Err(EngineError::InvalidConfig(
                "max_alert_history must be at least 1".to_string(),
            ));
        }
        if self.trend_window < MIN_TREND_POINTS {
            return Err(EngineError::InvalidConfig(format!(
                "trend_window must be at least {}",
                MIN_TREND_POINTS
            )));
        }
        if !(0.0..=1.0).contains(&self.adaptation_rate) {
            return Err(EngineError::InvalidConfig(format!(
                "adaptation_rate must be within [0, 1], got {}",
                self.adaptation_rate
            )));
        }
        self.weights.validate()
    }

    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration_samples, 15);
        assert_eq!(config.max_history, 1000);
        assert_eq!(config.trend_window, 20);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"calibration_samples": 5, "default_language": "pidgin"}"#)
            .unwrap();
        assert_eq!(config.calibration_samples, 5);
        assert_eq!(config.default_language, Language::Pidgin);
        assert_eq!(config.max_history, DEFAULT_MAX_HISTORY);
        assert_eq!(config.weights, ScoringWeights::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = EngineConfig::from_json(r#"{"trend_window": 2}"#).unwrap_err();
        assert_eq!(err.reason(), "invalid_config");

        let err = EngineConfig::from_json(r#"{"max_history": 0}"#).unwrap_err();
        assert_eq!(err.reason(), "invalid_config");

        let err = EngineConfig::from_json(
            r#"{"weights": {"heart_rate": 0.5, "hrv": 0.5, "spo2": 0.5, "temperature": 0.5}}"#,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "invalid_weights");
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.reason(), "invalid_json");
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig {
            calibration_samples: 8,
            ..EngineConfig::default()
        };
        let restored = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
