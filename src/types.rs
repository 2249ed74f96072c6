//! Core types for the Synheart Cardio pipeline
//!
//! This module defines the data that flows between pipeline stages: validated
//! samples, the metrics and components they are scored on, and the scored
//! result of a single sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One validated biometric observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Observation time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Heart rate (bpm)
    pub heart_rate: f64,
    /// Heart-rate variability, RMSSD (ms)
    pub hrv: f64,
    /// Blood oxygen saturation (%)
    pub spo2: f64,
    /// Skin temperature (°C)
    pub temperature: f64,
}

impl Sample {
    pub fn new(heart_rate: f64, hrv: f64, spo2: f64, temperature: f64) -> Self {
        Self::at(Utc::now(), heart_rate, hrv, spo2, temperature)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        heart_rate: f64,
        hrv: f64,
        spo2: f64,
        temperature: f64,
    ) -> Self {
        Self {
            timestamp,
            heart_rate,
            hrv,
            spo2,
            temperature,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::Hrv => self.hrv,
            Metric::Spo2 => self.spo2,
            Metric::Temperature => self.temperature,
        }
    }
}

/// Measured vital sign. Also names the score component derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    Hrv,
    Spo2,
    Temperature,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::HeartRate,
        Metric::Hrv,
        Metric::Spo2,
        Metric::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::Hrv => "hrv",
            Metric::Spo2 => "spo2",
            Metric::Temperature => "temperature",
        }
    }

    /// Human-facing component name
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::HeartRate => "Heart Rate",
            Metric::Hrv => "Heart Rate Variability",
            Metric::Spo2 => "Blood Oxygen",
            Metric::Temperature => "Temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::HeartRate => "bpm",
            Metric::Hrv => "ms",
            Metric::Spo2 => "%",
            Metric::Temperature => "°C",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative label attached to a component score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLabel {
    Excellent,
    Good,
    Fair,
    Concerning,
    /// No usable baseline to compare against
    Unknown,
}

impl ScoreLabel {
    /// Label for a score using the 80/60/40 thresholds
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreLabel::Excellent
        } else if score >= 60.0 {
            ScoreLabel::Good
        } else if score >= 40.0 {
            ScoreLabel::Fair
        } else {
            ScoreLabel::Concerning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLabel::Excellent => "excellent",
            ScoreLabel::Good => "good",
            ScoreLabel::Fair => "fair",
            ScoreLabel::Concerning => "concerning",
            ScoreLabel::Unknown => "unknown",
        }
    }
}

/// A single 0-100 component score with its label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub score: f64,
    pub label: ScoreLabel,
}

impl ComponentScore {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            label: ScoreLabel::for_score(score),
        }
    }

    /// Neutral score used when the baseline cannot be divided by
    pub fn unknown() -> Self {
        Self {
            score: 50.0,
            label: ScoreLabel::Unknown,
        }
    }
}

/// Four component scores plus the weighted composite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub heart_rate: ComponentScore,
    pub hrv: ComponentScore,
    pub spo2: ComponentScore,
    pub temperature: ComponentScore,
    /// Weighted composite in [0, 100], one decimal
    pub composite: f64,
}

impl ComponentScores {
    pub fn get(&self, metric: Metric) -> ComponentScore {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::Hrv => self.hrv,
            Metric::Spo2 => self.spo2,
            Metric::Temperature => self.temperature,
        }
    }

    /// Component scores in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, ComponentScore)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    /// Lowest-scoring component. Ties resolve to the earlier component.
    pub fn weakest(&self) -> (Metric, f64) {
        let mut weakest = (Metric::HeartRate, self.heart_rate.score);
        for (metric, component) in self.iter() {
            if component.score < weakest.1 {
                weakest = (metric, component.score);
            }
        }
        weakest
    }

    /// Components scoring strictly below `threshold`
    pub fn below(&self, threshold: f64) -> Vec<Metric> {
        self.iter()
            .filter(|(_, c)| c.score < threshold)
            .map(|(m, _)| m)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(hr: f64, hrv: f64, spo2: f64, temp: f64) -> ComponentScores {
        ComponentScores {
            heart_rate: ComponentScore::new(hr),
            hrv: ComponentScore::new(hrv),
            spo2: ComponentScore::new(spo2),
            temperature: ComponentScore::new(temp),
            composite: 0.0,
        }
    }

    #[test]
    fn test_score_labels() {
        assert_eq!(ScoreLabel::for_score(80.0), ScoreLabel::Excellent);
        assert_eq!(ScoreLabel::for_score(79.9), ScoreLabel::Good);
        assert_eq!(ScoreLabel::for_score(60.0), ScoreLabel::Good);
        assert_eq!(ScoreLabel::for_score(40.0), ScoreLabel::Fair);
        assert_eq!(ScoreLabel::for_score(39.9), ScoreLabel::Concerning);
        assert_eq!(ComponentScore::unknown().label.as_str(), "unknown");
    }

    #[test]
    fn test_weakest_component() {
        let s = scores(90.0, 35.0, 100.0, 35.0);
        assert_eq!(s.weakest(), (Metric::Hrv, 35.0));
        assert_eq!(s.below(50.0), vec![Metric::Hrv, Metric::Temperature]);
    }

    #[test]
    fn test_sample_value_lookup() {
        let sample = Sample::new(72.0, 48.0, 98.0, 36.6);
        assert_eq!(sample.value(Metric::HeartRate), 72.0);
        assert_eq!(sample.value(Metric::Temperature), 36.6);
    }
}
