//! Component scoring
//!
//! Each vital is mapped to a 0-100 sub-score through a piecewise-linear
//! curve. Heart rate and HRV are judged relative to the session baseline,
//! SpO2 against absolute thresholds and temperature by absolute deviation.
//! The four sub-scores combine into a weighted composite.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::baseline::Baseline;
use crate::error::EngineError;
use crate::stats::{clamp_score, round1};
use crate::types::{ComponentScore, ComponentScores, Metric, Sample};

/// Allowed drift of the weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// Walk a descending piecewise-linear curve.
///
/// `points` are `(deviation, score)` pairs with increasing deviation; the
/// score past the last point keeps falling at the final segment's slope
/// and is floored at zero.
fn piecewise(deviation: f64, points: &[(f64, f64)]) -> f64 {
    if deviation <= points[0].0 {
        return points[0].1;
    }
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if deviation <= x1 {
            return y0 + (deviation - x0) * (y1 - y0) / (x1 - x0);
        }
    }

    let n = points.len();
    let (x0, y0) = points[n - 2];
    let (x1, y1) = points[n - 1];
    let slope = (y1 - y0) / (x1 - x0);
    (y1 + (deviation - x1) * slope).max(0.0)
}

const HEART_RATE_CURVE: [(f64, f64); 4] = [(0.0, 100.0), (10.0, 80.0), (25.0, 40.0), (50.0, 10.0)];
const HEART_RATE_TAIL: f64 = 0.2;

const HRV_CURVE: [(f64, f64); 4] = [(0.0, 100.0), (15.0, 80.0), (30.0, 50.0), (50.0, 20.0)];
const HRV_TAIL: f64 = 0.8;

const TEMPERATURE_CURVE: [(f64, f64); 5] = [
    (0.3, 100.0),
    (0.5, 90.0),
    (1.0, 70.0),
    (1.5, 50.0),
    (3.5, 0.0),
];

/// Score heart rate by percentage increase over the resting baseline.
///
/// At or below baseline scores 100. A non-positive baseline yields the
/// neutral `unknown` score.
pub fn score_heart_rate(current: f64, baseline: f64) -> ComponentScore {
    if baseline <= 0.0 {
        return ComponentScore::unknown();
    }
    let increase_pct = (current - baseline) / baseline * 100.0;
    ComponentScore::new(tail_curve(increase_pct, &HEART_RATE_CURVE, HEART_RATE_TAIL))
}

/// Score HRV by percentage drop below the resting baseline.
///
/// HRV at or above baseline scores 100.
pub fn score_hrv(current: f64, baseline: f64) -> ComponentScore {
    if baseline <= 0.0 {
        return ComponentScore::unknown();
    }
    let drop_pct = (baseline - current) / baseline * 100.0;
    ComponentScore::new(tail_curve(drop_pct, &HRV_CURVE, HRV_TAIL))
}

// Past the last breakpoint the score falls by `tail` per percentage point.
fn tail_curve(deviation: f64, points: &[(f64, f64)], tail: f64) -> f64 {
    let (last_x, last_y) = points[points.len() - 1];
    if deviation > last_x {
        return (last_y - (deviation - last_x) * tail).max(0.0);
    }
    piecewise(deviation, points)
}

/// Score blood oxygen against absolute thresholds.
///
/// Safe oxygenation is not personal, so no baseline is involved.
pub fn score_spo2(current: f64) -> ComponentScore {
    let score = if current >= 97.0 {
        100.0
    } else if current >= 95.0 {
        90.0 + (current - 95.0) * 5.0
    } else if current >= 92.0 {
        60.0 + (current - 92.0) * 10.0
    } else if current >= 88.0 {
        20.0 + (current - 88.0) * 10.0
    } else {
        (20.0 - (88.0 - current) * 2.5).max(0.0)
    };
    ComponentScore::new(score)
}

/// Score skin temperature by absolute deviation from baseline, either direction
pub fn score_temperature(current: f64, baseline: f64) -> ComponentScore {
    if baseline <= 0.0 {
        return ComponentScore::unknown();
    }
    let deviation = (current - baseline).abs();
    ComponentScore::new(piecewise(deviation, &TEMPERATURE_CURVE))
}

/// Composite weights; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub heart_rate: f64,
    pub hrv: f64,
    pub spo2: f64,
    pub temperature: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            heart_rate: 0.25,
            hrv: 0.40,
            spo2: 0.20,
            temperature: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Build weights from a name -> weight map; all four keys are required
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, EngineError> {
        let get = |m: Metric| {
            map.get(m.as_str())
                .copied()
                .ok_or_else(|| EngineError::InvalidWeights(format!("missing weight: {}", m)))
        };
        let weights = Self {
            heart_rate: get(Metric::HeartRate)?,
            hrv: get(Metric::Hrv)?,
            spo2: get(Metric::Spo2)?,
            temperature: get(Metric::Temperature)?,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::Hrv => self.hrv,
            Metric::Spo2 => self.spo2,
            Metric::Temperature => self.temperature,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for m in Metric::ALL {
            let w = self.get(m);
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::InvalidWeights(format!(
                    "weight for {} must be a non-negative number, got {}",
                    m, w
                )));
            }
        }
        let sum: f64 = Metric::ALL.iter().map(|&m| self.get(m)).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EngineError::InvalidWeights(format!(
                "weights must sum to 1.0, got {:.3}",
                sum
            )));
        }
        Ok(())
    }

    fn combine(&self, hr: f64, hrv: f64, spo2: f64, temperature: f64) -> f64 {
        let raw = hr * self.heart_rate
            + hrv * self.hrv
            + spo2 * self.spo2
            + temperature * self.temperature;
        round1(clamp_score(raw))
    }
}

/// Weighted composite with the default weights, clamped and rounded to one decimal
pub fn calculate_composite(hr: f64, hrv: f64, spo2: f64, temperature: f64) -> f64 {
    ScoringWeights::default().combine(hr, hrv, spo2, temperature)
}

/// Weighted composite with caller-supplied weights, validated first
pub fn calculate_composite_with(
    hr: f64,
    hrv: f64,
    spo2: f64,
    temperature: f64,
    weights: &ScoringWeights,
) -> Result<f64, EngineError> {
    weights.validate()?;
    Ok(weights.combine(hr, hrv, spo2, temperature))
}

/// Score every component of a sample against a baseline.
///
/// Weights are assumed validated (the engine checks them at construction).
pub fn score_sample(sample: &Sample, baseline: &Baseline, weights: &ScoringWeights) -> ComponentScores {
    let heart_rate = score_heart_rate(sample.heart_rate, baseline.resting_heart_rate);
    let hrv = score_hrv(sample.hrv, baseline.resting_hrv);
    let spo2 = score_spo2(sample.spo2);
    let temperature = score_temperature(sample.temperature, baseline.normal_temperature);

    ComponentScores {
        heart_rate,
        hrv,
        spo2,
        temperature,
        composite: weights.combine(heart_rate.score, hrv.score, spo2.score, temperature.score),
    }
}

/// Per-component breakdown for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    pub component: Metric,
    pub value: f64,
    pub baseline: f64,
    pub score: f64,
    pub status: String,
}

/// Score a sample and report value, baseline, score and status per component
pub fn score_breakdown(sample: &Sample, baseline: &Baseline) -> Vec<ComponentBreakdown> {
    let scores = score_sample(sample, baseline, &ScoringWeights::default());
    scores
        .iter()
        .map(|(metric, component)| ComponentBreakdown {
            component: metric,
            value: sample.value(metric),
            baseline: baseline.value(metric),
            score: round1(component.score),
            status: component.label.as_str().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreLabel;

    #[test]
    fn test_heart_rate_curve() {
        assert_eq!(score_heart_rate(70.0, 70.0).score, 100.0);
        assert_eq!(score_heart_rate(60.0, 70.0).score, 100.0);
        // +10% -> 80
        assert!((score_heart_rate(77.0, 70.0).score - 80.0).abs() < 0.001);
        // +25% -> 40
        assert!((score_heart_rate(87.5, 70.0).score - 40.0).abs() < 0.001);
        // +50% -> 10
        assert!((score_heart_rate(105.0, 70.0).score - 10.0).abs() < 0.001);
        // +100% -> 0
        assert_eq!(score_heart_rate(140.0, 70.0).score, 0.0);
        assert_eq!(score_heart_rate(200.0, 70.0).score, 0.0);
    }

    #[test]
    fn test_unknown_baseline() {
        let s = score_heart_rate(80.0, 0.0);
        assert_eq!((s.score, s.label.as_str()), (50.0, "unknown"));
        assert_eq!(score_hrv(40.0, -1.0).label, ScoreLabel::Unknown);
        assert_eq!(score_temperature(36.5, 0.0).score, 50.0);
    }

    #[test]
    fn test_hrv_curve() {
        assert_eq!(score_hrv(60.0, 50.0).score, 100.0);
        // -15% -> 80
        assert!((score_hrv(42.5, 50.0).score - 80.0).abs() < 0.001);
        // -30% -> 50
        assert!((score_hrv(35.0, 50.0).score - 50.0).abs() < 0.001);
        // -50% -> 20
        assert!((score_hrv(25.0, 50.0).score - 20.0).abs() < 0.001);
        // -60% -> 12
        assert!((score_hrv(20.0, 50.0).score - 12.0).abs() < 0.001);
        assert_eq!(score_hrv(5.0, 50.0).score, 0.0);
    }

    #[test]
    fn test_spo2_bands() {
        assert_eq!(score_spo2(99.0).score, 100.0);
        assert_eq!(score_spo2(97.0).score, 100.0);
        assert!((score_spo2(96.0).score - 95.0).abs() < 0.001);
        assert!((score_spo2(95.0).score - 90.0).abs() < 0.001);
        assert!((score_spo2(93.0).score - 70.0).abs() < 0.001);
        assert!((score_spo2(90.0).score - 40.0).abs() < 0.001);
        assert!((score_spo2(86.0).score - 15.0).abs() < 0.001);
        assert_eq!(score_spo2(75.0).score, 0.0);
    }

    #[test]
    fn test_temperature_deviation_either_direction() {
        assert_eq!(score_temperature(36.7, 36.5).score, 100.0);
        let warm = score_temperature(37.5, 36.5).score;
        let cool = score_temperature(35.5, 36.5).score;
        assert!((warm - 70.0).abs() < 0.001);
        assert!((cool - 70.0).abs() < 0.001);
        assert!((score_temperature(38.0, 36.5).score - 50.0).abs() < 0.001);
        assert!((score_temperature(39.0, 36.5).score - 25.0).abs() < 0.001);
        assert_eq!(score_temperature(41.0, 36.5).score, 0.0);
    }

    #[test]
    fn test_composite() {
        assert_eq!(calculate_composite(100.0, 100.0, 100.0, 100.0), 100.0);
        assert_eq!(calculate_composite(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(calculate_composite(100.0, 50.0, 100.0, 100.0), 80.0);
    }

    #[test]
    fn test_custom_weights_validated() {
        let even = ScoringWeights {
            heart_rate: 0.25,
            hrv: 0.25,
            spo2: 0.25,
            temperature: 0.25,
        };
        assert_eq!(
            calculate_composite_with(100.0, 0.0, 100.0, 0.0, &even).unwrap(),
            50.0
        );

        let bad = ScoringWeights { hrv: 0.6, ..ScoringWeights::default() };
        let err = calculate_composite_with(100.0, 100.0, 100.0, 100.0, &bad).unwrap_err();
        assert_eq!(err.reason(), "invalid_weights");

        let negative = ScoringWeights {
            heart_rate: -0.1,
            hrv: 0.75,
            spo2: 0.2,
            temperature: 0.15,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_weights_from_map() {
        let mut map = HashMap::new();
        map.insert("heart_rate".to_string(), 0.3);
        map.insert("hrv".to_string(), 0.3);
        map.insert("spo2".to_string(), 0.2);
        assert!(ScoringWeights::from_map(&map).is_err());

        map.insert("temperature".to_string(), 0.195);
        let weights = ScoringWeights::from_map(&map).unwrap();
        assert_eq!(weights.temperature, 0.195);
    }

    #[test]
    fn test_score_sample_is_pure() {
        let baseline = Baseline::from_values(65.0, 45.0, 98.0, 36.6);
        let sample = Sample::new(72.0, 40.0, 97.0, 36.9);
        let weights = ScoringWeights::default();

        let a = score_sample(&sample, &baseline, &weights);
        let b = score_sample(&sample, &baseline, &weights);
        assert_eq!(a, b);
        assert!(a.composite > 80.0 && a.composite <= 100.0);
    }

    #[test]
    fn test_breakdown() {
        let baseline = Baseline::from_values(70.0, 50.0, 98.0, 36.5);
        let rows = score_breakdown(&Sample::new(70.0, 35.0, 98.0, 36.5), &baseline);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].component, Metric::Hrv);
        assert_eq!(rows[1].score, 50.0);
        assert_eq!(rows[1].status, "fair");
    }
}
