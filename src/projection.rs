//! Trend analysis and risk projection
//!
//! Fits a least-squares line through recent composite scores, extrapolates
//! it forward with per-hour dampening, and simulates what named
//! interventions or adverse behaviours would do to the score.
//!
//! One score step is treated as one hour when extrapolating.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::stats::{clamp_score, linear_regression, round1, std_dev};
use crate::zones::{classify_zone, Zone};

/// Minimum scores for a fitted trend
pub const MIN_TREND_POINTS: usize = 3;

/// Default number of recent scores fitted
pub const DEFAULT_TREND_WINDOW: usize = 20;

/// Slope (points per step) beyond which a trend is improving/declining
pub const TREND_SLOPE_THRESHOLD: f64 = 1.5;

/// Std dev above which a flat series counts as volatile
pub const VOLATILITY_THRESHOLD: f64 = 10.0;

/// Confidence reported when there are too few points to fit
pub const LOW_CONFIDENCE: f64 = 0.2;

const MIN_FIT_CONFIDENCE: f64 = 0.3;
const MAX_FIT_CONFIDENCE: f64 = 0.95;

/// Per-hour multiplier applied to the slope as the horizon grows
pub const PROJECTION_DAMPENING: f64 = 0.9;

/// Envelope width at zero confidence
const ENVELOPE_POINTS: f64 = 20.0;

/// Default projection horizon in hours
pub const DEFAULT_PROJECTION_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    Volatile,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
            TrendDirection::Volatile => "volatile",
        }
    }
}

/// Fitted trend over recent scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    /// Points per step
    pub slope: f64,
    /// Fit R², limited to [0.3, 0.95]; 0.2 when unfitted
    pub confidence: f64,
    pub readings_analyzed: usize,
    pub std_dev: f64,
    pub projected_score_1h: f64,
    pub projected_score_24h: f64,
    pub projected_zone_1h: Zone,
    pub projected_zone_24h: Zone,
}

/// Fit a trend through `scores` (oldest first).
///
/// Fewer than three scores give a stable, low-confidence trend with flat
/// projections from the last score (50 when there is none).
pub fn calculate_trend(scores: &[f64]) -> TrendAnalysis {
    let last = scores.last().copied().unwrap_or(50.0);

    let fit = if scores.len() >= MIN_TREND_POINTS {
        linear_regression(scores)
    } else {
        None
    };

    let Some(fit) = fit else {
        let flat = clamp_score(last);
        return TrendAnalysis {
            direction: TrendDirection::Stable,
            slope: 0.0,
            confidence: LOW_CONFIDENCE,
            readings_analyzed: scores.len(),
            std_dev: std_dev(scores),
            projected_score_1h: flat,
            projected_score_24h: flat,
            projected_zone_1h: classify_zone(flat),
            projected_zone_24h: classify_zone(flat),
        };
    };

    let spread = std_dev(scores);
    let direction = if fit.slope > TREND_SLOPE_THRESHOLD {
        TrendDirection::Improving
    } else if fit.slope < -TREND_SLOPE_THRESHOLD {
        TrendDirection::Declining
    } else if spread > VOLATILITY_THRESHOLD {
        TrendDirection::Volatile
    } else {
        TrendDirection::Stable
    };

    let p1 = clamp_score(last + fit.slope);
    let p24 = clamp_score(last + fit.slope * 24.0);

    TrendAnalysis {
        direction,
        slope: fit.slope,
        confidence: fit.r_squared.clamp(MIN_FIT_CONFIDENCE, MAX_FIT_CONFIDENCE),
        readings_analyzed: scores.len(),
        std_dev: spread,
        projected_score_1h: round1(p1),
        projected_score_24h: round1(p24),
        projected_zone_1h: classify_zone(p1),
        projected_zone_24h: classify_zone(p24),
    }
}

/// Trend over the most recent `window` scores
pub fn trend_over_window(scores: &[f64], window: usize) -> TrendAnalysis {
    let start = scores.len().saturating_sub(window);
    calculate_trend(&scores[start..])
}

/// Hour-by-hour projection of the composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProjection {
    pub current_score: f64,
    pub current_zone: Zone,
    pub hours_ahead: u32,
    /// Scores for hours 1..=hours_ahead
    pub projected_scores: Vec<f64>,
    pub projected_zones: Vec<Zone>,
    pub trend: TrendDirection,
    pub slope: f64,
    pub confidence: f64,
    /// First hour whose zone differs from the current zone
    pub time_to_zone_change: Option<u32>,
    pub worst_case_score: f64,
    pub best_case_score: f64,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Dampened score path for hours 1..=hours starting from `current`
fn dampened_path(current: f64, slope: f64, hours: u32) -> Vec<f64> {
    let mut score = current;
    (1..=hours)
        .map(|h| {
            score = clamp_score(score + slope * PROJECTION_DAMPENING.powi(h as i32 - 1));
            round1(score)
        })
        .collect()
}

/// Project the score `hours` ahead from the trend of `history` (oldest first).
pub fn project_risk(current: f64, history: &[f64], hours: u32) -> RiskProjection {
    let trend = trend_over_window(history, DEFAULT_TREND_WINDOW);
    let current_zone = classify_zone(current);

    let projected_scores = dampened_path(current, trend.slope, hours);
    let projected_zones: Vec<Zone> = projected_scores.iter().map(|&s| classify_zone(s)).collect();

    let time_to_zone_change = projected_zones
        .iter()
        .position(|z| *z != current_zone)
        .map(|i| i as u32 + 1);

    let margin = (1.0 - trend.confidence) * ENVELOPE_POINTS;
    let lowest = projected_scores.iter().copied().fold(current, f64::min);
    let highest = projected_scores.iter().copied().fold(current, f64::max);

    let risk_factors = risk_factors(
        current_zone,
        &trend,
        projected_zones.last().copied(),
        time_to_zone_change,
    );

    RiskProjection {
        current_score: current,
        current_zone,
        hours_ahead: hours,
        projected_scores,
        projected_zones,
        trend: trend.direction,
        slope: trend.slope,
        confidence: trend.confidence,
        time_to_zone_change,
        worst_case_score: round1(clamp_score(lowest - margin)),
        best_case_score: round1(clamp_score(highest + margin)),
        risk_factors,
        recommendations: zone_recommendations(current_zone, trend.direction),
    }
}

fn risk_factors(
    current_zone: Zone,
    trend: &TrendAnalysis,
    final_zone: Option<Zone>,
    time_to_zone_change: Option<u32>,
) -> Vec<String> {
    let mut factors = Vec::new();

    match trend.direction {
        TrendDirection::Declining => factors.push(format!(
            "Score is declining by {:.1} points per reading",
            -trend.slope
        )),
        TrendDirection::Volatile => {
            factors.push("Score is fluctuating widely between readings".to_string())
        }
        TrendDirection::Improving | TrendDirection::Stable => {}
    }

    if current_zone.is_critical() {
        factors.push(format!(
            "Currently in {} zone",
            current_zone.as_str().to_uppercase()
        ));
    }

    if let (Some(zone), Some(hours)) = (final_zone, time_to_zone_change) {
        if zone > current_zone {
            factors.push(format!(
                "Projected to reach {} zone within {} hour(s)",
                zone.as_str().to_uppercase(),
                hours
            ));
        }
    }

    factors
}

fn zone_recommendations(zone: Zone, direction: TrendDirection) -> Vec<String> {
    let mut recs: Vec<String> = match zone {
        Zone::Red => vec![
            "Stop all activity and rest immediately",
            "Sit or lie down somewhere cool and quiet",
            "Seek medical help if you feel chest pain, dizziness or shortness of breath",
        ],
        Zone::Orange => vec![
            "Take a 15-30 minute rest break",
            "Practice deep breathing for 5 minutes",
            "Drink a glass of water",
        ],
        Zone::Yellow => vec![
            "Consider a short break",
            "Try a few minutes of slow breathing",
        ],
        Zone::Green => vec!["Maintain your current routine"],
    }
    .into_iter()
    .map(String::from)
    .collect();

    if direction == TrendDirection::Declining && zone != Zone::Red {
        recs.push("Your score is trending down - consider slowing your pace".to_string());
    }
    recs
}

/// Heart rate implied by a score change: each lost point adds half a beat
pub fn estimate_hr_impact(heart_rate: f64, score_change: f64) -> f64 {
    (heart_rate - score_change * 0.5).clamp(40.0, 200.0)
}

/// HRV implied by a score change: each gained point adds 0.4 ms
pub fn estimate_hrv_impact(hrv: f64, score_change: f64) -> f64 {
    (hrv + score_change * 0.4).clamp(5.0, 150.0)
}

/// Simulation horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
}

impl Horizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Immediate => "immediate",
            Horizon::OneHour => "1h",
            Horizon::OneDay => "24h",
        }
    }

    /// Longer horizons are less certain
    pub fn confidence(&self) -> f64 {
        match self {
            Horizon::Immediate => 0.85,
            Horizon::OneHour => 0.7,
            Horizon::OneDay => 0.5,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "immediate" | "now" => Ok(Horizon::Immediate),
            "1h" | "hour" => Ok(Horizon::OneHour),
            "24h" | "day" => Ok(Horizon::OneDay),
            other => Err(format!("unknown horizon: {}", other)),
        }
    }
}

/// Score deltas for one named scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioEffect {
    pub name: &'static str,
    pub description: &'static str,
    pub immediate: f64,
    pub one_hour: f64,
    pub one_day: f64,
}

impl ScenarioEffect {
    pub fn delta(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Immediate => self.immediate,
            Horizon::OneHour => self.one_hour,
            Horizon::OneDay => self.one_day,
        }
    }
}

pub static INTERVENTIONS: [ScenarioEffect; 7] = [
    ScenarioEffect {
        name: "rest_15min",
        description: "a 15-minute rest",
        immediate: 5.0,
        one_hour: 8.0,
        one_day: 3.0,
    },
    ScenarioEffect {
        name: "rest_30min",
        description: "a 30-minute rest",
        immediate: 8.0,
        one_hour: 12.0,
        one_day: 5.0,
    },
    ScenarioEffect {
        name: "deep_breathing_5min",
        description: "5 minutes of deep breathing",
        immediate: 4.0,
        one_hour: 6.0,
        one_day: 2.0,
    },
    ScenarioEffect {
        name: "meditation",
        description: "a short meditation",
        immediate: 3.0,
        one_hour: 7.0,
        one_day: 4.0,
    },
    ScenarioEffect {
        name: "hydration",
        description: "drinking water",
        immediate: 2.0,
        one_hour: 4.0,
        one_day: 3.0,
    },
    ScenarioEffect {
        name: "light_walk",
        description: "a light walk",
        immediate: 1.0,
        one_hour: 5.0,
        one_day: 4.0,
    },
    ScenarioEffect {
        name: "good_sleep",
        description: "a full night of good sleep",
        immediate: 0.0,
        one_hour: 0.0,
        one_day: 15.0,
    },
];

pub static ADVERSE_BEHAVIORS: [ScenarioEffect; 5] = [
    ScenarioEffect {
        name: "continued_stress",
        description: "continued stress",
        immediate: -3.0,
        one_hour: -8.0,
        one_day: -15.0,
    },
    ScenarioEffect {
        name: "poor_sleep",
        description: "a night of poor sleep",
        immediate: 0.0,
        one_hour: -5.0,
        one_day: -12.0,
    },
    ScenarioEffect {
        name: "caffeine_excess",
        description: "too much caffeine",
        immediate: -2.0,
        one_hour: -5.0,
        one_day: -3.0,
    },
    ScenarioEffect {
        name: "dehydration",
        description: "not drinking enough water",
        immediate: -1.0,
        one_hour: -4.0,
        one_day: -8.0,
    },
    ScenarioEffect {
        name: "skipped_meals",
        description: "skipping meals",
        immediate: -1.0,
        one_hour: -3.0,
        one_day: -6.0,
    },
];

/// Find a scenario by name. `deep_breathing` is accepted for the 5-minute exercise.
pub fn find_scenario(name: &str) -> Option<&'static ScenarioEffect> {
    let name = match name.trim() {
        "deep_breathing" => "deep_breathing_5min",
        other => other,
    };
    INTERVENTIONS
        .iter()
        .chain(ADVERSE_BEHAVIORS.iter())
        .find(|e| e.name == name)
}

/// Outcome of a what-if simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfScenario {
    pub scenario_name: String,
    pub horizon: Horizon,
    pub current_score: f64,
    pub projected_score: f64,
    pub score_change: f64,
    pub current_zone: Zone,
    pub new_zone: Zone,
    pub zone_changed: bool,
    pub confidence: f64,
    pub explanation: String,
}

/// Apply a named scenario's delta to `current`.
///
/// Unknown names produce no change with low confidence.
pub fn simulate_scenario(name: &str, current: f64, horizon: Horizon) -> WhatIfScenario {
    let current_zone = classify_zone(current);

    let Some(effect) = find_scenario(name) else {
        return WhatIfScenario {
            scenario_name: name.to_string(),
            horizon,
            current_score: current,
            projected_score: current,
            score_change: 0.0,
            current_zone,
            new_zone: current_zone,
            zone_changed: false,
            confidence: LOW_CONFIDENCE,
            explanation: format!("No modelled effect for '{}'", name),
        };
    };

    let projected = round1(clamp_score(current + effect.delta(horizon)));
    let change = round1(projected - current);
    let new_zone = classify_zone(projected);

    let when = match horizon {
        Horizon::Immediate => "right away",
        Horizon::OneHour => "within an hour",
        Horizon::OneDay => "over the next day",
    };
    let mut explanation = if change > 0.0 {
        format!(
            "{} could raise your score by {:.1} points {}",
            capitalize(effect.description),
            change,
            when
        )
    } else if change < 0.0 {
        format!(
            "{} could lower your score by {:.1} points {}",
            capitalize(effect.description),
            -change,
            when
        )
    } else {
        format!(
            "{} is not expected to change your score {}",
            capitalize(effect.description),
            when
        )
    };
    if new_zone != current_zone {
        explanation.push_str(&format!(
            ", moving you from {} to {}",
            current_zone.as_str().to_uppercase(),
            new_zone.as_str().to_uppercase()
        ));
    }

    WhatIfScenario {
        scenario_name: name.to_string(),
        horizon,
        current_score: current,
        projected_score: projected,
        score_change: change,
        current_zone,
        new_zone,
        zone_changed: new_zone != current_zone,
        confidence: horizon.confidence(),
        explanation,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Maximum interventions returned by [`improvement_path`]
pub const MAX_IMPROVEMENT_STEPS: usize = 5;

/// Interventions ranked by one-hour effect, best first. Empty in the green zone.
pub fn improvement_path(current: f64) -> Vec<WhatIfScenario> {
    if classify_zone(current) == Zone::Green {
        return Vec::new();
    }

    let mut options: Vec<WhatIfScenario> = INTERVENTIONS
        .iter()
        .filter(|e| e.one_hour > 0.0)
        .map(|e| simulate_scenario(e.name, current, Horizon::OneHour))
        .collect();

    options.sort_by(|a, b| b.score_change.total_cmp(&a.score_change));
    options.truncate(MAX_IMPROVEMENT_STEPS);
    options
}

/// Behaviour assumed when charting a trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Follow the current trend
    Current,
    /// Rest and recover
    Positive,
    /// Keep up stressors
    Negative,
}

impl FromStr for Behavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(Behavior::Current),
            "positive" => Ok(Behavior::Positive),
            "negative" => Ok(Behavior::Negative),
            other => Err(format!("unknown behavior: {}", other)),
        }
    }
}

const POSITIVE_TARGET: f64 = 85.0;
const NEGATIVE_TARGET: f64 = 25.0;
const BEHAVIOR_APPROACH: f64 = 0.85;

/// Inclusive score band of one zone, for charting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub zone: Zone,
    pub min: f64,
    pub max: f64,
}

/// Chart-ready trajectory over hours 0..=hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTrajectory {
    pub behavior: Behavior,
    pub hours: Vec<u32>,
    pub scores: Vec<f64>,
    pub zones: Vec<Zone>,
    pub zone_boundaries: Vec<ZoneBand>,
    /// `(hour, zone)` wherever the zone differs from the previous hour
    pub zone_changes: Vec<(u32, Zone)>,
}

/// Score trajectory under an assumed behaviour.
///
/// Positive and negative behaviour approach a recovered or strained level
/// geometrically; current behaviour follows the dampened trend of `history`.
pub fn risk_trajectory(current: f64, history: &[f64], behavior: Behavior, hours: u32) -> RiskTrajectory {
    let start = clamp_score(current);
    let mut scores = vec![round1(start)];

    match behavior {
        Behavior::Current => {
            let slope = trend_over_window(history, DEFAULT_TREND_WINDOW).slope;
            scores.extend(dampened_path(start, slope, hours));
        }
        Behavior::Positive | Behavior::Negative => {
            let target = if behavior == Behavior::Positive {
                POSITIVE_TARGET.max(start)
            } else {
                NEGATIVE_TARGET.min(start)
            };
            scores.extend((1..=hours).map(|h| {
                let progress = 1.0 - BEHAVIOR_APPROACH.powi(h as i32);
                round1(clamp_score(start + (target - start) * progress))
            }));
        }
    }

    let zones: Vec<Zone> = scores.iter().map(|&s| classify_zone(s)).collect();
    let zone_changes = zones
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1])
        .map(|(i, w)| (i as u32 + 1, w[1]))
        .collect();

    RiskTrajectory {
        behavior,
        hours: (0..=hours).collect(),
        scores,
        zones,
        zone_boundaries: Zone::ALL
            .iter()
            .map(|&zone| {
                let (min, max) = zone.boundaries();
                ZoneBand { zone, min, max }
            })
            .collect(),
        zone_changes,
    }
}

/// Default recovery target (bottom of the green zone)
pub const DEFAULT_RECOVERY_TARGET: f64 = 80.0;

/// Default intervention for recovery estimates
pub const DEFAULT_RECOVERY_INTERVENTION: &str = "rest_30min";

/// Buffer applied to recovery estimates
const RECOVERY_UNCERTAINTY: f64 = 1.2;

/// Time needed to reach a target score with one intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEstimate {
    pub current_score: f64,
    pub target_score: f64,
    pub intervention: String,
    /// Points per hour credited to the intervention
    pub hourly_rate: f64,
    /// `None` when the intervention does not raise the score
    pub estimated_hours: Option<u32>,
    pub confidence: f64,
    pub message: String,
}

/// Estimate hours to recover from `current` to `target` using `intervention`.
///
/// Hours are `ceil(gap * 1.2 / rate)`. A non-positive hourly rate cannot
/// close the gap, so the estimate is reported as unavailable.
pub fn project_recovery_time(current: f64, target: f64, intervention: &str) -> RecoveryEstimate {
    let hourly_rate = find_scenario(intervention)
        .map(|e| e.one_hour)
        .unwrap_or(0.0);
    let gap = target - current;

    let (estimated_hours, confidence, message) = if gap <= 0.0 {
        (
            Some(0),
            0.9,
            format!("Already at or above target score of {:.0}", target),
        )
    } else if hourly_rate <= 0.0 {
        (
            None,
            0.0,
            format!(
                "Recovery time cannot be estimated for {}",
                intervention
            ),
        )
    } else {
        let hours = (gap * RECOVERY_UNCERTAINTY / hourly_rate).ceil() as u32;
        let confidence = (0.8 - 0.05 * hours as f64).clamp(0.2, 0.8);
        (
            Some(hours),
            round1(confidence * 100.0) / 100.0,
            format!(
                "About {} hour(s) of {} to reach a score of {:.0}",
                hours, intervention, target
            ),
        )
    };

    RecoveryEstimate {
        current_score: current,
        target_score: target,
        intervention: intervention.to_string(),
        hourly_rate,
        estimated_hours,
        confidence,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insufficient_data_is_stable() {
        let trend = calculate_trend(&[70.0, 72.0]);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.confidence < 0.5);
        assert_eq!(trend.projected_score_1h, 72.0);

        let single = calculate_trend(&[75.0]);
        assert_eq!(single.projected_score_1h, 75.0);
        assert_eq!(single.projected_score_24h, 75.0);

        let empty = calculate_trend(&[]);
        assert_eq!(empty.direction, TrendDirection::Stable);
        assert_eq!(empty.readings_analyzed, 0);
    }

    #[test]
    fn test_improving_and_declining() {
        let up = calculate_trend(&[60.0, 65.0, 70.0, 75.0, 80.0]);
        assert_eq!(up.direction, TrendDirection::Improving);
        assert!(up.slope > 0.0);
        assert_eq!(up.readings_analyzed, 5);
        assert_eq!(up.confidence, 0.95);

        let down = calculate_trend(&[100.0, 90.0, 80.0, 70.0, 60.0]);
        assert_eq!(down.direction, TrendDirection::Declining);
        assert!(down.slope < 0.0);
        assert!(down.projected_score_24h < 60.0);
        assert_eq!(down.projected_score_24h, 0.0);
    }

    #[test]
    fn test_stable_and_volatile() {
        let flat = calculate_trend(&[70.0, 71.0, 70.0, 71.0, 70.0]);
        assert_eq!(flat.direction, TrendDirection::Stable);

        let choppy = calculate_trend(&[50.0, 80.0, 50.0, 80.0, 50.0]);
        assert!(choppy.slope.abs() < TREND_SLOPE_THRESHOLD);
        assert_eq!(choppy.direction, TrendDirection::Volatile);
        assert_eq!(choppy.confidence, 0.3);
    }

    #[test]
    fn test_project_risk_basic() {
        let p = project_risk(80.0, &[], DEFAULT_PROJECTION_HOURS);
        assert_eq!(p.current_zone, Zone::Green);
        assert_eq!(p.projected_scores.len(), 24);
        assert!(p.projected_scores.iter().all(|&s| s == 80.0));
        assert_eq!(p.time_to_zone_change, None);

        let short = project_risk(80.0, &[], 12);
        assert_eq!(short.projected_scores.len(), 12);
    }

    #[test]
    fn test_project_risk_with_trend() {
        let up = project_risk(80.0, &[60.0, 65.0, 70.0, 75.0, 80.0], 24);
        assert_eq!(up.trend, TrendDirection::Improving);

        let down = project_risk(70.0, &[90.0, 85.0, 80.0, 75.0, 70.0], 24);
        assert_eq!(down.trend, TrendDirection::Declining);
        assert!(!down.risk_factors.is_empty());
        // -5, -4.5, ... crosses 55 in the fourth hour
        assert_eq!(down.time_to_zone_change, Some(4));
        assert_eq!(down.projected_zones[3], Zone::Orange);
    }

    #[test]
    fn test_dampening_slows_projection() {
        let p = project_risk(50.0, &[30.0, 35.0, 40.0, 45.0, 50.0], 24);
        let first_step = p.projected_scores[0] - 50.0;
        let last_step = p.projected_scores[23] - p.projected_scores[22];
        assert!((first_step - 5.0).abs() < 0.01);
        assert!(last_step < first_step);
        // geometric series bounds the total climb at slope / (1 - 0.9)
        assert!(p.projected_scores[23] < 100.0);
    }

    #[test]
    fn test_recommendations_by_zone() {
        let red = project_risk(20.0, &[], 24);
        assert!(red.recommendations[0].contains("Stop all activity"));

        let green = project_risk(90.0, &[], 24);
        assert!(green
            .recommendations
            .iter()
            .any(|r| r.to_lowercase().contains("maintain")));

        let orange = project_risk(41.0, &[], 24);
        assert_eq!(orange.current_zone, Zone::Orange);
        assert!(orange
            .recommendations
            .iter()
            .any(|r| r.to_lowercase().contains("rest")));
    }

    #[test]
    fn test_envelope_bounds() {
        let p = project_risk(86.0, &[], 24);
        // confidence 0.2 widens by 16 points
        assert_eq!(p.worst_case_score, 70.0);
        assert_eq!(p.best_case_score, 100.0);

        for score in [5.0, 50.0, 99.0] {
            let p = project_risk(score, &[], 24);
            assert!(p.projected_scores.iter().all(|s| (0.0..=100.0).contains(s)));
            assert!((0.0..=100.0).contains(&p.worst_case_score));
            assert!((0.0..=100.0).contains(&p.best_case_score));
        }
    }

    #[test]
    fn test_physiological_impacts() {
        assert!(estimate_hr_impact(70.0, -10.0) > 70.0);
        assert!(estimate_hr_impact(80.0, 10.0) < 80.0);
        assert_eq!(estimate_hr_impact(195.0, -40.0), 200.0);
        assert_eq!(estimate_hr_impact(45.0, 40.0), 40.0);

        assert!(estimate_hrv_impact(45.0, -10.0) < 45.0);
        assert!(estimate_hrv_impact(30.0, 10.0) > 30.0);
        assert_eq!(estimate_hrv_impact(8.0, -20.0), 5.0);
    }

    #[test]
    fn test_simulate_interventions() {
        let breathing = simulate_scenario("deep_breathing_5min", 60.0, Horizon::OneHour);
        assert!(breathing.score_change > 0.0);
        assert!(breathing.projected_score > 60.0);
        assert!(breathing.explanation.len() > 10);

        let alias = simulate_scenario("deep_breathing", 60.0, Horizon::OneHour);
        assert_eq!(alias.projected_score, breathing.projected_score);

        let stress = simulate_scenario("continued_stress", 70.0, Horizon::OneHour);
        assert!(stress.score_change < 0.0);
        assert!(stress.projected_score < 70.0);
    }

    #[test]
    fn test_unknown_scenario() {
        let result = simulate_scenario("unknown_thing", 70.0, Horizon::OneHour);
        assert_eq!(result.score_change, 0.0);
        assert!(result.confidence < 0.5);
        assert!(!result.zone_changed);
    }

    #[test]
    fn test_scenario_zone_change() {
        let result = simulate_scenario("rest_30min", 52.0, Horizon::OneHour);
        assert_eq!(result.projected_score, 64.0);
        assert!(result.zone_changed);
        assert_eq!(result.new_zone, Zone::Yellow);
        assert!(result.explanation.contains("ORANGE to YELLOW"));
    }

    #[test]
    fn test_confidence_by_horizon() {
        let now = simulate_scenario("rest_15min", 60.0, Horizon::Immediate);
        let hour = simulate_scenario("rest_15min", 60.0, Horizon::OneHour);
        let day = simulate_scenario("rest_15min", 60.0, Horizon::OneDay);
        assert!(now.confidence > hour.confidence);
        assert!(hour.confidence > day.confidence);
    }

    #[test]
    fn test_clamped_change_near_ceiling() {
        let result = simulate_scenario("rest_30min", 95.0, Horizon::OneHour);
        assert_eq!(result.projected_score, 100.0);
        assert_eq!(result.score_change, 5.0);
    }

    #[test]
    fn test_improvement_path() {
        assert!(improvement_path(90.0).is_empty());

        let path = improvement_path(41.0);
        assert_eq!(path.len(), MAX_IMPROVEMENT_STEPS);
        assert_eq!(path[0].scenario_name, "rest_30min");
        assert!(path.windows(2).all(|w| w[0].score_change >= w[1].score_change));
        assert!(path.iter().any(|s| s.scenario_name.contains("rest")));
        assert!(path.iter().all(|s| s.scenario_name != "good_sleep"));
    }

    #[test]
    fn test_effect_tables() {
        assert!(INTERVENTIONS
            .iter()
            .all(|e| e.immediate > 0.0 || e.one_hour > 0.0 || e.one_day > 0.0));
        assert!(ADVERSE_BEHAVIORS
            .iter()
            .all(|e| e.immediate < 0.0 || e.one_hour < 0.0 || e.one_day < 0.0));
    }

    #[test]
    fn test_trajectory_shape() {
        let t = risk_trajectory(80.0, &[], Behavior::Current, 12);
        assert_eq!(t.hours.len(), 13);
        assert_eq!(t.scores.len(), 13);
        assert_eq!(t.zones.len(), 13);
        assert_eq!(t.zone_boundaries.len(), 4);
        assert!(t.zone_changes.is_empty());
    }

    #[test]
    fn test_trajectory_behaviors() {
        let up = risk_trajectory(60.0, &[], Behavior::Positive, 10);
        assert!(up.scores.windows(2).all(|w| w[1] >= w[0]));
        assert!(up.scores[10] > 75.0);

        let down = risk_trajectory(80.0, &[], Behavior::Negative, 10);
        assert!(down.scores.windows(2).all(|w| w[1] <= w[0]));
        assert!(!down.zone_changes.is_empty());
        assert_eq!(down.zone_changes[0].1, Zone::Yellow);
    }

    #[test]
    fn test_recovery_time() {
        let done = project_recovery_time(85.0, 80.0, DEFAULT_RECOVERY_INTERVENTION);
        assert_eq!(done.estimated_hours, Some(0));
        assert!(done.message.contains("Already"));

        // gap 30 at 12/h with 20% buffer: ceil(3.0) = 3
        let est = project_recovery_time(50.0, 80.0, "rest_30min");
        assert_eq!(est.estimated_hours, Some(3));
        assert!(est.confidence > 0.0);

        let meditation = project_recovery_time(60.0, DEFAULT_RECOVERY_TARGET, "meditation");
        assert!(meditation.message.contains("meditation"));
        assert_eq!(meditation.estimated_hours, Some(4));
    }

    #[test]
    fn test_recovery_inestimable() {
        let est = project_recovery_time(50.0, 80.0, "continued_stress");
        assert_eq!(est.estimated_hours, None);
        let est = project_recovery_time(50.0, 80.0, "good_sleep");
        assert_eq!(est.estimated_hours, None);
    }

    #[test]
    fn test_horizon_parsing() {
        assert_eq!("1h".parse::<Horizon>().unwrap(), Horizon::OneHour);
        assert_eq!("24H".parse::<Horizon>().unwrap(), Horizon::OneDay);
        assert!("week".parse::<Horizon>().is_err());
    }
}
