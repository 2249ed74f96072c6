//! Zone classification
//!
//! Maps a composite score onto one of four ordered risk zones and tracks
//! how the zone moves between samples.
//!
//! | Zone   | Score   | Label           |
//! |--------|---------|-----------------|
//! | Green  | 80-100  | Thriving        |
//! | Yellow | 55-79   | Mild Strain     |
//! | Orange | 30-54   | Elevated Risk   |
//! | Red    | 0-29    | Critical Strain |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stats::clamp_score;

/// Risk zone, ordered best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Yellow,
    Orange,
    Red,
}

/// Lower score bound of each zone
pub const GREEN_MIN: f64 = 80.0;
pub const YELLOW_MIN: f64 = 55.0;
pub const ORANGE_MIN: f64 = 30.0;

/// Score delta beyond which a change counts as improved/declined
pub const DIRECTION_THRESHOLD: f64 = 2.0;

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Green, Zone::Yellow, Zone::Orange, Zone::Red];

    /// Ordinal position, 0 = green (best) to 3 = red (worst)
    pub fn severity_index(&self) -> i32 {
        match self {
            Zone::Green => 0,
            Zone::Yellow => 1,
            Zone::Orange => 2,
            Zone::Red => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Green => "green",
            Zone::Yellow => "yellow",
            Zone::Orange => "orange",
            Zone::Red => "red",
        }
    }

    /// Inclusive score range `(min, max)`
    pub fn boundaries(&self) -> (f64, f64) {
        match self {
            Zone::Green => (GREEN_MIN, 100.0),
            Zone::Yellow => (YELLOW_MIN, 79.0),
            Zone::Orange => (ORANGE_MIN, 54.0),
            Zone::Red => (0.0, 29.0),
        }
    }

    /// Orange and red need attention
    pub fn is_critical(&self) -> bool {
        matches!(self, Zone::Orange | Zone::Red)
    }

    pub fn is_healthy(&self) -> bool {
        *self == Zone::Green
    }

    /// Next better zone, `None` for green
    pub fn next_better(&self) -> Option<Zone> {
        match self {
            Zone::Green => None,
            Zone::Yellow => Some(Zone::Green),
            Zone::Orange => Some(Zone::Yellow),
            Zone::Red => Some(Zone::Orange),
        }
    }

    pub fn metadata(&self) -> &'static ZoneMetadata {
        match self {
            Zone::Green => &GREEN_METADATA,
            Zone::Yellow => &YELLOW_METADATA,
            Zone::Orange => &ORANGE_METADATA,
            Zone::Red => &RED_METADATA,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a score. Scores outside [0, 100] are clamped first.
pub fn classify_zone(score: f64) -> Zone {
    let score = clamp_score(score);
    if score >= GREEN_MIN {
        Zone::Green
    } else if score >= YELLOW_MIN {
        Zone::Yellow
    } else if score >= ORANGE_MIN {
        Zone::Orange
    } else {
        Zone::Red
    }
}

/// Static display data for a zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneMetadata {
    pub label: &'static str,
    pub emoji: &'static str,
    pub color_hex: &'static str,
    pub description: &'static str,
    /// 0 = none, 3 = critical
    pub urgency: u8,
    pub recommended_action: &'static str,
}

static GREEN_METADATA: ZoneMetadata = ZoneMetadata {
    label: "Thriving",
    emoji: "🟢",
    color_hex: "#22C55E",
    description: "Optimal cardiovascular state. Your heart is performing excellently.",
    urgency: 0,
    recommended_action: "Maintain current lifestyle. Great job!",
};

static YELLOW_METADATA: ZoneMetadata = ZoneMetadata {
    label: "Mild Strain",
    emoji: "🟡",
    color_hex: "#EAB308",
    description: "Slight stress response detected. Minor attention recommended.",
    urgency: 1,
    recommended_action: "Consider a short break or relaxation technique.",
};

static ORANGE_METADATA: ZoneMetadata = ZoneMetadata {
    label: "Elevated Risk",
    emoji: "🟠",
    color_hex: "#F97316",
    description: "Significant cardiovascular stress detected. Active intervention suggested.",
    urgency: 2,
    recommended_action: "Take a break, practice deep breathing, stay hydrated.",
};

static RED_METADATA: ZoneMetadata = ZoneMetadata {
    label: "Critical Strain",
    emoji: "🔴",
    color_hex: "#EF4444",
    description: "High cardiovascular strain. Immediate rest strongly recommended.",
    urgency: 3,
    recommended_action: "Stop activity immediately. Rest and monitor closely.",
};

/// A score together with its zone and display metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneInfo {
    pub zone: Zone,
    pub score: f64,
    #[serde(flatten)]
    pub metadata: &'static ZoneMetadata,
}

impl ZoneInfo {
    pub fn for_score(score: f64) -> Self {
        let zone = classify_zone(score);
        Self {
            zone,
            score,
            metadata: zone.metadata(),
        }
    }

    /// e.g. `🟡 Mild Strain (62)`
    pub fn display(&self, include_score: bool) -> String {
        if include_score {
            format!("{} {} ({:.0})", self.metadata.emoji, self.metadata.label, self.score)
        } else {
            format!("{} {}", self.metadata.emoji, self.metadata.label)
        }
    }
}

/// Direction of score movement between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improved,
    Declined,
    Stable,
}

/// Zone change between consecutive samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneTransition {
    pub previous_zone: Option<Zone>,
    pub current_zone: Zone,
    pub previous_score: Option<f64>,
    pub current_score: f64,
    pub direction: Direction,
    /// Zone ordinal delta, positive = worse
    pub severity_change: i32,
    /// True exactly when the zone changed
    pub is_significant: bool,
}

impl ZoneTransition {
    /// Short user-facing description of a zone change, if there was one
    pub fn message(&self) -> Option<String> {
        if !self.is_significant {
            return None;
        }
        let previous = self.previous_zone?;
        if self.severity_change > 0 {
            Some(format!(
                "Your status moved from {} to {}",
                previous.as_str().to_uppercase(),
                self.current_zone.as_str().to_uppercase()
            ))
        } else {
            Some(format!(
                "Great improvement! Moved to {} zone",
                self.current_zone.as_str().to_uppercase()
            ))
        }
    }
}

/// Compare the current score with the previous sample.
///
/// When only `previous_score` is known the previous zone is derived from it.
/// With neither, this is a first reading: stable and not significant.
pub fn detect_zone_transition(
    current_score: f64,
    previous_score: Option<f64>,
    previous_zone: Option<Zone>,
) -> ZoneTransition {
    let current_zone = classify_zone(current_score);
    let previous_zone = previous_zone.or_else(|| previous_score.map(classify_zone));

    let direction = match previous_score {
        Some(prev) if current_score - prev > DIRECTION_THRESHOLD => Direction::Improved,
        Some(prev) if current_score - prev < -DIRECTION_THRESHOLD => Direction::Declined,
        _ => Direction::Stable,
    };

    let severity_change = previous_zone
        .map(|prev| current_zone.severity_index() - prev.severity_index())
        .unwrap_or(0);

    ZoneTransition {
        previous_zone,
        current_zone,
        previous_score,
        current_score,
        direction,
        severity_change,
        is_significant: previous_zone.is_some_and(|prev| prev != current_zone),
    }
}

/// How settled the zone has been over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStability {
    Stable,
    MinorFluctuation,
    Volatile,
}

/// Zone-level view of recent scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneTrend {
    pub direction: Direction,
    pub stability: ZoneStability,
    pub zone_changes: usize,
    pub current_zone: Zone,
    /// Most frequent zone; ties go to the first seen in the window
    pub dominant_zone: Zone,
    pub score_range: (f64, f64),
}

/// Default window for [`zone_trend`]
pub const ZONE_TREND_WINDOW: usize = 5;

/// Summarize zone movement over the last `window` scores (newest last).
///
/// Returns `None` for an empty series.
pub fn zone_trend(scores: &[f64], window: usize) -> Option<ZoneTrend> {
    let recent = &scores[scores.len().saturating_sub(window.max(1))..];
    let last = *recent.last()?;
    let zones: Vec<Zone> = recent.iter().map(|&s| classify_zone(s)).collect();

    let zone_changes = zones.windows(2).filter(|w| w[0] != w[1]).count();

    let direction = if recent.len() >= 2 {
        let avg_change = (last - recent[0]) / recent.len() as f64;
        if avg_change > DIRECTION_THRESHOLD {
            Direction::Improved
        } else if avg_change < -DIRECTION_THRESHOLD {
            Direction::Declined
        } else {
            Direction::Stable
        }
    } else {
        Direction::Stable
    };

    let stability = match zone_changes {
        0 => ZoneStability::Stable,
        1 => ZoneStability::MinorFluctuation,
        _ => ZoneStability::Volatile,
    };

    let mut dominant = (zones[0], 0usize);
    for zone in &zones {
        let count = zones.iter().filter(|z| *z == zone).count();
        if count > dominant.1 {
            dominant = (*zone, count);
        }
    }

    let min = recent.iter().copied().fold(f64::INFINITY, f64::min);
    let max = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(ZoneTrend {
        direction,
        stability,
        zone_changes,
        current_zone: zones[zones.len() - 1],
        dominant_zone: dominant.0,
        score_range: (min, max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify_zone(80.0), Zone::Green);
        assert_eq!(classify_zone(79.99), Zone::Yellow);
        assert_eq!(classify_zone(55.0), Zone::Yellow);
        assert_eq!(classify_zone(54.99), Zone::Orange);
        assert_eq!(classify_zone(30.0), Zone::Orange);
        assert_eq!(classify_zone(29.99), Zone::Red);
    }

    #[test]
    fn test_classify_clamps() {
        assert_eq!(classify_zone(-10.0), Zone::Red);
        assert_eq!(classify_zone(150.0), Zone::Green);
    }

    #[test]
    fn test_classify_monotonic() {
        let mut previous = Zone::Red;
        for tenth in 0..=1000 {
            let zone = classify_zone(tenth as f64 / 10.0);
            assert!(zone <= previous, "zone got worse as score rose");
            previous = zone;
        }
    }

    #[test]
    fn test_zone_metadata() {
        let info = ZoneInfo::for_score(62.4);
        assert_eq!(info.zone, Zone::Yellow);
        assert_eq!(info.metadata.label, "Mild Strain");
        assert_eq!(info.display(true), "🟡 Mild Strain (62)");
        assert_eq!(info.display(false), "🟡 Mild Strain");
        assert_eq!(Zone::Red.metadata().urgency, 3);
        assert_eq!(Zone::Yellow.boundaries(), (55.0, 79.0));
    }

    #[test]
    fn test_critical_and_healthy() {
        assert!(Zone::Orange.is_critical());
        assert!(Zone::Red.is_critical());
        assert!(!Zone::Yellow.is_critical());
        assert!(Zone::Green.is_healthy());
        assert!(!Zone::Yellow.is_healthy());
    }

    #[test]
    fn test_first_reading_transition() {
        let t = detect_zone_transition(85.0, None, None);
        assert_eq!(t.previous_zone, None);
        assert_eq!(t.direction, Direction::Stable);
        assert_eq!(t.severity_change, 0);
        assert!(!t.is_significant);
        assert_eq!(t.message(), None);
    }

    #[test]
    fn test_decline_across_boundary() {
        let t = detect_zone_transition(50.0, Some(85.0), None);
        assert_eq!(t.previous_zone, Some(Zone::Green));
        assert_eq!(t.current_zone, Zone::Orange);
        assert_eq!(t.direction, Direction::Declined);
        assert_eq!(t.severity_change, 2);
        assert!(t.is_significant);
        assert_eq!(
            t.message().unwrap(),
            "Your status moved from GREEN to ORANGE"
        );
    }

    #[test]
    fn test_small_delta_across_boundary_is_significant_but_stable() {
        let t = detect_zone_transition(79.0, Some(80.5), None);
        assert_eq!(t.direction, Direction::Stable);
        assert!(t.is_significant);
        assert_eq!(t.severity_change, 1);
    }

    #[test]
    fn test_improvement() {
        let t = detect_zone_transition(82.0, Some(70.0), Some(Zone::Yellow));
        assert_eq!(t.direction, Direction::Improved);
        assert_eq!(t.severity_change, -1);
        assert_eq!(t.message().unwrap(), "Great improvement! Moved to GREEN zone");
    }

    #[test]
    fn test_zone_trend() {
        assert!(zone_trend(&[], 5).is_none());

        // window is green, yellow, yellow, orange, orange
        let trend = zone_trend(&[90.0, 85.0, 70.0, 60.0, 50.0, 40.0], 5).unwrap();
        assert_eq!(trend.direction, Direction::Declined);
        assert_eq!(trend.zone_changes, 2);
        assert_eq!(trend.stability, ZoneStability::Volatile);
        assert_eq!(trend.current_zone, Zone::Orange);
        assert_eq!(trend.dominant_zone, Zone::Yellow);
        assert_eq!(trend.score_range, (40.0, 85.0));

        let majority = zone_trend(&[85.0, 78.0, 70.0, 60.0, 50.0], 5).unwrap();
        assert_eq!(majority.dominant_zone, Zone::Yellow);
        assert_eq!(majority.zone_changes, 2);

        let steady = zone_trend(&[82.0, 83.0, 84.0], ZONE_TREND_WINDOW).unwrap();
        assert_eq!(steady.stability, ZoneStability::Stable);
        assert_eq!(steady.direction, Direction::Stable);
    }

    #[test]
    fn test_zone_trend_tie_keeps_first_seen() {
        // orange, orange, yellow, yellow
        let trend = zone_trend(&[40.0, 45.0, 60.0, 65.0], 4).unwrap();
        assert_eq!(trend.dominant_zone, Zone::Orange);
        assert_eq!(trend.current_zone, Zone::Yellow);
        assert_eq!(trend.direction, Direction::Improved);
        assert_eq!(trend.zone_changes, 1);
        assert_eq!(trend.stability, ZoneStability::MinorFluctuation);
    }
}
