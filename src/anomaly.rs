//! Anomaly detection
//!
//! A fixed battery of independent rules runs on every scored sample. Each
//! rule looks at one aspect (composite score, zone, a single vital against
//! the baseline, sensor plausibility) and produces at most one [`Alert`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

use crate::baseline::Baseline;
use crate::stats::round1;
use crate::types::{ComponentScores, Sample};
use crate::validation::MOTION_ARTIFACT_HR_JUMP;
use crate::zones::{classify_zone, Zone};

/// Composite score below which the critical-threshold rule fires (urgent)
pub const URGENT_SCORE: f64 = 30.0;
/// Composite score below which the critical-threshold rule is critical
pub const CRITICAL_SCORE: f64 = 20.0;

/// Default score drop between consecutive samples that raises a warning
pub const SUDDEN_DROP_THRESHOLD: f64 = 20.0;
/// Score drop that escalates a sudden drop to urgent
pub const SUDDEN_DROP_URGENT: f64 = 30.0;

/// Consecutive drops needed for a sustained decline
pub const SUSTAINED_DECLINE_READINGS: usize = 3;
/// A step must fall by more than this to count as a drop
pub const DECLINE_TOLERANCE: f64 = 2.0;
/// Total fall over the window that makes a sustained decline urgent
pub const SUSTAINED_DECLINE_URGENT_TOTAL: f64 = 25.0;

/// Component score under which a component counts as declining
pub const LOW_COMPONENT_SCORE: f64 = 50.0;

/// Kind of anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SuddenScoreDrop,
    ZoneDowngrade,
    CriticalThreshold,
    SustainedDecline,
    Spo2Critical,
    HrvSuddenDrop,
    HrRapidIncrease,
    MultiComponentDecline,
    SensorArtifact,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SuddenScoreDrop => "sudden_score_drop",
            AlertType::ZoneDowngrade => "zone_downgrade",
            AlertType::CriticalThreshold => "critical_threshold",
            AlertType::SustainedDecline => "sustained_decline",
            AlertType::Spo2Critical => "spo2_critical",
            AlertType::HrvSuddenDrop => "hrv_sudden_drop",
            AlertType::HrRapidIncrease => "hr_rapid_increase",
            AlertType::MultiComponentDecline => "multi_component_decline",
            AlertType::SensorArtifact => "sensor_artifact",
        }
    }

    /// Typical severity for this kind of alert, before escalation
    pub fn default_severity(&self) -> AlertSeverity {
        match self {
            AlertType::CriticalThreshold => AlertSeverity::Critical,
            AlertType::Spo2Critical => AlertSeverity::Urgent,
            AlertType::SensorArtifact => AlertSeverity::Info,
            AlertType::SuddenScoreDrop
            | AlertType::ZoneDowngrade
            | AlertType::SustainedDecline
            | AlertType::HrvSuddenDrop
            | AlertType::HrRapidIncrease
            | AlertType::MultiComponentDecline => AlertSeverity::Warning,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, `Info < Warning < Urgent < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Urgent,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Urgent => "urgent",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fired anomaly rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        details: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            message,
            details: details
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            created_at: Utc::now(),
        }
    }

    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(Value::as_f64)
    }
}

/// Composite score below 30 (urgent) or 20 (critical)
pub fn detect_critical_threshold(score: f64) -> Option<Alert> {
    let severity = if score < CRITICAL_SCORE {
        AlertSeverity::Critical
    } else if score < URGENT_SCORE {
        AlertSeverity::Urgent
    } else {
        return None;
    };

    Some(Alert::new(
        AlertType::CriticalThreshold,
        severity,
        format!(
            "Your score has fallen to {:.0}, which indicates high cardiovascular strain",
            score
        ),
        [("score", json!(round1(score)))],
    ))
}

/// Drop of at least `threshold` points since the previous sample
pub fn detect_sudden_score_drop(current: f64, previous: f64, threshold: f64) -> Option<Alert> {
    let drop = previous - current;
    if drop < threshold {
        return None;
    }

    let severity = if drop >= SUDDEN_DROP_URGENT {
        AlertSeverity::Urgent
    } else {
        AlertSeverity::Warning
    };

    Some(Alert::new(
        AlertType::SuddenScoreDrop,
        severity,
        format!(
            "Your score dropped {:.0} points since the last reading",
            drop
        ),
        [
            ("drop", json!(round1(drop))),
            ("previous_score", json!(round1(previous))),
            ("current_score", json!(round1(current))),
        ],
    ))
}

/// Move to a worse zone.
///
/// Reaching red is critical; reaching orange or skipping a zone is urgent.
pub fn detect_zone_downgrade(current: Zone, previous: Zone) -> Option<Alert> {
    let steps = current.severity_index() - previous.severity_index();
    if steps <= 0 {
        return None;
    }

    let severity = if current == Zone::Red {
        AlertSeverity::Critical
    } else if current == Zone::Orange || steps >= 2 {
        AlertSeverity::Urgent
    } else {
        AlertSeverity::Warning
    };

    Some(Alert::new(
        AlertType::ZoneDowngrade,
        severity,
        format!(
            "Your status moved from {} to {}",
            previous.as_str().to_uppercase(),
            current.as_str().to_uppercase()
        ),
        [
            ("previous_zone", json!(previous)),
            ("current_zone", json!(current)),
            ("downgrade_steps", json!(steps)),
        ],
    ))
}

/// Most recent run of consecutive drops within the trailing `readings + 1` scores.
///
/// A step counts as a drop only when it falls by more than
/// [`DECLINE_TOLERANCE`]; any other step resets the run. Only the run that
/// ends at the newest score matters, so an older run followed by a
/// recovery does not fire.
pub fn detect_sustained_decline(scores: &[f64], readings: usize) -> Option<Alert> {
    let readings = readings.max(1);
    if scores.len() < readings + 1 {
        return None;
    }

    let window = &scores[scores.len() - (readings + 1)..];
    let mut run = 0;
    for pair in window.windows(2) {
        if pair[0] - pair[1] > DECLINE_TOLERANCE {
            run += 1;
        } else {
            run = 0;
        }
    }

    if run < readings {
        return None;
    }

    let total = window[0] - window[window.len() - 1];
    let severity = if total > SUSTAINED_DECLINE_URGENT_TOTAL {
        AlertSeverity::Urgent
    } else {
        AlertSeverity::Warning
    };

    Some(Alert::new(
        AlertType::SustainedDecline,
        severity,
        format!(
            "Your score has declined for {} readings in a row ({:.0} points total)",
            run, total
        ),
        [
            ("consecutive_drops", json!(run)),
            ("total_drop", json!(round1(total))),
        ],
    ))
}

/// Absolute blood-oxygen thresholds: <94 warning, <92 urgent, <90 critical
pub fn detect_spo2_critical(spo2: f64) -> Option<Alert> {
    let severity = if spo2 < 90.0 {
        AlertSeverity::Critical
    } else if spo2 < 92.0 {
        AlertSeverity::Urgent
    } else if spo2 < 94.0 {
        AlertSeverity::Warning
    } else {
        return None;
    };

    Some(Alert::new(
        AlertType::Spo2Critical,
        severity,
        format!("Blood oxygen is low at {:.0}%", spo2),
        [("spo2", json!(spo2))],
    ))
}

/// HRV at least 30% (warning) or 50% (urgent) below baseline
pub fn detect_hrv_sudden_drop(current: f64, baseline: f64) -> Option<Alert> {
    if baseline <= 0.0 {
        return None;
    }

    let drop_percent = round1((baseline - current) * 100.0 / baseline);
    let severity = if drop_percent >= 50.0 {
        AlertSeverity::Urgent
    } else if drop_percent >= 30.0 {
        AlertSeverity::Warning
    } else {
        return None;
    };

    Some(Alert::new(
        AlertType::HrvSuddenDrop,
        severity,
        format!(
            "Heart rate variability is {:.0}% below your baseline",
            drop_percent
        ),
        [
            ("current_hrv", json!(current)),
            ("baseline_hrv", json!(baseline)),
            ("drop_percent", json!(drop_percent)),
        ],
    ))
}

/// Heart rate at least 40% (warning) or 60% (urgent) above baseline
pub fn detect_hr_rapid_increase(current: f64, baseline: f64) -> Option<Alert> {
    if baseline <= 0.0 {
        return None;
    }

    let increase_percent = round1((current - baseline) * 100.0 / baseline);
    let severity = if increase_percent >= 60.0 {
        AlertSeverity::Urgent
    } else if increase_percent >= 40.0 {
        AlertSeverity::Warning
    } else {
        return None;
    };

    Some(Alert::new(
        AlertType::HrRapidIncrease,
        severity,
        format!(
            "Heart rate is {:.0}% above your resting rate",
            increase_percent
        ),
        [
            ("current_hr", json!(current)),
            ("baseline_hr", json!(baseline)),
            ("increase_percent", json!(increase_percent)),
        ],
    ))
}

/// Two (warning) or three or more (urgent) components scoring under 50
pub fn detect_multi_component_decline(scores: &ComponentScores) -> Option<Alert> {
    let low = scores.below(LOW_COMPONENT_SCORE);
    let severity = match low.len() {
        0 | 1 => return None,
        2 => AlertSeverity::Warning,
        _ => AlertSeverity::Urgent,
    };

    let names: Vec<&str> = low.iter().map(|m| m.as_str()).collect();
    Some(Alert::new(
        AlertType::MultiComponentDecline,
        severity,
        format!("{} vital signs are below normal", low.len()),
        [("low_components", json!(names))],
    ))
}

/// Implausible heart-rate jump between consecutive samples
pub fn detect_sensor_artifact(current: &Sample, previous: &Sample) -> Option<Alert> {
    let jump = (current.heart_rate - previous.heart_rate).abs();
    if jump <= MOTION_ARTIFACT_HR_JUMP {
        return None;
    }

    Some(Alert::new(
        AlertType::SensorArtifact,
        AlertSeverity::Info,
        "Reading may be affected by movement - check the sensor fit".to_string(),
        [("hr_jump", json!(round1(jump)))],
    ))
}

/// Everything the detector may look at for one sample
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyInput<'a> {
    pub current_score: f64,
    pub previous_score: Option<f64>,
    /// Recent composite scores, oldest first, including the current one
    pub score_history: &'a [f64],
    pub current_sample: Option<&'a Sample>,
    pub previous_sample: Option<&'a Sample>,
    /// Only pass a real baseline; baseline-relative rules are skipped without one
    pub baseline: Option<&'a Baseline>,
    pub component_scores: Option<&'a ComponentScores>,
}

impl<'a> AnomalyInput<'a> {
    pub fn new(current_score: f64) -> Self {
        Self {
            current_score,
            ..Default::default()
        }
    }
}

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionResult {
    pub alerts: Vec<Alert>,
    pub highest_severity: Option<AlertSeverity>,
    pub should_notify: bool,
    pub summary: String,
}

/// Run every rule against the input
pub fn detect_anomalies(input: &AnomalyInput<'_>) -> AnomalyDetectionResult {
    let mut alerts = Vec::new();

    alerts.extend(detect_critical_threshold(input.current_score));

    if let Some(previous) = input.previous_score {
        alerts.extend(detect_sudden_score_drop(
            input.current_score,
            previous,
            SUDDEN_DROP_THRESHOLD,
        ));
        alerts.extend(detect_zone_downgrade(
            classify_zone(input.current_score),
            classify_zone(previous),
        ));
    }

    alerts.extend(detect_sustained_decline(
        input.score_history,
        SUSTAINED_DECLINE_READINGS,
    ));

    if let Some(sample) = input.current_sample {
        alerts.extend(detect_spo2_critical(sample.spo2));

        if let Some(baseline) = input.baseline {
            alerts.extend(detect_hrv_sudden_drop(sample.hrv, baseline.resting_hrv));
            alerts.extend(detect_hr_rapid_increase(
                sample.heart_rate,
                baseline.resting_heart_rate,
            ));
        }

        if let Some(previous) = input.previous_sample {
            alerts.extend(detect_sensor_artifact(sample, previous));
        }
    }

    if let Some(scores) = input.component_scores {
        alerts.extend(detect_multi_component_decline(scores));
    }

    summarize(alerts)
}

fn summarize(alerts: Vec<Alert>) -> AnomalyDetectionResult {
    let highest_severity = alerts.iter().map(|a| a.severity).max();
    let should_notify = highest_severity.is_some_and(|s| s >= AlertSeverity::Warning);

    let summary = match (highest_severity, primary_alert(&alerts)) {
        (Some(severity), Some(primary)) => format!(
            "{}: {} alert(s) - {}",
            severity.as_str().to_uppercase(),
            alerts.len(),
            primary.message
        ),
        _ => "No anomalies detected".to_string(),
    };

    AnomalyDetectionResult {
        alerts,
        highest_severity,
        should_notify,
        summary,
    }
}

/// Most severe alert; the first one wins a tie
pub fn primary_alert(alerts: &[Alert]) -> Option<&Alert> {
    alerts.iter().fold(None, |best: Option<&Alert>, alert| match best {
        Some(b) if b.severity >= alert.severity => Some(b),
        _ => Some(alert),
    })
}

/// How prominently a delivery layer should surface a detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    None,
    Nudge,
    ProminentAlert,
    ImmediateAlert,
}

pub fn notification_for(result: &AnomalyDetectionResult) -> NotificationKind {
    match result.highest_severity {
        Some(AlertSeverity::Critical) => NotificationKind::ImmediateAlert,
        Some(AlertSeverity::Urgent) => NotificationKind::ProminentAlert,
        Some(AlertSeverity::Warning) => NotificationKind::Nudge,
        Some(AlertSeverity::Info) | None => NotificationKind::None,
    }
}

/// Alert summary handed to message generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    pub has_alerts: bool,
    pub alert_count: usize,
    pub primary_alert: Option<Alert>,
    pub alert_types: Vec<AlertType>,
    /// Urgent or critical alert present
    pub requires_immediate_action: bool,
}

pub fn alert_context(alerts: &[Alert]) -> AlertContext {
    let primary = primary_alert(alerts).cloned();
    let requires_immediate_action = primary
        .as_ref()
        .is_some_and(|a| a.severity >= AlertSeverity::Urgent);

    AlertContext {
        has_alerts: !alerts.is_empty(),
        alert_count: alerts.len(),
        alert_types: alerts.iter().map(|a| a.alert_type).collect(),
        primary_alert: primary,
        requires_immediate_action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentScore;

    fn component_scores(hr: f64, hrv: f64, spo2: f64, temp: f64) -> ComponentScores {
        ComponentScores {
            heart_rate: ComponentScore::new(hr),
            hrv: ComponentScore::new(hrv),
            spo2: ComponentScore::new(spo2),
            temperature: ComponentScore::new(temp),
            composite: 0.0,
        }
    }

    fn types(result: &AnomalyDetectionResult) -> Vec<AlertType> {
        result.alerts.iter().map(|a| a.alert_type).collect()
    }

    #[test]
    fn test_severity_order() {
        assert!(AlertSeverity::Info < AlertSeverity::Warning);
        assert!(AlertSeverity::Warning < AlertSeverity::Urgent);
        assert!(AlertSeverity::Urgent < AlertSeverity::Critical);
    }

    #[test]
    fn test_critical_threshold() {
        assert!(detect_critical_threshold(35.0).is_none());
        assert_eq!(
            detect_critical_threshold(25.0).unwrap().severity,
            AlertSeverity::Urgent
        );
        assert_eq!(
            detect_critical_threshold(15.0).unwrap().severity,
            AlertSeverity::Critical
        );
        assert!(detect_critical_threshold(22.0).unwrap().message.contains("22"));
    }

    #[test]
    fn test_sudden_score_drop() {
        assert!(detect_sudden_score_drop(80.0, 85.0, SUDDEN_DROP_THRESHOLD).is_none());
        assert!(detect_sudden_score_drop(85.0, 70.0, SUDDEN_DROP_THRESHOLD).is_none());

        let warning = detect_sudden_score_drop(60.0, 80.0, SUDDEN_DROP_THRESHOLD).unwrap();
        assert_eq!(warning.alert_type, AlertType::SuddenScoreDrop);
        assert_eq!(warning.severity, AlertSeverity::Warning);
        assert_eq!(warning.detail_f64("drop"), Some(20.0));

        let urgent = detect_sudden_score_drop(50.0, 80.0, SUDDEN_DROP_THRESHOLD).unwrap();
        assert_eq!(urgent.severity, AlertSeverity::Urgent);

        let details = detect_sudden_score_drop(55.0, 80.0, SUDDEN_DROP_THRESHOLD).unwrap();
        assert_eq!(details.detail_f64("drop"), Some(25.0));
        assert_eq!(details.detail_f64("previous_score"), Some(80.0));
        assert_eq!(details.detail_f64("current_score"), Some(55.0));

        assert!(detect_sudden_score_drop(70.0, 80.0, 5.0).is_some());
    }

    #[test]
    fn test_zone_downgrade() {
        assert!(detect_zone_downgrade(Zone::Green, Zone::Green).is_none());
        assert!(detect_zone_downgrade(Zone::Green, Zone::Yellow).is_none());
        assert_eq!(
            detect_zone_downgrade(Zone::Yellow, Zone::Green).unwrap().severity,
            AlertSeverity::Warning
        );
        assert_eq!(
            detect_zone_downgrade(Zone::Orange, Zone::Yellow).unwrap().severity,
            AlertSeverity::Urgent
        );
        assert_eq!(
            detect_zone_downgrade(Zone::Red, Zone::Orange).unwrap().severity,
            AlertSeverity::Critical
        );

        let two_step = detect_zone_downgrade(Zone::Orange, Zone::Green).unwrap();
        assert_eq!(two_step.severity, AlertSeverity::Urgent);
        assert_eq!(two_step.detail_f64("downgrade_steps"), Some(2.0));
    }

    #[test]
    fn test_sustained_decline() {
        let n = SUSTAINED_DECLINE_READINGS;
        assert!(detect_sustained_decline(&[80.0, 75.0], n).is_none());

        let alert = detect_sustained_decline(&[85.0, 80.0, 73.0, 65.0], n).unwrap();
        assert_eq!(alert.alert_type, AlertType::SustainedDecline);
        assert_eq!(alert.severity, AlertSeverity::Warning);

        assert!(detect_sustained_decline(&[85.0, 70.0, 75.0, 60.0], n).is_none());

        let urgent = detect_sustained_decline(&[90.0, 80.0, 65.0, 50.0], n).unwrap();
        assert_eq!(urgent.severity, AlertSeverity::Urgent);

        // three-point steps exceed the tolerance
        assert!(detect_sustained_decline(&[80.0, 77.0, 74.0, 71.0], n).is_some());
        // two-point steps do not
        assert!(detect_sustained_decline(&[80.0, 78.0, 76.0, 74.0], n).is_none());
    }

    #[test]
    fn test_sustained_decline_uses_most_recent_run() {
        // an earlier run of drops followed by a recovery does not fire
        let scores = [95.0, 85.0, 75.0, 65.0, 70.0, 72.0];
        assert!(detect_sustained_decline(&scores, SUSTAINED_DECLINE_READINGS).is_none());
    }

    #[test]
    fn test_spo2_critical() {
        assert!(detect_spo2_critical(98.0).is_none());
        assert_eq!(detect_spo2_critical(93.0).unwrap().severity, AlertSeverity::Warning);
        assert_eq!(detect_spo2_critical(91.0).unwrap().severity, AlertSeverity::Urgent);
        assert_eq!(detect_spo2_critical(88.0).unwrap().severity, AlertSeverity::Critical);
        assert!(detect_spo2_critical(89.0).unwrap().message.contains("89"));
    }

    #[test]
    fn test_hrv_sudden_drop() {
        assert!(detect_hrv_sudden_drop(40.0, 45.0).is_none());
        assert_eq!(
            detect_hrv_sudden_drop(35.0, 50.0).unwrap().severity,
            AlertSeverity::Warning
        );
        assert_eq!(
            detect_hrv_sudden_drop(25.0, 50.0).unwrap().severity,
            AlertSeverity::Urgent
        );
        assert!(detect_hrv_sudden_drop(40.0, 0.0).is_none());
        assert_eq!(
            detect_hrv_sudden_drop(30.0, 50.0).unwrap().detail_f64("drop_percent"),
            Some(40.0)
        );
    }

    #[test]
    fn test_hr_rapid_increase() {
        assert!(detect_hr_rapid_increase(75.0, 70.0).is_none());
        assert_eq!(
            detect_hr_rapid_increase(98.0, 70.0).unwrap().severity,
            AlertSeverity::Warning
        );
        assert_eq!(
            detect_hr_rapid_increase(112.0, 70.0).unwrap().severity,
            AlertSeverity::Urgent
        );
        assert!(detect_hr_rapid_increase(80.0, 0.0).is_none());
    }

    #[test]
    fn test_multi_component_decline() {
        assert!(detect_multi_component_decline(&component_scores(80.0, 40.0, 90.0, 85.0)).is_none());

        let two = detect_multi_component_decline(&component_scores(40.0, 40.0, 90.0, 85.0)).unwrap();
        assert_eq!(two.severity, AlertSeverity::Warning);
        assert_eq!(
            two.details["low_components"],
            json!(["heart_rate", "hrv"])
        );

        let three = detect_multi_component_decline(&component_scores(40.0, 40.0, 40.0, 85.0)).unwrap();
        assert_eq!(three.severity, AlertSeverity::Urgent);
    }

    #[test]
    fn test_sensor_artifact_is_info() {
        let prev = Sample::new(70.0, 50.0, 98.0, 36.5);
        let jump = Sample::new(125.0, 50.0, 98.0, 36.5);
        let alert = detect_sensor_artifact(&jump, &prev).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Info);

        let result = detect_anomalies(&AnomalyInput {
            current_sample: Some(&jump),
            previous_sample: Some(&prev),
            ..AnomalyInput::new(85.0)
        });
        assert_eq!(types(&result), vec![AlertType::SensorArtifact]);
        assert!(!result.should_notify);
        assert_eq!(notification_for(&result), NotificationKind::None);
    }

    #[test]
    fn test_normal_reading_has_no_alerts() {
        let result = detect_anomalies(&AnomalyInput::new(85.0));
        assert!(result.alerts.is_empty());
        assert!(!result.should_notify);
        assert_eq!(result.highest_severity, None);
        assert_eq!(result.summary, "No anomalies detected");
    }

    #[test]
    fn test_combined_detection() {
        let baseline = Baseline::from_values(65.0, 45.0, 98.0, 36.6);
        let reading = Sample::new(130.0, 20.0, 96.0, 37.5);

        let result = detect_anomalies(&AnomalyInput {
            previous_score: Some(86.0),
            current_sample: Some(&reading),
            baseline: Some(&baseline),
            ..AnomalyInput::new(41.0)
        });

        let found = types(&result);
        assert!(found.contains(&AlertType::ZoneDowngrade));
        assert!(found.contains(&AlertType::HrvSuddenDrop));
        assert!(found.contains(&AlertType::HrRapidIncrease));
        assert!(found.contains(&AlertType::SuddenScoreDrop));
        assert!(result.should_notify);
        assert_eq!(result.highest_severity, Some(AlertSeverity::Urgent));
    }

    #[test]
    fn test_sustained_decline_from_history() {
        let history = [90.0, 85.0, 75.0, 65.0, 60.0];
        let result = detect_anomalies(&AnomalyInput {
            score_history: &history,
            ..AnomalyInput::new(60.0)
        });
        assert!(types(&result).contains(&AlertType::SustainedDecline));
    }

    #[test]
    fn test_critical_summary() {
        let result = detect_anomalies(&AnomalyInput::new(15.0));
        assert_eq!(result.highest_severity, Some(AlertSeverity::Critical));
        assert!(result.summary.contains("CRITICAL"));
        assert_eq!(notification_for(&result), NotificationKind::ImmediateAlert);
    }

    #[test]
    fn test_notification_levels() {
        let warning = detect_anomalies(&AnomalyInput {
            previous_score: Some(92.0),
            ..AnomalyInput::new(70.0)
        });
        assert!(warning.should_notify);
        assert_eq!(notification_for(&warning), NotificationKind::Nudge);
    }

    #[test]
    fn test_alert_context() {
        let alerts = vec![
            detect_spo2_critical(93.0).unwrap(),
            detect_critical_threshold(18.0).unwrap(),
            detect_zone_downgrade(Zone::Red, Zone::Orange).unwrap(),
        ];
        let ctx = alert_context(&alerts);
        assert!(ctx.has_alerts);
        assert_eq!(ctx.alert_count, 3);
        // both critical; the earlier one is primary
        assert_eq!(
            ctx.primary_alert.unwrap().alert_type,
            AlertType::CriticalThreshold
        );
        assert!(ctx.requires_immediate_action);

        let empty = alert_context(&[]);
        assert!(!empty.has_alerts);
        assert!(!empty.requires_immediate_action);
    }

    #[test]
    fn test_default_severity_table() {
        assert_eq!(
            AlertType::CriticalThreshold.default_severity(),
            AlertSeverity::Critical
        );
        assert_eq!(AlertType::Spo2Critical.default_severity(), AlertSeverity::Urgent);
        assert_eq!(AlertType::SensorArtifact.default_severity(), AlertSeverity::Info);
        assert_eq!(AlertType::ZoneDowngrade.default_severity(), AlertSeverity::Warning);
    }
}
