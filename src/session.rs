//! Per-session monitoring state
//!
//! A [`Session`] is owned by the engine's registry. Callers only ever see
//! snapshot clones; every mutator is crate-private.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::anomaly::Alert;
use crate::baseline::{Baseline, CalibrationResult};
use crate::error::EngineError;
use crate::nudges::Language;
use crate::projection::TrendAnalysis;
use crate::types::{ComponentScores, Sample};
use crate::zones::Zone;

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Calibrating,
    Active,
    Paused,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Calibrating => "calibrating",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
        }
    }

    /// Allowed edges of the lifecycle graph.
    ///
    /// `Ended` is terminal. Returning to `Calibrating` is an explicit reset.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Ended, _) => false,
            (Calibrating, Active) => true,
            (Active, Paused) | (Paused, Active) => true,
            (_, Ended) => true,
            (_, Calibrating) => true,
            _ => false,
        }
    }

    pub fn accepts_samples(&self) -> bool {
        matches!(self, SessionStatus::Calibrating | SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores and zone recorded for one accepted sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub timestamp: DateTime<Utc>,
    pub scores: ComponentScores,
    pub zone: Zone,
}

/// Monitoring state for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    user_id: String,
    status: SessionStatus,
    language: Language,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    samples: VecDeque<Sample>,
    calibration_window: Vec<Sample>,
    baseline: Option<Baseline>,
    calibration: Option<CalibrationResult>,
    current_scores: Option<ComponentScores>,
    current_zone: Option<Zone>,
    previous_zone: Option<Zone>,
    history: VecDeque<ScoreSnapshot>,
    active_alerts: Vec<Alert>,
    alert_history: VecDeque<Alert>,
    trend: Option<TrendAnalysis>,
    required_calibration_samples: usize,
    total_samples: u64,
}

impl Session {
    pub(crate) fn new(
        id: String,
        user_id: String,
        language: Language,
        required_calibration_samples: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            status: SessionStatus::Calibrating,
            language,
            created_at: now,
            updated_at: now,
            ended_at: None,
            samples: VecDeque::new(),
            calibration_window: Vec::new(),
            baseline: None,
            calibration: None,
            current_scores: None,
            current_zone: None,
            previous_zone: None,
            history: VecDeque::new(),
            active_alerts: Vec::new(),
            alert_history: VecDeque::new(),
            trend: None,
            required_calibration_samples,
            total_samples: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Retained samples, oldest first
    pub fn samples(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn calibration_window(&self) -> &[Sample] {
        &self.calibration_window
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Result of the most recent calibration attempt
    pub fn calibration(&self) -> Option<&CalibrationResult> {
        self.calibration.as_ref()
    }

    pub fn current_scores(&self) -> Option<&ComponentScores> {
        self.current_scores.as_ref()
    }

    pub fn current_score(&self) -> Option<f64> {
        self.current_scores.map(|s| s.composite)
    }

    pub fn current_zone(&self) -> Option<Zone> {
        self.current_zone
    }

    pub fn previous_zone(&self) -> Option<Zone> {
        self.previous_zone
    }

    pub fn history(&self) -> &VecDeque<ScoreSnapshot> {
        &self.history
    }

    /// Composite scores in history order
    pub fn score_history(&self) -> Vec<f64> {
        self.history.iter().map(|h| h.scores.composite).collect()
    }

    pub fn active_alerts(&self) -> &[Alert] {
        &self.active_alerts
    }

    /// Cumulative alerts, capped at the configured history size
    pub fn alert_history(&self) -> &VecDeque<Alert> {
        &self.alert_history
    }

    pub fn trend(&self) -> Option<&TrendAnalysis> {
        self.trend.as_ref()
    }

    pub fn required_calibration_samples(&self) -> usize {
        self.required_calibration_samples
    }

    /// Accepted samples over the session's lifetime, including evicted ones
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Elapsed time from creation to end (or now)
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at.unwrap_or_else(Utc::now) - self.created_at
    }

    pub(crate) fn transition(&mut self, next: SessionStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == SessionStatus::Ended {
            self.ended_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub(crate) fn set_language(&mut self, language: Language) {
        self.language = language;
        self.updated_at = Utc::now();
    }

    /// Append a sample, evicting the oldest beyond `cap`
    pub(crate) fn push_sample(&mut self, sample: Sample, cap: usize) {
        self.samples.push_back(sample);
        while self.samples.len() > cap {
            self.samples.pop_front();
        }
        self.total_samples += 1;
        self.updated_at = Utc::now();
    }

    pub(crate) fn push_calibration_sample(&mut self, sample: Sample) {
        self.calibration_window.push(sample);
    }

    /// Store a calibration attempt. A failed attempt restarts the window.
    pub(crate) fn record_calibration(&mut self, result: CalibrationResult) {
        use crate::baseline::CalibrationStatus;
        match result.status {
            CalibrationStatus::Complete => {
                self.baseline = result.baseline.clone();
                self.calibration_window.clear();
            }
            CalibrationStatus::Failed => self.calibration_window.clear(),
            CalibrationStatus::Collecting | CalibrationStatus::ExtendedWindow => {}
        }
        self.calibration = Some(result);
    }

    pub(crate) fn set_baseline(&mut self, baseline: Baseline) {
        self.baseline = Some(baseline);
        self.calibration_window.clear();
        self.updated_at = Utc::now();
    }

    /// Record scores for the latest sample, evicting old snapshots beyond `cap`
    pub(crate) fn record_scores(&mut self, snapshot: ScoreSnapshot, cap: usize) {
        self.previous_zone = self.current_zone;
        self.current_zone = Some(snapshot.zone);
        self.current_scores = Some(snapshot.scores);
        self.history.push_back(snapshot);
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }

    /// Replace the active set and append to the bounded history
    pub(crate) fn record_alerts(&mut self, alerts: Vec<Alert>, cap: usize) {
        self.alert_history.extend(alerts.iter().cloned());
        while self.alert_history.len() > cap {
            self.alert_history.pop_front();
        }
        self.active_alerts = alerts;
    }

    pub(crate) fn set_trend(&mut self, trend: Option<TrendAnalysis>) {
        self.trend = trend;
    }

    /// Drop the baseline and derived state and return to calibration.
    ///
    /// Raw samples and alert history are retained.
    pub(crate) fn reset(&mut self) -> Result<(), EngineError> {
        self.transition(SessionStatus::Calibrating)?;
        self.calibration_window.clear();
        self.baseline = None;
        self.calibration = None;
        self.current_scores = None;
        self.current_zone = None;
        self.previous_zone = None;
        self.history.clear();
        self.active_alerts.clear();
        self.trend = None;
        Ok(())
    }
}
