//! Session orchestration
//!
//! [`CardioEngine`] owns the session registry and runs each reading through
//! the scoring pipeline:
//!
//! 1. lifecycle check
//! 2. validation and sensor check
//! 3. bounded append to the session history
//! 4. calibration step (only while calibrating)
//! 5. component and composite scoring
//! 6. zone classification and transition detection
//! 7. anomaly detection
//! 8. trend update, once enough score history exists
//!
//! The registry is a sharded concurrent map of independently locked sessions,
//! so readings for different sessions can be processed in parallel.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anomaly::{detect_anomalies, Alert, AlertSeverity, AnomalyInput};
use crate::baseline::{
    adapt_baseline, calibrate, Baseline, CalibrationPolicy, CalibrationResult, CalibrationStatus,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::nudges::{compose_nudge, Language, Nudge, NudgeConfig, NudgeContext, NudgeGenerator};
use crate::projection::{
    improvement_path, project_recovery_time, project_risk, risk_trajectory, simulate_scenario,
    trend_over_window, Behavior, Horizon, RecoveryEstimate, RiskProjection, RiskTrajectory,
    TrendAnalysis, WhatIfScenario, DEFAULT_RECOVERY_INTERVENTION, DEFAULT_RECOVERY_TARGET,
    MIN_TREND_POINTS,
};
use crate::scoring::score_sample;
use crate::session::{ScoreSnapshot, Session, SessionStatus};
use crate::stats::{mean, round1};
use crate::types::ComponentScores;
use crate::validation::{detect_sensor_error, RangeValidator, RawReading, SampleValidator, SensorError};
use crate::zones::{classify_zone, detect_zone_transition, Zone, ZoneInfo, ZoneTransition};

/// Aggregated outcome of processing one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub reading_valid: bool,
    /// Machine-readable reason when the reading was rejected
    pub error: Option<String>,
    pub validation_errors: Vec<String>,
    pub sensor_error: Option<SensorError>,
    pub status: Option<SessionStatus>,
    /// Present while the session is calibrating, including the completing reading
    pub calibration: Option<CalibrationResult>,
    pub scores: Option<ComponentScores>,
    pub zone: Option<Zone>,
    pub zone_changed: bool,
    pub transition: Option<ZoneTransition>,
    pub new_alerts: Vec<Alert>,
    pub highest_severity: Option<AlertSeverity>,
    pub should_notify: bool,
    pub trend: Option<TrendAnalysis>,
    pub message: String,
}

impl ProcessingResult {
    /// Structured failure for a reading that never entered the pipeline
    pub fn rejected(session_id: &str, error: &EngineError) -> Self {
        Self {
            success: false,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            reading_valid: false,
            error: Some(error.reason().to_string()),
            validation_errors: vec![error.to_string()],
            sensor_error: None,
            status: None,
            calibration: None,
            scores: None,
            zone: None,
            zone_changed: false,
            transition: None,
            new_alerts: Vec::new(),
            highest_severity: None,
            should_notify: false,
            trend: None,
            message: error.to_string(),
        }
    }
}

/// Descriptive statistics over a session's score history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub latest_score: f64,
    pub zone_distribution: BTreeMap<Zone, usize>,
}

/// Point-in-time overview of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub readings_count: u64,
    pub calibrated: bool,
    pub baseline: Option<Baseline>,
    pub current_score: Option<f64>,
    pub current_zone: Option<Zone>,
    pub statistics: Option<ScoreStatistics>,
    pub trend: Option<TrendAnalysis>,
    pub active_alert_count: usize,
    pub total_alert_count: usize,
}

/// Registry of monitoring sessions and the pipeline that drives them
pub struct CardioEngine {
    config: EngineConfig,
    validator: Box<dyn SampleValidator>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
}

impl Default for CardioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CardioEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            validator: Box::new(RangeValidator),
            sessions: DashMap::new(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replace the reading validator
    pub fn with_validator(mut self, validator: impl SampleValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, EngineError> {
        // Clone the Arc so the shard lock is released before the session lock is taken
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();
        f(&mut session)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Register a new session and return its id.
    ///
    /// A random id is generated unless one is supplied.
    pub fn create_session(
        &self,
        user_id: &str,
        language: Option<Language>,
        session_id: Option<String>,
    ) -> Result<String, EngineError> {
        let id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let language = language.unwrap_or(self.config.default_language);

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(EngineError::SessionExists(id)),
            Entry::Vacant(slot) => {
                let session = Session::new(
                    id.clone(),
                    user_id.to_string(),
                    language,
                    self.config.calibration_samples,
                );
                slot.insert(Arc::new(Mutex::new(session)));
                info!(session_id = %id, user_id, language = %language, "session created");
                Ok(id)
            }
        }
    }

    /// Snapshot of a session's state
    pub fn get_session(&self, session_id: &str) -> Result<Session, EngineError> {
        self.with_session(session_id, |s| Ok(s.clone()))
    }

    pub fn end_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.with_session(session_id, |s| s.transition(SessionStatus::Ended))?;
        info!(session_id, "session ended");
        Ok(())
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.sessions
            .remove(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        info!(session_id, "session deleted");
        Ok(())
    }

    pub fn pause_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.with_session(session_id, |s| s.transition(SessionStatus::Paused))?;
        debug!(session_id, "session paused");
        Ok(())
    }

    pub fn resume_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.with_session(session_id, |s| s.transition(SessionStatus::Active))?;
        debug!(session_id, "session resumed");
        Ok(())
    }

    /// Discard the baseline and start a fresh calibration
    pub fn reset_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.with_session(session_id, |s| s.reset())?;
        info!(session_id, "session reset, recalibrating");
        Ok(())
    }

    pub fn set_language(&self, session_id: &str, language: Language) -> Result<(), EngineError> {
        self.with_session(session_id, |s| {
            s.set_language(language);
            Ok(())
        })
    }

    /// Install a previously persisted baseline, skipping calibration
    pub fn set_baseline(&self, session_id: &str, baseline: Baseline) -> Result<(), EngineError> {
        self.with_session(session_id, |s| {
            if s.status() == SessionStatus::Ended {
                return Err(EngineError::SessionEnded(session_id.to_string()));
            }
            s.set_baseline(baseline);
            if s.status() == SessionStatus::Calibrating {
                s.transition(SessionStatus::Active)?;
            }
            Ok(())
        })?;
        info!(session_id, "baseline restored");
        Ok(())
    }

    /// All registered session ids, sorted
    pub fn list_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Ids of calibrated, unpaused sessions, sorted
    pub fn active_sessions(&self) -> Vec<String> {
        let handles: Vec<(String, Arc<Mutex<Session>>)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut ids: Vec<String> = handles
            .into_iter()
            .filter(|(_, h)| h.lock().status() == SessionStatus::Active)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ---------------------------------------------------------------------
    // Pipeline
    // ---------------------------------------------------------------------

    /// Run one reading through the pipeline.
    ///
    /// Lifecycle and validation failures are returned as errors and leave the
    /// session untouched. An unfinished calibration is not an error.
    pub fn process_reading(
        &self,
        session_id: &str,
        raw: &RawReading,
    ) -> Result<ProcessingResult, EngineError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock();

        match session.status() {
            SessionStatus::Ended => return Err(EngineError::SessionEnded(session_id.to_string())),
            SessionStatus::Paused => return Err(EngineError::SessionPaused(session_id.to_string())),
            SessionStatus::Calibrating | SessionStatus::Active => {}
        }

        let sample = self.validator.validate(raw).map_err(|e| {
            warn!(session_id, reason = e.reason(), "reading rejected: {}", e);
            EngineError::from(e)
        })?;

        let previous_sample = session.last_sample().cloned();
        let sensor_error = detect_sensor_error(&sample, previous_sample.as_ref());
        if let Some(err) = sensor_error {
            warn!(session_id, sensor_error = err.as_str(), "possible sensor error");
        }

        session.push_sample(sample.clone(), self.config.max_history);

        let calibration = if session.status() == SessionStatus::Calibrating {
            Some(self.calibration_step(&mut session, &sample)?)
        } else {
            None
        };

        let baseline = session.baseline().cloned();
        let reference = baseline.clone().unwrap_or_else(Baseline::population_default);
        let scores = score_sample(&sample, &reference, &self.config.weights);
        let composite = scores.composite;

        let previous_score = session.current_score();
        let zone = classify_zone(composite);
        let transition = detect_zone_transition(composite, previous_score, session.current_zone());
        if transition.is_significant {
            info!(
                session_id,
                from = ?transition.previous_zone,
                to = %zone,
                score = composite,
                "zone transition"
            );
        }

        session.record_scores(
            ScoreSnapshot {
                timestamp: sample.timestamp,
                scores,
                zone,
            },
            self.config.max_history,
        );
        let history = session.score_history();

        let detection = detect_anomalies(&AnomalyInput {
            current_score: composite,
            previous_score,
            score_history: &history,
            current_sample: Some(&sample),
            previous_sample: previous_sample.as_ref(),
            baseline: baseline.as_ref(),
            component_scores: Some(&scores),
        });
        if !detection.alerts.is_empty() {
            warn!(session_id, alerts = detection.alerts.len(), "{}", detection.summary);
        }
        session.record_alerts(detection.alerts.clone(), self.config.max_alert_history);

        let trend = (history.len() >= MIN_TREND_POINTS)
            .then(|| trend_over_window(&history, self.config.trend_window));
        session.set_trend(trend.clone());

        let message = match &calibration {
            Some(c) => c.message(),
            None if !detection.alerts.is_empty() => detection.summary.clone(),
            None => ZoneInfo::for_score(composite).display(true),
        };

        debug!(session_id, composite, zone = %zone, "reading processed");

        Ok(ProcessingResult {
            success: true,
            session_id: session_id.to_string(),
            timestamp: sample.timestamp,
            reading_valid: true,
            error: None,
            validation_errors: Vec::new(),
            sensor_error,
            status: Some(session.status()),
            calibration,
            scores: Some(scores),
            zone: Some(zone),
            zone_changed: transition.is_significant,
            transition: Some(transition),
            new_alerts: detection.alerts,
            highest_severity: detection.highest_severity,
            should_notify: detection.should_notify,
            trend,
            message,
        })
    }

    /// Like [`process_reading`](Self::process_reading) but folds errors into a
    /// rejected result, for transports that always answer with a result object
    pub fn process(&self, session_id: &str, raw: &RawReading) -> ProcessingResult {
        self.process_reading(session_id, raw)
            .unwrap_or_else(|e| ProcessingResult::rejected(session_id, &e))
    }

    fn calibration_step(
        &self,
        session: &mut Session,
        sample: &crate::types::Sample,
    ) -> Result<CalibrationResult, EngineError> {
        session.push_calibration_sample(sample.clone());
        let policy = CalibrationPolicy::for_target(session.required_calibration_samples());
        let result = calibrate(session.calibration_window(), &policy);

        match result.status {
            CalibrationStatus::Complete => {
                info!(
                    session_id = session.id(),
                    quality = result.baseline.as_ref().map(|b| b.quality.as_str()),
                    "calibration complete"
                );
            }
            CalibrationStatus::ExtendedWindow => {
                warn!(
                    session_id = session.id(),
                    needed = result.samples_needed,
                    "noisy calibration window, extending"
                );
            }
            CalibrationStatus::Failed => {
                warn!(session_id = session.id(), "calibration failed, restarting window");
            }
            CalibrationStatus::Collecting => {}
        }

        let complete = result.calibration_complete();
        session.record_calibration(result.clone());
        if complete {
            session.transition(SessionStatus::Active)?;
        }
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn current_score(&self, session_id: &str) -> Result<Option<f64>, EngineError> {
        self.with_session(session_id, |s| Ok(s.current_score()))
    }

    pub fn current_zone(&self, session_id: &str) -> Result<Option<Zone>, EngineError> {
        self.with_session(session_id, |s| Ok(s.current_zone()))
    }

    /// Alerts raised by the most recent reading
    pub fn active_alerts(&self, session_id: &str) -> Result<Vec<Alert>, EngineError> {
        self.with_session(session_id, |s| Ok(s.active_alerts().to_vec()))
    }

    pub fn alert_history(&self, session_id: &str) -> Result<Vec<Alert>, EngineError> {
        self.with_session(session_id, |s| Ok(s.alert_history().iter().cloned().collect()))
    }

    fn latest_score(session: &Session) -> Result<f64, EngineError> {
        session
            .current_score()
            .ok_or(EngineError::InsufficientHistory { have: 0, need: 1 })
    }

    /// Project the score `hours` ahead; needs at least three scored readings
    pub fn project_risk(&self, session_id: &str, hours: u32) -> Result<RiskProjection, EngineError> {
        let history = self.with_session(session_id, |s| Ok(s.score_history()))?;
        let current = match history.last() {
            Some(&last) if history.len() >= MIN_TREND_POINTS => last,
            _ => {
                return Err(EngineError::InsufficientHistory {
                    have: history.len(),
                    need: MIN_TREND_POINTS,
                })
            }
        };
        Ok(project_risk(current, &history, hours))
    }

    pub fn simulate_scenario(
        &self,
        session_id: &str,
        scenario: &str,
        horizon: Horizon,
    ) -> Result<WhatIfScenario, EngineError> {
        let current = self.with_session(session_id, |s| Self::latest_score(s))?;
        Ok(simulate_scenario(scenario, current, horizon))
    }

    /// Interventions ranked by how far they lift the current score
    pub fn improvement_suggestions(&self, session_id: &str) -> Result<Vec<WhatIfScenario>, EngineError> {
        let current = self.with_session(session_id, |s| Self::latest_score(s))?;
        Ok(improvement_path(current))
    }

    pub fn risk_trajectory(
        &self,
        session_id: &str,
        behavior: Behavior,
        hours: u32,
    ) -> Result<RiskTrajectory, EngineError> {
        let (current, history) = self.with_session(session_id, |s| {
            Ok((Self::latest_score(s)?, s.score_history()))
        })?;
        Ok(risk_trajectory(current, &history, behavior, hours))
    }

    pub fn estimate_recovery_time(
        &self,
        session_id: &str,
        target: Option<f64>,
        intervention: Option<&str>,
    ) -> Result<RecoveryEstimate, EngineError> {
        let current = self.with_session(session_id, |s| Self::latest_score(s))?;
        Ok(project_recovery_time(
            current,
            target.unwrap_or(DEFAULT_RECOVERY_TARGET),
            intervention.unwrap_or(DEFAULT_RECOVERY_INTERVENTION),
        ))
    }

    pub fn session_summary(&self, session_id: &str) -> Result<SessionSummary, EngineError> {
        self.with_session(session_id, |s| {
            let scores = s.score_history();
            let statistics = mean(&scores).map(|average| {
                let mut zone_distribution = BTreeMap::new();
                for snapshot in s.history() {
                    *zone_distribution.entry(snapshot.zone).or_insert(0) += 1;
                }
                ScoreStatistics {
                    average_score: round1(average),
                    min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
                    max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    latest_score: scores.last().copied().unwrap_or(average),
                    zone_distribution,
                }
            });

            Ok(SessionSummary {
                session_id: s.id().to_string(),
                user_id: s.user_id().to_string(),
                status: s.status(),
                language: s.language(),
                created_at: s.created_at(),
                duration_seconds: s.duration().num_seconds(),
                readings_count: s.total_samples(),
                calibrated: s.is_calibrated(),
                baseline: s.baseline().cloned(),
                current_score: s.current_score(),
                current_zone: s.current_zone(),
                statistics,
                trend: s.trend().cloned(),
                active_alert_count: s.active_alerts().len(),
                total_alert_count: s.alert_history().len(),
            })
        })
    }

    /// Structured input for an external message generator
    pub fn nudge_context(&self, session_id: &str) -> Result<NudgeContext, EngineError> {
        self.with_session(session_id, |s| Self::build_nudge_context(s))
    }

    fn build_nudge_context(session: &Session) -> Result<NudgeContext, EngineError> {
        let score = Self::latest_score(session)?;
        let transition = match session.previous_zone() {
            Some(previous) => {
                let previous_score = session
                    .history()
                    .iter()
                    .rev()
                    .nth(1)
                    .map(|h| h.scores.composite);
                Some(detect_zone_transition(score, previous_score, Some(previous)))
            }
            None => None,
        };
        Ok(NudgeContext::assemble(
            score,
            session.current_scores(),
            transition.as_ref(),
            session.active_alerts(),
            session.trend(),
        ))
    }

    /// Build a nudge in the session's language unless `language` overrides it
    pub fn compose_nudge(
        &self,
        session_id: &str,
        language: Option<Language>,
        generator: Option<&dyn NudgeGenerator>,
    ) -> Result<Nudge, EngineError> {
        let (ctx, session_language) =
            self.with_session(session_id, |s| Ok((Self::build_nudge_context(s)?, s.language())))?;
        let config = NudgeConfig {
            language: language.unwrap_or(session_language),
            ..NudgeConfig::default()
        };
        Ok(compose_nudge(&ctx, &config, generator))
    }

    /// Blend the baseline toward the most recent readings.
    ///
    /// Only applies on request; the baseline is otherwise frozen after
    /// calibration.
    pub fn adapt_baseline(&self, session_id: &str) -> Result<Baseline, EngineError> {
        let need = self.config.adaptation_min_samples;
        let window = need.max(self.config.trend_window);
        let rate = self.config.adaptation_rate;

        let adapted = self.with_session(session_id, |s| {
            let baseline = s
                .baseline()
                .cloned()
                .ok_or_else(|| EngineError::NotCalibrated(session_id.to_string()))?;
            let recent: Vec<_> = s.samples().iter().rev().take(window).rev().cloned().collect();
            if recent.len() < need {
                return Err(EngineError::InsufficientHistory {
                    have: recent.len(),
                    need,
                });
            }
            let adapted = adapt_baseline(&baseline, &recent, rate);
            s.set_baseline(adapted.clone());
            Ok(adapted)
        })?;

        info!(
            session_id,
            resting_heart_rate = adapted.resting_heart_rate,
            resting_hrv = adapted.resting_hrv,
            "baseline adapted"
        );
        Ok(adapted)
    }
}
