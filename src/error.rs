//! Error types for Synheart Cardio

use thiserror::Error;

use crate::session::SessionStatus;
use crate::validation::ValidationError;

/// Errors surfaced by the scoring engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Session has ended: {0}")]
    SessionEnded(String),

    #[error("Session is paused: {0}")]
    SessionPaused(String),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },

    #[error("Invalid reading: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient score history: have {have}, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Session has no baseline yet: {0}")]
    NotCalibrated(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::SessionNotFound(_) => "session_not_found",
            EngineError::SessionExists(_) => "session_exists",
            EngineError::SessionEnded(_) => "session_ended",
            EngineError::SessionPaused(_) => "session_paused",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::Validation(e) => e.reason(),
            EngineError::InvalidWeights(_) => "invalid_weights",
            EngineError::InvalidConfig(_) => "invalid_config",
            EngineError::InsufficientHistory { .. } => "insufficient_history",
            EngineError::NotCalibrated(_) => "not_calibrated",
            EngineError::Json(_) => "invalid_json",
        }
    }

    /// Whether the error concerns session lifecycle rather than input data
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EngineError::SessionNotFound(_)
                | EngineError::SessionExists(_)
                | EngineError::SessionEnded(_)
                | EngineError::SessionPaused(_)
                | EngineError::InvalidTransition { .. }
        )
    }
}
