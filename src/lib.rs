//! Synheart Cardio - session-scoped cardiovascular scoring engine
//!
//! Cardio turns a stream of periodic biometric readings (heart rate, HRV,
//! blood oxygen, skin temperature) into a single 0-100 health indicator
//! through a deterministic per-session pipeline: validation → baseline
//! calibration → component scoring → zone classification → anomaly
//! detection → trend projection.
//!
//! ## Modules
//!
//! - **Engine**: session registry and per-reading orchestration
//! - **Scoring**: baseline calibration, component curves and the composite
//! - **Risk**: zones, anomaly rules, trend and what-if projections
//! - **Nudges**: fallback message templates and generator context
//!
//! Outputs are heuristic and bounded. This is not a medical device.

pub mod anomaly;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod nudges;
pub mod projection;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod types;
pub mod validation;
pub mod zones;

pub use anomaly::{detect_anomalies, Alert, AlertSeverity, AlertType, AnomalyInput};
pub use baseline::{calibrate, Baseline, CalibrationPolicy, CalibrationResult};
pub use config::EngineConfig;
pub use engine::{CardioEngine, ProcessingResult, SessionSummary};
pub use error::EngineError;
pub use nudges::{Language, Nudge, NudgeContext, NudgeGenerator};
pub use projection::{calculate_trend, project_risk, simulate_scenario, Horizon, TrendAnalysis};
pub use scoring::{calculate_composite, score_sample, ScoringWeights};
pub use session::{Session, SessionStatus};
pub use types::{ComponentScore, ComponentScores, Metric, Sample};
pub use validation::{RangeValidator, RawReading, SampleValidator, ValidationError};
pub use zones::{classify_zone, Zone, ZoneTransition};

/// Cardio version reported by the CLI
pub const CARDIO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for emitted records
pub const PRODUCER_NAME: &str = "synheart-cardio";
