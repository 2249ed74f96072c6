//! Reading validation
//!
//! Raw readings arrive from a transport layer with optional, possibly null
//! fields. A [`SampleValidator`] turns them into a [`Sample`] that is free of
//! missing values and inside physiological bounds, or rejects them with an
//! enumerated [`ValidationError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Metric, Sample};

/// Inclusive physiological bounds per metric
pub const HEART_RATE_RANGE: (f64, f64) = (30.0, 220.0);
pub const HRV_RANGE: (f64, f64) = (0.0, 200.0);
pub const SPO2_RANGE: (f64, f64) = (70.0, 100.0);
pub const TEMPERATURE_RANGE: (f64, f64) = (30.0, 42.0);

/// Beat-to-beat jump treated as a motion artifact (bpm)
pub const MOTION_ARTIFACT_HR_JUMP: f64 = 40.0;

/// Reading rejection reasons
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field is null: {0}")]
    NullValue(String),

    #[error("Field is not a number: {0}")]
    NanValue(String),

    #[error("{field} out of range: {value} (expected {min}-{max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("SpO2 critically low: {0}%")]
    CriticallyLowSpo2(f64),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::NullValue(_) => "null_value",
            ValidationError::NanValue(_) => "nan_value",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::CriticallyLowSpo2(_) => "critically_low_spo2",
            ValidationError::InvalidTimestamp(_) => "invalid_timestamp",
        }
    }
}

/// Unvalidated reading as handed over by a transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub heart_rate: Option<f64>,
    pub hrv: Option<f64>,
    pub spo2: Option<f64>,
    pub temperature: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawReading {
    pub fn new(heart_rate: f64, hrv: f64, spo2: f64, temperature: f64) -> Self {
        Self {
            heart_rate: Some(heart_rate),
            hrv: Some(hrv),
            spo2: Some(spo2),
            temperature: Some(temperature),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a reading from a JSON object.
    ///
    /// An absent key is reported as [`ValidationError::MissingField`] and an
    /// explicit `null` as [`ValidationError::NullValue`]. Heart rate may also
    /// be sent as `bpm` or `hr`, temperature as `temp`.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::MissingField("reading".to_string()))?;

        let heart_rate = read_number(obj, "heart_rate", &["bpm", "hr"])?;
        let hrv = read_number(obj, "hrv", &[])?;
        let spo2 = read_number(obj, "spo2", &[])?;
        let temperature = read_number(obj, "temperature", &["temp"])?;

        let timestamp = match obj.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|_| ValidationError::InvalidTimestamp(s.clone()))?
                    .with_timezone(&Utc),
            ),
            Some(other) => return Err(ValidationError::InvalidTimestamp(other.to_string())),
        };

        Ok(Self {
            heart_rate: Some(heart_rate),
            hrv: Some(hrv),
            spo2: Some(spo2),
            temperature: Some(temperature),
            timestamp,
        })
    }

    fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::HeartRate => self.heart_rate,
            Metric::Hrv => self.hrv,
            Metric::Spo2 => self.spo2,
            Metric::Temperature => self.temperature,
        }
    }
}

fn read_number(
    obj: &Map<String, Value>,
    key: &str,
    aliases: &[&str],
) -> Result<f64, ValidationError> {
    let (name, value) = std::iter::once(key)
        .chain(aliases.iter().copied())
        .find_map(|k| obj.get(k).map(|v| (k, v)))
        .ok_or_else(|| ValidationError::MissingField(key.to_string()))?;

    match value {
        Value::Null => Err(ValidationError::NullValue(name.to_string())),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ValidationError::NanValue(name.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NanValue(name.to_string())),
        _ => Err(ValidationError::NanValue(name.to_string())),
    }
}

/// Validation/sanitization collaborator
pub trait SampleValidator: Send + Sync {
    /// Turn a raw reading into a sample fit for scoring
    fn validate(&self, raw: &RawReading) -> Result<Sample, ValidationError>;
}

/// Default validator enforcing the physiological bounds above
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeValidator;

impl RangeValidator {
    pub fn range(metric: Metric) -> (f64, f64) {
        match metric {
            Metric::HeartRate => HEART_RATE_RANGE,
            Metric::Hrv => HRV_RANGE,
            Metric::Spo2 => SPO2_RANGE,
            Metric::Temperature => TEMPERATURE_RANGE,
        }
    }

    fn check(metric: Metric, value: Option<f64>) -> Result<f64, ValidationError> {
        let field = metric.as_str();
        let value = value.ok_or_else(|| ValidationError::MissingField(field.to_string()))?;

        if value.is_nan() {
            return Err(ValidationError::NanValue(field.to_string()));
        }

        let (min, max) = Self::range(metric);

        // Hypoxic readings get their own reason so callers can escalate
        if metric == Metric::Spo2 && value < min {
            return Err(ValidationError::CriticallyLowSpo2(value));
        }

        if !(min..=max).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }

        Ok(value)
    }
}

impl SampleValidator for RangeValidator {
    fn validate(&self, raw: &RawReading) -> Result<Sample, ValidationError> {
        let heart_rate = Self::check(Metric::HeartRate, raw.get(Metric::HeartRate))?;
        let hrv = Self::check(Metric::Hrv, raw.get(Metric::Hrv))?;
        let spo2 = Self::check(Metric::Spo2, raw.get(Metric::Spo2))?;
        let temperature = Self::check(Metric::Temperature, raw.get(Metric::Temperature))?;

        Ok(Sample::at(
            raw.timestamp.unwrap_or_else(Utc::now),
            heart_rate,
            hrv,
            spo2,
            temperature,
        ))
    }
}

/// Sensor fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorError {
    /// Implausible heart-rate jump between consecutive samples
    MotionArtifact,
}

impl SensorError {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorError::MotionArtifact => "motion_artifact",
        }
    }
}

/// Check a validated sample against its predecessor for sensor faults.
///
/// The sample is still usable; the flag is informational.
pub fn detect_sensor_error(current: &Sample, previous: Option<&Sample>) -> Option<SensorError> {
    let previous = previous?;
    if (current.heart_rate - previous.heart_rate).abs() > MOTION_ARTIFACT_HR_JUMP {
        return Some(SensorError::MotionArtifact);
    }
    None
}
