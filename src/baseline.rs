//! Baseline calibration
//!
//! A session starts by collecting resting samples. Once enough have arrived
//! the window is filtered for outliers and the per-metric means become the
//! frozen baseline every later sample is scored against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::{mean, percentile, std_dev};
use crate::types::{Metric, Sample};

/// IQR filtering needs at least this many values
pub const MIN_SAMPLES_FOR_IQR: usize = 4;

/// Default calibration window size
pub const DEFAULT_CALIBRATION_SAMPLES: usize = 15;

/// Heart-rate std dev (bpm) above which the user is considered moving
pub const MOTION_HR_STD_THRESHOLD: f64 = 8.0;

/// HRV std dev (ms) above which the user is considered moving
pub const MOTION_HRV_STD_THRESHOLD: f64 = 10.0;

/// Mean heart rate suggesting a post-exercise start
pub const POST_EXERCISE_HR: f64 = 100.0;

/// Mean HRV suggesting a post-exercise start
pub const POST_EXERCISE_HRV: f64 = 25.0;

/// Recent samples required before a baseline may adapt
pub const MIN_ADAPTATION_SAMPLES: usize = 10;

/// IQR bounds `(Q1 - 1.5*IQR, Q3 + 1.5*IQR)`, `None` below [`MIN_SAMPLES_FOR_IQR`]
pub fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < MIN_SAMPLES_FOR_IQR {
        return None;
    }
    let q1 = percentile(values, 25.0)?;
    let q3 = percentile(values, 75.0)?;
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Drop items whose extracted value falls outside the IQR bounds.
///
/// With fewer than four items nothing is removed.
pub fn remove_outliers<T, F>(items: &[T], value_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> f64,
{
    let values: Vec<f64> = items.iter().map(&value_of).collect();
    match iqr_bounds(&values) {
        Some((lower, upper)) => items
            .iter()
            .zip(values)
            .filter(|(_, v)| *v >= lower && *v <= upper)
            .map(|(item, _)| item.clone())
            .collect(),
        None => items.to_vec(),
    }
}

/// Keep only samples whose four metrics all fall inside their bounds.
///
/// Bounds are computed per metric over the whole window.
pub fn remove_outliers_all(samples: &[Sample]) -> Vec<Sample> {
    let bounds: Vec<(Metric, Option<(f64, f64)>)> = Metric::ALL
        .iter()
        .map(|&m| {
            let values: Vec<f64> = samples.iter().map(|s| s.value(m)).collect();
            (m, iqr_bounds(&values))
        })
        .collect();

    samples
        .iter()
        .filter(|s| {
            bounds.iter().all(|(m, b)| match b {
                Some((lower, upper)) => {
                    let v = s.value(*m);
                    v >= *lower && v <= *upper
                }
                None => true,
            })
        })
        .cloned()
        .collect()
}

/// Population standard deviation per metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricVariance {
    pub heart_rate: f64,
    pub hrv: f64,
    pub spo2: f64,
    pub temperature: f64,
}

/// Per-metric standard deviation (all zero for fewer than two samples)
pub fn calculate_variance(samples: &[Sample]) -> MetricVariance {
    let column = |m: Metric| -> Vec<f64> { samples.iter().map(|s| s.value(m)).collect() };
    MetricVariance {
        heart_rate: std_dev(&column(Metric::HeartRate)),
        hrv: std_dev(&column(Metric::Hrv)),
        spo2: std_dev(&column(Metric::Spo2)),
        temperature: std_dev(&column(Metric::Temperature)),
    }
}

/// True when heart rate or HRV fluctuate too much for a resting window
pub fn detect_motion(samples: &[Sample]) -> bool {
    let variance = calculate_variance(samples);
    variance.heart_rate > MOTION_HR_STD_THRESHOLD || variance.hrv > MOTION_HRV_STD_THRESHOLD
}

/// True when the window looks like the user just finished exercising
pub fn is_post_exercise(samples: &[Sample]) -> bool {
    let hr: Vec<f64> = samples.iter().map(|s| s.heart_rate).collect();
    let hrv: Vec<f64> = samples.iter().map(|s| s.hrv).collect();

    let high_hr = mean(&hr).is_some_and(|m| m > POST_EXERCISE_HR);
    let low_hrv = mean(&hrv).is_some_and(|m| m < POST_EXERCISE_HRV);
    high_hr || low_hrv
}

/// Calibration quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CalibrationQuality {
    /// Tier from the share of rejected samples and the heart-rate spread
    pub fn assess(rejection_rate: f64, hr_std: f64) -> Self {
        if rejection_rate <= 0.05 && hr_std < 2.0 {
            CalibrationQuality::Excellent
        } else if rejection_rate <= 0.15 && hr_std < 4.0 {
            CalibrationQuality::Good
        } else if rejection_rate <= 0.30 && hr_std < 8.0 {
            CalibrationQuality::Fair
        } else {
            CalibrationQuality::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationQuality::Excellent => "excellent",
            CalibrationQuality::Good => "good",
            CalibrationQuality::Fair => "fair",
            CalibrationQuality::Poor => "poor",
        }
    }
}

/// Resting reference values for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub resting_heart_rate: f64,
    pub resting_hrv: f64,
    pub normal_spo2: f64,
    pub normal_temperature: f64,
    pub quality: CalibrationQuality,
    pub variance: MetricVariance,
    /// Samples that survived outlier rejection
    pub samples_used: usize,
    pub outliers_removed: usize,
    pub calibrated_at: DateTime<Utc>,
}

impl Baseline {
    /// Baseline from known reference values rather than a calibration window
    pub fn from_values(heart_rate: f64, hrv: f64, spo2: f64, temperature: f64) -> Self {
        Self {
            resting_heart_rate: heart_rate,
            resting_hrv: hrv,
            normal_spo2: spo2,
            normal_temperature: temperature,
            quality: CalibrationQuality::Good,
            variance: MetricVariance::default(),
            samples_used: 0,
            outliers_removed: 0,
            calibrated_at: Utc::now(),
        }
    }

    /// Population reference used before a session has calibrated
    pub fn population_default() -> Self {
        Self::from_values(70.0, 50.0, 98.0, 36.5)
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HeartRate => self.resting_heart_rate,
            Metric::Hrv => self.resting_hrv,
            Metric::Spo2 => self.normal_spo2,
            Metric::Temperature => self.normal_temperature,
        }
    }

    /// Load a baseline from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the baseline to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Window sizes governing calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPolicy {
    /// Samples collected before a first attempt
    pub target_samples: usize,
    /// Surviving samples required to accept a baseline
    pub min_clean_samples: usize,
    /// Window size for the retry after a noisy first attempt
    pub extended_samples: usize,
}

impl Default for CalibrationPolicy {
    fn default() -> Self {
        Self::for_target(DEFAULT_CALIBRATION_SAMPLES)
    }
}

impl CalibrationPolicy {
    /// Policy scaled to a target window (15 gives 12 clean / 20 extended)
    pub fn for_target(target: usize) -> Self {
        let target = target.max(1);
        Self {
            target_samples: target,
            min_clean_samples: (target * 4).div_ceil(5),
            extended_samples: target + target.div_ceil(3),
        }
    }
}

/// Progress of a calibration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Still filling the initial window
    Collecting,
    /// Too many outliers; collecting up to the extended window
    ExtendedWindow,
    Complete,
    /// Extended window still too noisy; the window must restart
    Failed,
}

/// Soft calibration problems. None of these block completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationWarning {
    Motion,
    PostExercise,
    NoisyWindow,
}

impl CalibrationWarning {
    pub fn message(&self) -> &'static str {
        match self {
            CalibrationWarning::Motion => {
                "High variability detected during calibration - please stay still"
            }
            CalibrationWarning::PostExercise => {
                "Elevated heart rate detected - please rest for 5 minutes before calibrating"
            }
            CalibrationWarning::NoisyWindow => {
                "Too many irregular readings - collecting additional samples"
            }
        }
    }
}

/// Outcome of running the calibrator over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub status: CalibrationStatus,
    pub samples_collected: usize,
    /// Additional samples needed before the next attempt
    pub samples_needed: usize,
    pub baseline: Option<Baseline>,
    pub warnings: Vec<CalibrationWarning>,
}

impl CalibrationResult {
    pub fn calibration_complete(&self) -> bool {
        self.status == CalibrationStatus::Complete
    }

    pub fn message(&self) -> String {
        match self.status {
            CalibrationStatus::Collecting | CalibrationStatus::ExtendedWindow => format!(
                "Calibrating: {} more readings needed",
                self.samples_needed
            ),
            CalibrationStatus::Complete => "Calibration complete".to_string(),
            CalibrationStatus::Failed => {
                "Calibration failed: readings too irregular, restarting".to_string()
            }
        }
    }
}

/// Attempt to establish a baseline from `samples`.
///
/// Motion and post-exercise conditions are reported as warnings on the
/// raw window but never prevent completion.
pub fn calibrate(samples: &[Sample], policy: &CalibrationPolicy) -> CalibrationResult {
    let collected = samples.len();

    if collected < policy.target_samples {
        return CalibrationResult {
            status: CalibrationStatus::Collecting,
            samples_collected: collected,
            samples_needed: policy.target_samples - collected,
            baseline: None,
            warnings: Vec::new(),
        };
    }

    let mut warnings = Vec::new();
    if detect_motion(samples) {
        warnings.push(CalibrationWarning::Motion);
    }
    if is_post_exercise(samples) {
        warnings.push(CalibrationWarning::PostExercise);
    }

    let clean = remove_outliers_all(samples);

    if clean.len() < policy.min_clean_samples {
        warnings.push(CalibrationWarning::NoisyWindow);
        let (status, needed) = if collected < policy.extended_samples {
            (
                CalibrationStatus::ExtendedWindow,
                policy.extended_samples - collected,
            )
        } else {
            (CalibrationStatus::Failed, policy.target_samples)
        };
        return CalibrationResult {
            status,
            samples_collected: collected,
            samples_needed: needed,
            baseline: None,
            warnings,
        };
    }

    let column = |m: Metric| -> Vec<f64> { clean.iter().map(|s| s.value(m)).collect() };
    let variance = calculate_variance(&clean);
    let outliers_removed = collected - clean.len();
    let rejection_rate = outliers_removed as f64 / collected as f64;

    let baseline = Baseline {
        resting_heart_rate: mean(&column(Metric::HeartRate)).unwrap_or_default(),
        resting_hrv: mean(&column(Metric::Hrv)).unwrap_or_default(),
        normal_spo2: mean(&column(Metric::Spo2)).unwrap_or_default(),
        normal_temperature: mean(&column(Metric::Temperature)).unwrap_or_default(),
        quality: CalibrationQuality::assess(rejection_rate, variance.heart_rate),
        variance,
        samples_used: clean.len(),
        outliers_removed,
        calibrated_at: Utc::now(),
    };

    CalibrationResult {
        status: CalibrationStatus::Complete,
        samples_collected: collected,
        samples_needed: 0,
        baseline: Some(baseline),
        warnings,
    }
}

/// Nudge a baseline toward recent behaviour with an exponential moving average.
///
/// `rate` is clamped to [0, 1]. With fewer than [`MIN_ADAPTATION_SAMPLES`]
/// recent samples the baseline is returned unchanged.
pub fn adapt_baseline(baseline: &Baseline, recent: &[Sample], rate: f64) -> Baseline {
    if recent.len() < MIN_ADAPTATION_SAMPLES {
        return baseline.clone();
    }

    let rate = rate.clamp(0.0, 1.0);
    let blend = |old: f64, m: Metric| -> f64 {
        let values: Vec<f64> = recent.iter().map(|s| s.value(m)).collect();
        match mean(&values) {
            Some(avg) => old * (1.0 - rate) + avg * rate,
            None => old,
        }
    };

    Baseline {
        resting_heart_rate: blend(baseline.resting_heart_rate, Metric::HeartRate),
        resting_hrv: blend(baseline.resting_hrv, Metric::Hrv),
        normal_spo2: blend(baseline.normal_spo2, Metric::Spo2),
        normal_temperature: blend(baseline.normal_temperature, Metric::Temperature),
        ..baseline.clone()
    }
}
