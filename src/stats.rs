//! Numeric helpers
//!
//! Small statistical routines used by calibration, scoring and trend fitting.
//! Inputs are short score/sample windows, so everything is a straight pass
//! over a slice.

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (0.0 for fewer than two values)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in [0, 100]. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Ordinary least-squares fit of `values` against their index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Fit a line through `(i, values[i])`.
///
/// Returns `None` for fewer than two points. A series with no variance fits
/// perfectly, so its R² is reported as 1.0.
pub fn linear_regression(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();

    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamp to the 0-100 score range
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert!((mean(&[1.0, 2.0, 3.0]).unwrap() - 2.0).abs() < 1e-9);

        // population std of [2,4,4,4,5,5,7,9] is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
        assert_eq!(std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [70.0, 71.0, 72.0, 71.0, 150.0, 70.0, 72.0];
        // sorted: 70 70 71 71 72 72 150
        assert!((percentile(&values, 25.0).unwrap() - 70.5).abs() < 1e-9);
        assert!((percentile(&values, 75.0).unwrap() - 72.0).abs() < 1e-9);
        assert!((percentile(&values, 50.0).unwrap() - 71.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_linear_regression() {
        let fit = linear_regression(&[10.0, 12.0, 14.0, 16.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 10.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);

        let flat = linear_regression(&[50.0, 50.0, 50.0]).unwrap();
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 1.0);

        assert!(linear_regression(&[1.0]).is_none());
    }

    #[test]
    fn test_round_and_clamp() {
        assert_eq!(round1(79.96), 80.0);
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(clamp_score(-4.0), 0.0);
        assert_eq!(clamp_score(104.0), 100.0);
    }
}
