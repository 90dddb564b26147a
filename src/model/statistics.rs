//! Rolling price-series statistics

/// Returned for series too short to have a spread, so callers can divide safely
pub const STD_DEV_FLOOR: f64 = 1e-6;

/// Arithmetic mean, `None` for an empty series
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation of a bounded series
///
/// Fewer than two samples yields [`STD_DEV_FLOOR`] rather than zero.
/// Two-pass (mean, then squared deviations) for stability on short windows.
pub fn rolling_std_dev(values: &[f64]) -> f64 {
    let Some(mean) = mean(values).filter(|_| values.len() >= 2) else {
        return STD_DEV_FLOOR;
    };

    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// The last `size` elements of a series (all of it when shorter)
pub fn tail(values: &[f64], size: usize) -> &[f64] {
    &values[values.len().saturating_sub(size)..]
}
