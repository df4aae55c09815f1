//! Drift and delay limits and how configuration maps onto them

use serde::{Deserialize, Serialize};

/// Maximum accepted age of a receive timestamp, seconds
pub const DEFAULT_MAX_DELAY: i64 = 5;

/// Drift limit used when the configured value is unusable, seconds (4 h)
pub const DEFAULT_MAX_DELTA: i64 = 4 * 3600;

/// Largest drift limit that may be configured, seconds (1 day)
pub const MAX_CONFIGURABLE_DELTA: f64 = 86400.0;

/// Smallest drift limit that may be configured, seconds
pub const MIN_CONFIGURABLE_DELTA: f64 = 1.0;

/// Limits applied by the sample validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Samples whose receive time is older than this are stale
    pub max_delay: i64,
    /// Samples whose receive/clock difference exceeds this are rejected;
    /// `0` disables the check
    pub max_delta: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_delay: DEFAULT_MAX_DELAY,
            max_delta: DEFAULT_MAX_DELTA,
        }
    }
}

impl Thresholds {
    /// Check if the drift check is active
    pub fn drift_check_enabled(&self) -> bool {
        self.max_delta > 0
    }
}

/// Derives the drift limit from clock configuration
///
/// The delay limit is fixed at [`DEFAULT_MAX_DELAY`] and is not touched
/// here.
#[derive(Debug, Clone, Default)]
pub struct ThresholdController {
    thresholds: Thresholds,
}

impl ThresholdController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the drift limit and return it
    ///
    /// `disable_drift` wins over everything. Otherwise a request outside
    /// `[1, 86400]` seconds (NaN included) falls back to four hours, and an
    /// in-range request is rounded half up to whole seconds. Requests below
    /// one second would round to zero and silently disable the check, so
    /// they count as out of range.
    pub fn apply_config(&mut self, disable_drift: bool, requested_delta: f64) -> i64 {
        self.thresholds.max_delta = Self::derive_delta(disable_drift, requested_delta);
        self.thresholds.max_delta
    }

    fn derive_delta(disable_drift: bool, requested: f64) -> i64 {
        if disable_drift {
            0
        } else if !(MIN_CONFIGURABLE_DELTA..=MAX_CONFIGURABLE_DELTA).contains(&requested) {
            DEFAULT_MAX_DELTA
        } else {
            (requested + 0.5).floor() as i64
        }
    }

    /// Current limits
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let controller = ThresholdController::new();
        assert_eq!(controller.thresholds().max_delay, 5);
        assert_eq!(controller.thresholds().max_delta, 14400);
    }

    #[test]
    fn test_disable_flag_wins() {
        let mut controller = ThresholdController::new();
        assert_eq!(controller.apply_config(true, 30.0), 0);
        assert!(!controller.thresholds().drift_check_enabled());
    }

    #[test]
    fn test_out_of_range_falls_back() {
        let mut controller = ThresholdController::new();
        assert_eq!(controller.apply_config(false, 0.0), DEFAULT_MAX_DELTA);
        assert_eq!(controller.apply_config(false, -3.0), DEFAULT_MAX_DELTA);
        assert_eq!(controller.apply_config(false, 86400.5), DEFAULT_MAX_DELTA);
        assert_eq!(controller.apply_config(false, f64::NAN), DEFAULT_MAX_DELTA);
        assert_eq!(controller.apply_config(false, 0.4), DEFAULT_MAX_DELTA);
    }

    #[test]
    fn test_rounds_to_nearest_second() {
        let mut controller = ThresholdController::new();
        assert_eq!(controller.apply_config(false, 10.4), 10);
        assert_eq!(controller.apply_config(false, 10.5), 11);
        assert_eq!(controller.apply_config(false, 86400.0), 86400);
    }

    #[test]
    fn test_idempotent() {
        let mut controller = ThresholdController::new();
        let first = controller.apply_config(false, 42.7);
        let second = controller.apply_config(false, 42.7);
        assert_eq!(first, second);
        assert_eq!(controller.thresholds().max_delay, DEFAULT_MAX_DELAY);
    }
}
