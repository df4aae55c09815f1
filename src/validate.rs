//! Staleness and drift screening of raw samples

use chrono::{DateTime, Datelike, Timelike, Utc};
use log::error;

use crate::{
    protocol::RawSample,
    threshold::Thresholds,
    timestamp::{LeapIndicator, Timestamp},
};

/// Why a raw sample was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Receive instant is in the future or older than the delay limit
    #[error("stale/bad receive time, delay={age}s")]
    Stale { age: i64 },
    /// Receive and clock instants are further apart than the drift limit
    #[error("difference limit exceeded, delta={delta}s")]
    ExcessiveDrift { delta: i64 },
}

/// A sample that passed validation, ready for the synchronization engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSample {
    pub receive: Timestamp,
    pub clock: Timestamp,
    pub leap: LeapIndicator,
    pub precision: i32,
    /// Diagnostic `YYYY-MM-DDThh:mm:ss.nnnnnnnnnZ` rendering of `clock`
    pub timecode: String,
}

/// Applies the staleness and drift checks
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleValidator;

impl SampleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Screen `raw` against `thresholds` at wall-clock second `now`
    pub fn validate(
        &self,
        raw: &RawSample,
        now: i64,
        thresholds: &Thresholds,
    ) -> Result<ValidatedSample, Rejection> {
        let age = now.saturating_sub(raw.receive.secs);
        if age < 0 || age > thresholds.max_delay {
            let rejection = Rejection::Stale { age };
            error!("SHM: {}", rejection);
            return Err(rejection);
        }

        let delta = drift_seconds(&raw.receive, &raw.clock);
        if thresholds.max_delta > 0 && delta > thresholds.max_delta {
            let rejection = Rejection::ExcessiveDrift { delta };
            error!("SHM: {}", rejection);
            return Err(rejection);
        }

        Ok(ValidatedSample {
            receive: raw.receive,
            clock: raw.clock,
            leap: raw.leap,
            precision: raw.precision,
            timecode: format_timecode(&raw.clock),
        })
    }
}

/// Whole seconds between receive and clock instants
///
/// A second is borrowed when the receive fraction is below the clock
/// fraction; the sub-second remainder is not part of the comparison.
pub fn drift_seconds(receive: &Timestamp, clock: &Timestamp) -> i64 {
    let borrow = (receive.nanos < clock.nanos) as i64;
    receive
        .secs
        .saturating_sub(clock.secs)
        .saturating_sub(borrow)
        .saturating_abs()
}

/// Render an instant as `YYYY-MM-DDThh:mm:ss.nnnnnnnnnZ` (UTC)
///
/// Returns an empty string for instants outside the representable
/// calendar range.
pub fn format_timecode(ts: &Timestamp) -> String {
    match DateTime::<Utc>::from_timestamp(ts.secs, 0) {
        Some(dt) => format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            ts.nanos
        ),
        None => String::new(),
    }
}
