//! Second/nanosecond instants and leap indicators carried by samples

use serde::{Deserialize, Serialize};

/// Nanoseconds per second
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Seconds between the NTP era 0 epoch (1900) and the Unix epoch (1970)
pub const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// A moment in time as an offset from the Unix epoch
///
/// `nanos` is always normalized to `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp from already-normalized parts
    pub const fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// Create a timestamp from a seconds value and an arbitrary nanosecond
    /// count, carrying overflow (or negative values) into the seconds field
    pub fn from_parts(secs: i64, nanos: i64) -> Self {
        let carry = nanos.div_euclid(NANOS_PER_SEC);
        let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        Self {
            secs: secs.wrapping_add(carry),
            nanos,
        }
    }

    /// Convert to the 64-bit NTP fixed-point format (32.32, era 0)
    ///
    /// The seconds part wraps at era boundaries like every NTP timestamp.
    pub fn to_ntp_fixed(&self) -> u64 {
        let secs = self.secs.wrapping_add(NTP_UNIX_OFFSET) as u32 as u64;
        let frac = ((self.nanos as u64) << 32) / NANOS_PER_SEC as u64;
        (secs << 32) | frac
    }

    /// Signed difference `self - other` in seconds
    pub fn seconds_since(&self, other: &Timestamp) -> f64 {
        (self.secs - other.secs) as f64 + (self.nanos as f64 - other.nanos as f64) / 1e9
    }
}

/// Leap second warning mirrored from the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeapIndicator {
    /// No leap second warning
    #[default]
    NoWarning,
    /// Last minute of the day has 61 seconds
    AddSecond,
    /// Last minute of the day has 59 seconds
    DelSecond,
    /// Clock not synchronized
    Alarm,
}

impl LeapIndicator {
    /// Map the producer's raw leap field; anything outside 0..=3 is treated
    /// as unsynchronized
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::NoWarning,
            1 => Self::AddSecond,
            2 => Self::DelSecond,
            _ => Self::Alarm,
        }
    }

    /// Wire value of the indicator
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::NoWarning => 0,
            Self::AddSecond => 1,
            Self::DelSecond => 2,
            Self::Alarm => 3,
        }
    }
}
