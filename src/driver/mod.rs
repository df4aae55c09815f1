//! Reference clock driver interface and the SHM driver
//!
//! A synchronization engine drives every reference clock through the same
//! operation set ([`RefClock`]) and receives results through
//! [`SyncEngine`]. [`ShmRefClock`] is the shared-memory implementation.

pub mod config;
pub mod shm;

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    timestamp::{LeapIndicator, Timestamp},
};

pub use config::DriverConfig;
pub use shm::{PeekOutcome, PollReport, ShmRefClock};

/// Degraded-state signal reported when a poll cycle produced no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// No segment attached; the driver is out of business
    NoSegment,
    /// Access clashes dominated; treated like a bad propagation path
    Propagation,
    /// Stale, drifting or malformed samples dominated
    BadReply,
    /// Nothing in particular dominated; the producer is just quiet
    Timeout,
}

/// Operator-supplied clock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockControl {
    /// Fudge offset in seconds, passed along with every sample
    pub time1: f64,
    /// Requested drift limit in seconds
    pub time2: f64,
    /// Disable the drift check
    pub flag1: bool,
    /// Emit the clock-stats line every poll
    pub flag4: bool,
}

impl Default for ClockControl {
    fn default() -> Self {
        Self {
            time1: 0.0,
            time2: 0.0,
            flag1: false,
            flag4: false,
        }
    }
}

/// Downstream synchronization engine, as seen from a driver
pub trait SyncEngine {
    /// Hand over one validated offset sample
    fn submit_offset(&mut self, receive: Timestamp, clock: Timestamp, fudge: f64);

    /// Mirror the source's leap indicator into the peer
    fn set_leap(&mut self, leap: LeapIndicator);

    /// Mirror the source's precision exponent into the peer
    fn set_precision(&mut self, precision: i32);

    /// Process the samples submitted since the last poll
    fn receive(&mut self);

    /// Report a degraded state
    fn report_fault(&mut self, fault: FaultKind);

    /// Clock statistics sink
    fn record_clock_stats(&mut self, line: &str);
}

/// Uniform operation set of a reference clock driver
pub trait RefClock {
    /// Attach resources and initialize peer state
    fn start(&mut self, engine: &mut dyn SyncEngine) -> Result<()>;

    /// Release resources; safe to call repeatedly
    fn shutdown(&mut self);

    /// Poll-interval processing
    fn poll(&mut self, engine: &mut dyn SyncEngine);

    /// Once-per-second processing
    fn timer(&mut self, engine: &mut dyn SyncEngine);

    /// Apply operator settings
    fn control(&mut self, control: &ClockControl);

    /// Four-character reference identifier
    fn reference_id(&self) -> [u8; 4];

    /// Human-readable driver description
    fn description(&self) -> &'static str;
}
