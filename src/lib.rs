//! # shmclock - Shared Memory Reference Clock Driver
//!
//! shmclock reads timestamps that an independent producer (a GPS daemon,
//! a PPS helper, another time daemon) posts into the classic NTP shared
//! memory segment, and turns them into samples a time synchronization
//! engine can use.
//!
//! ## Features
//!
//! - **Fixed segment layout**: byte-compatible with existing SHM producers
//! - **Both read disciplines**: unguarded, and count-guarded with clash detection
//! - **Nanosecond reconciliation**: nanosecond fields adopted only when they agree with microseconds
//! - **Sample screening**: staleness and drift limits, configurable drift tolerance
//! - **Cycle statistics**: per-poll counters and degraded-state classification
//! - **Pluggable backing**: SysV IPC, memory-mapped files, or in-process segments
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  timer (1 s)   ┌────────────────────┐
//! │ SyncEngine   │ ─────────────▶ │ ShmRefClock        │
//! │ (downstream) │ ◀───────────── │  SegmentHandle     │──▶ segment (producer-owned)
//! └──────────────┘  offsets,      │  SampleProtocolReader
//!        ▲          faults        │  SampleValidator   │
//!        │  poll                  │  StatsAggregator   │
//!        └─────────────────────── │  ThresholdController
//!                                 └────────────────────┘
//! ```
//!
//! The segment is read without locks. Guarded mode detects a producer that
//! wrote mid-read, nothing more; there are no memory fences on either side.

pub mod error;
pub mod timestamp;
pub mod segment;
pub mod protocol;
pub mod validate;
pub mod stats;
pub mod threshold;
pub mod clock;
pub mod driver;

// Main API re-exports
pub use error::{ShmClockError, Result};
pub use timestamp::{LeapIndicator, Timestamp};
pub use segment::{
    AttachedSegment, BackingType, PrivateSegment, RawStamp, SegmentAccess, SegmentConfig,
    SegmentHandle, SegmentProvider, ShmTime, ShmView, SystemSegmentProvider,
};
pub use protocol::{
    Publication, RawSample, ReadMode, ReadOutcome, SampleProtocolReader, SegmentPublisher,
};
pub use validate::{Rejection, SampleValidator, ValidatedSample};
pub use stats::{ClockStats, RejectKind, StatsAggregator};
pub use threshold::{ThresholdController, Thresholds};
pub use clock::{SystemClock, WallClock};
pub use driver::{
    ClockControl, DriverConfig, FaultKind, PeekOutcome, PollReport, RefClock, ShmRefClock,
    SyncEngine,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timing constants
pub mod defaults {
    /// Timer period: one read attempt per second
    pub const TIMER_INTERVAL_SECS: u64 = 1;

    /// Default poll interval (2^6 s)
    pub const POLL_INTERVAL_SECS: u64 = 64;

    /// Maximum accepted sample age in seconds
    pub const MAX_DELAY_SECS: i64 = crate::threshold::DEFAULT_MAX_DELAY;

    /// Drift limit used when none is configured, seconds
    pub const MAX_DELTA_SECS: i64 = crate::threshold::DEFAULT_MAX_DELTA;
}
