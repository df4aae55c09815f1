//! Sample protocol reader
//!
//! One logical read of a unit segment under either supported discipline:
//!
//! - **Unguarded** (mode 0): if `valid` is set the fields are used as they
//!   are.
//! - **Guarded** (mode 1): `count` is loaded before and after the timestamp
//!   fields; a difference means the producer wrote mid-read and the whole
//!   sample is discarded as a clash.
//!
//! The guarded check is a best-effort detector built on plain volatile
//! loads (see [`crate::segment::view`]). A clash is never retried in place;
//! the next tick performs a fresh read.

pub mod writer;

use log::{error, trace, warn};

use crate::{
    segment::{RawStamp, SegmentAccess},
    segment::layout::{MODE_GUARDED, MODE_UNGUARDED},
    timestamp::{LeapIndicator, Timestamp},
};

pub use writer::{Publication, SegmentPublisher};

/// Maximum distance between a nanosecond field and its microsecond field
/// (scaled to nanoseconds) for the nanosecond field to be trusted
pub const NSEC_AGREEMENT_WINDOW: u32 = 1000;

/// Read discipline announced by the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Unguarded,
    Guarded,
}

impl ReadMode {
    /// Decode the segment's mode tag
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            MODE_UNGUARDED => Some(Self::Unguarded),
            MODE_GUARDED => Some(Self::Guarded),
            _ => None,
        }
    }

    /// Wire tag for this mode
    pub fn tag(&self) -> i32 {
        match self {
            Self::Unguarded => MODE_UNGUARDED,
            Self::Guarded => MODE_GUARDED,
        }
    }
}

/// A sample taken from the segment, not yet validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Discipline the sample was read under
    pub mode: ReadMode,
    /// Reference clock instant
    pub clock: Timestamp,
    /// Local receive instant
    pub receive: Timestamp,
    pub leap: LeapIndicator,
    pub precision: i32,
    /// Whether the nanosecond fields were adopted (otherwise both instants
    /// carry microsecond resolution)
    pub nanosecond_resolution: bool,
}

/// Result of one read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A sample was taken and marked consumed
    Sample(RawSample),
    /// `valid` not set: nothing new posted
    NotReady,
    /// Sequence counter moved during a guarded read
    Clash { before: i32, after: i32 },
    /// Unknown mode tag; `valid` left untouched
    BadMode(i32),
}

/// Performs single reads of a segment
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleProtocolReader;

impl SampleProtocolReader {
    pub fn new() -> Self {
        Self
    }

    /// Take one sample from `segment`
    ///
    /// Only a successful read clears `valid`.
    pub fn read<S: SegmentAccess + ?Sized>(&self, segment: &S) -> ReadOutcome {
        if segment.valid() == 0 {
            return ReadOutcome::NotReady;
        }

        let tag = segment.mode();
        let mode = match ReadMode::from_tag(tag) {
            Some(mode) => mode,
            None => {
                error!("SHM: bad mode found in shared memory: {}", tag);
                return ReadOutcome::BadMode(tag);
            }
        };

        let (receive, clock) = match mode {
            ReadMode::Unguarded => (segment.receive_stamp(), segment.clock_stamp()),
            ReadMode::Guarded => {
                let before = segment.count();
                let receive = segment.receive_stamp();
                let clock = segment.clock_stamp();
                let after = segment.count();
                if before != after {
                    warn!("SHM: access clash in shared memory ({} != {})", before, after);
                    return ReadOutcome::Clash { before, after };
                }
                (receive, clock)
            }
        };

        let (clock, receive, nanosecond_resolution) = reconcile(clock, receive);
        let leap = LeapIndicator::from_raw(segment.leap());
        let precision = segment.precision();

        segment.clear_valid();
        trace!("SHM {:?} sample: clock {:?} receive {:?}", mode, clock, receive);

        ReadOutcome::Sample(RawSample {
            mode,
            clock,
            receive,
            leap,
            precision,
            nanosecond_resolution,
        })
    }
}

/// Microsecond field scaled to nanoseconds, with the same wrapping a 32-bit
/// producer would see
fn usec_as_nanos(usec: i32) -> i64 {
    (usec as i64).wrapping_mul(1000)
}

/// Whether `nsec` truncates to `usec_nanos`
///
/// The subtraction is unsigned on purpose: a nanosecond field below its
/// microsecond counterpart wraps to a huge value and fails the window test.
/// Producers must truncate, not round, when deriving microseconds.
pub fn nsec_agrees(nsec: u32, usec_nanos: i64) -> bool {
    nsec.wrapping_sub(usec_nanos as u32) < NSEC_AGREEMENT_WINDOW
}

/// Turn the raw clock/receive stamps into instants
///
/// The nanosecond fields are adopted only when both pairs agree; otherwise
/// both instants use the microsecond fields. Returns
/// `(clock, receive, nanosecond_resolution)`.
pub fn reconcile(clock: RawStamp, receive: RawStamp) -> (Timestamp, Timestamp, bool) {
    let clock_us = usec_as_nanos(clock.usec);
    let receive_us = usec_as_nanos(receive.usec);

    if nsec_agrees(clock.nsec, clock_us) && nsec_agrees(receive.nsec, receive_us) {
        (
            Timestamp::from_parts(clock.sec, clock.nsec as i64),
            Timestamp::from_parts(receive.sec, receive.nsec as i64),
            true,
        )
    } else {
        (
            Timestamp::from_parts(clock.sec, clock_us),
            Timestamp::from_parts(receive.sec, receive_us),
            false,
        )
    }
}
