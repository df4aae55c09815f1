//! Integration tests for the segment read protocol
//!
//! Covers both read disciplines, nanosecond reconciliation, clash detection
//! and the valid-flag handshake with the producer.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use shmclock::{
    protocol::{Publication, ReadMode, ReadOutcome, SampleProtocolReader, SegmentPublisher},
    segment::{PrivateSegment, RawStamp, SegmentAccess},
    LeapIndicator, Timestamp,
};

/// Segment whose sequence counter follows a script, to simulate a producer
/// writing between the two counter loads of a guarded read
#[derive(Debug)]
struct ScriptedSegment {
    mode: i32,
    counts: RefCell<VecDeque<i32>>,
    valid: Cell<i32>,
    clock: RawStamp,
    receive: RawStamp,
}

impl ScriptedSegment {
    fn guarded(counts: &[i32]) -> Self {
        Self {
            mode: 1,
            counts: RefCell::new(counts.iter().copied().collect()),
            valid: Cell::new(1),
            clock: RawStamp { sec: 1000, usec: 1, nsec: 1_500 },
            receive: RawStamp { sec: 1000, usec: 2, nsec: 2_500 },
        }
    }
}

impl SegmentAccess for ScriptedSegment {
    fn valid(&self) -> i32 {
        self.valid.get()
    }
    fn mode(&self) -> i32 {
        self.mode
    }
    fn count(&self) -> i32 {
        self.counts.borrow_mut().pop_front().unwrap_or(0)
    }
    fn receive_stamp(&self) -> RawStamp {
        self.receive
    }
    fn clock_stamp(&self) -> RawStamp {
        self.clock
    }
    fn leap(&self) -> i32 {
        0
    }
    fn precision(&self) -> i32 {
        -10
    }
    fn nsamples(&self) -> i32 {
        3
    }
    fn clear_valid(&self) {
        self.valid.set(0)
    }
    fn prime(&self, _precision: i32, _nsamples: i32) {
        self.valid.set(0)
    }
}

fn post_raw(segment: &PrivateSegment, mode: ReadMode, clock: RawStamp, receive: RawStamp) {
    let publication = Publication {
        clock,
        receive,
        leap: LeapIndicator::NoWarning,
        precision: -20,
    };
    SegmentPublisher::new(segment.view(), mode).publish(&publication);
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_not_ready_when_valid_unset() {
        let segment = PrivateSegment::new();
        let reader = SampleProtocolReader::new();
        assert_eq!(reader.read(&segment), ReadOutcome::NotReady);
    }

    #[test]
    fn test_unguarded_adopts_nanoseconds() {
        let segment = PrivateSegment::new();
        post_raw(
            &segment,
            ReadMode::Unguarded,
            RawStamp { sec: 1_000, usec: 123_456, nsec: 123_456_789 },
            RawStamp { sec: 1_001, usec: 654_321, nsec: 654_321_999 },
        );

        let sample = match SampleProtocolReader::new().read(&segment) {
            ReadOutcome::Sample(sample) => sample,
            other => panic!("expected sample, got {:?}", other),
        };
        assert_eq!(sample.mode, ReadMode::Unguarded);
        assert!(sample.nanosecond_resolution);
        assert_eq!(sample.clock, Timestamp::new(1_000, 123_456_789));
        assert_eq!(sample.receive, Timestamp::new(1_001, 654_321_999));
        assert_eq!(segment.valid(), 0, "successful read marks the sample consumed");
    }

    #[test]
    fn test_disagreeing_pair_falls_back_for_both() {
        let segment = PrivateSegment::new();
        post_raw(
            &segment,
            ReadMode::Unguarded,
            RawStamp { sec: 1_000, usec: 123_456, nsec: 123_456_789 },
            // Receive nanoseconds are a full microsecond ahead.
            RawStamp { sec: 1_001, usec: 654_321, nsec: 654_322_000 },
        );

        let sample = match SampleProtocolReader::new().read(&segment) {
            ReadOutcome::Sample(sample) => sample,
            other => panic!("expected sample, got {:?}", other),
        };
        assert!(!sample.nanosecond_resolution);
        assert_eq!(sample.clock, Timestamp::new(1_000, 123_456_000));
        assert_eq!(sample.receive, Timestamp::new(1_001, 654_321_000));
    }

    #[test]
    fn test_rounded_microseconds_are_not_trusted() {
        let segment = PrivateSegment::new();
        // usec rounded up from ...999_600 ns: nsec < usec * 1000 wraps.
        post_raw(
            &segment,
            ReadMode::Guarded,
            RawStamp { sec: 50, usec: 1_000, nsec: 999_600 },
            RawStamp { sec: 50, usec: 7, nsec: 7_001 },
        );

        match SampleProtocolReader::new().read(&segment) {
            ReadOutcome::Sample(sample) => {
                assert!(!sample.nanosecond_resolution);
                assert_eq!(sample.clock, Timestamp::new(50, 1_000_000));
                assert_eq!(sample.receive, Timestamp::new(50, 7_000));
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[test]
    fn test_guarded_stable_count_reads_sample() {
        let segment = PrivateSegment::new();
        let publisher = SegmentPublisher::new(segment.view(), ReadMode::Guarded);
        publisher.publish(&Publication::from_timestamps(
            Timestamp::new(2_000, 10_000),
            Timestamp::new(2_000, 20_000),
        ));

        match SampleProtocolReader::new().read(&segment) {
            ReadOutcome::Sample(sample) => {
                assert_eq!(sample.mode, ReadMode::Guarded);
                assert_eq!(sample.clock, Timestamp::new(2_000, 10_000));
                assert_eq!(sample.precision, -20);
            }
            other => panic!("expected sample, got {:?}", other),
        }
        assert_eq!(segment.valid(), 0);
    }

    #[test]
    fn test_guarded_count_change_is_clash() {
        let segment = ScriptedSegment::guarded(&[5, 6]);
        let outcome = SampleProtocolReader::new().read(&segment);

        assert_eq!(outcome, ReadOutcome::Clash { before: 5, after: 6 });
        assert_eq!(segment.valid(), 1, "clashed sample is left for the next tick");
    }

    #[test]
    fn test_guarded_retry_after_clash_succeeds() {
        let segment = ScriptedSegment::guarded(&[5, 6, 6, 6]);
        let reader = SampleProtocolReader::new();

        assert!(matches!(reader.read(&segment), ReadOutcome::Clash { .. }));
        match reader.read(&segment) {
            ReadOutcome::Sample(sample) => {
                assert_eq!(sample.clock, Timestamp::new(1000, 1_500));
                assert_eq!(sample.receive, Timestamp::new(1000, 2_500));
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_mode_keeps_valid_flag() {
        let segment = PrivateSegment::new();
        segment.view().store_mode(7);
        segment.view().store_valid(1);

        assert_eq!(SampleProtocolReader::new().read(&segment), ReadOutcome::BadMode(7));
        assert_eq!(segment.valid(), 1);
    }

    #[test]
    fn test_leap_and_precision_mirrored() {
        let segment = PrivateSegment::new();
        let publication = Publication::from_timestamps(Timestamp::new(9, 0), Timestamp::new(9, 0))
            .with_leap(LeapIndicator::AddSecond)
            .with_precision(-18);
        SegmentPublisher::new(segment.view(), ReadMode::Unguarded).publish(&publication);

        match SampleProtocolReader::new().read(&segment) {
            ReadOutcome::Sample(sample) => {
                assert_eq!(sample.leap, LeapIndicator::AddSecond);
                assert_eq!(sample.precision, -18);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }
}
