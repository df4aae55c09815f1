//! Producer side of the segment protocol
//!
//! Posts samples the way a well-behaved producer does. Used by the CLI's
//! `post` command and for exercising the reader in-process.

use crate::{
    segment::{RawStamp, SegmentAccess, ShmView},
    timestamp::{LeapIndicator, Timestamp},
};

use super::ReadMode;

/// One sample as a producer writes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publication {
    pub clock: RawStamp,
    pub receive: RawStamp,
    pub leap: LeapIndicator,
    pub precision: i32,
}

impl Publication {
    /// Build a publication whose microsecond fields are the truncation of
    /// the nanosecond fields
    pub fn from_timestamps(clock: Timestamp, receive: Timestamp) -> Self {
        Self {
            clock: raw_stamp(clock),
            receive: raw_stamp(receive),
            leap: LeapIndicator::NoWarning,
            precision: -20,
        }
    }

    pub fn with_leap(mut self, leap: LeapIndicator) -> Self {
        self.leap = leap;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }
}

fn raw_stamp(ts: Timestamp) -> RawStamp {
    RawStamp {
        sec: ts.secs,
        usec: (ts.nanos / 1000) as i32,
        nsec: ts.nanos,
    }
}

/// Writes samples into a segment
#[derive(Debug)]
pub struct SegmentPublisher<'a> {
    view: &'a ShmView,
    mode: ReadMode,
}

impl<'a> SegmentPublisher<'a> {
    pub fn new(view: &'a ShmView, mode: ReadMode) -> Self {
        Self { view, mode }
    }

    /// Post a sample and raise `valid`
    ///
    /// In guarded mode `count` is bumped before and after the field writes
    /// so a concurrent guarded reader sees it move.
    pub fn publish(&self, publication: &Publication) {
        let view = self.view;
        view.store_mode(self.mode.tag());

        if self.mode == ReadMode::Guarded {
            view.store_count(view.count().wrapping_add(1));
        }

        view.store_clock_stamp(publication.clock);
        view.store_receive_stamp(publication.receive);
        view.store_leap(publication.leap.as_raw());
        view.store_precision(publication.precision);

        if self.mode == ReadMode::Guarded {
            view.store_count(view.count().wrapping_add(1));
        }

        view.store_valid(1);
    }

    /// Mode samples are posted under
    pub fn mode(&self) -> ReadMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::PrivateSegment;

    #[test]
    fn test_publication_truncates_microseconds() {
        let p = Publication::from_timestamps(Timestamp::new(5, 123_456_789), Timestamp::new(6, 999));
        assert_eq!(p.clock.usec, 123_456);
        assert_eq!(p.clock.nsec, 123_456_789);
        assert_eq!(p.receive.usec, 0);
    }

    #[test]
    fn test_guarded_publish_moves_count_by_two() {
        let segment = PrivateSegment::new();
        let publisher = SegmentPublisher::new(segment.view(), ReadMode::Guarded);
        let p = Publication::from_timestamps(Timestamp::new(5, 0), Timestamp::new(5, 0));

        publisher.publish(&p);
        assert_eq!(segment.count(), 2);
        assert_eq!(segment.valid(), 1);
        assert_eq!(segment.mode(), 1);
    }

    #[test]
    fn test_unguarded_publish_leaves_count() {
        let segment = PrivateSegment::new();
        let publisher = SegmentPublisher::new(segment.view(), ReadMode::Unguarded);
        publisher.publish(&Publication::from_timestamps(Timestamp::new(1, 0), Timestamp::new(1, 0)));
        assert_eq!(segment.count(), 0);
        assert_eq!(segment.mode(), 0);
    }
}
