//! Field-level access to a mapped segment
//!
//! Every load and store here is a single volatile access to one field. There
//! are no fences: ordering and cross-core visibility are whatever the host's
//! memory model gives plain loads and stores. This mirrors what producers
//! already do and is the contract they were written against. A guarded-mode
//! read can detect a writer that raced it, it cannot prove the data it saw
//! was coherent.

use std::ptr::{self, NonNull};

use super::layout::ShmTime;

/// One timestamp as stored in the segment, before reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawStamp {
    pub sec: i64,
    pub usec: i32,
    pub nsec: u32,
}

/// Read access (plus the consumer's few writes) to a time segment
///
/// The protocol reader only talks to segments through this trait so that
/// attached, private and scripted segments are interchangeable.
pub trait SegmentAccess {
    /// Producer's "new sample posted" flag
    fn valid(&self) -> i32;
    /// Mode tag
    fn mode(&self) -> i32;
    /// Sequence counter
    fn count(&self) -> i32;
    /// Receive timestamp fields, read in sec/usec/nsec order
    fn receive_stamp(&self) -> RawStamp;
    /// Clock timestamp fields, read in sec/usec/nsec order
    fn clock_stamp(&self) -> RawStamp;
    /// Leap indicator
    fn leap(&self) -> i32;
    /// Precision exponent
    fn precision(&self) -> i32;
    /// Sample depth hint
    fn nsamples(&self) -> i32;
    /// Mark the current sample consumed
    fn clear_valid(&self);
    /// Consumer-side initialization done once at driver start
    fn prime(&self, precision: i32, nsamples: i32);
}

/// Volatile view over a `ShmTime` that lives in memory owned elsewhere
#[derive(Debug)]
pub struct ShmView {
    ptr: NonNull<ShmTime>,
}

// The view is only ever driven from one thread of control per unit; the
// memory behind it is shared with foreign processes regardless.
unsafe impl Send for ShmView {}

macro_rules! load {
    ($view:expr, $field:ident) => {
        unsafe { ptr::read_volatile(ptr::addr_of!((*$view.ptr.as_ptr()).$field)) }
    };
}

macro_rules! store {
    ($view:expr, $field:ident, $value:expr) => {
        unsafe { ptr::write_volatile(ptr::addr_of_mut!((*$view.ptr.as_ptr()).$field), $value) }
    };
}

impl ShmView {
    /// Wrap a pointer to a segment
    ///
    /// # Safety
    /// `ptr` must point to at least `SEGMENT_SIZE` readable and writable
    /// bytes, suitably aligned for `ShmTime`, that stay mapped for the
    /// lifetime of the view.
    pub unsafe fn from_raw(ptr: NonNull<ShmTime>) -> Self {
        Self { ptr }
    }

    /// Raw pointer to the segment
    pub fn as_ptr(&self) -> *mut ShmTime {
        self.ptr.as_ptr()
    }

    /// Field-by-field volatile copy of the whole segment (diagnostics only,
    /// not a consistent snapshot)
    pub fn snapshot(&self) -> ShmTime {
        ShmTime {
            mode: load!(self, mode),
            count: load!(self, count),
            clock_sec: load!(self, clock_sec),
            clock_usec: load!(self, clock_usec),
            receive_sec: load!(self, receive_sec),
            receive_usec: load!(self, receive_usec),
            leap: load!(self, leap),
            precision: load!(self, precision),
            nsamples: load!(self, nsamples),
            valid: load!(self, valid),
            clock_nsec: load!(self, clock_nsec),
            receive_nsec: load!(self, receive_nsec),
            dummy: load!(self, dummy),
        }
    }

    pub fn store_mode(&self, mode: i32) {
        store!(self, mode, mode)
    }

    pub fn store_count(&self, count: i32) {
        store!(self, count, count)
    }

    pub fn store_valid(&self, valid: i32) {
        store!(self, valid, valid)
    }

    pub fn store_leap(&self, leap: i32) {
        store!(self, leap, leap)
    }

    pub fn store_precision(&self, precision: i32) {
        store!(self, precision, precision)
    }

    pub fn store_nsamples(&self, nsamples: i32) {
        store!(self, nsamples, nsamples)
    }

    /// Write the receive timestamp fields
    pub fn store_receive_stamp(&self, stamp: RawStamp) {
        store!(self, receive_sec, stamp.sec as libc::time_t);
        store!(self, receive_usec, stamp.usec);
        store!(self, receive_nsec, stamp.nsec);
    }

    /// Write the clock timestamp fields
    pub fn store_clock_stamp(&self, stamp: RawStamp) {
        store!(self, clock_sec, stamp.sec as libc::time_t);
        store!(self, clock_usec, stamp.usec);
        store!(self, clock_nsec, stamp.nsec);
    }
}

impl SegmentAccess for ShmView {
    fn valid(&self) -> i32 {
        load!(self, valid)
    }

    fn mode(&self) -> i32 {
        load!(self, mode)
    }

    fn count(&self) -> i32 {
        load!(self, count)
    }

    fn receive_stamp(&self) -> RawStamp {
        RawStamp {
            sec: load!(self, receive_sec) as i64,
            usec: load!(self, receive_usec),
            nsec: load!(self, receive_nsec),
        }
    }

    fn clock_stamp(&self) -> RawStamp {
        RawStamp {
            sec: load!(self, clock_sec) as i64,
            usec: load!(self, clock_usec),
            nsec: load!(self, clock_nsec),
        }
    }

    fn leap(&self) -> i32 {
        load!(self, leap)
    }

    fn precision(&self) -> i32 {
        load!(self, precision)
    }

    fn nsamples(&self) -> i32 {
        load!(self, nsamples)
    }

    fn clear_valid(&self) {
        self.store_valid(0)
    }

    fn prime(&self, precision: i32, nsamples: i32) {
        self.store_precision(precision);
        self.store_valid(0);
        self.store_nsamples(nsamples);
    }
}

/// Implement [`SegmentAccess`] for a type with an inherent `view()` method
/// returning `&ShmView`
macro_rules! forward_segment_access {
    ($ty:ty) => {
        impl $crate::segment::view::SegmentAccess for $ty {
            fn valid(&self) -> i32 {
                $crate::segment::view::SegmentAccess::valid(self.view())
            }
            fn mode(&self) -> i32 {
                $crate::segment::view::SegmentAccess::mode(self.view())
            }
            fn count(&self) -> i32 {
                $crate::segment::view::SegmentAccess::count(self.view())
            }
            fn receive_stamp(&self) -> $crate::segment::view::RawStamp {
                $crate::segment::view::SegmentAccess::receive_stamp(self.view())
            }
            fn clock_stamp(&self) -> $crate::segment::view::RawStamp {
                $crate::segment::view::SegmentAccess::clock_stamp(self.view())
            }
            fn leap(&self) -> i32 {
                $crate::segment::view::SegmentAccess::leap(self.view())
            }
            fn precision(&self) -> i32 {
                $crate::segment::view::SegmentAccess::precision(self.view())
            }
            fn nsamples(&self) -> i32 {
                $crate::segment::view::SegmentAccess::nsamples(self.view())
            }
            fn clear_valid(&self) {
                $crate::segment::view::SegmentAccess::clear_valid(self.view())
            }
            fn prime(&self, precision: i32, nsamples: i32) {
                $crate::segment::view::SegmentAccess::prime(self.view(), precision, nsamples)
            }
        }
    };
}

pub(crate) use forward_segment_access;
