//! Segment ownership with lazy re-acquisition

use log::debug;

use crate::error::Result;

use super::view::SegmentAccess;

/// Source of unit segments
///
/// Implementations for different host mechanisms are interchangeable; the
/// driver only needs something it can read through [`SegmentAccess`].
pub trait SegmentProvider {
    /// Attached segment type; dropping it detaches
    type Segment: SegmentAccess + std::fmt::Debug;

    /// Create or attach the segment for `unit`
    ///
    /// Failures are logged by the implementation and returned. They are
    /// never fatal to the unit: the handle retries on the next tick.
    fn acquire(&mut self, unit: u32) -> Result<Self::Segment>;

    /// Detach a segment
    fn release(&mut self, segment: Self::Segment) {
        drop(segment);
    }
}

/// A unit's (possibly absent) segment
#[derive(Debug)]
pub struct SegmentHandle<P: SegmentProvider> {
    unit: u32,
    provider: P,
    segment: Option<P::Segment>,
    failed_attempts: u64,
}

impl<P: SegmentProvider> SegmentHandle<P> {
    /// Create a handle with no segment held yet
    pub fn new(unit: u32, provider: P) -> Self {
        Self {
            unit,
            provider,
            segment: None,
            failed_attempts: 0,
        }
    }

    /// Attach now if no segment is held
    pub fn acquire(&mut self) -> Result<&P::Segment> {
        match self.segment {
            Some(ref segment) => Ok(segment),
            None => match self.provider.acquire(self.unit) {
                Ok(segment) => {
                    self.failed_attempts = 0;
                    Ok(self.segment.insert(segment))
                }
                Err(e) => {
                    self.failed_attempts += 1;
                    Err(e)
                }
            },
        }
    }

    /// Currently held segment, re-acquiring first if a previous attempt
    /// failed (for example because a stale segment has since been removed)
    pub fn ensure(&mut self) -> Option<&P::Segment> {
        if self.segment.is_none() {
            if let Err(e) = self.acquire() {
                debug!("SHM unit {}: no segment ({})", self.unit, e);
                return None;
            }
        }
        self.segment.as_ref()
    }

    /// Detach; no-op when nothing is held
    pub fn release(&mut self) {
        if let Some(segment) = self.segment.take() {
            self.provider.release(segment);
            debug!("SHM unit {} released", self.unit);
        }
    }

    /// Currently held segment without trying to attach
    pub fn segment(&self) -> Option<&P::Segment> {
        self.segment.as_ref()
    }

    /// Check if a segment is held
    pub fn is_attached(&self) -> bool {
        self.segment.is_some()
    }

    /// Unit index
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Consecutive failed acquisitions since the last success
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts
    }

    /// Provider this handle attaches through
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: SegmentProvider> Drop for SegmentHandle<P> {
    fn drop(&mut self) {
        self.release();
    }
}
