//! Shared memory reference clock driver

use log::{debug, info, trace};

use crate::{
    clock::{SystemClock, WallClock},
    error::Result,
    protocol::{ReadOutcome, SampleProtocolReader},
    segment::{SegmentAccess, SegmentHandle, SegmentProvider, SystemSegmentProvider},
    stats::{ClockStats, RejectKind, StatsAggregator},
    threshold::{ThresholdController, Thresholds},
    validate::{format_timecode, Rejection, SampleValidator, ValidatedSample},
};

use super::{ClockControl, DriverConfig, FaultKind, RefClock, SyncEngine};

/// Precision assumed for the source until a sample says otherwise (0.5 s)
pub const PRECISION: i32 = -1;

/// Reference identifier
pub const REFID: [u8; 4] = *b"SHM\0";

/// Driver description
pub const DESCRIPTION: &str = "SHM/Shared memory interface";

/// Sample depth hint written into the segment at start
pub const NSAMPLES: i32 = 3;

/// What one timer tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekOutcome {
    /// No segment could be attached
    NoSegment,
    /// Producer had nothing new
    NotReady,
    /// Guarded read was torn
    Clash,
    /// Segment carried an unknown mode tag
    BadMode(i32),
    /// Sample read but refused by validation
    Rejected(Rejection),
    /// Sample forwarded to the engine
    Accepted(ValidatedSample),
}

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Counters for the cycle that just ended
    pub stats: ClockStats,
    /// Fault reported, if no sample was accepted
    pub fault: Option<FaultKind>,
}

/// Per-unit driver state
///
/// Owns the unit's segment handle, counters and limits; nothing here is
/// shared between units.
#[derive(Debug)]
pub struct ShmRefClock<P: SegmentProvider, C: WallClock = SystemClock> {
    handle: SegmentHandle<P>,
    reader: SampleProtocolReader,
    validator: SampleValidator,
    stats: StatsAggregator,
    thresholds: ThresholdController,
    control: ClockControl,
    clock: C,
    last_timecode: String,
    polls: u64,
}

impl ShmRefClock<SystemSegmentProvider, SystemClock> {
    /// Build a driver for a configured unit using real segments
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let provider = SystemSegmentProvider::new(config.segment.clone());
        let mut driver = ShmRefClock::new(config.unit, provider);
        driver.control(&config.control);
        Ok(driver)
    }
}

impl<P: SegmentProvider> ShmRefClock<P, SystemClock> {
    /// Create a driver reading `unit` through `provider`
    pub fn new(unit: u32, provider: P) -> Self {
        Self::with_clock(unit, provider, SystemClock)
    }
}

impl<P: SegmentProvider, C: WallClock> ShmRefClock<P, C> {
    /// Create a driver with an explicit wall clock
    pub fn with_clock(unit: u32, provider: P, clock: C) -> Self {
        Self {
            handle: SegmentHandle::new(unit, provider),
            reader: SampleProtocolReader::new(),
            validator: SampleValidator::new(),
            stats: StatsAggregator::new(),
            thresholds: ThresholdController::new(),
            control: ClockControl::default(),
            clock,
            last_timecode: String::new(),
            polls: 0,
        }
    }

    /// Try to take one sample and forward it
    pub fn peek(&mut self, engine: &mut dyn SyncEngine) -> PeekOutcome {
        self.stats.record_attempt();
        let unit = self.handle.unit();

        let segment = match self.handle.ensure() {
            Some(segment) => segment,
            None => {
                debug!("SHM unit {}: no SHM segment", unit);
                return PeekOutcome::NoSegment;
            }
        };

        let raw = match self.reader.read(segment) {
            ReadOutcome::Sample(raw) => raw,
            ReadOutcome::NotReady => {
                debug!("SHM unit {}: SHM not ready", unit);
                self.stats.record_not_ready();
                return PeekOutcome::NotReady;
            }
            ReadOutcome::Clash { .. } => {
                self.stats.record_rejected(RejectKind::Clash);
                return PeekOutcome::Clash;
            }
            ReadOutcome::BadMode(tag) => {
                self.stats.record_rejected(RejectKind::BadMode);
                return PeekOutcome::BadMode(tag);
            }
        };

        self.last_timecode = format_timecode(&raw.clock);

        let now = self.clock.now_secs();
        match self.validator.validate(&raw, now, self.thresholds.thresholds()) {
            Ok(sample) => {
                trace!("SHM unit {}: feeding data {}", unit, sample.timecode);
                engine.set_leap(sample.leap);
                engine.set_precision(sample.precision);
                engine.submit_offset(sample.receive, sample.clock, self.control.time1);
                self.stats.record_accepted();
                PeekOutcome::Accepted(sample)
            }
            Err(rejection) => {
                self.stats.record_rejected(rejection.into());
                PeekOutcome::Rejected(rejection)
            }
        }
    }

    /// End a poll cycle: hand samples to the engine or report why there
    /// are none, then publish and reset the counters
    pub fn poll_cycle(&mut self, engine: &mut dyn SyncEngine) -> PollReport {
        self.polls += 1;

        let cycle = self.stats.snapshot();
        let fault = if cycle.good > 0 {
            engine.receive();
            None
        } else if !self.handle.is_attached() {
            Some(FaultKind::NoSegment)
        } else {
            Some(cycle.dominant_fault())
        };

        if let Some(fault) = fault {
            debug!("SHM unit {}: reporting {:?}", self.handle.unit(), fault);
            engine.report_fault(fault);
        }

        // Counters are cleared last so the report covers the whole cycle.
        let stats = self.stats.drain_and_reset();
        if self.control.flag4 {
            engine.record_clock_stats(&stats.report_line());
        }

        PollReport { stats, fault }
    }

    /// Counters accumulated in the current cycle
    pub fn stats(&self) -> ClockStats {
        self.stats.snapshot()
    }

    /// Active limits
    pub fn thresholds(&self) -> &Thresholds {
        self.thresholds.thresholds()
    }

    /// Active operator settings
    pub fn clock_control(&self) -> &ClockControl {
        &self.control
    }

    /// Timecode of the most recently read sample, accepted or not
    pub fn last_timecode(&self) -> &str {
        &self.last_timecode
    }

    /// Number of poll cycles completed
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Unit index
    pub fn unit(&self) -> u32 {
        self.handle.unit()
    }

    /// Check if a segment is currently attached
    pub fn is_attached(&self) -> bool {
        self.handle.is_attached()
    }

    /// Attached segment, if any
    pub fn segment(&self) -> Option<&P::Segment> {
        self.handle.segment()
    }
}

impl<P: SegmentProvider, C: WallClock> RefClock for ShmRefClock<P, C> {
    fn start(&mut self, engine: &mut dyn SyncEngine) -> Result<()> {
        let unit = self.handle.unit();
        let segment = self.handle.acquire()?;
        segment.prime(PRECISION, NSAMPLES);
        engine.set_precision(PRECISION);
        info!("SHM unit {} started", unit);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.handle.release();
    }

    fn poll(&mut self, engine: &mut dyn SyncEngine) {
        self.poll_cycle(engine);
    }

    fn timer(&mut self, engine: &mut dyn SyncEngine) {
        self.peek(engine);
    }

    fn control(&mut self, control: &ClockControl) {
        let max_delta = self.thresholds.apply_config(control.flag1, control.time2);
        self.control = control.clone();
        debug!("SHM unit {}: drift limit {}s", self.handle.unit(), max_delta);
    }

    fn reference_id(&self) -> [u8; 4] {
        REFID
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }
}
