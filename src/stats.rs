//! Per-poll-cycle read counters

use serde::{Deserialize, Serialize};

use crate::{driver::FaultKind, validate::Rejection};

/// Counter snapshot for one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStats {
    /// Read attempts (timer ticks)
    pub attempts: u32,
    /// Samples forwarded downstream
    pub good: u32,
    /// Ticks where the producer had not posted a new sample
    pub not_ready: u32,
    /// Samples discarded for bad mode, staleness or drift
    pub bad: u32,
    /// Guarded reads torn by a concurrent write
    pub clash: u32,
}

impl ClockStats {
    /// Clock-stats line: five space separated, width-3 fields in the order
    /// `attempts good notready bad clash`
    pub fn report_line(&self) -> String {
        format!(
            "{:3} {:3} {:3} {:3} {:3}",
            self.attempts, self.good, self.not_ready, self.bad, self.clash
        )
    }

    /// Degraded-state classification for a cycle without accepted samples
    ///
    /// The largest of the not-ready, bad and clash counters wins, with
    /// clash taking ties over bad. When not-ready dominates, or nothing was
    /// counted at all, the cycle is a plain timeout.
    pub fn dominant_fault(&self) -> FaultKind {
        let major = self.not_ready.max(self.bad).max(self.clash);
        if major == 0 {
            FaultKind::Timeout
        } else if major == self.clash {
            FaultKind::Propagation
        } else if major == self.bad {
            FaultKind::BadReply
        } else {
            FaultKind::Timeout
        }
    }
}

/// Failure kinds that count against a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Torn guarded read; counted as clash only
    Clash,
    /// Unknown mode tag
    BadMode,
    /// Receive time too old or in the future
    Stale,
    /// Receive/clock difference over the limit
    ExcessiveDrift,
}

impl From<Rejection> for RejectKind {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Stale { .. } => RejectKind::Stale,
            Rejection::ExcessiveDrift { .. } => RejectKind::ExcessiveDrift,
        }
    }
}

/// Accumulates counters between poll cycles
///
/// Only [`StatsAggregator::drain_and_reset`] zeroes the counters.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    current: ClockStats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.current.attempts = self.current.attempts.saturating_add(1);
    }

    pub fn record_accepted(&mut self) {
        self.current.good = self.current.good.saturating_add(1);
    }

    pub fn record_not_ready(&mut self) {
        self.current.not_ready = self.current.not_ready.saturating_add(1);
    }

    /// Count a discarded sample
    pub fn record_rejected(&mut self, kind: RejectKind) {
        match kind {
            RejectKind::Clash => self.current.clash = self.current.clash.saturating_add(1),
            RejectKind::BadMode | RejectKind::Stale | RejectKind::ExcessiveDrift => {
                self.current.bad = self.current.bad.saturating_add(1)
            }
        }
    }

    /// Counters accumulated so far in this cycle
    pub fn snapshot(&self) -> ClockStats {
        self.current
    }

    /// Return the full cycle's counters and start a new cycle at zero
    pub fn drain_and_reset(&mut self) -> ClockStats {
        std::mem::take(&mut self.current)
    }
}
