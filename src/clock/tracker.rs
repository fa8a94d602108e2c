//! Per-stream clock tracker: anchors a 27 MHz or 90 kHz tick domain to a
//! wallclock reference and reports drift between the two.

use super::{modular_diff, MAX_PTS, MAX_SCR};

/// Associates a clock domain (27 MHz SCR/PCR or 90 kHz PTS/DTS) with an
/// initial wallclock reference and tracks drift between the tick domain and
/// real time as further ticks are observed.
#[derive(Debug, Clone, Copy)]
pub struct ClockTracker {
    timebase_hz: u32,
    established: bool,
    wall_anchor_us: i64,
    tick_anchor: i64,
    last_ticks: i64,
    last_drift_us: i64,
}

impl ClockTracker {
    /// Creates a tracker for the given timebase (typically `90_000` or
    /// `27_000_000`), uninitialized until [`Self::establish_wallclock`].
    pub fn new(timebase_hz: u32) -> Self {
        let mut tracker = Self {
            timebase_hz: 0,
            established: false,
            wall_anchor_us: 0,
            tick_anchor: 0,
            last_ticks: 0,
            last_drift_us: 0,
        };
        tracker.initialize(timebase_hz);
        tracker
    }

    /// Resets all tracker state for the given timebase.
    pub fn initialize(&mut self, timebase_hz: u32) {
        *self = Self {
            timebase_hz,
            established: false,
            wall_anchor_us: 0,
            tick_anchor: 0,
            last_ticks: 0,
            last_drift_us: 0,
        };
    }

    fn modulus(&self) -> i64 {
        if self.timebase_hz as i64 == 27_000_000 {
            MAX_SCR
        } else {
            MAX_PTS
        }
    }

    /// Idempotent: latches `(now_us, first_ticks)` as the anchor pair on the
    /// first call only. Later calls are no-ops.
    pub fn establish_wallclock(&mut self, now_us: i64, first_ticks: i64) {
        if !self.established {
            self.wall_anchor_us = now_us;
            self.tick_anchor = first_ticks;
            self.last_ticks = first_ticks;
            self.established = true;
        }
    }

    /// Whether [`Self::establish_wallclock`] has latched an anchor yet.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Records a new tick observation at wallclock `now_us`, updating the
    /// cached drift.
    pub fn set_ticks(&mut self, now_us: i64, ticks: i64) {
        self.last_ticks = ticks;
        if !self.established {
            return;
        }
        let modulus = self.modulus();
        let tick_delta = modular_diff(self.tick_anchor, ticks, modulus);
        let expected_wall_us = tick_delta * 1_000_000 / self.timebase_hz as i64;
        let actual_wall_us = now_us - self.wall_anchor_us;
        self.last_drift_us = expected_wall_us - actual_wall_us;
    }

    /// Drift in microseconds as of the last [`Self::set_ticks`] call.
    /// Negative means the tracked clock lags wallclock.
    pub fn drift_us(&self) -> i64 {
        self.last_drift_us
    }

    /// Drift in milliseconds as of the last [`Self::set_ticks`] call.
    pub fn drift_ms(&self) -> i64 {
        self.last_drift_us / 1000
    }
}
