//! Per-PID state table.
//!
//! A flat array of 8192 slots keyed directly by the 13-bit PID space — no
//! hashing, O(1) lookup. Owned exclusively by the ingest task; the only
//! state shared across tasks is the [`LinearTrend`](crate::clock::trend::LinearTrend)
//! instances reached through `trend_pts`/`trend_dts`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::tracker::ClockTracker;
use crate::clock::trend::LinearTrend;
use crate::inspector::reorder::OrderedPtsList;

/// Total size of the PID address space (`2^13`).
pub const PID_TABLE_SIZE: usize = 8192;

/// The null PID; excluded from continuity-counter checking.
pub const NULL_PID: u16 = 0x1FFF;

/// Per-PES clock bookkeeping shared by the PTS and DTS subtrees.
#[derive(Debug)]
pub struct PesClockState {
    /// Number of PTS/DTS values observed on this PID.
    pub count: u64,
    /// Last decoded timestamp (90 kHz ticks), if any.
    pub last_ticks: Option<i64>,
    /// Wrap-corrected forward delta from the previous observation.
    pub diff_ticks: i64,
    /// SCR value (27 MHz ticks) captured at the time of the last
    /// observation, used to compute the SCR-relative drift of the next one.
    pub last_scr: Option<i64>,
    /// Clock tracker anchored the first time this timestamp type is seen.
    pub clock: ClockTracker,
    /// Bounded drift-trend window, shared with the periodic trend reporter.
    /// `None` until the warm-up period is past and the first sample is
    /// inserted — the window itself (and its backing allocation) is created
    /// lazily, not at table construction.
    pub trend: Arc<Mutex<Option<LinearTrend>>>,
    /// Name a lazily-created `trend` is built with.
    pub trend_name: String,
    /// Capacity a lazily-created `trend` is built with.
    pub trend_capacity: usize,
    /// Observations consumed so far, used to gate the trend warm-up period
    /// (the first 16 observations are discarded before any sample is
    /// inserted into `trend`).
    pub warmup_consumed: u32,
    /// `(x, y)` latch point for the trend: wallclock seconds and PTS/DTS
    /// seconds at the first post-warmup sample.
    pub trend_origin: Option<(f64, f64)>,
}

impl PesClockState {
    fn new(name: &str, trend_capacity: usize, timebase_hz: u32) -> Self {
        Self {
            count: 0,
            last_ticks: None,
            diff_ticks: 0,
            last_scr: None,
            clock: ClockTracker::new(timebase_hz),
            trend: Arc::new(Mutex::new(None)),
            trend_name: name.to_string(),
            trend_capacity,
            warmup_consumed: 0,
            trend_origin: None,
        }
    }
}

/// All per-PID state tracked by the inspector pipeline.
pub struct PidState {
    /// Packets seen carrying this PID.
    pub pkt_count: u64,
    /// Continuity-counter mismatches seen on this PID.
    pub cc_errors: u64,
    /// Last observed continuity counter, `None` until the first payload
    /// packet (the `Fresh` state of the per-PID continuity state machine).
    pub last_cc: Option<u8>,

    /// First PCR/SCR value observed on this PID.
    pub scr_first: Option<i64>,
    /// Wallclock (microseconds since epoch) when `scr_first` was latched.
    pub scr_first_wall_time: i64,
    /// Most recently observed PCR/SCR value.
    pub scr: Option<i64>,
    /// Number of PCR/SCR updates observed.
    pub scr_updates: u64,

    /// SCR value observed at the start of the PES unit currently being
    /// delivered (latched when a new PUSI packet begins a PES header).
    pub scr_at_pes_unit_header: Option<i64>,
    /// Wallclock for `scr_at_pes_unit_header`.
    pub scr_at_pes_unit_header_wall_us: i64,
    /// SCR value observed at the most recent non-PUSI packet on the
    /// configured SCR PID, i.e. the tail of the PES unit just completed.
    pub scr_last_seen: Option<i64>,
    /// Wallclock for `scr_last_seen`.
    pub scr_last_seen_wall_us: i64,

    /// PTS bookkeeping.
    pub pts: PesClockState,
    /// DTS bookkeeping.
    pub dts: PesClockState,

    /// Populated lazily in reorder mode; `None` otherwise.
    pub ordered_pts: Option<OrderedPtsList>,
}

impl PidState {
    fn new(pid: u16, trend_capacity: usize) -> Self {
        Self {
            pkt_count: 0,
            cc_errors: 0,
            last_cc: None,
            scr_first: None,
            scr_first_wall_time: 0,
            scr: None,
            scr_updates: 0,
            scr_at_pes_unit_header: None,
            scr_at_pes_unit_header_wall_us: 0,
            scr_last_seen: None,
            scr_last_seen_wall_us: 0,
            pts: PesClockState::new(&format!("pts:{pid:#x}"), trend_capacity, 90_000),
            dts: PesClockState::new(&format!("dts:{pid:#x}"), trend_capacity, 90_000),
            ordered_pts: None,
        }
    }

    /// Whether this PID has seen its first payload packet yet (`Fresh` vs
    /// `Tracking` in the continuity state machine).
    pub fn is_fresh(&self) -> bool {
        self.last_cc.is_none()
    }
}

/// Fixed-size table of [`PidState`], one slot per 13-bit PID.
pub struct PidTable {
    slots: Vec<PidState>,
    trend_capacity: usize,
}

impl PidTable {
    /// Creates a zero-initialized table; `trend_capacity` sizes each
    /// [`LinearTrend`] window the first time it is lazily created for a PID.
    pub fn new(trend_capacity: usize) -> Self {
        let slots = (0..PID_TABLE_SIZE as u16)
            .map(|pid| PidState::new(pid, trend_capacity))
            .collect();
        Self {
            slots,
            trend_capacity,
        }
    }

    /// Borrows the state slot for `pid`, creating nothing (the table is
    /// fully pre-allocated).
    pub fn get(&self, pid: u16) -> &PidState {
        &self.slots[pid as usize & 0x1FFF]
    }

    /// Mutably borrows the state slot for `pid`.
    pub fn get_mut(&mut self, pid: u16) -> &mut PidState {
        &mut self.slots[pid as usize & 0x1FFF]
    }

    /// Iterates all 8192 slots alongside their PID.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &PidState)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(pid, state)| (pid as u16, state))
    }

    /// The trend-window capacity new PES clock states are created with.
    pub fn trend_capacity(&self) -> usize {
        self.trend_capacity
    }
}
