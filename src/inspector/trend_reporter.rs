//! Periodic trend-reporting task.
//!
//! Runs as tokio's second cooperative task: wakes every 250ms, and on a
//! period boundary (15s by default, `-B`) takes a brief lock on each
//! watched PID's [`LinearTrend`], copies it out, and formats a summary
//! line from the copy after releasing the lock. `-L`'s verbosity controls
//! how much more than the summary line gets produced: level 2 also
//! persists one CSV row per snapshot, level 3 also dumps every raw sample
//! to the console.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use parking_lot::Mutex;

use crate::clock::trend::LinearTrend;
use crate::inspector::report;
use crate::pid_table::PidTable;

/// Wake interval regardless of the configured report period.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Minimum verbosity: summary line only.
pub const VERBOSITY_SUMMARY: u8 = 1;
/// Also persist each snapshot as a CSV row.
pub const VERBOSITY_CSV: u8 = 2;
/// Also dump every raw sample to the console.
pub const VERBOSITY_SAMPLES: u8 = 3;

struct TrendWatch {
    pid: u16,
    label: &'static str,
    trend: Arc<Mutex<Option<LinearTrend>>>,
}

/// Watches a fixed set of PIDs' PTS/DTS trend windows and periodically
/// formats [`report::trend_summary_line`]s for the ones that have data.
pub struct TrendReporter {
    watches: Vec<TrendWatch>,
    period: Duration,
    verbosity: u8,
}

impl TrendReporter {
    /// Extracts `Arc` handles to the PTS and DTS trend windows of every PID
    /// in `pids`. Cloning the `Arc` (not the trend itself) is what lets this
    /// reporter run on a separate task from the ingest loop that owns
    /// `table`; the trend inside may still be `None` if nothing has been
    /// observed for that PID yet, since it is created lazily on first use.
    pub fn new(table: &PidTable, pids: &[u16], report_period_seconds: u64, verbosity: u8) -> Self {
        let mut watches = Vec::new();
        for &pid in pids {
            let state = table.get(pid);
            watches.push(TrendWatch {
                pid,
                label: "pts",
                trend: state.pts.trend.clone(),
            });
            watches.push(TrendWatch {
                pid,
                label: "dts",
                trend: state.dts.trend.clone(),
            });
        }
        Self {
            watches,
            period: Duration::from_secs(report_period_seconds),
            verbosity: verbosity.clamp(VERBOSITY_SUMMARY, VERBOSITY_SAMPLES),
        }
    }

    /// Runs until `running` is cleared, emitting report lines through
    /// `emit` on each period boundary. `now_ms` supplies the stream-time
    /// value used in each summary's timestamp field.
    pub async fn run(&self, running: Arc<AtomicBool>, now_ms: impl Fn() -> i64, mut emit: impl FnMut(String)) {
        let mut since_last_report = Duration::ZERO;
        while running.load(Ordering::Relaxed) {
            tokio::time::sleep(POLL_INTERVAL).await;
            since_last_report += POLL_INTERVAL;
            if since_last_report >= self.period {
                self.emit_once(now_ms(), &mut emit);
                since_last_report = Duration::ZERO;
            }
        }
    }

    /// Emits one round of trend summaries immediately, for callers that
    /// want a final flush on shutdown rather than waiting for the next
    /// period boundary.
    pub fn emit_once(&self, now_ms: i64, emit: &mut impl FnMut(String)) {
        for watch in &self.watches {
            let snapshot = {
                let guard = watch.trend.lock();
                guard.as_ref().map(LinearTrend::clone_snapshot)
            };
            let Some(snapshot) = snapshot else {
                continue;
            };
            if snapshot.count() == 0 {
                continue;
            }
            let name = format!("{}:{:#06x}", watch.label, watch.pid);
            emit(report::trend_summary_line(
                &name,
                snapshot.count(),
                snapshot.slope(),
                snapshot.deviation(),
                snapshot.r_squared(),
                now_ms,
            ));

            if self.verbosity >= VERBOSITY_CSV {
                persist_csv_row(&name, snapshot.count(), snapshot.slope(), snapshot.deviation(), snapshot.r_squared(), now_ms);
            }
            if self.verbosity >= VERBOSITY_SAMPLES {
                for (x, y) in snapshot.samples() {
                    emit(report::trend_sample_line(&name, x, y));
                }
            }
        }
    }
}

/// Appends one comma-separated row to `<name>.trend.csv`, writing a header
/// first if the file doesn't exist yet. A simple hand-written writer; the
/// format is one row per snapshot, not worth a CSV crate.
fn persist_csv_row(name: &str, count: usize, slope: f64, deviation: f64, r_squared: f64, wall_ms: i64) {
    let path = csv_path(name);
    let is_new = !path.exists();
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut file) => {
            if is_new {
                if let Err(e) = writeln!(file, "wall_ms,count,slope,deviation,r_squared") {
                    warn!("failed to write CSV header to {}: {e}", path.display());
                    return;
                }
            }
            if let Err(e) = writeln!(file, "{wall_ms},{count},{slope},{deviation},{r_squared}") {
                warn!("failed to append CSV row to {}: {e}", path.display());
            }
        }
        Err(e) => warn!("failed to open trend CSV {}: {e}", path.display()),
    }
}

fn csv_path(name: &str) -> PathBuf {
    let sanitized: String = name.chars().map(|c| if c == ':' { '_' } else { c }).collect();
    PathBuf::from(format!("{sanitized}.trend.csv"))
}
