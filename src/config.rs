//! Runtime configuration for the two binaries.
//!
//! Unlike the teacher's long-lived, env/file-layered, reloadable `Config`,
//! these are one-shot values built directly from parsed CLI arguments —
//! there is no live process to reload configuration into.

use std::path::PathBuf;

use crate::error::{Result, TsPcrError};

/// Parsed form of the `-i` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUrl {
    File(PathBuf),
    Udp { host: String, port: u16 },
}

impl SourceUrl {
    /// Parses `-i <input>` into a [`SourceUrl`], recognizing `udp://host:port`
    /// and treating anything else as a file path.
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("udp://") {
            let url = url::Url::parse(raw)
                .map_err(|e| TsPcrError::Config(format!("bad udp URL '{raw}': {e}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| TsPcrError::Config(format!("missing host in '{raw}'")))?
                .to_string();
            let port = url
                .port()
                .ok_or_else(|| TsPcrError::Config(format!("missing port in '{raw}'")))?;
            let _ = rest;
            Ok(SourceUrl::Udp { host, port })
        } else {
            Ok(SourceUrl::File(PathBuf::from(raw)))
        }
    }
}

/// Default SCR PID used when `-S` is not given.
pub const DEFAULT_SCR_PID: u16 = 0x31;
/// Default PTS/DTS drift threshold in milliseconds (`-D`).
pub const DEFAULT_DRIFT_THRESHOLD_MS: i64 = 700;
/// Default trend window size in samples (`-A`).
pub const DEFAULT_TREND_CAPACITY: usize = 216_000;
/// Minimum trend window size, regardless of `-A`.
pub const MIN_TREND_CAPACITY: usize = 60;
/// Default trend report period in seconds (`-B`).
pub const DEFAULT_REPORT_PERIOD_SECONDS: u64 = 15;
/// Minimum report period, regardless of `-B`.
pub const MIN_REPORT_PERIOD_SECONDS: u64 = 5;
/// Default `-L` verbosity: summary line only.
pub const DEFAULT_TREND_VERBOSITY: u8 = 1;
/// Highest `-L` verbosity: summary, CSV persistence, and per-sample dump.
pub const MAX_TREND_VERBOSITY: u8 = 3;

/// Configuration for `ts-pcr-inspect`, built from parsed CLI flags.
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Parsed `-i` source.
    pub source: SourceUrl,
    /// `-T YYYYMMDDHHMMSS` initial wallclock anchor, if given.
    pub wallclock_anchor: Option<String>,
    /// PIDs to hex-dump (`-d`, repeatable).
    pub hex_dump_pids: Vec<u16>,
    /// Whether SCR stats are enabled (`-s`).
    pub scr_stats: bool,
    /// SCR PID (`-S`, default [`DEFAULT_SCR_PID`]).
    pub scr_pid: u16,
    /// PIDs to track PTS/DTS on (`-p`, repeatable).
    pub pts_dts_pids: Vec<u16>,
    /// Drift threshold in milliseconds (`-D`).
    pub drift_threshold_ms: i64,
    /// Whether to buffer and reorder PTS by value (`-R`).
    pub reorder_pts: bool,
    /// Whether to print a progress indicator (`-P`).
    pub progress: bool,
    /// Whether conformance warnings are suppressed (`-Z`).
    pub suppress_conformance: bool,
    /// PIDs to emit periodic trend reports for (`-L`, repeatable).
    pub trend_report_pids: Vec<u16>,
    /// Whether PES delivery-span reporting is enabled (`-Y`).
    pub pes_delivery_report: bool,
    /// Stop after this many seconds of ingest (`-t`).
    pub stop_after_seconds: Option<u64>,
    /// Trend window size in samples (`-A`, floored at [`MIN_TREND_CAPACITY`]).
    pub trend_capacity: usize,
    /// Trend report period in seconds (`-B`, floored at [`MIN_REPORT_PERIOD_SECONDS`]).
    pub report_period_seconds: u64,
    /// `-L` verbosity: `1` summary line, `2` also persists a CSV row per
    /// snapshot, `3` also dumps every raw sample to the console.
    pub trend_verbosity: u8,
}

impl InspectorConfig {
    /// Builds a config from parsed CLI args, applying the `-A`/`-B` minimums.
    #[allow(clippy::too_many_arguments)]
    pub fn from_args(
        input: &str,
        wallclock_anchor: Option<String>,
        hex_dump_pids: Vec<u16>,
        scr_stats: bool,
        scr_pid: Option<u16>,
        pts_dts_pids: Vec<u16>,
        drift_threshold_ms: Option<i64>,
        reorder_pts: bool,
        progress: bool,
        suppress_conformance: bool,
        trend_report_pids: Vec<u16>,
        pes_delivery_report: bool,
        stop_after_seconds: Option<u64>,
        trend_capacity: Option<usize>,
        report_period_seconds: Option<u64>,
        trend_verbosity: Option<u8>,
    ) -> Result<Self> {
        if input.is_empty() {
            return Err(TsPcrError::Config("missing required -i <url>".into()));
        }
        Ok(Self {
            source: SourceUrl::parse(input)?,
            wallclock_anchor,
            hex_dump_pids,
            scr_stats,
            scr_pid: scr_pid.unwrap_or(DEFAULT_SCR_PID),
            pts_dts_pids,
            drift_threshold_ms: drift_threshold_ms.unwrap_or(DEFAULT_DRIFT_THRESHOLD_MS),
            reorder_pts,
            progress,
            suppress_conformance,
            trend_report_pids,
            pes_delivery_report,
            stop_after_seconds,
            trend_capacity: trend_capacity.unwrap_or(DEFAULT_TREND_CAPACITY).max(MIN_TREND_CAPACITY),
            report_period_seconds: report_period_seconds
                .unwrap_or(DEFAULT_REPORT_PERIOD_SECONDS)
                .max(MIN_REPORT_PERIOD_SECONDS),
            trend_verbosity: trend_verbosity
                .unwrap_or(DEFAULT_TREND_VERBOSITY)
                .clamp(DEFAULT_TREND_VERBOSITY, MAX_TREND_VERBOSITY),
        })
    }
}

/// Configuration for `ts-pcr-slice`, built from parsed CLI flags.
#[derive(Debug, Clone)]
pub struct SlicerConfig {
    /// Required `-i <input.ts>`.
    pub input: PathBuf,
    /// `-o <output.ts>`.
    pub output: Option<PathBuf>,
    /// `-s <time>` start bound.
    pub start: Option<String>,
    /// `-e <time>` end bound.
    pub end: Option<String>,
    /// `-l` dump index flag.
    pub dump_index: bool,
    /// `-q <file>` fast duration query target.
    pub fast_query: Option<PathBuf>,
}

impl SlicerConfig {
    /// Builds a config from parsed CLI args.
    pub fn from_args(
        input: &str,
        output: Option<String>,
        start: Option<String>,
        end: Option<String>,
        dump_index: bool,
        fast_query: Option<String>,
    ) -> Result<Self> {
        if input.is_empty() {
            return Err(TsPcrError::Config("missing required -i <input.ts>".into()));
        }
        Ok(Self {
            input: PathBuf::from(input),
            output: output.map(PathBuf::from),
            start,
            end,
            dump_index,
            fast_query: fast_query.map(PathBuf::from),
        })
    }
}
