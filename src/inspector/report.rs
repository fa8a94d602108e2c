//! Stable stdout report-line formatting.
//!
//! Every report line a consumer might parse is formatted in exactly one
//! place so the column layout never drifts between call sites. Lines that
//! report a timing-conformance violation are prefixed `!`; everything else
//! is unprefixed. These are a data product, not `log`-crate output, and are
//! written with plain `println!` by the binaries.

use crate::clock::time_to_str;

/// `!CC Error PID 0x0100: expected 04 got 05`
pub fn cc_error_line(pid: u16, expected: u8, got: u8) -> String {
    format!("!CC Error PID {pid:#06x}: expected {expected:02} got {got:02}")
}

/// `SCR PID 0x0031: pcr=123456789012 ms=4572477 diff_ticks=2430000 diff_us=90000`
pub fn scr_line(pid: u16, pcr_ticks: i64, ms: i64, diff_ticks: i64, diff_us: i64) -> String {
    format!("SCR PID {pid:#06x}: pcr={pcr_ticks} ms={ms} diff_ticks={diff_ticks} diff_us={diff_us}")
}

/// `PTS PID 0x0200: nr=42 ts=8100090 diff=9000 diff_ms=100`
pub fn pts_line(pid: u16, nr: u64, ticks: i64, diff_ticks: i64, diff_ms: i64) -> String {
    format!("PTS PID {pid:#06x}: nr={nr} ts={ticks} diff={diff_ticks} diff_ms={diff_ms}")
}

/// `DTS PID 0x0200: nr=42 ts=8100090 diff=9000 diff_ms=100`
pub fn dts_line(pid: u16, nr: u64, ticks: i64, diff_ticks: i64, diff_ms: i64) -> String {
    format!("DTS PID {pid:#06x}: nr={nr} ts={ticks} diff={diff_ticks} diff_ms={diff_ms}")
}

/// `!PTS PID 0x0200: arriving BEHIND the PCR (pts_ms=... scr_ms=...)`
pub fn pts_behind_pcr_line(pid: u16, pts_ms: i64, scr_ms: i64) -> String {
    format!(
        "!PTS PID {pid:#06x}: arriving BEHIND the PCR (pts_ms={pts_ms} scr_ms={scr_ms})"
    )
}

/// `!PTS PID 0x0200: Difference exceeds threshold >= ±700ms (is 700)`
///
/// The comparison this warning reports on is `diff_ms >= threshold_ms`, not
/// `diff_ms.abs() >= threshold_ms` — a negative drift of arbitrary
/// magnitude never triggers it. Preserved as observed rather than
/// "corrected" to a symmetric comparison.
pub fn drift_warning_line(label: &str, pid: u16, threshold_ms: i64, diff_ms: i64) -> String {
    format!(
        "!{label} PID {pid:#06x}: Difference exceeds threshold >= \u{b1}{threshold_ms}ms (is {diff_ms})"
    )
}

/// Periodic trend-window summary: PID label, sample count, slope, deviation,
/// r-squared, and a stream-time timestamp.
pub fn trend_summary_line(name: &str, count: usize, slope: f64, deviation: f64, r_squared: f64, wall_ms: i64) -> String {
    format!(
        "TREND {name}: count={count} slope={slope:.6} deviation={deviation:.3} r2={r_squared:.4} at={}",
        time_to_str(wall_ms)
    )
}

/// One raw trend sample, emitted to the console under `-L` verbosity 3.
pub fn trend_sample_line(name: &str, x: f64, y: f64) -> String {
    format!("TREND SAMPLE {name}: x={x:.6} y={y:.6}")
}

/// Hex dump of one packet's bytes, gated by `-d`.
pub fn hex_dump_line(pid: u16, nr: u64, bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
    format!("TS PID {pid:#06x}: nr={nr} {hex}")
}

/// PES delivery-span report, gated by `-Y`: how long (wallclock) a PES unit
/// took to arrive, from first packet of the unit to its last.
pub fn pes_delivery_line(pid: u16, nr: u64, span_us: i64) -> String {
    format!("PES PID {pid:#06x}: nr={nr} delivery_span_us={span_us}")
}

/// One line of the ordered-PTS listing dumped at shutdown under `-R`.
pub fn ordered_pts_line(pid: u16, nr: u64, pts: i64, filepos: u64) -> String {
    format!("ORDERED PTS PID {pid:#06x}: nr={nr} pts={pts} filepos={filepos}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_error_line_matches_literal_scenario_substrings() {
        let line = cc_error_line(0x100, 4, 5);
        assert!(line.contains("!CC Error"));
        assert!(line.contains("expected 04"));
        assert!(line.contains("got 05"));
    }

    #[test]
    fn drift_warning_matches_literal_scenario_substrings() {
        let line = drift_warning_line("PTS", 0x200, 700, 700);
        assert!(line.contains("Difference"));
        assert!(line.contains("\u{b1}700ms"));
        assert!(line.contains("(is 700)"));
    }

    #[test]
    fn pts_behind_pcr_line_is_bang_prefixed() {
        let line = pts_behind_pcr_line(0x200, 100, 200);
        assert!(line.starts_with("!PTS"));
        assert!(line.contains("BEHIND"));
    }

    #[test]
    fn pts_line_is_not_bang_prefixed() {
        let line = pts_line(0x200, 1, 9000, 9000, 100);
        assert!(!line.starts_with('!'));
    }

    #[test]
    fn scr_line_reports_both_ticks_and_microseconds() {
        let line = scr_line(0x31, 270_000_000, 10_000, 2_700_000, 100_000);
        assert!(line.contains("diff_ticks=2700000"));
        assert!(line.contains("diff_us=100000"));
    }

    #[test]
    fn trend_sample_line_carries_both_axes() {
        let line = trend_sample_line("pts:0x0200", 1.5, 3.25);
        assert!(line.contains("x=1.500000"));
        assert!(line.contains("y=3.250000"));
    }

    #[test]
    fn ordered_pts_line_carries_filepos_for_slicing() {
        let line = ordered_pts_line(0x200, 3, 1000, 564);
        assert!(line.contains("pts=1000"));
        assert!(line.contains("filepos=564"));
    }
}
