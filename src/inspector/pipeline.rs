//! Clock-inspector pipeline.
//!
//! Owns the [`PidTable`] and drives it packet by packet: continuity
//! checking, SCR/PTS/DTS extraction, conformance-warning rules, and (when
//! `-S` is not given) opportunistic PAT/PMT-driven PCR PID discovery. A
//! single-threaded, cooperative component — everything here runs on the
//! ingest task; the only state it shares with another task is the
//! `LinearTrend` instances reached through [`PidTable`].

use log::debug;

use crate::clock::trend::LinearTrend;
use crate::clock::{parse_wallclock_anchor, pts_diff_ticks, scr_diff, ticks_27m_to_ms, ticks_90k_to_ms};
use crate::config::InspectorConfig;
use crate::inspector::report;
use crate::inspector::reorder::OrderedPtsList;
use crate::pid_table::{PesClockState, PidTable, NULL_PID};
use crate::ts::packet;
use crate::ts::pes;

/// Observations consumed before a PES clock state starts contributing
/// samples to its [`LinearTrend`](crate::clock::trend::LinearTrend) window.
const TREND_WARMUP_SAMPLES: u32 = 16;

/// Drives per-PID state from a continuous stream of 188-byte packets.
pub struct Pipeline {
    table: PidTable,
    config: InspectorConfig,
    packet_nr: u64,
    byte_offset: u64,
    pmt_pid: Option<u16>,
    discovered_pcr_pid: Option<u16>,
    first_packet_wall_us: Option<i64>,
    /// Added to every `now_us` once the first packet establishes the offset
    /// between the ingest task's elapsed-time clock and a `-T` wallclock
    /// anchor. Zero when `-T` was not given.
    wallclock_offset_us: i64,
    /// Packets seen since the last `-P` progress line.
    progress_pkt_count: u64,
}

impl Pipeline {
    /// Creates a pipeline with a freshly-allocated, zeroed [`PidTable`].
    pub fn new(config: InspectorConfig) -> Self {
        let trend_capacity = config.trend_capacity;
        Self {
            table: PidTable::new(trend_capacity),
            config,
            packet_nr: 0,
            byte_offset: 0,
            pmt_pid: None,
            discovered_pcr_pid: None,
            first_packet_wall_us: None,
            wallclock_offset_us: 0,
            progress_pkt_count: 0,
        }
    }

    /// Borrows the per-PID state table, e.g. for a [`TrendReporter`](crate::inspector::trend_reporter::TrendReporter) to extract trend handles from.
    pub fn table(&self) -> &PidTable {
        &self.table
    }

    /// The PCR PID currently in effect: the configured `-S` value unless it
    /// was left at its default and PAT/PMT discovery has found a different
    /// one.
    pub fn effective_scr_pid(&self) -> u16 {
        self.discovered_pcr_pid.unwrap_or(self.config.scr_pid)
    }

    /// Seconds of ingest elapsed since the first packet, used by the `-t`
    /// stop-after-N-seconds flag.
    pub fn elapsed_seconds(&self, now_us: i64) -> Option<u64> {
        self.first_packet_wall_us
            .map(|start| ((now_us - start).max(0) / 1_000_000) as u64)
    }

    /// Formats the pts-sorted listing buffered for each tracked PID under
    /// `-R`, in shutdown-dump order (one block per PID, each block sorted by
    /// PTS). Empty when `-R` was not given.
    pub fn drain_ordered_pts_lines(&self) -> Vec<String> {
        if !self.config.reorder_pts {
            return Vec::new();
        }
        let mut lines = Vec::new();
        for &pid in &self.config.pts_dts_pids {
            if let Some(ordered) = &self.table.get(pid).ordered_pts {
                for entry in ordered.entries() {
                    lines.push(report::ordered_pts_line(pid, entry.nr, entry.pts, entry.filepos));
                }
            }
        }
        lines
    }

    /// Processes one 188-byte packet, returning the stdout report lines it
    /// produced, in emission order. `now_us` is the ingest task's wallclock
    /// reading at the moment this packet was read, in microseconds since
    /// an arbitrary but consistent epoch.
    pub fn process_packet(&mut self, pkt: &[u8], now_us: i64) -> Vec<String> {
        let mut lines = Vec::new();
        if !packet::has_sync(pkt) {
            return lines;
        }
        if self.first_packet_wall_us.is_none() {
            if let Some(anchor) = &self.config.wallclock_anchor {
                if let Ok(anchor_us) = parse_wallclock_anchor(anchor) {
                    self.wallclock_offset_us = anchor_us - now_us;
                }
            }
        }
        self.first_packet_wall_us.get_or_insert(now_us);
        let now_us = now_us + self.wallclock_offset_us;
        self.packet_nr += 1;
        let nr = self.packet_nr;
        self.byte_offset += packet::PACKET_SIZE as u64;
        let byte_offset = self.byte_offset - packet::PACKET_SIZE as u64;

        let pid = packet::pid(pkt);

        self.maybe_discover_pat_pmt(pid, pkt);

        if self.config.hex_dump_pids.contains(&pid) {
            lines.push(report::hex_dump_line(pid, nr, pkt));
        }

        self.check_continuity(pid, pkt, &mut lines);

        if self.config.scr_stats && pid == self.effective_scr_pid() {
            self.handle_scr(pid, pkt, now_us, &mut lines);
        }

        if self.config.pts_dts_pids.contains(&pid) {
            self.handle_pes(pid, pkt, nr, byte_offset, now_us, &mut lines);
        }

        if self.config.progress {
            self.progress_pkt_count += 1;
            if self.progress_pkt_count % 10_000 == 0 {
                lines.push(format!("PROGRESS packets={} bytes={}", self.packet_nr, self.byte_offset));
            }
        }

        lines
    }

    fn check_continuity(&mut self, pid: u16, pkt: &[u8], lines: &mut Vec<String>) {
        if pid == NULL_PID {
            return;
        }
        let afc = packet::adaptation_field_control(pkt);
        // Only payload-bearing packets (afc 1 or 3) carry a meaningful CC.
        if afc != 1 && afc != 3 {
            return;
        }
        let cc = packet::continuity_counter(pkt);
        let state = self.table.get_mut(pid);
        state.pkt_count += 1;
        if let Some(last) = state.last_cc {
            let expected = (last + 1) % 16;
            if cc != expected {
                state.cc_errors += 1;
                lines.push(report::cc_error_line(pid, expected, cc));
            }
        }
        state.last_cc = Some(cc);
    }

    fn maybe_discover_pat_pmt(&mut self, pid: u16, pkt: &[u8]) {
        if self.config.scr_pid != crate::config::DEFAULT_SCR_PID || self.discovered_pcr_pid.is_some() {
            return;
        }
        if pid == 0 {
            if let Some(pmt_pid) = parse_pat_first_pmt_pid(pkt) {
                self.pmt_pid = Some(pmt_pid);
            }
        } else if Some(pid) == self.pmt_pid {
            if let Some(pcr_pid) = parse_pmt_pcr_pid(pkt) {
                self.discovered_pcr_pid = Some(pcr_pid);
            }
        }
    }

    fn handle_scr(&mut self, pid: u16, pkt: &[u8], now_us: i64, lines: &mut Vec<String>) {
        let Some(pcr) = packet::pcr_27mhz(pkt) else {
            return;
        };
        let state = self.table.get_mut(pid);
        let diff_ticks = match state.scr {
            Some(last) => crate::clock::scr_diff(last, pcr),
            None => 0,
        };
        if state.scr_first.is_none() {
            state.scr_first = Some(pcr);
            state.scr_first_wall_time = now_us;
        }
        state.scr = Some(pcr);
        state.scr_updates += 1;
        state.scr_last_seen = Some(pcr);
        state.scr_last_seen_wall_us = now_us;

        let ms = ticks_27m_to_ms(pcr);
        let diff_us = diff_ticks / 27;
        lines.push(report::scr_line(pid, pcr, ms, diff_ticks, diff_us));
    }

    fn handle_pes(&mut self, pid: u16, pkt: &[u8], nr: u64, byte_offset: u64, now_us: i64, lines: &mut Vec<String>) {
        if !packet::payload_unit_start_indicator(pkt) {
            return;
        }
        let Some(offset) = packet::payload_offset(pkt) else {
            debug!("pid {pid:#06x} nr={nr}: no payload offset, skipping");
            return;
        };
        let Some(payload) = pkt.get(offset..) else {
            debug!("pid {pid:#06x} nr={nr}: payload offset past packet end, skipping");
            return;
        };
        let Some(header) = pes::parse_pes_header(payload) else {
            debug!("pid {pid:#06x} nr={nr}: not a PES header, skipping");
            return;
        };

        let scr_ticks = self.table.get(self.effective_scr_pid()).scr;
        let threshold_ms = self.config.drift_threshold_ms;

        if self.config.pes_delivery_report {
            let state = self.table.get_mut(pid);
            let span_us = now_us - state.scr_at_pes_unit_header_wall_us;
            if state.scr_at_pes_unit_header.is_some() {
                lines.push(report::pes_delivery_line(pid, nr, span_us));
            }
            state.scr_at_pes_unit_header = state.scr;
            state.scr_at_pes_unit_header_wall_us = now_us;
        }

        if let Some(pts) = header.pts {
            if self.config.reorder_pts {
                let state = self.table.get_mut(pid);
                state
                    .ordered_pts
                    .get_or_insert_with(OrderedPtsList::new)
                    .insert(nr, pts, byte_offset);
            }

            let state = self.table.get_mut(pid);
            let diff_ticks = observe_pes_clock(&mut state.pts, pts, now_us, TREND_WARMUP_SAMPLES);
            let diff_ms = ticks_90k_to_ms(diff_ticks);
            // In reorder mode the arrival-order PTS line is withheld; the
            // full pts-sorted listing is dumped at shutdown instead.
            if !self.config.reorder_pts {
                lines.push(report::pts_line(pid, nr, pts, diff_ticks, diff_ms));
            }

            if !self.config.suppress_conformance {
                if let Some(scr) = scr_ticks {
                    if (pts * 300) < scr {
                        let pts_ms = ticks_90k_to_ms(pts);
                        let scr_ms = ticks_27m_to_ms(scr);
                        lines.push(report::pts_behind_pcr_line(pid, pts_ms, scr_ms));
                    }
                }
                if diff_ms.abs() >= threshold_ms {
                    lines.push(report::drift_warning_line("PTS", pid, threshold_ms, diff_ms));
                }
                if let (Some(last_scr), Some(scr)) = (state.pts.last_scr, scr_ticks) {
                    let pts_scr_diff_ms = scr_diff(last_scr, scr) / 27_000;
                    if pts_scr_diff_ms >= threshold_ms {
                        lines.push(report::drift_warning_line("PTS", pid, threshold_ms, pts_scr_diff_ms));
                    }
                }
            }
            state.pts.last_scr = scr_ticks;
        }

        if let Some(dts) = header.dts {
            let state = self.table.get_mut(pid);
            let diff_ticks = observe_pes_clock(&mut state.dts, dts, now_us, TREND_WARMUP_SAMPLES);
            let diff_ms = ticks_90k_to_ms(diff_ticks);
            lines.push(report::dts_line(pid, nr, dts, diff_ticks, diff_ms));

            if !self.config.suppress_conformance {
                if diff_ms.abs() >= threshold_ms {
                    lines.push(report::drift_warning_line("DTS", pid, threshold_ms, diff_ms));
                }
                if let (Some(last_scr), Some(scr)) = (state.dts.last_scr, scr_ticks) {
                    let dts_scr_diff_ms = scr_diff(last_scr, scr) / 27_000;
                    if dts_scr_diff_ms >= threshold_ms {
                        lines.push(report::drift_warning_line("DTS", pid, threshold_ms, dts_scr_diff_ms));
                    }
                }
            }
            state.dts.last_scr = scr_ticks;
        }
    }
}

/// Updates one [`PesClockState`] with a newly-decoded timestamp, returning
/// the wrap-corrected forward delta from the previous observation.
fn observe_pes_clock(state: &mut PesClockState, ticks: i64, now_us: i64, warmup: u32) -> i64 {
    let diff_ticks = match state.last_ticks {
        Some(last) => pts_diff_ticks(last, ticks),
        None => 0,
    };
    state.diff_ticks = diff_ticks;
    state.last_ticks = Some(ticks);
    state.count += 1;

    if !state.clock.is_established() {
        state.clock.establish_wallclock(now_us, ticks);
    } else {
        state.clock.set_ticks(now_us, ticks);
    }

    if state.warmup_consumed < warmup {
        state.warmup_consumed += 1;
    } else {
        let (ox, oy) = *state.trend_origin.get_or_insert((now_us as f64 / 1_000_000.0, ticks as f64 / 90_000.0));
        let x = now_us as f64 / 1_000_000.0 - ox;
        let y = ticks as f64 / 90_000.0 - oy;
        let mut guard = state.trend.lock();
        let trend = guard.get_or_insert_with(|| LinearTrend::new(state.trend_name.clone(), state.trend_capacity));
        trend.insert(x, y);
    }

    diff_ticks
}

/// Reads the PMT PID for the first program listed in a PAT section.
///
/// Returns `None` for anything other than a minimal well-formed PAT; this
/// is best-effort discovery, not a conformant PSI parser (see the
/// TR 101 290 non-goal).
fn parse_pat_first_pmt_pid(pkt: &[u8]) -> Option<u16> {
    let offset = packet::payload_offset(pkt)?;
    let payload = pkt.get(offset..)?;
    let pointer_field = *payload.first()? as usize;
    let section = payload.get(pointer_field + 1..)?;
    // section[0] = table_id, [1..3] section_length bits, [3..5] transport_stream_id,
    // [5] misc, [6] section_number, [7] last_section_number, then program loop.
    let program_loop = section.get(8..)?;
    if program_loop.len() < 4 {
        return None;
    }
    let program_number = u16::from_be_bytes([program_loop[0], program_loop[1]]);
    if program_number == 0 {
        // Network PID entry, not a program; no PMT to learn here.
        return None;
    }
    let pid = (((program_loop[2] & 0x1F) as u16) << 8) | program_loop[3] as u16;
    Some(pid)
}

/// Reads the PCR_PID field from a PMT section.
fn parse_pmt_pcr_pid(pkt: &[u8]) -> Option<u16> {
    let offset = packet::payload_offset(pkt)?;
    let payload = pkt.get(offset..)?;
    let pointer_field = *payload.first()? as usize;
    let section = payload.get(pointer_field + 1..)?;
    let pcr_field = section.get(8..10)?;
    let pid = (((pcr_field[0] & 0x1F) as u16) << 8) | pcr_field[1] as u16;
    Some(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InspectorConfig;
    use crate::ts::packet::{build_pcr_packet, PACKET_SIZE, SYNC_BYTE};
    use crate::ts::pes::build_pes_header;

    fn test_config(scr_pid: u16, pts_pid: u16) -> InspectorConfig {
        InspectorConfig::from_args(
            "dummy.ts",
            None,
            vec![],
            true,
            Some(scr_pid),
            vec![pts_pid],
            Some(700),
            false,
            false,
            false,
            vec![],
            false,
            None,
            Some(64),
            None,
            None,
        )
        .unwrap()
    }

    fn payload_packet(pid: u16, cc: u8, pusi: bool, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0xFFu8; PACKET_SIZE];
        pkt[0] = SYNC_BYTE;
        pkt[1] = (((pid >> 8) as u8) & 0x1F) | if pusi { 0x40 } else { 0x00 };
        pkt[2] = (pid & 0xFF) as u8;
        pkt[3] = 0x10 | (cc & 0x0F);
        let end = (4 + payload.len()).min(PACKET_SIZE);
        pkt[4..end].copy_from_slice(&payload[..end - 4]);
        pkt
    }

    #[test]
    fn literal_scenario_cc_error_reports_expected_and_got() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        let ccs = [0u8, 1, 2, 3, 5, 6, 7, 8, 9, 10];
        let mut cc_error_lines = Vec::new();
        for (i, &cc) in ccs.iter().enumerate() {
            let pkt = payload_packet(0x100, cc, i == 0, &[0u8; 4]);
            let lines = pipeline.process_packet(&pkt, i as i64 * 1000);
            cc_error_lines.extend(lines.into_iter().filter(|l| l.starts_with("!CC")));
        }
        assert_eq!(cc_error_lines.len(), 1);
        assert!(cc_error_lines[0].contains("expected 04"));
        assert!(cc_error_lines[0].contains("got 05"));
    }

    #[test]
    fn literal_scenario_pts_wrap_has_no_conformance_warning() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        let near_wrap = crate::clock::MAX_PTS - 9000;
        let payload_a = build_pes_header(0xE0, near_wrap, None);
        let pkt_a = payload_packet(0x200, 0, true, &payload_a);
        let lines_a = pipeline.process_packet(&pkt_a, 0);
        assert!(lines_a.iter().any(|l| l.contains("diff=0")));

        let payload_b = build_pes_header(0xE0, 0, None);
        let pkt_b = payload_packet(0x200, 1, true, &payload_b);
        let lines_b = pipeline.process_packet(&pkt_b, 100_000);
        let pts_line = lines_b.iter().find(|l| l.starts_with("PTS")).unwrap();
        assert!(pts_line.contains("diff=9000"));
        assert!(pts_line.contains("diff_ms=100"));
        assert!(!lines_b.iter().any(|l| l.starts_with('!')));
    }

    #[test]
    fn literal_scenario_pts_behind_pcr_is_reported() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        let t: i64 = 27_000_000 * 10; // 10s of 27MHz ticks
        let scr_pkt = build_pcr_packet(0x31, 0, t);
        pipeline.process_packet(&scr_pkt, 0);

        let pts = t / 300 - 1000;
        let payload = build_pes_header(0xE0, pts, None);
        let pkt = payload_packet(0x200, 0, true, &payload);
        let lines = pipeline.process_packet(&pkt, 0);
        assert!(lines.iter().any(|l| l.contains("BEHIND the PCR")));
    }

    #[test]
    fn pts_scr_diff_ms_warns_on_the_same_rule_as_the_pts_diff_check() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));

        pipeline.process_packet(&build_pcr_packet(0x31, 0, 0), 0);
        let pkt_a = payload_packet(0x200, 0, true, &build_pes_header(0xE0, 63_334, None));
        let lines_a = pipeline.process_packet(&pkt_a, 0);
        assert!(!lines_a.iter().any(|l| l.starts_with('!')));

        pipeline.process_packet(&build_pcr_packet(0x31, 1, 19_000_000), 0);
        let pkt_b = payload_packet(0x200, 1, true, &build_pes_header(0xE0, 63_335, None));
        let lines_b = pipeline.process_packet(&pkt_b, 0);
        assert!(lines_b
            .iter()
            .any(|l| l.starts_with("!PTS") && l.contains("Difference") && l.contains("(is 703)")));
    }

    #[test]
    fn pts_behind_pcr_uses_exact_tick_multiplication_not_truncated_division() {
        // scr=301, pts=1: pts*300=300 < 301, so PTS is behind the PCR by one
        // 27MHz tick. `scr / 300` truncates to 1, which would have missed it.
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        pipeline.process_packet(&build_pcr_packet(0x31, 0, 301), 0);
        let pkt = payload_packet(0x200, 0, true, &build_pes_header(0xE0, 1, None));
        let lines = pipeline.process_packet(&pkt, 0);
        assert!(lines.iter().any(|l| l.contains("BEHIND the PCR")));
    }

    #[test]
    fn drift_warning_fires_only_when_diff_ms_is_not_negative_and_past_threshold() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        let payload_a = build_pes_header(0xE0, 0, None);
        let pkt_a = payload_packet(0x200, 0, true, &payload_a);
        pipeline.process_packet(&pkt_a, 0);

        // PTS advances by 63_001 ticks @ 90kHz, i.e. 700ms, meeting the
        // default `-D 700` threshold exactly; wallclock timing is irrelevant
        // to this check, which compares the tick-domain diff directly.
        let pts_ticks = 63_001;
        let payload_b = build_pes_header(0xE0, pts_ticks, None);
        let pkt_b = payload_packet(0x200, 1, true, &payload_b);
        let lines = pipeline.process_packet(&pkt_b, 0);
        assert!(lines.iter().any(|l| l.contains("Difference") && l.contains("(is 700)")));
    }

    #[test]
    fn scr_line_reports_the_diff_from_the_previous_pcr() {
        let mut pipeline = Pipeline::new(test_config(0x31, 0x200));
        let lines_a = pipeline.process_packet(&build_pcr_packet(0x31, 0, 27_000_000), 0);
        assert!(lines_a.iter().any(|l| l.contains("diff_ticks=0")));

        let lines_b = pipeline.process_packet(&build_pcr_packet(0x31, 1, 27_000_000 * 2), 40_000);
        let scr_line = lines_b.iter().find(|l| l.starts_with("SCR")).unwrap();
        assert!(scr_line.contains("diff_ticks=27000000"));
        assert!(scr_line.contains("diff_us=1000000"));
    }

    #[test]
    fn reorder_mode_withholds_arrival_order_lines_and_dumps_sorted_at_shutdown() {
        let mut config = test_config(0x31, 0x200);
        config.reorder_pts = true;
        let mut pipeline = Pipeline::new(config);

        for (nr, pts) in [(0i64, 0i64), (1, 3), (2, 1), (3, 2)] {
            let payload = build_pes_header(0xE0, pts, None);
            let pkt = payload_packet(0x200, nr as u8, true, &payload);
            let lines = pipeline.process_packet(&pkt, nr * 1000);
            assert!(!lines.iter().any(|l| l.starts_with("PTS")));
        }

        let dumped = pipeline.drain_ordered_pts_lines();
        let pts_seq: Vec<i64> = dumped
            .iter()
            .map(|l| {
                l.split("pts=")
                    .nth(1)
                    .unwrap()
                    .split_whitespace()
                    .next()
                    .unwrap()
                    .parse()
                    .unwrap()
            })
            .collect();
        assert_eq!(pts_seq, vec![0, 1, 2, 3]);
    }

    #[test]
    fn pes_delivery_report_emits_span_from_second_unit_onward() {
        let mut config = test_config(0x31, 0x200);
        config.pes_delivery_report = true;
        let mut pipeline = Pipeline::new(config);

        let pkt_a = payload_packet(0x200, 0, true, &build_pes_header(0xE0, 0, None));
        let lines_a = pipeline.process_packet(&pkt_a, 0);
        assert!(!lines_a.iter().any(|l| l.starts_with("PES")));

        let pkt_b = payload_packet(0x200, 1, true, &build_pes_header(0xE0, 3000, None));
        let lines_b = pipeline.process_packet(&pkt_b, 40_000);
        assert!(lines_b.iter().any(|l| l.contains("delivery_span_us=40000")));
    }

    #[test]
    fn wallclock_anchor_offsets_scr_reporting_time() {
        let mut config = test_config(0x31, 0x200);
        config.wallclock_anchor = Some("20260101000000".to_string());
        let mut pipeline = Pipeline::new(config);
        let anchor_us = crate::clock::parse_wallclock_anchor("20260101000000").unwrap();

        let pkt = build_pcr_packet(0x31, 0, 0);
        let lines = pipeline.process_packet(&pkt, 5_000_000);
        let scr_line = lines.iter().find(|l| l.starts_with("SCR")).unwrap();
        assert!(scr_line.contains("pcr=0"));
        // The offset latched at the first packet should make later wallclock
        // reads land `anchor_us` plus the raw elapsed time, not raw alone.
        assert_eq!(pipeline.wallclock_offset_us, anchor_us - 5_000_000);
    }

    #[test]
    fn progress_flag_emits_a_line_every_10000_packets() {
        let mut config = test_config(0x31, 0x200);
        config.progress = true;
        let mut pipeline = Pipeline::new(config);
        let mut last_lines = Vec::new();
        for i in 0..10_000u64 {
            last_lines = pipeline.process_packet(&payload_packet(0x100, (i % 16) as u8, i == 0, &[0u8; 4]), i as i64);
        }
        assert!(last_lines.iter().any(|l| l.starts_with("PROGRESS")));
    }
}
