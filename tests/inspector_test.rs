//! End-to-end inspector scenarios driving the pipeline over small synthetic
//! packet sequences, mirroring the literal scenarios the crate is judged
//! against.

use tspcr::clock::ticks_90k_to_ms;
use tspcr::config::InspectorConfig;
use tspcr::inspector::pipeline::Pipeline;
use tspcr::ts::packet::{build_pcr_packet, PACKET_SIZE, SYNC_BYTE};
use tspcr::ts::pes::build_pes_header;

fn config(scr_pid: u16, pts_pid: u16) -> InspectorConfig {
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
fn cc_error_detection_reports_expected_and_got_values() {
    let mut pipeline = Pipeline::new(config(0x31, 0x200));
    let ccs = [0u8, 1, 2, 3, 5, 6, 7, 8, 9, 10];
    let mut errors = Vec::new();
    for (i, &cc) in ccs.iter().enumerate() {
        let pkt = payload_packet(0x100, cc, i == 0, &[0u8; 4]);
        errors.extend(
            pipeline
                .process_packet(&pkt, i as i64 * 1000)
                .into_iter()
                .filter(|l| l.starts_with("!CC")),
        );
    }
    assert_eq!(errors, vec!["!CC Error PID 0x0100: expected 04 got 05"]);
}

#[test]
fn pts_wrap_is_reported_as_a_small_forward_delta_with_no_warning() {
    let mut pipeline = Pipeline::new(config(0x31, 0x200));
    let near_wrap = tspcr::clock::MAX_PTS - 9000;

    let pkt_a = payload_packet(0x200, 0, true, &build_pes_header(0xE0, near_wrap, None));
    pipeline.process_packet(&pkt_a, 0);

    let pkt_b = payload_packet(0x200, 1, true, &build_pes_header(0xE0, 0, None));
    let lines = pipeline.process_packet(&pkt_b, 100_000);

    let pts_line = lines.iter().find(|l| l.starts_with("PTS")).unwrap();
    assert!(pts_line.contains("diff=9000"));
    assert_eq!(ticks_90k_to_ms(9000), 100);
    assert!(lines.iter().all(|l| !l.starts_with('!')));
}

#[test]
fn pts_arriving_behind_pcr_triggers_a_conformance_warning() {
    let mut pipeline = Pipeline::new(config(0x31, 0x200));
    let t = 27_000_000 * 10i64;
    pipeline.process_packet(&build_pcr_packet(0x31, 0, t), 0);

    let pts = t / 300 - 1000;
    let pkt = payload_packet(0x200, 0, true, &build_pes_header(0xE0, pts, None));
    let lines = pipeline.process_packet(&pkt, 0);

    assert!(lines.iter().any(|l| l.starts_with("!PTS") && l.contains("BEHIND the PCR")));
}

#[test]
fn drift_threshold_warning_uses_asymmetric_ge_comparison() {
    let mut pipeline = Pipeline::new(config(0x31, 0x200));
    pipeline.process_packet(&payload_packet(0x200, 0, true, &build_pes_header(0xE0, 0, None)), 0);

    // 63_001 ticks @ 90kHz is exactly 700ms in the tick domain; this check
    // is purely tick-based, so wallclock timing plays no part in it.
    let pts_ticks = 63_001;
    let pkt = payload_packet(0x200, 1, true, &build_pes_header(0xE0, pts_ticks, None));
    let lines = pipeline.process_packet(&pkt, 0);

    assert!(lines
        .iter()
        .any(|l| l.contains("Difference") && l.contains("\u{b1}700ms") && l.contains("(is 700)")));
}

#[test]
fn pts_scr_diff_ms_warns_when_the_scr_advances_past_threshold_between_observations() {
    let mut pipeline = Pipeline::new(config(0x31, 0x200));

    pipeline.process_packet(&build_pcr_packet(0x31, 0, 0), 0);
    pipeline.process_packet(&payload_packet(0x200, 0, true, &build_pes_header(0xE0, 63_334, None)), 0);

    pipeline.process_packet(&build_pcr_packet(0x31, 1, 19_000_000), 0);
    let lines = pipeline.process_packet(&payload_packet(0x200, 1, true, &build_pes_header(0xE0, 63_335, None)), 0);

    assert!(lines
        .iter()
        .any(|l| l.starts_with("!PTS") && l.contains("Difference") && l.contains("(is 703)")));
}

#[test]
fn suppress_conformance_flag_hides_bang_lines() {
    let mut config = config(0x31, 0x200);
    config.suppress_conformance = true;
    let mut pipeline = Pipeline::new(config);

    let t = 27_000_000 * 10i64;
    pipeline.process_packet(&build_pcr_packet(0x31, 0, t), 0);
    let pts = t / 300 - 1000;
    let pkt = payload_packet(0x200, 0, true, &build_pes_header(0xE0, pts, None));
    let lines = pipeline.process_packet(&pkt, 0);

    assert!(lines.iter().all(|l| !l.starts_with('!')));
}
