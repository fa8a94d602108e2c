//! End-to-end indexer/slicer scenarios over small synthetic TS files.

use std::path::PathBuf;

use tspcr::clock::time_to_pcr;
use tspcr::index::{indexer, query, slicer};
use tspcr::ts::packet::{build_pcr_packet, PACKET_SIZE};

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tspcr-e2e-{label}-{}.ts", std::process::id()))
}

fn write_synthetic_ts(path: &std::path::Path, count: usize, step_ticks: i64) {
    let mut buf = Vec::with_capacity(count * PACKET_SIZE);
    for i in 0..count {
        buf.extend_from_slice(&build_pcr_packet(0x31, (i % 16) as u8, i as i64 * step_ticks));
    }
    std::fs::write(path, buf).unwrap();
}

#[test]
fn index_build_and_slice_matches_literal_scenario() {
    let input = temp_path("index-build-slice");
    // PCR on PID 0x31 every 40ms for 60s: 1501 samples (t = 0, 40, ..., 60000).
    write_synthetic_ts(&input, 1501, time_to_pcr(40));

    let records = indexer::build_index(&input, 0x31).unwrap();
    assert_eq!(records.len(), 1501);
    let span = records.last().unwrap().pcr_27mhz - records.first().unwrap().pcr_27mhz;
    assert_eq!(span, 60 * 27_000_000);

    let output = temp_path("index-build-slice-out");
    let written = slicer::slice_by_time(
        &input,
        &output,
        &records,
        Some("0.00:00:10.000"),
        Some("0.00:00:20.000"),
    )
    .unwrap();

    assert_eq!(written % PACKET_SIZE as u64, 0);
    let start_record_idx = records.partition_point(|r| r.pcr_27mhz < time_to_pcr(10_000));
    let end_record_idx = records.partition_point(|r| r.pcr_27mhz < time_to_pcr(20_000));
    assert_eq!(
        written,
        records[end_record_idx].byte_offset - records[start_record_idx].byte_offset
    );

    std::fs::remove_file(&input).ok();
    std::fs::remove_file(&output).ok();
}

#[test]
fn write_then_read_index_yields_identical_records() {
    let index_path = temp_path("roundtrip").with_extension("idx");
    let records = vec![
        tspcr::index::pcr_position::PcrPosition { byte_offset: 0, pcr_27mhz: 1000 },
        tspcr::index::pcr_position::PcrPosition { byte_offset: 188, pcr_27mhz: 2000 },
        tspcr::index::pcr_position::PcrPosition { byte_offset: 376, pcr_27mhz: 3000 },
    ];
    indexer::write_index(&index_path, &records).unwrap();
    let read_back = indexer::read_index(&index_path).unwrap();
    assert_eq!(read_back, records);
    std::fs::remove_file(&index_path).ok();
}

#[test]
fn fast_query_on_large_ts_file_reads_only_head_and_tail() {
    let ts_path = temp_path("fast-query");
    let first_pcr = 1_000_000i64;
    let last_pcr = first_pcr + 3600 * 27_000_000;

    let mut buf = Vec::new();
    buf.extend_from_slice(&build_pcr_packet(0x31, 0, first_pcr));
    // Filler packets span well past either 16 MiB chunk boundary, carrying
    // an obviously-wrong PCR so a middle read would be caught.
    let filler_packet_count = (33 * 1024 * 1024) / PACKET_SIZE;
    for i in 0..filler_packet_count {
        buf.extend_from_slice(&build_pcr_packet(0x31, (i % 16) as u8, 0xBAD));
    }
    buf.extend_from_slice(&build_pcr_packet(0x31, 0, last_pcr));
    std::fs::write(&ts_path, &buf).unwrap();

    let duration = query::fast_query_duration(&ts_path, 0x31).unwrap();
    assert_eq!(duration, 3600 * 27_000_000);

    std::fs::remove_file(&ts_path).ok();
}
