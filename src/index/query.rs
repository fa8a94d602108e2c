//! Index lookups: ordinary binary search over an in-memory index, plus a
//! fast-query mode that answers a duration query by scanning only the first
//! and last 16 MiB of the source TS file, regardless of how large the file
//! is, never reading (or requiring) the middle of it.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::clock::scr_diff;
use crate::error::Result;
use crate::index::pcr_position::PcrPosition;
use crate::ts::packet::{self, PACKET_SIZE};

/// Returns the first record whose `pcr_27mhz` is `>=` target, assuming
/// `records` is sorted by `pcr_27mhz` (true for any index built from a
/// single, non-wrapping capture).
pub fn lookup_ge(records: &[PcrPosition], target_pcr: i64) -> Option<&PcrPosition> {
    let idx = records.partition_point(|r| r.pcr_27mhz < target_pcr);
    records.get(idx)
}

/// Total PCR span covered by an in-memory record set, wrap-aware.
pub fn duration_ticks(records: &[PcrPosition]) -> Option<i64> {
    let first = records.first()?;
    let last = records.last()?;
    Some(scr_diff(first.pcr_27mhz, last.pcr_27mhz))
}

/// Chunk size read from each end of the TS file by [`fast_query_duration`].
const FAST_QUERY_CHUNK_BYTES: u64 = 16 * 1024 * 1024;
/// Below this size, the whole file is read and scanned rather than splitting
/// into a head and tail chunk.
const FAST_QUERY_WHOLE_FILE_THRESHOLD_BYTES: u64 = 2 * FAST_QUERY_CHUNK_BYTES;

/// Answers a duration query by reading only the first 16 MiB and the last
/// 16 MiB of the TS file at `path` (the whole file, for anything smaller
/// than 32 MiB), scanning each chunk for PCR records on `scr_pid`, and
/// returning the modular span between the first record found in the head
/// and the last record found in the tail. The middle of the file is never
/// read.
pub fn fast_query_duration(path: &Path, scr_pid: u16) -> Result<i64> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();

    let (head_records, tail_records) = if len <= FAST_QUERY_WHOLE_FILE_THRESHOLD_BYTES {
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let records = scan_chunk_for_pcrs(&buf, 0, scr_pid);
        (records.clone(), records)
    } else {
        let head_len = aligned_chunk_len(FAST_QUERY_CHUNK_BYTES);
        let mut head_buf = vec![0u8; head_len as usize];
        file.read_exact(&mut head_buf)?;
        let head_records = scan_chunk_for_pcrs(&head_buf, 0, scr_pid);

        let tail_len = aligned_chunk_len(FAST_QUERY_CHUNK_BYTES.min(len));
        let tail_start = len - tail_len;
        let tail_start = tail_start - (tail_start % PACKET_SIZE as u64);
        file.seek(SeekFrom::Start(tail_start))?;
        let mut tail_buf = Vec::new();
        file.read_to_end(&mut tail_buf)?;
        let tail_records = scan_chunk_for_pcrs(&tail_buf, tail_start, scr_pid);

        (head_records, tail_records)
    };

    let first = head_records.first().ok_or_else(|| {
        crate::error::TsPcrError::Index(format!("no PCR found on PID {scr_pid:#06x} in the head of {}", path.display()))
    })?;
    let last = tail_records.last().ok_or_else(|| {
        crate::error::TsPcrError::Index(format!("no PCR found on PID {scr_pid:#06x} in the tail of {}", path.display()))
    })?;
    Ok(scr_diff(first.pcr_27mhz, last.pcr_27mhz))
}

/// Rounds `wanted` down to a whole multiple of the packet size.
fn aligned_chunk_len(wanted: u64) -> u64 {
    wanted - (wanted % PACKET_SIZE as u64)
}

/// Scans a buffer of whole 188-byte packets for PCR values on `scr_pid`,
/// recording each as a [`PcrPosition`] at its absolute file offset
/// (`base_offset` plus the packet's offset within `buf`).
fn scan_chunk_for_pcrs(buf: &[u8], base_offset: u64, scr_pid: u16) -> Vec<PcrPosition> {
    let mut records = Vec::new();
    for (i, pkt) in buf.chunks_exact(PACKET_SIZE).enumerate() {
        if !packet::has_sync(pkt) || packet::pid(pkt) != scr_pid {
            continue;
        }
        if let Some(pcr_27mhz) = packet::pcr_27mhz(pkt) {
            records.push(PcrPosition {
                byte_offset: base_offset + (i * PACKET_SIZE) as u64,
                pcr_27mhz,
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::packet::build_pcr_packet;
    use std::io::Write as _;

    fn sample_records() -> Vec<PcrPosition> {
        (0..10)
            .map(|i| PcrPosition {
                byte_offset: i as u64 * 188,
                pcr_27mhz: i as i64 * 1_000_000,
            })
            .collect()
    }

    #[test]
    fn lookup_ge_finds_exact_and_nearest_above() {
        let records = sample_records();
        assert_eq!(lookup_ge(&records, 3_000_000).unwrap().byte_offset, 3 * 188);
        assert_eq!(lookup_ge(&records, 3_500_000).unwrap().byte_offset, 4 * 188);
        assert!(lookup_ge(&records, 50_000_000).is_none());
    }

    #[test]
    fn duration_ticks_matches_first_last_span() {
        let records = sample_records();
        assert_eq!(duration_ticks(&records), Some(9_000_000));
    }

    #[test]
    fn literal_scenario_fast_query_on_large_index() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tspcr-query-fastpath-{}.ts", std::process::id()));
        let scr_pid = 0x31;

        let first_pcr = 1_000_000i64;
        let last_pcr = first_pcr + 3600 * 27_000_000;

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&build_pcr_packet(scr_pid, 0, first_pcr)).unwrap();
        // Middle packets carry an obviously-wrong PCR and live well outside
        // either 16 MiB chunk; if the fast path ever read them, this test
        // would still pass by coincidence, so the point of the assertion is
        // the exact expected duration, not the middle values themselves.
        let filler_packet_count = (33 * 1024 * 1024) / PACKET_SIZE;
        for _ in 0..filler_packet_count {
            file.write_all(&build_pcr_packet(scr_pid, 1, 0xDEAD_BEEF)).unwrap();
        }
        file.write_all(&build_pcr_packet(scr_pid, 2, last_pcr)).unwrap();
        drop(file);

        let duration = fast_query_duration(&path, scr_pid).unwrap();
        assert_eq!(duration, 3600 * 27_000_000);
        std::fs::remove_file(&path).ok();
    }
}
