//! PCR indexer: scans a TS file in chunks and records a `(byte_offset, pcr)`
//! pair for every packet on the configured SCR PID that carries a PCR.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, TsPcrError};
use crate::index::pcr_position::PcrPosition;
use crate::ts::packet;

/// Number of TS packets read per chunk during an index build.
const CHUNK_PACKETS: usize = 4096;

/// The conventional index file path for a given input file: `<input>.idx`.
pub fn index_path_for(input: &Path) -> PathBuf {
    let mut name = input.file_name().unwrap_or_default().to_os_string();
    name.push(".idx");
    input.with_file_name(name)
}

/// Scans `input` for packets on `scr_pid`, returning one [`PcrPosition`] per
/// PCR found. Does not touch the index file on disk; see [`write_index`].
pub fn build_index(input: &Path, scr_pid: u16) -> Result<Vec<PcrPosition>> {
    let mut file = std::fs::File::open(input)?;
    let mut chunk = vec![0u8; packet::PACKET_SIZE * CHUNK_PACKETS];
    let mut records = Vec::new();
    let mut byte_offset: u64 = 0;

    loop {
        let n = read_fill(&mut file, &mut chunk)?;
        if n == 0 {
            break;
        }
        debug!("indexer: read {n} bytes at offset {byte_offset}, {} PCRs so far", records.len());
        let whole_packets = n / packet::PACKET_SIZE;
        for i in 0..whole_packets {
            let pkt = &chunk[i * packet::PACKET_SIZE..(i + 1) * packet::PACKET_SIZE];
            if packet::has_sync(pkt) && packet::pid(pkt) == scr_pid {
                if let Some(pcr) = packet::pcr_27mhz(pkt) {
                    records.push(PcrPosition {
                        byte_offset,
                        pcr_27mhz: pcr,
                    });
                }
            }
            byte_offset += packet::PACKET_SIZE as u64;
        }
        if n < chunk.len() {
            break;
        }
    }
    Ok(records)
}

/// Reads into `buf` until it is full or the file is exhausted, returning how
/// many bytes were actually filled (may be less than `buf.len()` only at
/// EOF).
fn read_fill(file: &mut std::fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Writes `records` to `path` as packed 16-byte big-endian entries.
pub fn write_index(path: &Path, records: &[PcrPosition]) -> Result<()> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        writer.write_all(&record.to_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads an index file in full, returning its records.
pub fn read_index(path: &Path) -> Result<Vec<PcrPosition>> {
    let bytes = std::fs::read(path)?;
    if bytes.len() % crate::index::pcr_position::RECORD_SIZE != 0 {
        return Err(TsPcrError::Index(format!(
            "index file {} has a length not a multiple of the record size",
            path.display()
        )));
    }
    let mut records = Vec::with_capacity(bytes.len() / crate::index::pcr_position::RECORD_SIZE);
    for chunk in bytes.chunks_exact(crate::index::pcr_position::RECORD_SIZE) {
        let array: [u8; crate::index::pcr_position::RECORD_SIZE] = chunk.try_into().unwrap();
        records.push(PcrPosition::from_bytes(&array));
    }
    Ok(records)
}

/// Builds an index for `input` and persists it at [`index_path_for`],
/// returning the records. A missing or corrupt existing index is always
/// treated the same as no index at all: rebuild from scratch.
pub fn build_and_persist(input: &Path, scr_pid: u16) -> Result<Vec<PcrPosition>> {
    let records = build_index(input, scr_pid)?;
    write_index(&index_path_for(input), &records)?;
    Ok(records)
}

/// Loads the on-disk index for `input` if present and well-formed,
/// rebuilding it otherwise.
pub fn load_or_build(input: &Path, scr_pid: u16) -> Result<Vec<PcrPosition>> {
    let idx_path = index_path_for(input);
    match read_index(&idx_path) {
        Ok(records) if !records.is_empty() => Ok(records),
        _ => build_and_persist(input, scr_pid),
    }
}
