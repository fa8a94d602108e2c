//! Byte-exact file slicing between two stream-time bounds.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::clock::{str_to_time, time_to_pcr};
use crate::error::{Result, TsPcrError};
use crate::index::pcr_position::PcrPosition;
use crate::index::query::lookup_ge;
use crate::ts::packet::PACKET_SIZE;

const COPY_CHUNK_BYTES: usize = PACKET_SIZE * 4096;

/// Resolves a `D.HH:MM:SS.mmm` time bound to a byte offset via the index,
/// using the first record at or after the requested time.
fn resolve_offset(records: &[PcrPosition], time_str: &str) -> Result<u64> {
    let ms = str_to_time(time_str)?;
    let target_pcr = time_to_pcr(ms) + records.first().map(|r| r.pcr_27mhz).unwrap_or(0);
    lookup_ge(records, target_pcr)
        .map(|r| r.byte_offset)
        .ok_or_else(|| TsPcrError::Index(format!("time '{time_str}' is past the end of the index")))
}

/// Copies the byte range `[start_offset, end_offset)` of `input` into
/// `output`, in fixed-size chunks aligned to the packet size.
pub fn slice_by_offsets(input: &Path, output: &Path, start_offset: u64, end_offset: u64) -> Result<u64> {
    if end_offset < start_offset {
        return Err(TsPcrError::Config(format!(
            "end offset {end_offset} precedes start offset {start_offset}"
        )));
    }
    let mut src = std::fs::File::open(input)?;
    src.seek(SeekFrom::Start(start_offset))?;
    let mut dst = std::io::BufWriter::new(std::fs::File::create(output)?);

    let mut remaining = end_offset - start_offset;
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let mut written = 0u64;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = src.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        written += n as u64;
        remaining -= n as u64;
    }
    dst.flush()?;
    Ok(written)
}

/// Slices `input` between the `start`/`end` stream-time bounds (either may
/// be omitted, meaning "from the beginning" / "to the end") using `records`
/// to resolve times to byte offsets, writing the result to `output`.
pub fn slice_by_time(
    input: &Path,
    output: &Path,
    records: &[PcrPosition],
    start: Option<&str>,
    end: Option<&str>,
) -> Result<u64> {
    let start_offset = match start {
        Some(s) => resolve_offset(records, s)?,
        None => records.first().map(|r| r.byte_offset).unwrap_or(0),
    };
    let end_offset = match end {
        Some(s) => resolve_offset(records, s)?,
        None => {
            let len = std::fs::metadata(input)?.len();
            len - (len % PACKET_SIZE as u64)
        }
    };
    slice_by_offsets(input, output, start_offset, end_offset)
}
