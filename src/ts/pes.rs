//! PES header decoding.
//!
//! Given the payload bytes starting at a PUSI packet's PES prefix, decodes
//! the `pts_dts_flags` field and the PTS/DTS timestamps themselves when
//! present. This crate owns a concrete decoder so the binaries are
//! runnable end-to-end, but the contract matches the "PES header parser"
//! external collaborator described at the top level: a byte window in,
//! `PesHeader` out.

/// Decoded fields of a PES packet header relevant to clock inspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PesHeader {
    /// Raw 2-bit `PTS_DTS_flags` field: `0` = neither, `2` = PTS only,
    /// `3` = PTS and DTS.
    pub pts_dts_flags: u8,
    /// 90 kHz PTS, if `pts_dts_flags & 0b10 != 0`.
    pub pts: Option<i64>,
    /// 90 kHz DTS, if `pts_dts_flags == 3`.
    pub dts: Option<i64>,
}

/// Whether `payload` begins with a PES start code prefix (`00 00 01`).
pub fn starts_with_pes_prefix(payload: &[u8]) -> bool {
    payload.len() >= 3 && payload[0] == 0x00 && payload[1] == 0x00 && payload[2] == 0x01
}

/// Decodes a PES header from the start of `payload`. Returns `None` if the
/// start code prefix is absent or the buffer is too short for the fields
/// the `PTS_DTS_flags` byte claims are present.
pub fn parse_pes_header(payload: &[u8]) -> Option<PesHeader> {
    if !starts_with_pes_prefix(payload) || payload.len() < 9 {
        return None;
    }
    let flags2 = payload[7];
    let pts_dts_flags = (flags2 >> 6) & 0x3;

    let mut header = PesHeader {
        pts_dts_flags,
        pts: None,
        dts: None,
    };

    if pts_dts_flags & 0b10 != 0 {
        let pts_bytes = payload.get(9..14)?;
        header.pts = Some(parse_timestamp(pts_bytes.try_into().ok()?));
    }
    if pts_dts_flags == 0b11 {
        let dts_bytes = payload.get(14..19)?;
        header.dts = Some(parse_timestamp(dts_bytes.try_into().ok()?));
    }

    Some(header)
}

fn parse_timestamp(b: [u8; 5]) -> i64 {
    let mut ts: i64 = ((b[0] & 0x0E) as i64) << 29;
    ts |= (b[1] as i64) << 22;
    ts |= ((b[2] & 0xFE) as i64) << 14;
    ts |= (b[3] as i64) << 7;
    ts |= ((b[4] & 0xFE) as i64) >> 1;
    ts
}

fn write_timestamp(out: &mut [u8; 5], marker: u8, ts: i64) {
    let ts = (ts as u64) & 0x1_FFFF_FFFF;
    out[0] = marker | (((ts >> 29) & 0x0E) as u8) | 0x01;
    out[1] = ((ts >> 22) & 0xFF) as u8;
    out[2] = (((ts >> 14) & 0xFE) as u8) | 0x01;
    out[3] = ((ts >> 7) & 0xFF) as u8;
    out[4] = (((ts << 1) & 0xFE) as u8) | 0x01;
}

/// Builds a synthetic PES header payload carrying `pts` and optionally
/// `dts`, for tests and fixture generation.
pub fn build_pes_header(stream_id: u8, pts: i64, dts: Option<i64>) -> Vec<u8> {
    let mut buf = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80];
    let pts_dts_flags: u8 = if dts.is_some() { 0b11 } else { 0b10 };
    buf.push((pts_dts_flags << 6) | 0x00);
    let header_data_len: u8 = if dts.is_some() { 10 } else { 5 };
    buf.push(header_data_len);
    let mut pts_bytes = [0u8; 5];
    let marker = if dts.is_some() { 0x30 } else { 0x20 };
    write_timestamp(&mut pts_bytes, marker, pts);
    buf.extend_from_slice(&pts_bytes);
    if let Some(dts) = dts {
        let mut dts_bytes = [0u8; 5];
        write_timestamp(&mut dts_bytes, 0x10, dts);
        buf.extend_from_slice(&dts_bytes);
    }
    buf
}
