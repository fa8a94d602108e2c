//! # Clock Primitives
//!
//! Modular arithmetic over the two MPEG-TS clock domains — the 27 MHz
//! system clock reference (SCR/PCR) and the 90 kHz presentation/decode
//! clock (PTS/DTS) — plus conversions to milliseconds and a stable
//! `D.HH:MM:SS.mmm` stream-time string.
//!
//! Every clock subtraction in this crate must go through [`pts_diff`] or
//! [`scr_diff`]; a raw `b - a` silently breaks at the wrap point and is the
//! single most common latent bug in TS tooling.

use crate::error::{Result, TsPcrError};

/// 90 kHz clock wraps every `2^33` ticks (~26.5 hours).
pub const MAX_PTS: i64 = 1i64 << 33;
/// 27 MHz clock wraps every `2^33 * 300` ticks (same wall time as [`MAX_PTS`]).
pub const MAX_SCR: i64 = MAX_PTS * 300;

/// Ticks above which a modular PTS delta is assumed to be a small *backward*
/// step (B-frame reordering) rather than a genuine clock wrap, per the
/// 10-second rule in the data model's `pts_diff_ticks` invariant.
pub const PTS_WRAP_CORRECTION_THRESHOLD_TICKS: i64 = 10 * 90_000;

/// Wrap-aware forward delta `b - a` reduced modulo `2^33`.
///
/// Always returns a value in `[0, MAX_PTS)`. For any `a, b`:
/// `pts_diff(a, b) + pts_diff(b, a) ≡ 0 (mod MAX_PTS)`.
pub fn pts_diff(a: i64, b: i64) -> i64 {
    modular_diff(a, b, MAX_PTS)
}

/// Wrap-aware forward delta `b - a` reduced modulo `2^33 * 300`.
///
/// Always returns a value in `[0, MAX_SCR)`. For any `a, b`:
/// `scr_diff(a, b) + scr_diff(b, a) ≡ 0 (mod MAX_SCR)`.
pub fn scr_diff(a: i64, b: i64) -> i64 {
    modular_diff(a, b, MAX_SCR)
}

pub(crate) fn modular_diff(a: i64, b: i64, modulus: i64) -> i64 {
    let raw = (b - a) % modulus;
    if raw < 0 {
        raw + modulus
    } else {
        raw
    }
}

/// `pts_diff` with the wrap-correction rule from the data model's
/// `pts_diff_ticks` invariant: a modular delta larger than 10 seconds' worth
/// of 90 kHz ticks is reinterpreted as a small backward step (out-of-order
/// PTS from B-frame reordering) rather than a legal clock wrap, by
/// subtracting `MAX_PTS` back into negative territory.
pub fn pts_diff_ticks(last: i64, new: i64) -> i64 {
    let raw = pts_diff(last, new);
    if raw > PTS_WRAP_CORRECTION_THRESHOLD_TICKS {
        raw - MAX_PTS
    } else {
        raw
    }
}

/// Converts 90 kHz ticks to milliseconds.
pub fn ticks_90k_to_ms(ticks: i64) -> i64 {
    ticks / 90
}

/// Converts 27 MHz ticks to milliseconds.
pub fn ticks_27m_to_ms(ticks: i64) -> i64 {
    ticks / 27_000
}

/// Converts a millisecond duration into 27 MHz ticks (inverse of [`pcr_to_ms`]).
pub fn time_to_pcr(total_ms: i64) -> i64 {
    total_ms * 27_000
}

/// Converts 27 MHz ticks into a millisecond duration (inverse of [`time_to_pcr`]).
pub fn pcr_to_ms(pcr_ticks: i64) -> i64 {
    pcr_ticks / 27_000
}

/// Formats a millisecond duration as `D.HH:MM:SS.mmm`.
///
/// The fractional-second field is unconditionally rendered as `000`; the
/// millisecond remainder is discarded rather than formatted.
pub fn time_to_str(total_ms: i64) -> String {
    let total_ms = total_ms.max(0);
    let total_secs = total_ms / 1000;
    let days = total_secs / 86_400;
    let hours = (total_secs / 3600) % 24;
    let mins = (total_secs / 60) % 60;
    let secs = total_secs % 60;
    format!("{days}.{hours:02}:{mins:02}:{secs:02}.000")
}

/// Parses a `D.HH:MM:SS.mmm` stream-time string into a millisecond total.
pub fn str_to_time(s: &str) -> Result<i64> {
    let (days_part, rest) = s
        .split_once('.')
        .ok_or_else(|| TsPcrError::Parser(format!("missing day separator in '{s}'")))?;
    let days: i64 = days_part
        .parse()
        .map_err(|_| TsPcrError::Parser(format!("bad day field in '{s}'")))?;

    let mut hms_and_ms = rest.splitn(2, '.');
    let hms = hms_and_ms
        .next()
        .ok_or_else(|| TsPcrError::Parser(format!("missing time field in '{s}'")))?;
    let ms_str = hms_and_ms.next().unwrap_or("0");
    let msecs: i64 = ms_str
        .parse()
        .map_err(|_| TsPcrError::Parser(format!("bad millisecond field in '{s}'")))?;

    let mut parts = hms.split(':');
    let hours: i64 = parts
        .next()
        .ok_or_else(|| TsPcrError::Parser(format!("missing hour field in '{s}'")))?
        .parse()
        .map_err(|_| TsPcrError::Parser(format!("bad hour field in '{s}'")))?;
    let mins: i64 = parts
        .next()
        .ok_or_else(|| TsPcrError::Parser(format!("missing minute field in '{s}'")))?
        .parse()
        .map_err(|_| TsPcrError::Parser(format!("bad minute field in '{s}'")))?;
    let secs: i64 = parts
        .next()
        .ok_or_else(|| TsPcrError::Parser(format!("missing second field in '{s}'")))?
        .parse()
        .map_err(|_| TsPcrError::Parser(format!("bad second field in '{s}'")))?;

    if hours >= 24 || mins >= 60 || secs >= 60 {
        return Err(TsPcrError::Parser(format!("time field out of range in '{s}'")));
    }

    Ok(((days * 24 + hours) * 60 + mins) * 60_000 + secs * 1000 + msecs)
}

/// Parses a `-T YYYYMMDDHHMMSS` wallclock anchor into microseconds since the
/// Unix epoch.
pub fn parse_wallclock_anchor(s: &str) -> Result<i64> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S")
        .map_err(|e| TsPcrError::Parser(format!("bad wallclock anchor '{s}': {e}")))?;
    Ok(naive.and_utc().timestamp_micros())
}

/// Per-stream wallclock-anchored drift tracking.
pub mod tracker;
/// Online single-pass linear-regression trend engine.
pub mod trend;
