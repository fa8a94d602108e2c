//! # Error Types
//!
//! This module provides the error types used throughout the `tspcr` library.
//! It defines a central error type `TsPcrError` that encapsulates all
//! possible errors that can occur during clock inspection and PCR indexing.
//!
//! ## Example Usage
//!
//! ```rust
//! use tspcr::error::{Result, TsPcrError};
//!
//! fn validate_packet(len: usize) -> Result<()> {
//!     if len != 188 {
//!         return Err(TsPcrError::InvalidPacket(format!("bad length {len}")));
//!     }
//!     Ok(())
//! }
//! ```

use std::num::ParseIntError;
use thiserror::Error;

/// Primary error type for the `tspcr` library.
#[derive(Error, Debug)]
pub enum TsPcrError {
    /// I/O errors that occur during file or socket operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A TS packet failed a structural sanity check (wrong length, lost sync).
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// A PES or PSI header could not be decoded.
    #[error("parser error: {0}")]
    Parser(String),

    /// The persistent PCR index is missing or unreadable; callers should
    /// fall through to rebuilding it rather than treating this as fatal.
    #[error("index error: {0}")]
    Index(String),

    /// A CLI argument combination or value was invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Errors that occur during integer parsing of CLI time/PID arguments.
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// A specialized [`std::result::Result`] for `tspcr` operations.
///
/// ## Example
///
/// ```rust
/// use tspcr::error::{Result, TsPcrError};
///
/// fn parse_pid(s: &str) -> Result<u16> {
///     u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(TsPcrError::from)
/// }
/// ```
pub type Result<T> = std::result::Result<T, TsPcrError>;
