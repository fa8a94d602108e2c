#![doc(html_root_url = "https://docs.rs/tspcr/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tspcr - MPEG-TS Clock Inspector & PCR Indexer/Slicer
//!
//! `tspcr` analyzes MPEG-TS transport streams for PCR/PTS/DTS timing
//! conformance against wallclock, and maintains a persistent byte-offset ↔
//! PCR index usable for constant-time duration queries and byte-exact
//! slicing of large capture files.
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tspcr = "0.1.0"
//! ```
//!
//! ### Building a PCR index
//!
//! ```rust,no_run
//! use tspcr::index::indexer;
//! use std::path::Path;
//!
//! fn example() -> tspcr::error::Result<()> {
//!     let records = indexer::build_and_persist(Path::new("capture.ts"), 0x31)?;
//!     println!("indexed {} PCR sightings", records.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Driving the clock-inspector pipeline
//!
//! ```rust,no_run
//! use tspcr::config::InspectorConfig;
//! use tspcr::inspector::pipeline::Pipeline;
//!
//! fn example(config: InspectorConfig, packet: &[u8]) {
//!     let mut pipeline = Pipeline::new(config);
//!     for line in pipeline.process_packet(packet, 0) {
//!         println!("{line}");
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `clock`: wrap-aware 27 MHz/90 kHz arithmetic, the `ClockTracker`
//!   wallclock-drift anchor, and the online `LinearTrend` regression engine.
//! - `ts`: zero-copy TS packet accessors and PES header decoding.
//! - `pid_table`: the fixed 8192-slot per-PID state table.
//! - `source`: `PacketSource` and its `FileSource`/`UdpSource`
//!   implementations.
//! - `inspector`: the ingest pipeline, report-line formatting, and the
//!   periodic trend-reporter task.
//! - `index`: the persistent PCR index, queries (including the fast-query
//!   head/tail mode), and the file slicer.
//! - `config`: CLI-flag-backed configuration for both binaries.
//! - `error`: the crate's central error type.

/// Clock primitives: modular arithmetic, wallclock tracking, trend regression.
pub mod clock;

/// Runtime configuration for the two binaries.
pub mod config;

/// Error types and utilities.
pub mod error;

/// Clock-inspector pipeline, report formatting, trend reporter.
pub mod inspector;

/// Per-PID state table.
pub mod pid_table;

/// Persistent PCR index: build, query, slice.
pub mod index;

/// Packet sources: file and UDP.
pub mod source;

/// MPEG-TS packet and PES parsing primitives.
pub mod ts;

pub use error::{Result, TsPcrError};
