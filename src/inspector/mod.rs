//! Clock-inspector pipeline: packet ingest, PES clock tracking, conformance
//! warnings, and periodic trend reporting.

pub mod pipeline;
pub mod reorder;
pub mod report;
pub mod trend_reporter;
