//! MPEG-TS packet and PES parsing primitives.

pub mod packet;
pub mod pes;
