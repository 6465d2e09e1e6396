//! Lead capture relay: validates inbound lead forms, optionally forwards them to a
//! partner API and appends every outcome to a spreadsheet file.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
