#![forbid(unsafe_code)]

//! Building blocks for exporting every video of a YouTube channel into a
//! single CSV file. The `export_channel` binary wires them together.

pub mod api;
pub mod config;
pub mod enumerate;
pub mod export;
pub mod progress;
pub mod record;
