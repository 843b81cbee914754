//! Shared utilities for every Mosaic crate.

pub mod logging;
pub mod tsid;

pub use tsid::TsidGenerator;
