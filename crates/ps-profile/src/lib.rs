//! # ps-profile
//!
//! Collects the records written by batch scan jobs and rebuilds the profiled
//! negative log-likelihood over the scan grid.

mod profile;
mod scan_log;

pub use profile::{CurvePoint, ProfileCell, ProfileCurves, ProfileLikelihood};
pub use scan_log::ScanLog;
