//! # ps-scan
//!
//! Grid enumeration and batch partitioning for profile-likelihood scans.
//!
//! Provides the N-dimensional grid enumerator, the job shard partitioner,
//! scan configuration with command-line overrides, the shard runner that
//! drives a [`ps_types::ProfileModel`], and batch plan descriptors for an
//! external scheduler.

mod batch;
mod config;
mod grid;
mod runner;
mod shard;

pub use batch::{BatchPlan, JobDescriptor, MAX_PLANNED_JOBS};
pub use config::{ParameterSpec, ScanConfig, ScanOverrides};
pub use grid::{total_points, Grid, GridPoint};
pub use runner::{JobReport, ScanJob};
pub use shard::{job_shard, owner_of, JobSpec, Shard, ShardSelector};
