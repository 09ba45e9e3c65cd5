//! # ps-fit
//!
//! Adapters between the scan and a fitting backend.
//!
//! [`RetryingFitter`] turns any [`FitBackend`] into a [`ps_types::ProfileModel`],
//! escalating minimizer settings when a fit fails. [`GaussianModel`] is a
//! closed-form backend used for demos and tests.

mod gaussian;
mod minimizer;

pub use gaussian::{Channel, GaussianModel, GaussianModelConfig};
pub use minimizer::{
    minimize_with_retries, FitAttempt, FitBackend, FitOutcome, MinimizerOptions, RetryingFitter,
};
