//! The seam between grid enumeration and whatever evaluates the likelihood.

use serde::{Deserialize, Serialize};

use crate::{NamedValue, ScanResult};

/// Outcome of a single fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Negative log-likelihood at the fitted point.
    pub nll: f64,
    /// Parameter values after the fit, POIs first.
    pub parameters: Vec<NamedValue>,
    /// Minimizer status code.
    pub status: i32,
}

impl FitSummary {
    /// Zero, or a multiple of 1000 (a warning from the Improve step only).
    pub fn converged(&self) -> bool {
        self.status % 1000 == 0
    }
}

/// A likelihood model the scan can drive.
///
/// Implementations wrap an external fitting framework. They own their mutable
/// model state, so concurrent scans need one instance per worker.
pub trait ProfileModel {
    /// Fix the POIs at `point` and minimise over everything else.
    fn apply_and_evaluate(&mut self, point: &[NamedValue]) -> ScanResult<FitSummary>;

    /// Minimise with all parameters floating.
    fn unconditional_fit(&mut self) -> ScanResult<FitSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(status: i32) -> FitSummary {
        FitSummary {
            nll: 1.0,
            parameters: vec![NamedValue::new("mu", 1.0)],
            status,
        }
    }

    #[test]
    fn improve_warnings_still_converge() {
        assert!(summary(0).converged());
        assert!(summary(3000).converged());
        assert!(!summary(4).converged());
        assert!(!summary(-1).converged());
    }
}
