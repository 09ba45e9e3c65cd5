//! Scanned parameter dimensions and named parameter values.

use serde::{Deserialize, Serialize};

use crate::{invalid_argument, ScanResult};

/// One scanned parameter: a range split into equal-width bins.
///
/// Each bin is represented by its centre value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Parameter name (e.g. "mu").
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    /// Number of bins, at least one.
    pub bins: u32,
}

impl Dimension {
    /// Create a validated dimension.
    pub fn new(name: impl Into<String>, lower: f64, upper: f64, bins: u32) -> ScanResult<Self> {
        let dim = Self {
            name: name.into(),
            lower,
            upper,
            bins,
        };
        dim.validate()?;
        Ok(dim)
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.bins < 1 {
            return Err(invalid_argument!(
                "dimension {} must have at least one bin, got {}",
                self.name,
                self.bins
            ));
        }
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(invalid_argument!(
                "dimension {} has non-finite bounds [{}, {}]",
                self.name,
                self.lower,
                self.upper
            ));
        }
        if self.lower >= self.upper {
            return Err(invalid_argument!(
                "dimension {} needs lower bound {} below upper bound {}",
                self.name,
                self.lower,
                self.upper
            ));
        }
        Ok(())
    }

    /// Width of a single bin.
    pub fn bin_width(&self) -> f64 {
        (self.upper - self.lower) / self.bins as f64
    }

    /// Centre value of bin `bin`.
    pub fn bin_center(&self, bin: u32) -> ScanResult<f64> {
        if bin >= self.bins {
            return Err(invalid_argument!(
                "bin {} out of range for dimension {} with {} bins",
                bin,
                self.name,
                self.bins
            ));
        }
        Ok(self.lower + (bin as f64 + 0.5) / self.bins as f64 * (self.upper - self.lower))
    }

    /// Bin containing `x`, or `None` when `x` falls outside `[lower, upper)`.
    pub fn find_bin(&self, x: f64) -> Option<u32> {
        if !x.is_finite() || x < self.lower || x >= self.upper {
            return None;
        }
        let bin = ((x - self.lower) / self.bin_width()).floor() as u32;
        // Rounding right below the upper edge can land on `bins`.
        Some(bin.min(self.bins - 1))
    }
}

/// A parameter name paired with a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl std::fmt::Display for NamedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
