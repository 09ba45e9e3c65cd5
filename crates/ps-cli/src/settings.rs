//! Run configuration file: the scan definition plus the model and minimizer
//! used to evaluate it.

use std::path::Path;

use anyhow::Context;
use ps_fit::{GaussianModel, GaussianModelConfig, MinimizerOptions, RetryingFitter};
use ps_scan::{ScanConfig, ScanOverrides};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub scan: ScanConfig,
    pub model: GaussianModelConfig,
    #[serde(default)]
    pub minimizer: MinimizerOptions,
}

impl RunConfig {
    /// Load `path` and apply command-line overrides.
    pub fn load(path: &Path, overrides: &ScanOverrides) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        if !overrides.is_empty() {
            config.scan.apply(overrides)?;
        }
        config.scan.validate()?;
        Ok(config)
    }

    pub fn build_model(&self) -> anyhow::Result<RetryingFitter<GaussianModel>> {
        let backend = GaussianModel::new(self.model.clone(), &self.scan.pois)?
            .with_start_values(&self.scan.start_values())?;
        Ok(RetryingFitter::new(backend, self.minimizer.clone()))
    }
}

#[cfg(test)]
pub(crate) const DEMO: &str = r#"{
    "name": "demo",
    "parameters": [
        {"name": "mu", "lower": 0.0, "upper": 4.0, "bins": 4},
        {"name": "nu", "lower": 8.0, "upper": 16.0, "bins": 2, "value": 12.0}
    ],
    "pois": ["mu"],
    "model": {
        "channels": [
            {"parameter": "mu", "sigma": 1.0, "observations": [1.0, 2.0, 3.0]},
            {"parameter": "nu", "sigma": 2.0, "observations": [10.0, 14.0]}
        ],
        "nuisance_sigma": 1.0
    }
}"#;
