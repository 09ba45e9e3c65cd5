//! Scan configuration: the parameter catalogue, the POI selection and the
//! command-line overrides applied on top of a config file.

use std::path::Path;

use ps_types::{config_error, Dimension, NamedValue, ScanResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grid::Grid;

fn default_bins() -> u32 {
    100
}

/// A model parameter the scan may use as a POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    #[serde(default = "default_bins")]
    pub bins: u32,
    /// Starting value.
    #[serde(default)]
    pub value: f64,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            bins: default_bins(),
            value: lower,
        }
    }

    pub fn with_bins(mut self, bins: u32) -> Self {
        self.bins = bins;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn dimension(&self) -> ScanResult<Dimension> {
        Dimension::new(self.name.clone(), self.lower, self.upper, self.bins)
    }
}

/// What to scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub name: String,
    pub parameters: Vec<ParameterSpec>,
    /// Parameters of interest in grid order; each must name a parameter.
    pub pois: Vec<String>,
}

impl ScanConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            pois: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_poi(mut self, name: impl Into<String>) -> Self {
        self.pois.push(name.into());
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ScanResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.pois.is_empty() {
            return Err(config_error!("no parameters of interest configured"));
        }
        for (i, poi) in self.pois.iter().enumerate() {
            self.parameter(poi)?;
            if self.pois[..i].contains(poi) {
                return Err(config_error!("parameter {} listed twice as POI", poi));
            }
        }
        Ok(())
    }

    pub fn parameter(&self, name: &str) -> ScanResult<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| config_error!("unknown parameter: {}", name))
    }

    fn parameter_mut(&mut self, name: &str) -> ScanResult<&mut ParameterSpec> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| config_error!("unknown parameter: {}", name))
    }

    pub fn is_poi(&self, name: &str) -> bool {
        self.pois.iter().any(|p| p == name)
    }

    /// Starting value of every parameter, in catalogue order.
    pub fn start_values(&self) -> Vec<NamedValue> {
        self.parameters
            .iter()
            .map(|p| NamedValue::new(p.name.clone(), p.value))
            .collect()
    }

    /// The scan grid over the POIs, in POI order.
    pub fn grid(&self) -> ScanResult<Grid> {
        self.validate()?;
        let dims = self
            .pois
            .iter()
            .map(|name| self.parameter(name)?.dimension())
            .collect::<ScanResult<Vec<_>>>()?;
        Grid::new(dims)
    }

    /// Apply overrides in the order range, bins, POI selection.
    pub fn apply(&mut self, overrides: &ScanOverrides) -> ScanResult<()> {
        if let Some(ranges) = &overrides.range {
            for (name, (lower, upper)) in parse_ranges(ranges)? {
                info!("Setting range for {}=[{},{}]", name, lower, upper);
                let param = self.parameter_mut(&name)?;
                param.lower = lower;
                param.upper = upper;
            }
        }

        if let Some(bins) = &overrides.bins {
            for (name, count) in parse_bins(bins)? {
                info!("Setting number of bins for {}={}", name, count);
                self.parameter_mut(&name)?.bins = count;
            }
        }

        if let Some(pois) = &overrides.poi {
            let assignments = parse_assignments(pois)?;
            for (name, _) in &assignments {
                self.parameter(name)?;
            }

            let listed: Vec<&str> = assignments.iter().map(|(n, _)| n.as_str()).collect();
            self.pois.retain(|poi| {
                let keep = listed.contains(&poi.as_str());
                if !keep {
                    info!("Moving {} from POIs to floating parameters", poi);
                }
                keep
            });

            for (name, value) in assignments {
                if !self.is_poi(&name) {
                    info!("Adding {}={} to POI", name, value);
                    self.pois.push(name.clone());
                } else {
                    info!("Setting value of POI {}={}", name, value);
                }
                self.parameter_mut(&name)?.value = value;
            }
        }

        self.validate()
    }
}

/// Overrides given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOverrides {
    /// `"mu=1,mH=125"`: the new POI set with starting values.
    pub poi: Option<String>,
    /// `"mu=[-5:10],mH=[120:130]"`.
    pub range: Option<String>,
    /// `"mu=5,mH=100"`.
    pub bins: Option<String>,
}

impl ScanOverrides {
    pub fn is_empty(&self) -> bool {
        self.poi.is_none() && self.range.is_none() && self.bins.is_none()
    }
}

fn split_pair(item: &str) -> ScanResult<(String, &str)> {
    let (name, value) = item
        .split_once('=')
        .ok_or_else(|| config_error!("expected name=value, got '{}'", item))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(config_error!("missing parameter name in '{}'", item));
    }
    Ok((name.to_string(), value.trim()))
}

fn parse_number(name: &str, text: &str) -> ScanResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| config_error!("invalid number '{}' for {}", text, name))
}

fn parse_assignments(text: &str) -> ScanResult<Vec<(String, f64)>> {
    text.split(',')
        .map(|item| {
            let (name, value) = split_pair(item)?;
            let value = parse_number(&name, value)?;
            Ok((name, value))
        })
        .collect()
}

fn parse_bins(text: &str) -> ScanResult<Vec<(String, u32)>> {
    text.split(',')
        .map(|item| {
            let (name, value) = split_pair(item)?;
            let bins = value
                .parse::<u32>()
                .map_err(|_| config_error!("invalid bin count '{}' for {}", value, name))?;
            Ok((name, bins))
        })
        .collect()
}

fn parse_ranges(text: &str) -> ScanResult<Vec<(String, (f64, f64))>> {
    // Ranges contain no commas, so splitting on ',' is safe.
    text.split(',')
        .map(|item| {
            let (name, value) = split_pair(item)?;
            let inner = value
                .strip_prefix('[')
                .and_then(|v| v.strip_suffix(']'))
                .ok_or_else(|| config_error!("range for {} must look like [min:max]", name))?;
            let (lower, upper) = inner
                .split_once(':')
                .ok_or_else(|| config_error!("range for {} must look like [min:max]", name))?;
            let lower = parse_number(&name, lower)?;
            let upper = parse_number(&name, upper)?;
            Ok((name, (lower, upper)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::ScanError;
    use std::io::Write;

    fn sample_config() -> ScanConfig {
        ScanConfig::new("gauss")
            .with_parameter(ParameterSpec::new("mu", 0.0, 5.0).with_bins(10))
            .with_parameter(ParameterSpec::new("mH", 110.0, 140.0).with_bins(30))
            .with_parameter(ParameterSpec::new("sigma_bkg", 0.5, 2.0))
            .with_poi("mu")
    }

    #[test]
    fn grid_follows_poi_order() {
        let config = sample_config().with_poi("mH");
        let grid = config.grid().unwrap();
        assert_eq!(grid.total_points(), 300);
        assert_eq!(grid.dimensions()[0].name, "mu");
        assert_eq!(grid.dimensions()[1].name, "mH");
    }

    #[test]
    fn range_and_bin_overrides() {
        let mut config = sample_config();
        let overrides = ScanOverrides {
            range: Some("mu=[-5:10],mH=[120:130]".into()),
            bins: Some("mu=5, mH=100".into()),
            poi: None,
        };
        config.apply(&overrides).unwrap();

        let mu = config.parameter("mu").unwrap();
        assert_eq!((mu.lower, mu.upper, mu.bins), (-5.0, 10.0, 5));
        let mh = config.parameter("mH").unwrap();
        assert_eq!((mh.lower, mh.upper, mh.bins), (120.0, 130.0, 100));
    }

    #[test]
    fn poi_override_replaces_selection() {
        let mut config = sample_config();
        let overrides = ScanOverrides {
            poi: Some("mH=125,sigma_bkg=1".into()),
            ..Default::default()
        };
        config.apply(&overrides).unwrap();

        assert_eq!(config.pois, vec!["mH".to_string(), "sigma_bkg".to_string()]);
        assert_eq!(config.parameter("mH").unwrap().value, 125.0);
        assert_eq!(config.parameter("sigma_bkg").unwrap().value, 1.0);
        assert_eq!(
            config.start_values(),
            vec![
                NamedValue::new("mu", 0.0),
                NamedValue::new("mH", 125.0),
                NamedValue::new("sigma_bkg", 1.0),
            ]
        );
    }

    #[test]
    fn poi_override_keeps_existing_order() {
        let mut config = sample_config().with_poi("mH");
        let overrides = ScanOverrides {
            poi: Some("sigma_bkg=1,mu=2".into()),
            ..Default::default()
        };
        config.apply(&overrides).unwrap();
        assert_eq!(config.pois, vec!["mu".to_string(), "sigma_bkg".to_string()]);
    }

    #[test]
    fn collapsed_range_cannot_be_scanned() {
        let mut config = sample_config();
        let overrides = ScanOverrides {
            range: Some("mu=[2:2]".into()),
            ..Default::default()
        };
        config.apply(&overrides).unwrap();
        assert!(matches!(config.grid(), Err(ScanError::InvalidArgument(_))));
    }

    #[test]
    fn unknown_parameter_is_a_config_error() {
        let mut config = sample_config();
        let overrides = ScanOverrides {
            bins: Some("tau=4".into()),
            ..Default::default()
        };
        assert!(matches!(config.apply(&overrides), Err(ScanError::Config(_))));
    }

    #[test]
    fn malformed_overrides_are_rejected() {
        for overrides in [
            ScanOverrides {
                range: Some("mu=-5:10".into()),
                ..Default::default()
            },
            ScanOverrides {
                range: Some("mu=[-5,10]".into()),
                ..Default::default()
            },
            ScanOverrides {
                bins: Some("mu=five".into()),
                ..Default::default()
            },
            ScanOverrides {
                poi: Some("mu".into()),
                ..Default::default()
            },
        ] {
            let mut config = sample_config();
            assert!(config.apply(&overrides).is_err(), "{overrides:?}");
        }
    }

    #[test]
    fn validation_catches_bad_poi_lists() {
        assert!(ScanConfig::new("empty").validate().is_err());
        assert!(sample_config().with_poi("mu").validate().is_err());
        assert!(sample_config().with_poi("tau").validate().is_err());
    }

    #[test]
    fn loads_from_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "demo",
                "parameters": [{{"name": "mu", "lower": 0.0, "upper": 2.0}}],
                "pois": ["mu"]
            }}"#
        )
        .unwrap();

        let config = ScanConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.parameters[0].bins, 100);
        assert_eq!(config.parameters[0].value, 0.0);
    }
}
