//! Closed-form Gaussian backend.
//!
//! Each channel measures one mean parameter `mu_i`; every observation `x` in
//! channel `i` is `N(mu_i + theta, sigma_i)`. The shared shift `theta` is
//! constrained by `N(0, nuisance_sigma)`. Minimising over `theta` and the
//! floating means has an exact solution, so "minimisation" never fails for
//! finite inputs.

use std::collections::HashMap;

use ps_types::{config_error, invalid_argument, NamedValue, ScanResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::minimizer::{FitAttempt, FitBackend};

fn default_nuisance_name() -> String {
    "theta".to_string()
}

/// One measurement channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Name of the mean parameter measured by this channel.
    pub parameter: String,
    pub sigma: f64,
    pub observations: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianModelConfig {
    pub channels: Vec<Channel>,
    #[serde(default = "default_nuisance_name")]
    pub nuisance_name: String,
    pub nuisance_sigma: f64,
}

impl GaussianModelConfig {
    pub fn validate(&self) -> ScanResult<()> {
        if self.channels.is_empty() {
            return Err(config_error!("gaussian model needs at least one channel"));
        }
        if !(self.nuisance_sigma.is_finite() && self.nuisance_sigma > 0.0) {
            return Err(config_error!(
                "nuisance sigma must be positive, got {}",
                self.nuisance_sigma
            ));
        }
        for (i, channel) in self.channels.iter().enumerate() {
            if !(channel.sigma.is_finite() && channel.sigma > 0.0) {
                return Err(config_error!(
                    "channel {} sigma must be positive, got {}",
                    channel.parameter,
                    channel.sigma
                ));
            }
            if channel.observations.is_empty() {
                return Err(config_error!("channel {} has no observations", channel.parameter));
            }
            if channel.observations.iter().any(|x| !x.is_finite()) {
                return Err(config_error!(
                    "channel {} has non-finite observations",
                    channel.parameter
                ));
            }
            if self.channels[..i].iter().any(|c| c.parameter == channel.parameter)
                || channel.parameter == self.nuisance_name
            {
                return Err(config_error!("duplicate parameter name {}", channel.parameter));
            }
        }
        Ok(())
    }
}

/// Gaussian channels with one shared constrained shift.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    config: GaussianModelConfig,
    /// Channel indices in report order: POIs first.
    order: Vec<usize>,
    npois: usize,
    fixed: HashMap<String, f64>,
    /// Snapshot restored when the POIs are released.
    start: Vec<f64>,
    means: Vec<f64>,
    theta: f64,
    nll: f64,
}

impl GaussianModel {
    /// Build the model; every name in `pois` must be a channel parameter.
    pub fn new(config: GaussianModelConfig, pois: &[String]) -> ScanResult<Self> {
        config.validate()?;

        let mut order = Vec::with_capacity(config.channels.len());
        for poi in pois {
            let idx = config
                .channels
                .iter()
                .position(|c| &c.parameter == poi)
                .ok_or_else(|| config_error!("POI {} is not a channel of the model", poi))?;
            order.push(idx);
        }
        let npois = order.len();
        for idx in 0..config.channels.len() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }

        let means: Vec<f64> = config.channels.iter().map(|c| sample_mean(&c.observations)).collect();
        let mut model = Self {
            config,
            order,
            npois,
            fixed: HashMap::new(),
            start: means.clone(),
            means,
            theta: 0.0,
            nll: f64::NAN,
        };
        model.nll = model.objective();
        Ok(model)
    }

    /// Set starting values for the channel means. Names that are not channel
    /// parameters are skipped.
    pub fn with_start_values(mut self, values: &[NamedValue]) -> ScanResult<Self> {
        for value in values {
            let Some(idx) = self
                .config
                .channels
                .iter()
                .position(|c| c.parameter == value.name)
            else {
                debug!("{} is not a channel parameter, ignoring its start value", value.name);
                continue;
            };
            if !value.value.is_finite() {
                return Err(config_error!(
                    "start value of {} is not finite: {}",
                    value.name,
                    value.value
                ));
            }
            self.start[idx] = value.value;
        }
        self.means.clone_from(&self.start);
        self.nll = self.objective();
        Ok(self)
    }

    pub fn config(&self) -> &GaussianModelConfig {
        &self.config
    }

    pub fn poi_count(&self) -> usize {
        self.npois
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    fn objective(&self) -> f64 {
        let data: f64 = self
            .config
            .channels
            .iter()
            .zip(&self.means)
            .map(|(channel, mu)| {
                let var = channel.sigma * channel.sigma;
                channel
                    .observations
                    .iter()
                    .map(|x| (x - mu - self.theta).powi(2) / (2.0 * var))
                    .sum::<f64>()
            })
            .sum();
        let constraint = self.theta.powi(2) / (2.0 * self.config.nuisance_sigma.powi(2));
        data + constraint
    }
}

impl FitBackend for GaussianModel {
    fn fix_pois(&mut self, point: &[NamedValue]) -> ScanResult<()> {
        let mut fixed = HashMap::with_capacity(point.len());
        for p in point {
            if !self.config.channels.iter().any(|c| c.parameter == p.name) {
                return Err(invalid_argument!("{} is not a parameter of the model", p.name));
            }
            if !p.value.is_finite() {
                return Err(invalid_argument!("{} fixed at non-finite value {}", p.name, p.value));
            }
            fixed.insert(p.name.clone(), p.value);
        }
        self.fixed = fixed;
        Ok(())
    }

    fn release_pois(&mut self) {
        self.fixed.clear();
        self.means.clone_from(&self.start);
        self.theta = 0.0;
        self.nll = self.objective();
    }

    fn minimize(&mut self, attempt: &FitAttempt) -> i32 {
        // theta = sum_F sum_j (x_ij - mu_i)/s_i^2 / (sum_F n_i/s_i^2 + 1/st^2),
        // summed over fixed channels F; floating means then sit at mean_i - theta.
        let mut precision = 1.0 / self.config.nuisance_sigma.powi(2);
        let mut pull = 0.0;
        for channel in &self.config.channels {
            if let Some(mu) = self.fixed.get(&channel.parameter) {
                let var = channel.sigma * channel.sigma;
                precision += channel.observations.len() as f64 / var;
                pull += channel.observations.iter().map(|x| x - mu).sum::<f64>() / var;
            }
        }
        self.theta = pull / precision;

        for (i, channel) in self.config.channels.iter().enumerate() {
            self.means[i] = match self.fixed.get(&channel.parameter) {
                Some(mu) => *mu,
                None => sample_mean(&channel.observations) - self.theta,
            };
        }

        self.nll = self.objective();
        debug!(
            "{}/{} fit: theta={}, nll={}",
            attempt.minimizer, attempt.algorithm, self.theta, self.nll
        );
        if self.nll.is_finite() {
            0
        } else {
            1
        }
    }

    fn nll(&self) -> f64 {
        self.nll
    }

    fn parameters(&self) -> Vec<NamedValue> {
        let mut params: Vec<NamedValue> = self
            .order
            .iter()
            .map(|&i| NamedValue::new(self.config.channels[i].parameter.clone(), self.means[i]))
            .collect();
        params.push(NamedValue::new(self.config.nuisance_name.clone(), self.theta));
        params
    }
}

fn sample_mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}
