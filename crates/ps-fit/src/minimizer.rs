//! Minimizer settings and the retry policy applied to every fit.

use ps_types::{FitSummary, NamedValue, ProfileModel, ScanResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MAX_TRIES: u32 = 4;

/// Minimizer configuration handed to a backend at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizerOptions {
    /// Minimizer type, e.g. "Minuit2".
    pub minimizer: String,
    /// Algorithm within the minimizer, e.g. "Migrad".
    pub algorithm: String,
    /// 0 = fast, 1 = default, 2 = careful.
    pub strategy: i32,
    pub tolerance: f64,
    /// 0 = silent.
    pub print_level: i32,
}

impl Default for MinimizerOptions {
    fn default() -> Self {
        Self {
            minimizer: "Minuit2".to_string(),
            algorithm: "Migrad".to_string(),
            strategy: 0,
            tolerance: 1.0,
            print_level: 0,
        }
    }
}

impl MinimizerOptions {
    pub fn with_strategy(mut self, strategy: i32) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_print_level(mut self, level: i32) -> Self {
        self.print_level = level;
        self
    }

    /// Settings for the first attempt.
    pub fn first_attempt(&self) -> FitAttempt {
        FitAttempt {
            minimizer: self.minimizer.clone(),
            algorithm: self.algorithm.clone(),
            strategy: self.strategy,
            tolerance: self.tolerance.max(1.0),
            // The backend's print level is offset by one from ours.
            print_level: if self.print_level == 0 {
                -1
            } else {
                self.print_level - 2
            },
        }
    }
}

/// Settings for one minimisation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAttempt {
    pub minimizer: String,
    pub algorithm: String,
    pub strategy: i32,
    pub tolerance: f64,
    pub print_level: i32,
}

/// Result of [`minimize_with_retries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    /// Status of the last attempt.
    pub status: i32,
    pub attempts: Vec<FitAttempt>,
    /// Number of coarse re-scans run between attempts.
    pub scans: u32,
}

impl FitOutcome {
    pub fn converged(&self) -> bool {
        self.status % 1000 == 0
    }
}

/// A fitting framework holding one model.
pub trait FitBackend {
    /// Fix the POIs at the given values; all other parameters float.
    fn fix_pois(&mut self, point: &[NamedValue]) -> ScanResult<()>;

    /// Let the POIs float again.
    fn release_pois(&mut self);

    /// Run one minimisation and return its status code.
    fn minimize(&mut self, attempt: &FitAttempt) -> i32;

    /// Coarse scan used to move away from a bad starting point.
    fn scan(&mut self) {}

    /// Objective value at the current parameters.
    fn nll(&self) -> f64;

    /// Current parameter values, POIs first.
    fn parameters(&self) -> Vec<NamedValue>;
}

/// Minimise, retrying up to four times with escalating settings.
///
/// Each failed attempt except the last is followed by a re-scan. After the
/// second failure strategy 0 is raised to 1; if the strategy was already
/// non-zero that step is skipped. From the third failure on the backend
/// switches to Minuit's `migradimproved`.
pub fn minimize_with_retries<B: FitBackend + ?Sized>(
    backend: &mut B,
    options: &MinimizerOptions,
) -> FitOutcome {
    let mut attempt = options.first_attempt();
    let mut attempts = Vec::new();
    let mut scans = 0;
    let mut status;
    let mut tries = 1;

    loop {
        status = backend.minimize(&attempt);
        attempts.push(attempt.clone());
        debug!(
            "Minimize try {} with {}/{} strategy {}: status {}",
            tries, attempt.minimizer, attempt.algorithm, attempt.strategy, status
        );

        // Multiples of 1000 only flag problems in the Improve step.
        if status % 1000 == 0 || tries >= MAX_TRIES {
            break;
        }

        info!("Doing a re-scan first");
        backend.scan();
        scans += 1;

        if tries == 2 {
            if attempt.strategy == 0 {
                info!("Trying with strategy = 1");
                attempt.strategy = 1;
            } else {
                tries += 1;
            }
        }
        if tries == 3 {
            info!("Trying with improve");
            attempt.minimizer = "Minuit".to_string();
            attempt.algorithm = "migradimproved".to_string();
        }
        tries += 1;
    }

    FitOutcome {
        status,
        attempts,
        scans,
    }
}

/// A [`ProfileModel`] backed by a [`FitBackend`] with retrying minimisation.
#[derive(Debug, Clone)]
pub struct RetryingFitter<B> {
    backend: B,
    options: MinimizerOptions,
}

impl<B: FitBackend> RetryingFitter<B> {
    pub fn new(backend: B, options: MinimizerOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &MinimizerOptions {
        &self.options
    }

    fn fit(&mut self) -> FitSummary {
        let outcome = minimize_with_retries(&mut self.backend, &self.options);
        FitSummary {
            nll: self.backend.nll(),
            parameters: self.backend.parameters(),
            status: outcome.status,
        }
    }
}

impl<B: FitBackend> ProfileModel for RetryingFitter<B> {
    fn apply_and_evaluate(&mut self, point: &[NamedValue]) -> ScanResult<FitSummary> {
        self.backend.fix_pois(point)?;
        Ok(self.fit())
    }

    fn unconditional_fit(&mut self) -> ScanResult<FitSummary> {
        self.backend.release_pois();
        Ok(self.fit())
    }
}
