use crate::error::{MertonError, MertonResult};
use crate::models::merton::SeriesConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-quote weighting scheme in the calibration objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Every quote contributes equally
    #[default]
    Uniform,
    /// Weight by Black-Scholes vega at the quote's implied volatility,
    /// normalised to mean one
    Vega,
}

/// Main configuration struct for calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOptions {
    /// Number of local-optimizer restarts (the first starts from the
    /// caller's initial guess, the rest from random points inside the bounds)
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Relative objective change below which a restart counts as converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Iteration cap per restart
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget per restart
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    #[serde(default)]
    pub weighting: Weighting,

    /// Random seed for the restart starting points
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,

    /// Whether to run restarts on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Refine the selected restart with L-BFGS-B?
    #[serde(default = "default_lbfgsb_polish")]
    pub lbfgsb_polish: bool,

    /// Max iterations for L-BFGS-B
    #[serde(default = "default_lbfgsb_max_iterations")]
    pub lbfgsb_max_iterations: usize,

    /// Truncation of the Poisson series used for every model price
    #[serde(default)]
    pub series: SeriesConfig,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            timeout_seconds: default_timeout_seconds(),
            weighting: Weighting::default(),
            seed: default_seed(),
            parallel: default_parallel(),
            lbfgsb_polish: default_lbfgsb_polish(),
            lbfgsb_max_iterations: default_lbfgsb_max_iterations(),
            series: SeriesConfig::default(),
        }
    }
}

impl CalibrationOptions {
    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self {
            max_restarts: 16,
            tolerance: 1e-10,
            max_iterations: 500,
            timeout_seconds: 10.0,
            weighting: Weighting::Vega,
            ..Self::default()
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            max_restarts: 4,
            tolerance: 1e-8,
            max_iterations: 100,
            timeout_seconds: 2.0,
            lbfgsb_polish: false,
            ..Self::default()
        }
    }

    /// High-precision configuration for research and backtesting
    pub fn research() -> Self {
        Self {
            max_restarts: 32,
            tolerance: 1e-12,
            max_iterations: 1000,
            timeout_seconds: 60.0,
            lbfgsb_max_iterations: 500,
            series: SeriesConfig::new(1e-14, 200),
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            max_restarts: 1,
            tolerance: 1e-6,
            max_iterations: 50,
            timeout_seconds: 1.0,
            parallel: false,
            lbfgsb_polish: false,
            ..Self::default()
        }
    }

    /// Parses options from a TOML document; absent keys take their defaults.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let options: Self =
            toml::from_str(source).context("failed to parse calibration options")?;
        options.validate()?;
        Ok(options)
    }

    /// Reads and parses a TOML options file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("invalid options in {}", path.display()))
    }

    pub fn validate(&self) -> MertonResult<()> {
        if self.max_restarts == 0 {
            return Err(MertonError::config("max_restarts must be >= 1"));
        }
        if self.max_iterations == 0 {
            return Err(MertonError::config("max_iterations must be >= 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MertonError::config(format!(
                "tolerance must be finite and > 0 (got {})",
                self.tolerance
            )));
        }
        if !(self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0) {
            return Err(MertonError::config(format!(
                "timeout_seconds must be finite and > 0 (got {})",
                self.timeout_seconds
            )));
        }
        self.series
            .validate()
            .map_err(|e| MertonError::config(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

fn default_max_restarts() -> usize {
    8
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    200
}

fn default_timeout_seconds() -> f64 {
    5.0
}

fn default_seed() -> Option<u64> {
    Some(123456)
}

fn default_parallel() -> bool {
    true
}

fn default_lbfgsb_polish() -> bool {
    true
}

fn default_lbfgsb_max_iterations() -> usize {
    200
}
