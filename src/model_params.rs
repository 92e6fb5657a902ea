//! Model parameter containers.
//!
//! The diffusion and jump components are kept as separate value types so that
//! callers can assemble a [`ModelParams`] from an existing Black-Scholes
//! volatility plus a jump specification. All of them are immutable `Copy`
//! values; validation happens at construction and again at every pricing
//! entry point.

use crate::error::{ensure_finite, ensure_non_negative, MertonResult};
use serde::{Deserialize, Serialize};

/// Diffusion component: Black-Scholes volatility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffusionParams {
    pub sigma: f64,
}

impl DiffusionParams {
    pub fn new(sigma: f64) -> MertonResult<Self> {
        ensure_non_negative("sigma", sigma)?;
        Ok(Self { sigma })
    }
}

/// Jump component: Poisson intensity and lognormal jump-size distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpParams {
    /// Expected number of jumps per year (λ)
    pub lambda: f64,
    /// Mean log-jump size (μ_J)
    pub mu_j: f64,
    /// Log-jump volatility (σ_J)
    pub sigma_j: f64,
}

impl JumpParams {
    pub fn new(lambda: f64, mu_j: f64, sigma_j: f64) -> MertonResult<Self> {
        let params = Self {
            lambda,
            mu_j,
            sigma_j,
        };
        params.validate()?;
        Ok(params)
    }

    /// No jumps at all; reduces the Merton model to Black-Scholes.
    pub fn none() -> Self {
        Self {
            lambda: 0.0,
            mu_j: 0.0,
            sigma_j: 0.0,
        }
    }

    pub fn validate(&self) -> MertonResult<()> {
        ensure_non_negative("lambda", self.lambda)?;
        ensure_finite("mu_j", self.mu_j)?;
        ensure_non_negative("sigma_j", self.sigma_j)
    }
}

/// Full Merton parameter set {σ, λ, μ_J, σ_J}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub sigma: f64,
    pub lambda: f64,
    pub mu_j: f64,
    pub sigma_j: f64,
}

impl ModelParams {
    pub fn new(sigma: f64, lambda: f64, mu_j: f64, sigma_j: f64) -> MertonResult<Self> {
        let params = Self {
            sigma,
            lambda,
            mu_j,
            sigma_j,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn from_parts(diffusion: DiffusionParams, jumps: JumpParams) -> Self {
        Self {
            sigma: diffusion.sigma,
            lambda: jumps.lambda,
            mu_j: jumps.mu_j,
            sigma_j: jumps.sigma_j,
        }
    }

    /// Pure diffusion parameters (λ = 0).
    pub fn black_scholes(sigma: f64) -> Self {
        Self::from_parts(DiffusionParams { sigma }, JumpParams::none())
    }

    pub fn validate(&self) -> MertonResult<()> {
        ensure_non_negative("sigma", self.sigma)?;
        self.jumps().validate()
    }

    pub fn diffusion(&self) -> DiffusionParams {
        DiffusionParams { sigma: self.sigma }
    }

    pub fn jumps(&self) -> JumpParams {
        JumpParams {
            lambda: self.lambda,
            mu_j: self.mu_j,
            sigma_j: self.sigma_j,
        }
    }

    /// Expected log of the jump multiplier plus its convexity term, μ_J + σ_J²/2.
    pub fn jump_log_mean(&self) -> f64 {
        self.mu_j + 0.5 * self.sigma_j * self.sigma_j
    }

    /// Mean relative jump size k = E[J - 1] = e^(μ_J + σ_J²/2) - 1.
    pub fn jump_compensator(&self) -> f64 {
        self.jump_log_mean().exp_m1()
    }

    /// Risk-neutral jump intensity λ' = λ(1 + k).
    pub fn risk_neutral_intensity(&self) -> f64 {
        self.lambda * self.jump_log_mean().exp()
    }

    /// Annualised variance of log-returns: σ² + λ(μ_J² + σ_J²).
    pub fn total_variance_rate(&self) -> f64 {
        self.sigma * self.sigma + self.lambda * (self.mu_j * self.mu_j + self.sigma_j * self.sigma_j)
    }

    /// Parameters as an optimisation vector `[sigma, lambda, mu_j, sigma_j]`.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.sigma, self.lambda, self.mu_j, self.sigma_j]
    }

    /// Inverse of [`ModelParams::to_vec`]; `x` must hold four entries.
    pub(crate) fn from_slice(x: &[f64]) -> Self {
        Self {
            sigma: x[0],
            lambda: x[1],
            mu_j: x[2],
            sigma_j: x[3],
        }
    }
}
