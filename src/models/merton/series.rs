// src/models/merton/series.rs

//! Poisson mixture terms of the Merton (1976) pricing formula.
//!
//! Conditional on `n` jumps before expiry the log-price is Gaussian, so the
//! option value is a Black-Scholes price with
//!
//! ```text
//! r_n = r - λk + n(μ_J + σ_J²/2)/T
//! σ_n = sqrt(σ² + nσ_J²/T)
//! ```
//!
//! weighted by the Poisson probability of `n` jumps at the risk-neutral
//! intensity λ' = λ(1 + k). Weights are accumulated in log space so that
//! large λ'T neither overflows `(λ'T)^n` nor `n!`.
//!
//! Truncation looks at each term's contribution to the price, not only at its
//! weight: with μ_J + σ_J²/2 < 0 the conditional put prices grow with `n`
//! like `K·e^{-r_n T}`, so a small weight alone does not bound the tail.

use crate::error::{MertonError, MertonResult};
use crate::model_params::ModelParams;
use crate::models::bs::bs_price;
use crate::models::types::ContractSpec;
use serde::{Deserialize, Serialize};

/// Truncation settings for the Poisson series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Stop once past the Poisson mode, when a term's weight is below
    /// `tolerance` times the accumulated weight and its weighted price is
    /// below `tolerance` times the accumulated price.
    #[serde(default = "default_series_tolerance")]
    pub tolerance: f64,
    /// Hard cap on the number of terms.
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            tolerance: default_series_tolerance(),
            max_terms: default_max_terms(),
        }
    }
}

impl SeriesConfig {
    pub fn new(tolerance: f64, max_terms: usize) -> Self {
        Self {
            tolerance,
            max_terms,
        }
    }

    pub fn validate(&self) -> MertonResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MertonError::validation(format!(
                "series tolerance must be finite and > 0 (got {})",
                self.tolerance
            )));
        }
        if self.max_terms == 0 {
            return Err(MertonError::validation("series max_terms must be >= 1"));
        }
        Ok(())
    }
}

fn default_series_tolerance() -> f64 {
    1e-10
}

fn default_max_terms() -> usize {
    100
}

/// One conditional Black-Scholes term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesTerm {
    /// Number of jumps
    pub n: usize,
    /// Poisson probability of `n` jumps at the risk-neutral intensity
    pub weight: f64,
    /// Drift-adjusted rate r_n
    pub rate: f64,
    /// Conditional volatility σ_n
    pub sigma: f64,
    /// Black-Scholes price conditional on `n` jumps
    pub price: f64,
}

/// Truncated Poisson mixture for one contract under one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonSeries {
    pub terms: Vec<SeriesTerm>,
    /// Expected number of jumps under the pricing measure, λ'T
    pub mean_jumps: f64,
    /// False when `max_terms` was reached before the tolerance test passed
    pub converged: bool,
}

impl PoissonSeries {
    /// Builds the mixture terms for `contract`, whose maturity must be
    /// strictly positive.
    pub fn new(params: &ModelParams, contract: &ContractSpec, config: &SeriesConfig) -> Self {
        let maturity = contract.maturity;
        let conditional_price = |rate: f64, sigma: f64| {
            bs_price(
                contract.option_type,
                contract.spot,
                contract.strike,
                rate,
                contract.dividend_yield,
                sigma,
                maturity,
            )
        };
        let mean_jumps = params.risk_neutral_intensity() * maturity;

        // λ = 0 collapses to the single n = 0 term with r and σ untouched.
        if mean_jumps <= 0.0 {
            return Self {
                terms: vec![SeriesTerm {
                    n: 0,
                    weight: 1.0,
                    rate: contract.rate,
                    sigma: params.sigma,
                    price: conditional_price(contract.rate, params.sigma),
                }],
                mean_jumps: 0.0,
                converged: true,
            };
        }

        let drift = contract.rate - params.lambda * params.jump_compensator();
        let log_jump = params.jump_log_mean();
        let sigma_sq = params.sigma * params.sigma;
        let jump_var = params.sigma_j * params.sigma_j;
        let ln_mean = mean_jumps.ln();

        let mut terms = Vec::with_capacity(config.max_terms.min(64));
        let mut log_weight = -mean_jumps;
        let mut cumulative_weight = 0.0;
        let mut cumulative_price = 0.0;

        for n in 0..config.max_terms {
            let nf = n as f64;
            if n > 0 {
                log_weight += ln_mean - nf.ln();
            }
            let weight = log_weight.exp();
            cumulative_weight += weight;

            let sigma = if n == 0 {
                params.sigma
            } else {
                (sigma_sq + nf * jump_var / maturity).sqrt()
            };
            let rate = drift + nf * log_jump / maturity;
            let price = conditional_price(rate, sigma);
            let contribution = weight * price;
            cumulative_price += contribution;
            terms.push(SeriesTerm {
                n,
                weight,
                rate,
                sigma,
                price,
            });

            // Weights only decrease once n is past the mode ⌊λ'T⌋.
            if nf + 1.0 > mean_jumps
                && weight <= config.tolerance * cumulative_weight
                && contribution <= config.tolerance * cumulative_price
            {
                return Self {
                    terms,
                    mean_jumps,
                    converged: true,
                };
            }
        }

        tracing::debug!(
            mean_jumps,
            max_terms = config.max_terms,
            "Poisson series hit its term cap before reaching tolerance"
        );
        Self {
            terms,
            mean_jumps,
            converged: false,
        }
    }

    /// Weighted sum of the conditional prices.
    pub fn price(&self) -> f64 {
        self.terms.iter().map(|t| t.weight * t.price).sum()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sum of the retained Poisson weights (≤ 1).
    pub fn total_weight(&self) -> f64 {
        self.terms.iter().map(|t| t.weight).sum()
    }
}
