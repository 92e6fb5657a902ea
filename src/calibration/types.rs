use crate::error::{ensure_finite, ensure_non_negative, ensure_positive, MertonError, MertonResult};
use crate::model_params::ModelParams;
use crate::models::bs;
use crate::models::types::{ContractSpec, OptionType};
use serde::{Deserialize, Serialize};

/// What the market shows for a quote: a premium or a Black-Scholes implied vol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    Price(f64),
    ImpliedVol(f64),
}

/// A single observed European option quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Strike price
    pub strike: f64,
    /// Time to expiration in years
    pub maturity: f64,
    pub option_type: OptionType,
    pub observed: Observation,
}

impl MarketQuote {
    pub fn with_price(strike: f64, maturity: f64, option_type: OptionType, price: f64) -> Self {
        Self {
            strike,
            maturity,
            option_type,
            observed: Observation::Price(price),
        }
    }

    pub fn with_implied_vol(
        strike: f64,
        maturity: f64,
        option_type: OptionType,
        implied_vol: f64,
    ) -> Self {
        Self {
            strike,
            maturity,
            option_type,
            observed: Observation::ImpliedVol(implied_vol),
        }
    }
}

/// Ordered quotes on one underlying, together with the market terms shared by
/// every quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSet {
    pub spot: f64,
    pub rate: f64,
    pub dividend_yield: f64,
    pub quotes: Vec<MarketQuote>,
}

impl QuoteSet {
    pub fn new(spot: f64, rate: f64, dividend_yield: f64, quotes: Vec<MarketQuote>) -> Self {
        Self {
            spot,
            rate,
            dividend_yield,
            quotes,
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Contract terms of `quote` under this set's market.
    pub fn contract_for(&self, quote: &MarketQuote) -> ContractSpec {
        ContractSpec {
            spot: self.spot,
            strike: quote.strike,
            rate: self.rate,
            dividend_yield: self.dividend_yield,
            maturity: quote.maturity,
            option_type: quote.option_type,
        }
    }

    /// Observed premium of `quote`; implied vols are converted with the
    /// Black-Scholes formula at the quote's contract terms.
    pub fn observed_price(&self, quote: &MarketQuote) -> MertonResult<f64> {
        let contract = self.contract_for(quote);
        match quote.observed {
            Observation::Price(price) => {
                ensure_non_negative("observed price", price)?;
                Ok(price)
            }
            Observation::ImpliedVol(vol) => {
                ensure_positive("observed implied vol", vol)?;
                bs::price(&contract, vol)
            }
        }
    }

    /// Black-Scholes implied vol of `quote`, inverting observed prices.
    pub fn observed_implied_vol(&self, quote: &MarketQuote) -> MertonResult<f64> {
        match quote.observed {
            Observation::ImpliedVol(vol) => {
                ensure_positive("observed implied vol", vol)?;
                Ok(vol)
            }
            Observation::Price(price) => bs::implied_volatility(&self.contract_for(quote), price),
        }
    }

    /// Validates the market terms and every quote's contract.
    pub fn validate(&self) -> MertonResult<()> {
        ensure_positive("spot", self.spot)?;
        ensure_finite("rate", self.rate)?;
        ensure_finite("dividend_yield", self.dividend_yield)?;
        for (i, quote) in self.quotes.iter().enumerate() {
            self.contract_for(quote)
                .validate()
                .map_err(|e| MertonError::validation(format!("quote {}: {}", i, e)))?;
        }
        Ok(())
    }
}

/// Box constraints on the calibrated parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    /// Diffusion volatility bounds (lower bound must be > 0)
    pub sigma: (f64, f64),
    /// Jump intensity bounds (lower bound must be >= 0)
    pub lambda: (f64, f64),
    /// Mean log-jump bounds
    pub mu_j: (f64, f64),
    /// Log-jump volatility bounds (lower bound must be >= 0)
    pub sigma_j: (f64, f64),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            sigma: (0.01, 1.0),
            lambda: (0.0, 5.0),
            mu_j: (-1.0, 1.0),
            sigma_j: (0.0, 1.0),
        }
    }
}

impl TryFrom<&[(f64, f64)]> for ParamBounds {
    type Error = MertonError;

    /// Bounds from `[sigma, lambda, mu_j, sigma_j]` order.
    fn try_from(bounds: &[(f64, f64)]) -> MertonResult<Self> {
        match *bounds {
            [sigma, lambda, mu_j, sigma_j] => Ok(Self {
                sigma,
                lambda,
                mu_j,
                sigma_j,
            }),
            _ => Err(MertonError::validation(format!(
                "expected 4 parameter bounds, got {}",
                bounds.len()
            ))),
        }
    }
}

impl ParamBounds {
    /// Bounds in optimisation-vector order `[sigma, lambda, mu_j, sigma_j]`.
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        vec![self.sigma, self.lambda, self.mu_j, self.sigma_j]
    }

    pub fn validate(&self) -> MertonResult<()> {
        for (name, (lo, hi)) in [
            ("sigma", self.sigma),
            ("lambda", self.lambda),
            ("mu_j", self.mu_j),
            ("sigma_j", self.sigma_j),
        ] {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(MertonError::validation(format!(
                    "{} bounds ({}, {}) must be finite with lower <= upper",
                    name, lo, hi
                )));
            }
        }
        ensure_positive("sigma lower bound", self.sigma.0)?;
        ensure_non_negative("lambda lower bound", self.lambda.0)?;
        ensure_non_negative("sigma_j lower bound", self.sigma_j.0)
    }

    /// Projects `params` onto the box.
    pub fn clamp(&self, params: &ModelParams) -> ModelParams {
        ModelParams {
            sigma: params.sigma.clamp(self.sigma.0, self.sigma.1),
            lambda: params.lambda.clamp(self.lambda.0, self.lambda.1),
            mu_j: params.mu_j.clamp(self.mu_j.0, self.mu_j.1),
            sigma_j: params.sigma_j.clamp(self.sigma_j.0, self.sigma_j.1),
        }
    }

    pub fn contains(&self, params: &ModelParams) -> bool {
        self.clamp(params) == *params
    }
}

/// Model calibrator trait for parameter optimization
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "merton")
    fn model_name(&self) -> &str;

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Weighted residuals (model minus observed) for a parameter vector `x`
    fn residuals(&self, x: &[f64]) -> Vec<f64>;

    /// Given a parameter vector `x`, returns the objective value
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        let r = self.residuals(x);
        if r.is_empty() {
            return f64::INFINITY;
        }
        r.iter().map(|v| v * v).sum()
    }

    fn param_count(&self) -> usize {
        self.param_bounds().len()
    }
}

/// Terminal state of one local-optimizer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    MaxIterationsReached,
    TimedOut,
    NumericFailure,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        self == Termination::Converged
    }
}

/// Outcome of one restart, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestartSummary {
    pub index: usize,
    pub initial: ModelParams,
    pub params: ModelParams,
    pub objective: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Result of a full multi-start calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Fitted parameters
    pub params: ModelParams,
    /// Weighted sum of squared pricing errors at `params`
    pub objective: f64,
    /// False when no restart met the convergence criterion
    pub converged: bool,
    /// Iterations used by the selected restart
    pub iterations: usize,
    /// Model minus observed price, in quote order (unweighted)
    pub residuals: Vec<f64>,
    /// Per-quote weights used in the objective
    pub weights: Vec<f64>,
    pub termination: Termination,
    pub restarts_converged: usize,
    pub restarts: Vec<RestartSummary>,
    /// Set when any model price at `params` hit the series term cap
    pub low_confidence: bool,
}

impl CalibrationResult {
    /// Root-mean-square of the unweighted residuals.
    pub fn rmse(&self) -> f64 {
        if self.residuals.is_empty() {
            return 0.0;
        }
        (self.residuals.iter().map(|r| r * r).sum::<f64>() / self.residuals.len() as f64).sqrt()
    }
}
