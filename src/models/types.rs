// src/models/types.rs

//! Contract and pricing-output value types shared by both pricers.

use crate::error::{ensure_finite, ensure_non_negative, ensure_positive, MertonResult};
use crate::model_params::ModelParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// European exercise payoff direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// +1 for calls, -1 for puts.
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Terms of a single European vanilla option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Spot price S
    pub spot: f64,
    /// Strike price K
    pub strike: f64,
    /// Continuously compounded risk-free rate r
    pub rate: f64,
    /// Continuous dividend / carry yield q
    pub dividend_yield: f64,
    /// Time to maturity T in years
    pub maturity: f64,
    pub option_type: OptionType,
}

impl ContractSpec {
    /// Creates a validated contract.
    pub fn new(
        spot: f64,
        strike: f64,
        rate: f64,
        dividend_yield: f64,
        maturity: f64,
        option_type: OptionType,
    ) -> MertonResult<Self> {
        let contract = Self {
            spot,
            strike,
            rate,
            dividend_yield,
            maturity,
            option_type,
        };
        contract.validate()?;
        Ok(contract)
    }

    pub fn call(spot: f64, strike: f64, rate: f64, dividend_yield: f64, maturity: f64) -> MertonResult<Self> {
        Self::new(spot, strike, rate, dividend_yield, maturity, OptionType::Call)
    }

    pub fn put(spot: f64, strike: f64, rate: f64, dividend_yield: f64, maturity: f64) -> MertonResult<Self> {
        Self::new(spot, strike, rate, dividend_yield, maturity, OptionType::Put)
    }

    /// Same terms with the opposite payoff direction.
    pub fn with_option_type(&self, option_type: OptionType) -> Self {
        Self {
            option_type,
            ..*self
        }
    }

    pub fn with_spot(&self, spot: f64) -> Self {
        Self { spot, ..*self }
    }

    pub fn with_maturity(&self, maturity: f64) -> Self {
        Self { maturity, ..*self }
    }

    pub fn validate(&self) -> MertonResult<()> {
        ensure_positive("spot", self.spot)?;
        ensure_positive("strike", self.strike)?;
        ensure_finite("rate", self.rate)?;
        ensure_finite("dividend_yield", self.dividend_yield)?;
        ensure_non_negative("maturity", self.maturity)
    }

    /// Payoff if exercised now: max(S-K, 0) or max(K-S, 0).
    pub fn intrinsic_value(&self) -> f64 {
        (self.option_type.sign() * (self.spot - self.strike)).max(0.0)
    }

    /// Put-call parity right-hand side S·e^(-qT) - K·e^(-rT).
    pub fn parity_value(&self) -> f64 {
        self.spot * (-self.dividend_yield * self.maturity).exp()
            - self.strike * (-self.rate * self.maturity).exp()
    }
}

/// Option price sensitivities.
///
/// Units: theta is per year of calendar time (dV/dt = -dV/dT), vega per unit
/// of diffusion volatility, rho per unit of the risk-free rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// dV/dS
    pub delta: f64,
    /// d²V/dS²
    pub gamma: f64,
    /// dV/dσ
    pub vega: f64,
    /// dV/dt
    pub theta: f64,
    /// dV/dr
    pub rho: f64,
}

impl Greeks {
    pub fn new(delta: f64, gamma: f64, vega: f64, theta: f64, rho: f64) -> Self {
        Self {
            delta,
            gamma,
            vega,
            theta,
            rho,
        }
    }
}

/// Price plus Greeks for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceResult {
    pub price: f64,
    pub greeks: Greeks,
    /// Number of Poisson series terms summed (1 for Black-Scholes)
    pub terms_used: usize,
    /// Set when the series hit its hard cap before meeting the tolerance
    pub low_confidence: bool,
}

/// The two supported pricing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PricingModel {
    BlackScholes { sigma: f64 },
    JumpDiffusion(ModelParams),
}
