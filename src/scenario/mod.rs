// src/scenario/mod.rs

//! Stress scenarios comparing Black-Scholes against the jump-diffusion model.
//!
//! Each scenario perturbs the fitted parameters, prices every quote of the
//! set under both models and scores the prices against the observed ones.
//! Black-Scholes is run at the variance-matched volatility
//! `sqrt(σ² + λ(μ_J² + σ_J²))` of the shocked parameters, so both models see
//! the same total return variance.

use crate::calibration::types::QuoteSet;
use crate::error::{ensure_non_negative, ensure_positive, MertonError, MertonResult};
use crate::model_params::ModelParams;
use crate::models::bs::bs_price;
use crate::models::merton::{price_unchecked, SeriesConfig};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Parameter perturbation applied to the fitted parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioShock {
    /// Multiplies the diffusion volatility
    #[serde(default = "default_multiplier")]
    pub sigma_multiplier: f64,
    #[serde(default)]
    pub lambda_override: Option<f64>,
    #[serde(default)]
    pub sigma_j_override: Option<f64>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for ScenarioShock {
    fn default() -> Self {
        Self::baseline()
    }
}

impl ScenarioShock {
    /// Fitted parameters unchanged.
    pub fn baseline() -> Self {
        Self {
            sigma_multiplier: 1.0,
            lambda_override: None,
            sigma_j_override: None,
        }
    }

    /// Diffusion volatility up 50%.
    pub fn high_vol() -> Self {
        Self {
            sigma_multiplier: 1.5,
            ..Self::baseline()
        }
    }

    /// Three jumps a year with wider jump sizes.
    pub fn jump_heavy() -> Self {
        Self {
            sigma_multiplier: 1.0,
            lambda_override: Some(3.0),
            sigma_j_override: Some(0.25),
        }
    }

    pub fn validate(&self) -> MertonResult<()> {
        ensure_non_negative("sigma_multiplier", self.sigma_multiplier)?;
        if let Some(lambda) = self.lambda_override {
            ensure_non_negative("lambda_override", lambda)?;
        }
        if let Some(sigma_j) = self.sigma_j_override {
            ensure_non_negative("sigma_j_override", sigma_j)?;
        }
        Ok(())
    }

    /// Shocked copy of `params`.
    pub fn apply(&self, params: &ModelParams) -> ModelParams {
        ModelParams {
            sigma: params.sigma * self.sigma_multiplier,
            lambda: self.lambda_override.unwrap_or(params.lambda),
            mu_j: params.mu_j,
            sigma_j: self.sigma_j_override.unwrap_or(params.sigma_j),
        }
    }
}

/// The three standard scenarios keyed by name.
pub fn default_scenarios() -> BTreeMap<String, ScenarioShock> {
    BTreeMap::from([
        ("baseline".to_string(), ScenarioShock::baseline()),
        ("high-vol".to_string(), ScenarioShock::high_vol()),
        ("jump-heavy".to_string(), ScenarioShock::jump_heavy()),
    ])
}

/// Pricing error statistics of one model against the observed prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub rmse: f64,
    pub mae: f64,
    /// Mean of model minus observed
    pub mean_signed_error: f64,
    pub count: usize,
}

impl ErrorMetrics {
    /// Statistics of `errors` (model minus observed); `errors` must be non-empty.
    pub fn from_errors(errors: &[f64]) -> Self {
        Self {
            rmse: errors.iter().map(|e| e * e).mean().sqrt(),
            mae: errors.iter().map(|e| e.abs()).mean(),
            mean_signed_error: errors.mean(),
            count: errors.len(),
        }
    }
}

/// Jump-diffusion metrics minus Black-Scholes metrics; negative means the
/// jump-diffusion prices are closer to the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelDelta {
    pub rmse: f64,
    pub mae: f64,
    pub mean_signed_error: f64,
    /// Mean of jump-diffusion price minus Black-Scholes price
    pub mean_price_gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Shocked parameters the scenario was priced at
    pub params: ModelParams,
    /// Variance-matched volatility used for the Black-Scholes prices
    pub black_scholes_sigma: f64,
    pub black_scholes: ErrorMetrics,
    pub jump_diffusion: ErrorMetrics,
    pub delta: ModelDelta,
    /// Quotes whose jump-diffusion price hit the series term cap
    pub low_confidence_quotes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub base_params: ModelParams,
    /// Outcomes in scenario-name order
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn get(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Prices `quotes` under every scenario and reports both models' errors.
pub fn evaluate(
    quotes: &QuoteSet,
    params: &ModelParams,
    scenarios: &BTreeMap<String, ScenarioShock>,
    series: &SeriesConfig,
) -> MertonResult<ScenarioReport> {
    if quotes.is_empty() {
        return Err(MertonError::validation("quote set is empty"));
    }
    quotes.validate()?;
    params.validate()?;
    series.validate()?;

    let contracts: Vec<_> = quotes.quotes.iter().map(|q| quotes.contract_for(q)).collect();
    let observed = quotes
        .quotes
        .iter()
        .map(|q| quotes.observed_price(q))
        .collect::<MertonResult<Vec<f64>>>()?;

    let mut outcomes = Vec::with_capacity(scenarios.len());
    for (name, shock) in scenarios {
        shock
            .validate()
            .map_err(|e| MertonError::validation(format!("scenario {}: {}", name, e)))?;
        let shocked = shock.apply(params);
        shocked.validate()?;
        let bs_sigma = shocked.total_variance_rate().sqrt();
        ensure_positive("variance-matched volatility", bs_sigma)
            .map_err(|e| MertonError::validation(format!("scenario {}: {}", name, e)))?;

        let mut bs_errors = Vec::with_capacity(contracts.len());
        let mut jd_errors = Vec::with_capacity(contracts.len());
        let mut gaps = Vec::with_capacity(contracts.len());
        let mut low_confidence_quotes = 0;
        for (c, obs) in contracts.iter().zip(&observed) {
            let bs = bs_price(
                c.option_type,
                c.spot,
                c.strike,
                c.rate,
                c.dividend_yield,
                bs_sigma,
                c.maturity,
            );
            let jd = price_unchecked(c, &shocked, series);
            if jd.low_confidence {
                low_confidence_quotes += 1;
            }
            bs_errors.push(bs - obs);
            jd_errors.push(jd.price - obs);
            gaps.push(jd.price - bs);
        }

        let black_scholes = ErrorMetrics::from_errors(&bs_errors);
        let jump_diffusion = ErrorMetrics::from_errors(&jd_errors);
        let delta = ModelDelta {
            rmse: jump_diffusion.rmse - black_scholes.rmse,
            mae: jump_diffusion.mae - black_scholes.mae,
            mean_signed_error: jump_diffusion.mean_signed_error - black_scholes.mean_signed_error,
            mean_price_gap: gaps.mean(),
        };

        tracing::debug!(
            scenario = %name,
            bs_rmse = black_scholes.rmse,
            jd_rmse = jump_diffusion.rmse,
            "evaluated scenario"
        );

        outcomes.push(ScenarioOutcome {
            name: name.clone(),
            params: shocked,
            black_scholes_sigma: bs_sigma,
            black_scholes,
            jump_diffusion,
            delta,
            low_confidence_quotes,
        });
    }

    Ok(ScenarioReport {
        base_params: *params,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shock_application() {
        let p = ModelParams::new(0.2, 0.5, -0.1, 0.15).unwrap();
        assert_eq!(ScenarioShock::baseline().apply(&p), p);
        let hv = ScenarioShock::high_vol().apply(&p);
        assert!((hv.sigma - 0.3).abs() < 1e-15);
        assert_eq!(hv.lambda, 0.5);
        let jh = ScenarioShock::jump_heavy().apply(&p);
        assert_eq!((jh.lambda, jh.mu_j, jh.sigma_j), (3.0, -0.1, 0.25));
    }

    #[test]
    fn test_error_metrics() {
        let m = ErrorMetrics::from_errors(&[1.0, -1.0, 2.0, 0.0]);
        assert!((m.rmse - 1.5f64.sqrt()).abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.mean_signed_error - 0.5).abs() < 1e-12);
        assert_eq!(m.count, 4);
    }

    #[test]
    fn test_invalid_shock_rejected() {
        let shock = ScenarioShock {
            lambda_override: Some(-1.0),
            ..ScenarioShock::baseline()
        };
        assert!(shock.validate().is_err());
    }
}
