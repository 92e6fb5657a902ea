// src/models/merton/mod.rs

//! Merton (1976) jump-diffusion pricer.
//!
//! The price is the Poisson mixture of Black-Scholes prices described in
//! [`series`]. With λ = 0 the mixture has exactly one term evaluated at the
//! unmodified rate and volatility, so the result is bit-for-bit the
//! Black-Scholes price.

pub mod calibrator;
pub mod series;

use crate::error::MertonResult;
use crate::model_params::ModelParams;
use crate::models::greeks::series_greeks;
use crate::models::types::{ContractSpec, PriceResult};
pub use calibrator::MertonCalibrator;
pub use series::{PoissonSeries, SeriesConfig, SeriesTerm};

/// Price without Greeks, plus truncation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPrice {
    pub price: f64,
    pub terms_used: usize,
    pub low_confidence: bool,
}

/// Jump-diffusion price assuming `contract` and `params` are already valid.
pub(crate) fn price_unchecked(
    contract: &ContractSpec,
    params: &ModelParams,
    config: &SeriesConfig,
) -> SeriesPrice {
    if contract.maturity <= 0.0 {
        return SeriesPrice {
            price: contract.intrinsic_value(),
            terms_used: 0,
            low_confidence: false,
        };
    }
    let series = PoissonSeries::new(params, contract, config);
    SeriesPrice {
        price: series.price(),
        terms_used: series.len(),
        low_confidence: !series.converged,
    }
}

fn validate_inputs(
    contract: &ContractSpec,
    params: &ModelParams,
    config: &SeriesConfig,
) -> MertonResult<()> {
    contract.validate()?;
    params.validate()?;
    config.validate()
}

/// Jump-diffusion price only.
pub fn price_only(
    contract: &ContractSpec,
    params: &ModelParams,
    config: &SeriesConfig,
) -> MertonResult<SeriesPrice> {
    validate_inputs(contract, params, config)?;
    Ok(price_unchecked(contract, params, config))
}

/// Jump-diffusion price and series-differentiated Greeks.
///
/// Greeks reuse the same truncated series as the price. At T = 0 the
/// intrinsic value and the Black-Scholes boundary Greeks are returned without
/// touching the series, with `terms_used = 0` as in [`price_only`].
pub fn price(
    contract: &ContractSpec,
    params: &ModelParams,
    config: &SeriesConfig,
) -> MertonResult<PriceResult> {
    validate_inputs(contract, params, config)?;

    if contract.maturity <= 0.0 {
        // No series term is evaluated at expiry.
        return crate::models::bs::price_with_greeks(contract, params.sigma).map(|r| PriceResult {
            terms_used: 0,
            ..r
        });
    }

    let series = PoissonSeries::new(params, contract, config);
    Ok(PriceResult {
        price: series.price(),
        greeks: series_greeks(contract, params, &series),
        terms_used: series.len(),
        low_confidence: !series.converged,
    })
}
