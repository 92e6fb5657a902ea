// src/models/greeks.rs

//! Sensitivities for both pricing models.
//!
//! Black-Scholes Greeks are the closed forms in [`crate::models::bs`].
//! Jump-diffusion Greeks differentiate the Poisson series term by term:
//! delta, gamma and rho are weighted sums of the conditional Black-Scholes
//! Greeks; vega picks up the chain factor ∂σ_n/∂σ = σ/σ_n; theta also
//! differentiates the Poisson weights and the maturity dependence of r_n
//! and σ_n.

use crate::error::MertonResult;
use crate::model_params::ModelParams;
use crate::models::bs::{self, bs_greeks};
use crate::models::merton::{PoissonSeries, SeriesConfig};
use crate::models::types::{ContractSpec, Greeks, PricingModel};

/// Greeks of `contract` under either pricing model.
pub fn greeks(
    contract: &ContractSpec,
    model: &PricingModel,
    config: &SeriesConfig,
) -> MertonResult<Greeks> {
    match model {
        PricingModel::BlackScholes { sigma } => bs::greeks(contract, *sigma),
        PricingModel::JumpDiffusion(params) => {
            crate::models::merton::price(contract, params, config).map(|r| r.greeks)
        }
    }
}

/// Term-by-term derivative of the Merton series. `contract.maturity` must be
/// strictly positive.
pub(crate) fn series_greeks(
    contract: &ContractSpec,
    params: &ModelParams,
    series: &PoissonSeries,
) -> Greeks {
    let t = contract.maturity;
    let intensity = params.risk_neutral_intensity();
    let log_jump = params.jump_log_mean();
    let jump_var = params.sigma_j * params.sigma_j;

    let mut total = Greeks::default();
    for term in &series.terms {
        let w = term.weight;
        let nf = term.n as f64;
        let g = bs_greeks(
            contract.option_type,
            contract.spot,
            contract.strike,
            term.rate,
            contract.dividend_yield,
            term.sigma,
            t,
        );

        let dsigma_dsigma = if term.sigma > 0.0 {
            params.sigma / term.sigma
        } else {
            1.0
        };

        // ∂/∂T of the weight, of r_n and of σ_n
        let dweight_dt = w * (nf / t - intensity);
        let drate_dt = -nf * log_jump / (t * t);
        let dsigma_dt = if term.sigma > 0.0 {
            -nf * jump_var / (2.0 * t * t * term.sigma)
        } else {
            0.0
        };

        total.delta += w * g.delta;
        total.gamma += w * g.gamma;
        total.vega += w * g.vega * dsigma_dsigma;
        total.rho += w * g.rho;
        // theta = -dV/dT; g.theta already equals -∂B/∂T at fixed (r_n, σ_n)
        total.theta +=
            -dweight_dt * term.price + w * (g.theta - g.rho * drate_dt - g.vega * dsigma_dt);
    }
    total
}
