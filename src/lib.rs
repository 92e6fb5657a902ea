//! # Merton-Lib: Jump-Diffusion Option Pricing and Calibration
//!
//! `merton-lib` prices European options under Black-Scholes and under the
//! Merton (1976) jump-diffusion model, computes Greeks for both, calibrates
//! the jump-diffusion parameters to market quotes and compares the two models
//! under stress scenarios.
//!
//! ## Core Features
//!
//! - **Black-Scholes**: closed-form prices, analytic Greeks and implied volatility
//! - **Jump-Diffusion**: Poisson mixture of Black-Scholes prices with adaptive truncation
//! - **Calibration**: multi-start bounded Levenberg-Marquardt with parallel restarts and
//!   optional L-BFGS-B refinement
//! - **Scenarios**: RMSE / MAE / mean signed error of both models under parameter shocks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use merton_lib::{
//!     calibrate, default_configs, price_jump_diffusion, ContractSpec, MarketQuote,
//!     ModelParams, OptionType, ParamBounds, QuoteSet, SeriesConfig,
//! };
//!
//! let quotes = QuoteSet::new(
//!     100.0,
//!     0.03,
//!     0.0,
//!     vec![
//!         MarketQuote::with_price(90.0, 0.5, OptionType::Put, 2.35),
//!         MarketQuote::with_price(100.0, 0.5, OptionType::Call, 7.10),
//!         MarketQuote::with_implied_vol(110.0, 0.5, OptionType::Call, 0.21),
//!     ],
//! );
//!
//! let guess = ModelParams::new(0.25, 0.3, -0.05, 0.2)?;
//! let result = calibrate(&quotes, &guess, ParamBounds::default(), &default_configs::fast())?;
//! if !result.converged {
//!     eprintln!("calibration did not converge, objective {}", result.objective);
//! }
//!
//! let contract = ContractSpec::call(100.0, 105.0, 0.03, 0.0, 1.0)?;
//! let priced = price_jump_diffusion(&contract, &result.params, &SeriesConfig::default())?;
//! println!("price {:.4}, delta {:.4}", priced.price, priced.greeks.delta);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Presets
//!
//! The library provides several calibration presets:
//! - `production()`: more restarts, vega weighting, tight tolerance
//! - `fast()`: few restarts for development
//! - `research()`: many restarts and a finer Poisson series
//! - `minimal()`: a single sequential restart

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod error;
pub mod model_params;
pub mod models;
pub mod scenario;

// ================================================================================================
// IMPORTS
// ================================================================================================

use std::collections::BTreeMap;

use calibration::pipeline::{calibrate_multi_start, polish_with_lbfgsb, sample_starts};
use calibration::types::ModelCalibrator;
use models::merton::MertonCalibrator;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Errors
pub use error::{MertonError, MertonResult};

// Contract, model and result types
pub use model_params::{DiffusionParams, JumpParams, ModelParams};
pub use models::merton::{PoissonSeries, SeriesConfig, SeriesPrice};
pub use models::types::{ContractSpec, Greeks, OptionType, PriceResult, PricingModel};

// Calibration inputs, configuration and results
pub use calibration::{
    config::{CalibrationOptions, Weighting},
    types::{
        CalibrationResult, MarketQuote, Observation, ParamBounds, QuoteSet, RestartSummary,
        Termination,
    },
};

// Scenario evaluation
pub use scenario::{
    default_scenarios, ErrorMetrics, ModelDelta, ScenarioOutcome, ScenarioReport, ScenarioShock,
};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured calibration settings for common use cases.
///
/// # Available Configurations
///
/// - [`production()`]: Production-grade settings
/// - [`fast()`]: Development-optimized settings
/// - [`research()`]: High-precision settings for research
/// - [`minimal()`]: Quick validation settings
pub mod default_configs {
    use crate::calibration::config::CalibrationOptions;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - 16 restarts, 500 iterations each
    /// - Convergence tolerance: 1e-10
    /// - Vega-weighted objective
    ///
    /// # Example
    ///
    /// ```rust
    /// use merton_lib::default_configs;
    ///
    /// let options = default_configs::production();
    /// assert_eq!(options.max_restarts, 16);
    /// ```
    pub fn production() -> CalibrationOptions {
        CalibrationOptions::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - 4 restarts, 100 iterations each
    /// - No L-BFGS-B refinement
    ///
    /// ```rust
    /// let options = merton_lib::default_configs::fast();
    /// assert!(!options.lbfgsb_polish);
    /// ```
    pub fn fast() -> CalibrationOptions {
        CalibrationOptions::fast()
    }

    /// High-precision configuration for research and backtesting.
    ///
    /// **Characteristics:**
    /// - 32 restarts, 1,000 iterations each
    /// - Convergence tolerance: 1e-12
    /// - Poisson series tolerance 1e-14 with up to 200 terms
    pub fn research() -> CalibrationOptions {
        CalibrationOptions::research()
    }

    /// Minimal configuration for quick validation and debugging: one
    /// sequential restart from the initial guess.
    pub fn minimal() -> CalibrationOptions {
        CalibrationOptions::minimal()
    }
}

// ================================================================================================
// PRICING
// ================================================================================================

/// Price and Greeks of a European option under Black-Scholes.
///
/// At `T = 0` the intrinsic value is returned with delta ±1 or 0 and every
/// other Greek zero. A zero `sigma` prices the discounted forward payoff.
///
/// # Errors
///
/// [`MertonError::Validation`] for `S <= 0`, `K <= 0`, negative or
/// non-finite `sigma`, or non-finite market terms.
///
/// # Example
///
/// ```rust
/// use merton_lib::{price_black_scholes, ContractSpec};
///
/// let contract = ContractSpec::call(100.0, 100.0, 0.03, 0.0, 0.5)?;
/// let result = price_black_scholes(&contract, 0.2)?;
/// assert!((result.price - 6.371028).abs() < 1e-6);
/// # Ok::<(), merton_lib::MertonError>(())
/// ```
pub fn price_black_scholes(contract: &ContractSpec, sigma: f64) -> MertonResult<PriceResult> {
    models::bs::price_with_greeks(contract, sigma)
}

/// Price and Greeks of a European option under Merton jump-diffusion.
///
/// The price is the Poisson-weighted sum of Black-Scholes prices at the
/// drift-adjusted rates `r_n` and volatilities `σ_n`; Greeks reuse the same
/// truncated series. `terms_used` and `low_confidence` on the result report
/// how the series was truncated. With `λ = 0` the result equals
/// [`price_black_scholes`] exactly.
///
/// # Example
///
/// ```rust
/// use merton_lib::{price_jump_diffusion, ContractSpec, ModelParams, SeriesConfig};
///
/// let contract = ContractSpec::call(100.0, 100.0, 0.03, 0.0, 0.5)?;
/// let params = ModelParams::new(0.2, 1.0, -0.05, 0.1)?;
/// let result = price_jump_diffusion(&contract, &params, &SeriesConfig::default())?;
/// assert!(!result.low_confidence);
/// # Ok::<(), merton_lib::MertonError>(())
/// ```
pub fn price_jump_diffusion(
    contract: &ContractSpec,
    params: &ModelParams,
    series: &SeriesConfig,
) -> MertonResult<PriceResult> {
    models::merton::price(contract, params, series)
}

/// Price and Greeks under either model.
pub fn price(
    contract: &ContractSpec,
    model: &PricingModel,
    series: &SeriesConfig,
) -> MertonResult<PriceResult> {
    match model {
        PricingModel::BlackScholes { sigma } => price_black_scholes(contract, *sigma),
        PricingModel::JumpDiffusion(params) => price_jump_diffusion(contract, params, series),
    }
}

/// Black-Scholes implied volatility of an observed premium.
pub fn implied_volatility(contract: &ContractSpec, market_price: f64) -> MertonResult<f64> {
    models::bs::implied_volatility(contract, market_price)
}

// ================================================================================================
// CALIBRATION
// ================================================================================================

/// Calibrate `[σ, λ, μ_J, σ_J]` to a set of market quotes.
///
/// Minimises `Σ w_i (model_i - observed_i)²` with a bounded Levenberg-Marquardt
/// optimizer run from `options.max_restarts` starting points: the first is
/// `initial_guess` projected onto `bounds`, the rest are drawn uniformly
/// inside `bounds` from `options.seed`. Restarts run in parallel when
/// `options.parallel` is set, each with its own `timeout_seconds` budget.
/// The lowest-objective converged restart is selected and, with
/// `options.lbfgsb_polish`, refined by L-BFGS-B.
///
/// # Errors
///
/// * [`MertonError::Config`] if `options` are invalid
/// * [`MertonError::Validation`] for an empty quote set, invalid quotes,
///   bounds or initial guess
/// * [`MertonError::Calibration`] only if every restart failed numerically
///
/// A result is returned even when no restart converged; callers must check
/// [`CalibrationResult::converged`].
pub fn calibrate(
    quotes: &QuoteSet,
    initial_guess: &ModelParams,
    bounds: ParamBounds,
    options: &CalibrationOptions,
) -> MertonResult<CalibrationResult> {
    options.validate()?;
    initial_guess.validate()?;
    let calibrator = MertonCalibrator::new(quotes, bounds, options, initial_guess.sigma)?;

    tracing::info!(
        quotes = quotes.len(),
        restarts = options.max_restarts,
        parallel = options.parallel,
        "starting jump-diffusion calibration"
    );

    let starts = sample_starts(
        calibrator.param_bounds(),
        &initial_guess.to_vec(),
        options.max_restarts,
        options.seed,
    );
    let outcome = calibrate_multi_start(&calibrator, starts, options)?;

    let polished = if options.lbfgsb_polish {
        let best = &outcome.best.outcome;
        polish_with_lbfgsb(&calibrator, &best.params, best.objective, options)
    } else {
        None
    };

    let result = calibrator.build_result(&outcome, polished);
    tracing::info!(
        sigma = result.params.sigma,
        lambda = result.params.lambda,
        mu_j = result.params.mu_j,
        sigma_j = result.params.sigma_j,
        objective = result.objective,
        converged = result.converged,
        "calibration finished"
    );
    Ok(result)
}

/// Weighted calibration objective of `params` against `quotes`.
///
/// Returns exactly the loss [`calibrate`] minimises under the same options,
/// so fit quality can be monitored without re-running the optimizer.
pub fn evaluate_objective(
    quotes: &QuoteSet,
    params: &ModelParams,
    options: &CalibrationOptions,
) -> MertonResult<f64> {
    options.validate()?;
    params.validate()?;
    let calibrator = MertonCalibrator::new(quotes, ParamBounds::default(), options, params.sigma)?;
    Ok(calibrator.objective_at(params))
}

// ================================================================================================
// SCENARIOS
// ================================================================================================

/// Compare Black-Scholes and jump-diffusion pricing errors on `quotes` under
/// each named parameter shock of `params`.
///
/// # Example
///
/// ```rust,no_run
/// use merton_lib::{default_scenarios, evaluate_scenarios, ModelParams, QuoteSet, SeriesConfig};
///
/// # let quotes = QuoteSet::new(100.0, 0.03, 0.0, vec![]);
/// let params = ModelParams::new(0.2, 0.5, -0.1, 0.15)?;
/// let report = evaluate_scenarios(&quotes, &params, &default_scenarios(), &SeriesConfig::default())?;
/// for outcome in &report.outcomes {
///     println!("{}: BS rmse {:.4}, JD rmse {:.4}", outcome.name,
///              outcome.black_scholes.rmse, outcome.jump_diffusion.rmse);
/// }
/// # Ok::<(), merton_lib::MertonError>(())
/// ```
pub fn evaluate_scenarios(
    quotes: &QuoteSet,
    params: &ModelParams,
    scenarios: &BTreeMap<String, ScenarioShock>,
    series: &SeriesConfig,
) -> MertonResult<ScenarioReport> {
    scenario::evaluate(quotes, params, scenarios, series)
}
