// demos/calibration_demo.rs

//! Calibrating jump-diffusion parameters to a synthetic quote grid, then
//! stress-testing the fit.
//!
//! Run with `RUST_LOG=merton_lib=debug` to see every restart.

use anyhow::Result;
use merton_lib::{
    calibrate, default_configs, default_scenarios, evaluate_scenarios, price_jump_diffusion,
    ContractSpec, MarketQuote, ModelParams, OptionType, ParamBounds, QuoteSet, SeriesConfig,
};
use tracing_subscriber::EnvFilter;

fn create_demo_quotes(truth: &ModelParams) -> Result<QuoteSet> {
    let series = SeriesConfig::default();
    let mut quotes = Vec::new();
    for maturity in [0.25, 0.5, 1.0, 2.0] {
        for strike in [80.0, 90.0, 95.0, 100.0, 105.0, 110.0, 120.0] {
            let option_type = if strike < 100.0 { OptionType::Put } else { OptionType::Call };
            let contract = ContractSpec::new(100.0, strike, 0.03, 0.0, maturity, option_type)?;
            let price = price_jump_diffusion(&contract, truth, &series)?.price;
            quotes.push(MarketQuote::with_price(strike, maturity, option_type, price));
        }
    }
    Ok(QuoteSet::new(100.0, 0.03, 0.0, quotes))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Jump-Diffusion Calibration Demo");
    println!("===============================");

    let truth = ModelParams::new(0.2, 0.5, -0.1, 0.15)?;
    let quotes = create_demo_quotes(&truth)?;
    println!("Generated {} quotes from {:?}", quotes.len(), truth);

    let guess = ModelParams::new(0.25, 0.3, -0.05, 0.2)?;
    let options = default_configs::fast();
    // [sigma, lambda, mu_j, sigma_j]
    let pairs: [(f64, f64); 4] = [(0.05, 0.6), (0.0, 3.0), (-0.5, 0.5), (0.0, 0.5)];
    let bounds = ParamBounds::try_from(&pairs[..])?;
    let result = calibrate(&quotes, &guess, bounds, &options)?;

    println!("\nCalibration result:");
    println!("  converged:   {}", result.converged);
    println!("  objective:   {:.3e}", result.objective);
    println!("  rmse:        {:.3e}", result.rmse());
    println!("  restarts:    {} of {} converged", result.restarts_converged, result.restarts.len());
    println!(
        "  parameters:  sigma={:.5} lambda={:.5} mu_j={:.5} sigma_j={:.5}",
        result.params.sigma, result.params.lambda, result.params.mu_j, result.params.sigma_j
    );
    for restart in &result.restarts {
        println!(
            "    restart {}: {:?} after {} iterations, objective {:.3e}",
            restart.index, restart.termination, restart.iterations, restart.objective
        );
    }

    let report = evaluate_scenarios(&quotes, &result.params, &default_scenarios(), &options.series)?;
    println!("\nScenario comparison (errors against the quoted prices):");
    println!("{:>12} {:>10} {:>10} {:>12}", "Scenario", "BS RMSE", "JD RMSE", "JD - BS gap");
    for outcome in &report.outcomes {
        println!(
            "{:>12} {:>10.4} {:>10.4} {:>12.4}",
            outcome.name,
            outcome.black_scholes.rmse,
            outcome.jump_diffusion.rmse,
            outcome.delta.mean_price_gap
        );
    }

    Ok(())
}
