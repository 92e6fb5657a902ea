// demos/pricing_demo.rs

//! Black-Scholes versus Merton jump-diffusion pricing
//!
//! This demo shows how to:
//! 1. Price a strike ladder under both models
//! 2. Read the Greeks and the series truncation diagnostics
//! 3. Recover the Black-Scholes implied volatility of jump-diffusion prices

use anyhow::Result;
use merton_lib::{
    implied_volatility, price_black_scholes, price_jump_diffusion, ContractSpec, ModelParams,
    OptionType, SeriesConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Jump-Diffusion Pricing Demo");
    println!("===========================");

    let params = ModelParams::new(0.2, 1.0, -0.05, 0.1)?;
    let series = SeriesConfig::default();
    println!(
        "Parameters: sigma={} lambda={} mu_j={} sigma_j={}",
        params.sigma, params.lambda, params.mu_j, params.sigma_j
    );
    println!("Risk-neutral jump intensity: {:.4}\n", params.risk_neutral_intensity());

    println!(
        "{:>6} {:>5} {:>10} {:>10} {:>8} {:>8} {:>8} {:>6}",
        "Strike", "Type", "BS", "Merton", "Delta", "Vega", "IV", "Terms"
    );
    for strike in [80.0, 90.0, 100.0, 110.0, 120.0] {
        let option_type = if strike < 100.0 { OptionType::Put } else { OptionType::Call };
        let contract = ContractSpec::new(100.0, strike, 0.03, 0.0, 0.5, option_type)?;

        let bs = price_black_scholes(&contract, params.sigma)?;
        let jd = price_jump_diffusion(&contract, &params, &series)?;
        let iv = implied_volatility(&contract, jd.price)?;

        println!(
            "{:>6.0} {:>5} {:>10.4} {:>10.4} {:>8.4} {:>8.4} {:>7.2}% {:>6}{}",
            strike,
            option_type,
            bs.price,
            jd.price,
            jd.greeks.delta,
            jd.greeks.vega,
            iv * 100.0,
            jd.terms_used,
            if jd.low_confidence { " (capped)" } else { "" }
        );
    }

    let atm = ContractSpec::call(100.0, 100.0, 0.03, 0.0, 0.5)?;
    let g = price_jump_diffusion(&atm, &params, &series)?.greeks;
    println!(
        "\nATM call Greeks: delta={:.4} gamma={:.5} vega={:.4} theta={:.4} rho={:.4}",
        g.delta, g.gamma, g.vega, g.theta, g.rho
    );

    Ok(())
}
