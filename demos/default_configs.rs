use merton_lib::{
    calibrate, default_configs, CalibrationOptions, MarketQuote, ModelParams, OptionType,
    ParamBounds, QuoteSet,
};

fn describe(name: &str, options: &CalibrationOptions) {
    println!(
        "{}: restarts={} tolerance={:e} max_iterations={} timeout={}s weighting={:?} polish={} series=({:e}, {})",
        name,
        options.max_restarts,
        options.tolerance,
        options.max_iterations,
        options.timeout_seconds,
        options.weighting,
        options.lbfgsb_polish,
        options.series.tolerance,
        options.series.max_terms
    );
}

fn main() {
    // Example quotes (minimal example)
    let quotes = QuoteSet::new(
        100.0,
        0.03,
        0.0,
        vec![
            MarketQuote::with_implied_vol(90.0, 0.25, OptionType::Put, 0.26),
            MarketQuote::with_implied_vol(100.0, 0.25, OptionType::Call, 0.21),
            MarketQuote::with_implied_vol(110.0, 0.25, OptionType::Call, 0.19),
            MarketQuote::with_implied_vol(90.0, 1.0, OptionType::Put, 0.24),
            MarketQuote::with_implied_vol(100.0, 1.0, OptionType::Call, 0.21),
            MarketQuote::with_implied_vol(110.0, 1.0, OptionType::Call, 0.20),
        ],
    );

    println!("Merton-lib Default Configuration Examples\n");
    describe("production", &default_configs::production());
    describe("fast", &default_configs::fast());
    describe("research", &default_configs::research());
    describe("minimal", &default_configs::minimal());

    // Options can also come from a TOML document; absent keys keep their defaults
    let from_toml = CalibrationOptions::from_toml_str(
        r#"
        max_restarts = 6
        weighting = "vega"
        timeout_seconds = 2.5

        [series]
        tolerance = 1e-12
        "#,
    );
    match &from_toml {
        Ok(options) => describe("toml", options),
        Err(e) => eprintln!("invalid options: {:#}", e),
    }

    let guess = match ModelParams::new(0.2, 0.5, -0.1, 0.1) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    println!();
    for (name, options) in [
        ("fast", default_configs::fast()),
        ("minimal", default_configs::minimal()),
    ] {
        match calibrate(&quotes, &guess, ParamBounds::default(), &options) {
            Ok(result) => println!(
                "{:>8}: converged={} objective={:.3e} sigma={:.4} lambda={:.4} mu_j={:.4} sigma_j={:.4}",
                name,
                result.converged,
                result.objective,
                result.params.sigma,
                result.params.lambda,
                result.params.mu_j,
                result.params.sigma_j
            ),
            Err(e) => eprintln!("{:>8}: calibration failed: {}", name, e),
        }
    }
}
