// src/models/merton/calibrator.rs

//! Least-squares calibrator for the four jump-diffusion parameters
//! `[sigma, lambda, mu_j, sigma_j]` against a [`QuoteSet`].

use crate::calibration::config::{CalibrationOptions, Weighting};
use crate::calibration::pipeline::{MultiStartOutcome, RestartOutcome};
use crate::calibration::types::{
    CalibrationResult, ModelCalibrator, ParamBounds, QuoteSet, RestartSummary,
};
use crate::error::{MertonError, MertonResult};
use crate::model_params::ModelParams;
use crate::models::bs::bs_greeks;
use crate::models::merton::{price_unchecked, SeriesConfig};
use crate::models::types::ContractSpec;

/// Smallest vega weight relative to the mean, so deep wings still count.
const MIN_RELATIVE_VEGA_WEIGHT: f64 = 1e-3;

/// Calibrator for the Merton jump-diffusion model over a whole quote set
#[derive(Debug, Clone)]
pub struct MertonCalibrator {
    contracts: Vec<ContractSpec>,
    observed: Vec<f64>,
    weights: Vec<f64>,
    sqrt_weights: Vec<f64>,
    bounds: ParamBounds,
    param_bounds: Vec<(f64, f64)>,
    series: SeriesConfig,
}

impl MertonCalibrator {
    /// Validates `quotes` and `bounds` and converts every observation to a
    /// premium.
    ///
    /// `reference_sigma` is the Black-Scholes vol used for vega weights when
    /// a quoted price cannot be inverted to an implied vol.
    pub fn new(
        quotes: &QuoteSet,
        bounds: ParamBounds,
        options: &CalibrationOptions,
        reference_sigma: f64,
    ) -> MertonResult<Self> {
        if quotes.is_empty() {
            return Err(MertonError::validation("quote set is empty"));
        }
        quotes.validate()?;
        bounds.validate()?;

        let mut contracts = Vec::with_capacity(quotes.len());
        let mut observed = Vec::with_capacity(quotes.len());
        for (i, quote) in quotes.quotes.iter().enumerate() {
            let price = quotes
                .observed_price(quote)
                .map_err(|e| MertonError::validation(format!("quote {}: {}", i, e)))?;
            contracts.push(quotes.contract_for(quote));
            observed.push(price);
        }

        let weights = match options.weighting {
            Weighting::Uniform => vec![1.0; contracts.len()],
            Weighting::Vega => vega_weights(quotes, &contracts, reference_sigma),
        };
        let sqrt_weights = weights.iter().map(|w| w.sqrt()).collect();

        tracing::debug!(
            quotes = contracts.len(),
            weighting = ?options.weighting,
            "prepared jump-diffusion calibrator"
        );

        Ok(Self {
            contracts,
            observed,
            weights,
            sqrt_weights,
            param_bounds: bounds.to_vec(),
            bounds,
            series: options.series,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Model price of every quote at `params`, and whether any of them hit
    /// the series term cap.
    pub fn model_prices(&self, params: &ModelParams) -> (Vec<f64>, bool) {
        let mut low_confidence = false;
        let prices = self
            .contracts
            .iter()
            .map(|c| {
                let p = price_unchecked(c, params, &self.series);
                low_confidence |= p.low_confidence;
                p.price
            })
            .collect();
        (prices, low_confidence)
    }

    /// Weighted sum of squared pricing errors at `params`, without projecting
    /// onto the bounds.
    pub fn objective_at(&self, params: &ModelParams) -> f64 {
        self.contracts
            .iter()
            .zip(&self.observed)
            .zip(&self.weights)
            .map(|((c, o), w)| {
                let r = price_unchecked(c, params, &self.series).price - o;
                w * r * r
            })
            .sum()
    }

    /// Assembles the public result from the multi-start outcome and an
    /// optional polished point `(objective, x)`.
    pub fn build_result(
        &self,
        outcome: &MultiStartOutcome,
        polished: Option<(f64, Vec<f64>)>,
    ) -> CalibrationResult {
        let best = &outcome.best.outcome;
        let (objective, x) = polished.unwrap_or_else(|| (best.objective, best.params.clone()));
        let params = self.bounds.clamp(&ModelParams::from_slice(&x));
        let (prices, low_confidence) = self.model_prices(&params);
        if low_confidence {
            tracing::warn!("calibrated parameters hit the series term cap on some quotes");
        }

        CalibrationResult {
            params,
            objective,
            converged: outcome.converged,
            iterations: best.iterations,
            residuals: prices
                .iter()
                .zip(&self.observed)
                .map(|(m, o)| m - o)
                .collect(),
            weights: self.weights.clone(),
            termination: best.termination,
            restarts_converged: outcome.converged_count,
            restarts: outcome.restarts.iter().map(summarize).collect(),
            low_confidence,
        }
    }
}

fn summarize(restart: &RestartOutcome) -> RestartSummary {
    RestartSummary {
        index: restart.index,
        initial: ModelParams::from_slice(&restart.initial),
        params: ModelParams::from_slice(&restart.outcome.params),
        objective: restart.outcome.objective,
        iterations: restart.outcome.iterations,
        termination: restart.outcome.termination,
    }
}

/// Black-Scholes vega at each quote's implied vol, normalised to mean one.
fn vega_weights(quotes: &QuoteSet, contracts: &[ContractSpec], reference_sigma: f64) -> Vec<f64> {
    let raw: Vec<f64> = quotes
        .quotes
        .iter()
        .zip(contracts)
        .map(|(quote, c)| {
            let vol = quotes.observed_implied_vol(quote).unwrap_or_else(|e| {
                tracing::debug!(strike = c.strike, maturity = c.maturity, error = %e, "falling back to reference vol for vega weight");
                reference_sigma
            });
            bs_greeks(c.option_type, c.spot, c.strike, c.rate, c.dividend_yield, vol, c.maturity).vega
        })
        .collect();

    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    if !(mean.is_finite() && mean > 0.0) {
        tracing::warn!("vega weights degenerate, using uniform weights");
        return vec![1.0; raw.len()];
    }
    raw.iter()
        .map(|v| (v / mean).max(MIN_RELATIVE_VEGA_WEIGHT))
        .collect()
}

impl ModelCalibrator for MertonCalibrator {
    fn model_name(&self) -> &str {
        "merton"
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["sigma", "lambda", "mu_j", "sigma_j"]
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        if x.len() != 4 || x.iter().any(|v| !v.is_finite()) {
            return vec![f64::NAN; self.contracts.len()];
        }
        let params = self.bounds.clamp(&ModelParams::from_slice(x));
        self.contracts
            .iter()
            .zip(&self.observed)
            .zip(&self.sqrt_weights)
            .map(|((c, o), sw)| sw * (price_unchecked(c, &params, &self.series).price - o))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::types::MarketQuote;
    use crate::models::types::OptionType;

    fn quotes(params: &ModelParams) -> QuoteSet {
        let mut qs = QuoteSet::new(100.0, 0.03, 0.0, Vec::new());
        for &t in &[0.5, 1.0] {
            for &k in &[90.0, 100.0, 110.0] {
                let ot = if k < 100.0 { OptionType::Put } else { OptionType::Call };
                let c = ContractSpec::new(100.0, k, 0.03, 0.0, t, ot).unwrap();
                let p = price_unchecked(&c, params, &SeriesConfig::default()).price;
                qs.quotes.push(MarketQuote::with_price(k, t, ot, p));
            }
        }
        qs
    }

    #[test]
    fn test_residuals_vanish_at_true_params() {
        let truth = ModelParams::new(0.2, 0.5, -0.1, 0.15).unwrap();
        let cal = MertonCalibrator::new(
            &quotes(&truth),
            ParamBounds::default(),
            &CalibrationOptions::default(),
            0.2,
        )
        .unwrap();
        assert_eq!(cal.param_count(), 4);
        assert_eq!(cal.param_names(), vec!["sigma", "lambda", "mu_j", "sigma_j"]);
        assert!(cal.evaluate_objective(&truth.to_vec()) < 1e-24);
        assert!(cal.evaluate_objective(&[0.3, 0.5, -0.1, 0.15]) > 1e-2);
        assert!(cal.evaluate_objective(&[f64::NAN, 0.5, -0.1, 0.15]).is_nan());
    }

    #[test]
    fn test_vega_weights_have_unit_mean() {
        let truth = ModelParams::new(0.2, 0.5, -0.1, 0.15).unwrap();
        let options = CalibrationOptions {
            weighting: Weighting::Vega,
            ..CalibrationOptions::default()
        };
        let cal = MertonCalibrator::new(&quotes(&truth), ParamBounds::default(), &options, 0.2).unwrap();
        let mean = cal.weights().iter().sum::<f64>() / cal.weights().len() as f64;
        assert!((mean - 1.0).abs() < 1e-2);
        assert!(cal.weights().iter().all(|w| *w > 0.0));
    }

    #[test]
    fn test_rejects_empty_and_non_finite_quotes() {
        let empty = QuoteSet::new(100.0, 0.03, 0.0, Vec::new());
        let opts = CalibrationOptions::default();
        assert!(matches!(
            MertonCalibrator::new(&empty, ParamBounds::default(), &opts, 0.2),
            Err(MertonError::Validation(_))
        ));

        let nan = QuoteSet::new(
            100.0,
            0.03,
            0.0,
            vec![MarketQuote::with_price(100.0, 0.5, OptionType::Call, f64::NAN)],
        );
        assert!(matches!(
            MertonCalibrator::new(&nan, ParamBounds::default(), &opts, 0.2),
            Err(MertonError::Validation(_))
        ));
    }
}
