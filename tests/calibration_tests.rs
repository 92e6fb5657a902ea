
use merton_lib::{
    calibrate, evaluate_objective, CalibrationOptions, MarketQuote, MertonError, ModelParams,
    OptionType, ParamBounds, QuoteSet, Termination, Weighting,
};
use merton_lib::calibration::pipeline::calibrate_multi_start;
use merton_lib::calibration::types::ModelCalibrator;
use std::time::Duration;
use test_utils::{
    create_test_options, relative_error, synthetic_iv_quotes, synthetic_quotes, true_params,
};

fn initial_guess() -> ModelParams {
    ModelParams::new(0.25, 0.3, -0.05, 0.2).unwrap()
}

fn assert_recovers_truth(params: &ModelParams) {
    let truth = true_params();
    assert!(relative_error(params.sigma, truth.sigma) < 0.05, "sigma {}", params.sigma);
    assert!(relative_error(params.lambda, truth.lambda) < 0.05, "lambda {}", params.lambda);
    assert!(relative_error(params.mu_j, truth.mu_j) < 0.05, "mu_j {}", params.mu_j);
    assert!(relative_error(params.sigma_j, truth.sigma_j) < 0.05, "sigma_j {}", params.sigma_j);
}

/// Synthetic quotes from known parameters must be fitted back to them.
#[test]
fn test_calibration_round_trip() {
    let quotes = synthetic_quotes(&true_params());
    let result = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &create_test_options())
        .expect("calibration runs");

    println!(
        "fitted sigma={:.6} lambda={:.6} mu_j={:.6} sigma_j={:.6} objective={:.3e}",
        result.params.sigma, result.params.lambda, result.params.mu_j, result.params.sigma_j,
        result.objective
    );

    assert!(result.converged);
    assert_eq!(result.termination, Termination::Converged);
    assert_recovers_truth(&result.params);
    assert!(result.objective < 1e-12);
    assert!(result.rmse() < 1e-5);
    assert_eq!(result.residuals.len(), quotes.len());
    assert_eq!(result.weights, vec![1.0; quotes.len()]);
    assert_eq!(result.restarts.len(), 4);
    assert!(result.restarts_converged >= 1);
    assert!(!result.low_confidence);
    assert!(ParamBounds::default().contains(&result.params));
}

#[test]
fn test_calibration_from_implied_vol_quotes() {
    let quotes = synthetic_iv_quotes(&true_params());
    let result = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &create_test_options())
        .unwrap();
    assert!(result.converged);
    assert_recovers_truth(&result.params);
}

#[test]
fn test_vega_weighted_calibration() {
    let quotes = synthetic_quotes(&true_params());
    let options = CalibrationOptions {
        weighting: Weighting::Vega,
        ..create_test_options()
    };
    let result = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &options).unwrap();
    assert!(result.converged);
    assert_recovers_truth(&result.params);
    assert!(result.weights.iter().all(|w| *w > 0.0));
    assert!(result.weights.iter().any(|w| (*w - 1.0).abs() > 1e-3));
}

#[test]
fn test_sequential_and_parallel_restarts_agree() {
    let quotes = synthetic_quotes(&true_params());
    let parallel = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &create_test_options())
        .unwrap();
    let sequential_options = CalibrationOptions {
        parallel: false,
        ..create_test_options()
    };
    let sequential =
        calibrate(&quotes, &initial_guess(), ParamBounds::default(), &sequential_options).unwrap();
    assert_eq!(parallel.params, sequential.params);
    assert_eq!(parallel.restarts, sequential.restarts);
}

#[test]
fn test_first_restart_starts_from_clamped_guess() {
    let quotes = synthetic_quotes(&true_params());
    let outside = ModelParams::new(3.0, 0.3, -0.05, 0.2).unwrap();
    let result = calibrate(&quotes, &outside, ParamBounds::default(), &create_test_options()).unwrap();
    assert_eq!(result.restarts[0].index, 0);
    assert_eq!(result.restarts[0].initial.sigma, 1.0);
    for restart in &result.restarts {
        assert!(ParamBounds::default().contains(&restart.initial));
    }
}

#[test]
fn test_iteration_cap_returns_non_converged_result() {
    let quotes = synthetic_quotes(&true_params());
    let options = CalibrationOptions {
        max_iterations: 1,
        tolerance: 1e-14,
        lbfgsb_polish: false,
        ..create_test_options()
    };
    let result = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &options).unwrap();
    assert!(!result.converged);
    assert_eq!(result.restarts_converged, 0);
    assert!(result.objective.is_finite());
    assert!(result
        .restarts
        .iter()
        .all(|r| r.termination == Termination::MaxIterationsReached));
}

#[test]
fn test_invalid_inputs_rejected() {
    let options = create_test_options();
    let empty = QuoteSet::new(100.0, 0.03, 0.0, Vec::new());
    assert!(matches!(
        calibrate(&empty, &initial_guess(), ParamBounds::default(), &options),
        Err(MertonError::Validation(_))
    ));

    let nan_quotes = QuoteSet::new(
        100.0,
        0.03,
        0.0,
        vec![
            MarketQuote::with_price(100.0, 0.5, OptionType::Call, f64::NAN),
            MarketQuote::with_price(110.0, 0.5, OptionType::Call, f64::NAN),
        ],
    );
    assert!(matches!(
        calibrate(&nan_quotes, &initial_guess(), ParamBounds::default(), &options),
        Err(MertonError::Validation(_))
    ));

    let quotes = synthetic_quotes(&true_params());
    let bad_options = CalibrationOptions {
        max_restarts: 0,
        ..options.clone()
    };
    assert!(matches!(
        calibrate(&quotes, &initial_guess(), ParamBounds::default(), &bad_options),
        Err(MertonError::Config(_))
    ));

    let bad_bounds = ParamBounds {
        sigma: (0.0, 1.0),
        ..ParamBounds::default()
    };
    assert!(matches!(
        calibrate(&quotes, &initial_guess(), bad_bounds, &options),
        Err(MertonError::Validation(_))
    ));

    let bad_guess = ModelParams {
        lambda: -1.0,
        ..initial_guess()
    };
    assert!(calibrate(&quotes, &bad_guess, ParamBounds::default(), &options).is_err());
}

#[test]
fn test_objective_evaluation() {
    let quotes = synthetic_quotes(&true_params());
    let options = CalibrationOptions::default();
    let at_truth = evaluate_objective(&quotes, &true_params(), &options).unwrap();
    let off = evaluate_objective(&quotes, &initial_guess(), &options).unwrap();
    assert!(at_truth < 1e-20);
    assert!(off > 1e-3);
}

#[test]
fn test_options_from_toml_drive_calibration() {
    let options = CalibrationOptions::from_toml_str(
        r#"
        max_restarts = 2
        tolerance = 1e-10
        timeout_seconds = 30.0
        weighting = "uniform"
        parallel = false
        "#,
    )
    .unwrap();
    let quotes = synthetic_quotes(&true_params());
    let result = calibrate(&quotes, &initial_guess(), ParamBounds::default(), &options).unwrap();
    assert_eq!(result.restarts.len(), 2);
    assert!(result.converged);
    assert_recovers_truth(&result.params);
}

/// Tilted double well in x with minima near ±0.5; the one near -0.5 is only
/// local. Residual evaluations with x > 0.2 are slow.
struct SlowRightWell {
    bounds: Vec<(f64, f64)>,
    delay: Duration,
}

impl ModelCalibrator for SlowRightWell {
    fn model_name(&self) -> &str {
        "slow-right-well"
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["x", "y"]
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        if x[0] > 0.2 {
            std::thread::sleep(self.delay);
        }
        vec![x[0] * x[0] - 0.25, 0.1 * (x[0] - 0.5), x[1] - 0.1]
    }
}

#[test]
fn test_timed_out_restart_excluded_from_selection() {
    let model = SlowRightWell {
        bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
        delay: Duration::from_millis(120),
    };
    // Restart 0 starts close to the global minimum but cannot finish one
    // iteration inside the budget; restart 1 settles in the local well.
    let starts = vec![vec![0.45, 0.1], vec![-0.9, 0.1]];
    let options = CalibrationOptions {
        timeout_seconds: 0.05,
        parallel: false,
        ..CalibrationOptions::default()
    };
    let out = calibrate_multi_start(&model, starts, &options).unwrap();

    let slow = &out.restarts[0].outcome;
    assert_eq!(slow.termination, Termination::TimedOut);
    assert!(!slow.termination.is_converged());
    assert!(slow.objective.is_finite());

    let fast = &out.restarts[1].outcome;
    assert_eq!(fast.termination, Termination::Converged);
    assert!(fast.params[0] < 0.0);

    // The timed-out point has the lower objective yet is not selected
    assert!(slow.objective < fast.objective);
    assert!(out.converged);
    assert_eq!(out.converged_count, 1);
    assert_eq!(out.best.index, 1);
    println!(
        "timed out at {:.4e}, selected local minimum {:.4e}",
        slow.objective, out.best.outcome.objective
    );
}
