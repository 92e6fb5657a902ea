use crate::calibration::config::CalibrationOptions;
use crate::calibration::optimizer::{BoundedLevenbergMarquardt, LmOutcome, LmSettings};
use crate::calibration::types::{ModelCalibrator, Termination};
use crate::error::{MertonError, MertonResult};
use cmaes_lbfgsb::lbfgsb_optimize::lbfgsb_optimize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

/// One local-optimizer run and where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartOutcome {
    pub index: usize,
    pub initial: Vec<f64>,
    pub outcome: LmOutcome,
}

/// Every restart plus the one selected as the calibration answer.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStartOutcome {
    pub best: RestartOutcome,
    /// Whether `best` met the convergence criterion
    pub converged: bool,
    pub converged_count: usize,
    pub restarts: Vec<RestartOutcome>,
}

/// Starting points: `initial` projected onto the bounds, then uniform draws
/// inside the bounds until `count` points exist.
pub fn sample_starts(
    bounds: &[(f64, f64)],
    initial: &[f64],
    count: usize,
    seed: Option<u64>,
) -> Vec<Vec<f64>> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut starts = Vec::with_capacity(count);
    if count == 0 {
        return starts;
    }
    starts.push(
        initial
            .iter()
            .zip(bounds)
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect(),
    );
    while starts.len() < count {
        starts.push(
            bounds
                .iter()
                .map(|(lo, hi)| rng.gen_range(*lo..=*hi))
                .collect(),
        );
    }
    starts
}

fn run_restart(
    model: &dyn ModelCalibrator,
    index: usize,
    initial: Vec<f64>,
    options: &CalibrationOptions,
) -> RestartOutcome {
    // The budget starts when a worker picks the restart up, not when it is queued.
    let settings = LmSettings {
        tolerance: options.tolerance,
        max_iterations: options.max_iterations,
        deadline: Some(Instant::now() + options.timeout()),
        ..LmSettings::default()
    };
    let residuals = |x: &[f64]| model.residuals(x);
    let outcome = BoundedLevenbergMarquardt::new(residuals, model.param_bounds(), settings)
        .minimize(&initial);

    match outcome.termination {
        Termination::TimedOut => tracing::warn!(
            restart = index,
            iterations = outcome.iterations,
            timeout_seconds = options.timeout_seconds,
            "restart timed out"
        ),
        termination => tracing::debug!(
            restart = index,
            ?termination,
            iterations = outcome.iterations,
            objective = outcome.objective,
            "restart finished"
        ),
    }

    RestartOutcome {
        index,
        initial,
        outcome,
    }
}

/// Runs the local optimizer from every start and selects the answer.
///
/// Restarts are independent; with `options.parallel` they run on the rayon
/// pool. The lowest-objective converged restart wins. When none converged
/// the lowest finite objective is returned with `converged = false`. Only
/// when every restart failed numerically is an error returned.
pub fn calibrate_multi_start(
    model: &dyn ModelCalibrator,
    starts: Vec<Vec<f64>>,
    options: &CalibrationOptions,
) -> MertonResult<MultiStartOutcome> {
    if starts.is_empty() {
        return Err(MertonError::calibration("no starting points supplied"));
    }
    let total = starts.len();

    let restarts: Vec<RestartOutcome> = if options.parallel {
        starts
            .into_par_iter()
            .enumerate()
            .map(|(index, initial)| run_restart(model, index, initial, options))
            .collect()
    } else {
        starts
            .into_iter()
            .enumerate()
            .map(|(index, initial)| run_restart(model, index, initial, options))
            .collect()
    };

    let usable = |r: &&RestartOutcome| {
        r.outcome.termination != Termination::NumericFailure && r.outcome.objective.is_finite()
    };
    let converged_count = restarts
        .iter()
        .filter(|r| r.outcome.termination.is_converged())
        .count();

    let best_converged = restarts
        .iter()
        .filter(usable)
        .filter(|r| r.outcome.termination.is_converged())
        .min_by(|a, b| a.outcome.objective.total_cmp(&b.outcome.objective));
    let (best, converged) = match best_converged {
        Some(best) => (best.clone(), true),
        None => {
            let fallback = restarts
                .iter()
                .filter(usable)
                .min_by(|a, b| a.outcome.objective.total_cmp(&b.outcome.objective))
                .ok_or_else(|| {
                    MertonError::calibration(format!(
                        "all {} restarts of the {} calibration failed numerically",
                        total,
                        model.model_name()
                    ))
                })?;
            tracing::warn!(
                restarts = total,
                objective = fallback.outcome.objective,
                "no restart converged; returning best non-converged result"
            );
            (fallback.clone(), false)
        }
    };

    let named_params = model
        .param_names()
        .iter()
        .zip(&best.outcome.params)
        .map(|(name, value)| format!("{}={:.6}", name, value))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(
        model = model.model_name(),
        restart = best.index,
        params = %named_params,
        objective = best.outcome.objective,
        converged,
        converged_count,
        restarts = total,
        "selected calibration restart"
    );

    Ok(MultiStartOutcome {
        best,
        converged,
        converged_count,
        restarts,
    })
}

/// Refines `start` with bounded L-BFGS-B and returns the refined point only
/// if it lowers the objective.
pub fn polish_with_lbfgsb(
    model: &dyn ModelCalibrator,
    start: &[f64],
    start_objective: f64,
    options: &CalibrationOptions,
) -> Option<(f64, Vec<f64>)> {
    let bounds = model.param_bounds();
    let obj_fn = |x: &[f64]| model.evaluate_objective(x);

    let mut refined_solution = start.to_vec();
    let refine_res = lbfgsb_optimize(
        &mut refined_solution,
        bounds,
        &obj_fn,
        options.lbfgsb_max_iterations,
        options.tolerance,
        Some(|_current_x: &[f64], current_obj: f64| {
            tracing::trace!(objective = current_obj, "L-BFGS-B iteration");
        }),
        None,
    );

    match refine_res {
        Ok((_, loc_sol)) => {
            // Re-evaluate inside the box rather than trusting the reported value.
            let projected: Vec<f64> = loc_sol
                .iter()
                .zip(bounds)
                .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
                .collect();
            let loc_obj = model.evaluate_objective(&projected);
            if loc_obj.is_finite() && loc_obj < start_objective {
                tracing::debug!(
                    before = start_objective,
                    after = loc_obj,
                    "L-BFGS-B improved objective"
                );
                Some((loc_obj, projected))
            } else {
                tracing::debug!("L-BFGS-B did not improve objective, keeping local solution");
                None
            }
        }
        Err(e) => {
            tracing::debug!(error = ?e, "L-BFGS-B failed, keeping local solution");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quadratic bowl with minimum at `target`, optionally poisoned.
    struct Bowl {
        target: Vec<f64>,
        bounds: Vec<(f64, f64)>,
        poisoned: bool,
    }

    impl ModelCalibrator for Bowl {
        fn model_name(&self) -> &str {
            "bowl"
        }

        fn param_names(&self) -> Vec<&str> {
            vec!["x", "y"]
        }

        fn param_bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }

        fn residuals(&self, x: &[f64]) -> Vec<f64> {
            if self.poisoned {
                return vec![f64::NAN; 2];
            }
            x.iter().zip(&self.target).map(|(a, b)| a - b).collect()
        }
    }

    fn bowl(poisoned: bool) -> Bowl {
        Bowl {
            target: vec![0.3, -0.2],
            bounds: vec![(-1.0, 1.0), (-1.0, 1.0)],
            poisoned,
        }
    }

    #[test]
    fn test_sample_starts_deterministic_and_in_bounds() {
        let bounds = [(0.01, 1.0), (0.0, 5.0)];
        let a = sample_starts(&bounds, &[2.0, 1.0], 6, Some(7));
        let b = sample_starts(&bounds, &[2.0, 1.0], 6, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert_eq!(a[0], vec![1.0, 1.0]);
        for start in &a {
            for (v, (lo, hi)) in start.iter().zip(&bounds) {
                assert!(*v >= *lo && *v <= *hi);
            }
        }
    }

    #[test]
    fn test_multi_start_selects_converged_minimum() {
        let model = bowl(false);
        let starts = sample_starts(model.param_bounds(), &[0.9, 0.9], 4, Some(1));
        let options = CalibrationOptions {
            parallel: false,
            ..CalibrationOptions::default()
        };
        let out = calibrate_multi_start(&model, starts, &options).unwrap();
        assert!(out.converged);
        assert_eq!(out.converged_count, 4);
        assert!((out.best.outcome.params[0] - 0.3).abs() < 1e-8);
        assert!((out.best.outcome.params[1] + 0.2).abs() < 1e-8);
    }

    #[test]
    fn test_all_restarts_failing_is_an_error() {
        let model = bowl(true);
        let starts = sample_starts(model.param_bounds(), &[0.0, 0.0], 3, Some(1));
        let err = calibrate_multi_start(&model, starts, &CalibrationOptions::default()).unwrap_err();
        assert!(matches!(err, MertonError::Calibration(_)));
    }

    #[test]
    fn test_non_converged_fallback() {
        let model = bowl(false);
        let starts = sample_starts(model.param_bounds(), &[0.9, 0.9], 2, Some(3));
        let options = CalibrationOptions {
            max_iterations: 1,
            tolerance: 1e-300,
            parallel: false,
            ..CalibrationOptions::default()
        };
        let out = calibrate_multi_start(&model, starts, &options).unwrap();
        assert!(!out.converged);
        assert_eq!(out.converged_count, 0);
        assert!(out.best.outcome.objective.is_finite());
    }
}
