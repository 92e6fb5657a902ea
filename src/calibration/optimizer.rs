//! Bounded Levenberg-Marquardt least-squares solver.
//!
//! Minimises `||r(x)||²` over a box. Each run is an explicit state machine:
//!
//! ```text
//! Initializing -> Iterating -> Converged
//!                           -> MaxIterationsReached
//!                           -> TimedOut
//!                           -> NumericFailure
//! ```
//!
//! Steps solve the Marquardt-scaled normal equations
//! `(JᵀJ + μ·diag(JᵀJ)) δ = -Jᵀr` on the free variables and are projected
//! back onto the box. A variable sitting on a bound whose gradient points
//! outward is frozen for that iteration so that projection does not swallow
//! the whole step.

use crate::calibration::types::Termination;
use std::time::Instant;

/// Tuning knobs for one solver run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    /// Converged once an accepted step improves the objective by less than
    /// this relative amount.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Runs still iterating past this instant stop as `TimedOut`.
    pub deadline: Option<Instant>,
    /// Objective value treated as an exact fit.
    pub objective_floor: f64,
    pub initial_damping: f64,
    pub damping_up: f64,
    pub damping_down: f64,
    pub min_damping: f64,
    pub max_damping: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 200,
            deadline: None,
            objective_floor: 1e-24,
            initial_damping: 1e-3,
            damping_up: 10.0,
            damping_down: 0.1,
            min_damping: 1e-12,
            max_damping: 1e12,
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initializing,
    Iterating,
    Converged,
    MaxIterationsReached,
    TimedOut,
    NumericFailure,
}

impl OptimizerState {
    /// The terminal outcome, or `None` while the run is still live.
    pub fn termination(self) -> Option<Termination> {
        match self {
            OptimizerState::Initializing | OptimizerState::Iterating => None,
            OptimizerState::Converged => Some(Termination::Converged),
            OptimizerState::MaxIterationsReached => Some(Termination::MaxIterationsReached),
            OptimizerState::TimedOut => Some(Termination::TimedOut),
            OptimizerState::NumericFailure => Some(Termination::NumericFailure),
        }
    }
}

/// Final state of a solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params` (infinite after a numeric failure)
    pub objective: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Box-constrained Levenberg-Marquardt over a residual function.
pub struct BoundedLevenbergMarquardt<'a, F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    residuals: F,
    bounds: &'a [(f64, f64)],
    settings: LmSettings,
}

struct Run {
    state: OptimizerState,
    x: Vec<f64>,
    r: Vec<f64>,
    objective: f64,
    damping: f64,
    iterations: usize,
}

impl<'a, F> BoundedLevenbergMarquardt<'a, F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    pub fn new(residuals: F, bounds: &'a [(f64, f64)], settings: LmSettings) -> Self {
        Self {
            residuals,
            bounds,
            settings,
        }
    }

    /// Runs the state machine from `initial` (projected onto the box) to a
    /// terminal state.
    pub fn minimize(&self, initial: &[f64]) -> LmOutcome {
        let mut run = Run {
            state: OptimizerState::Initializing,
            x: self.project(initial),
            r: Vec::new(),
            objective: f64::INFINITY,
            damping: self.settings.initial_damping,
            iterations: 0,
        };

        loop {
            run.state = match run.state {
                OptimizerState::Initializing => self.initialize(&mut run),
                OptimizerState::Iterating => self.iterate(&mut run),
                _ => break,
            };
        }

        let termination = run
            .state
            .termination()
            .unwrap_or(Termination::NumericFailure);
        tracing::trace!(
            ?termination,
            iterations = run.iterations,
            objective = run.objective,
            "Levenberg-Marquardt run finished"
        );
        LmOutcome {
            params: run.x,
            objective: run.objective,
            iterations: run.iterations,
            termination,
        }
    }

    fn initialize(&self, run: &mut Run) -> OptimizerState {
        run.r = (self.residuals)(&run.x);
        run.objective = sum_of_squares(&run.r);
        if run.r.is_empty() || !run.objective.is_finite() {
            run.objective = f64::INFINITY;
            OptimizerState::NumericFailure
        } else if run.objective <= self.settings.objective_floor {
            OptimizerState::Converged
        } else {
            OptimizerState::Iterating
        }
    }

    fn iterate(&self, run: &mut Run) -> OptimizerState {
        if run.iterations >= self.settings.max_iterations {
            return OptimizerState::MaxIterationsReached;
        }
        if self.deadline_passed() {
            return OptimizerState::TimedOut;
        }
        run.iterations += 1;

        let jacobian = self.jacobian(&run.x);
        if jacobian.iter().flatten().any(|v| !v.is_finite()) {
            return OptimizerState::NumericFailure;
        }

        let n = run.x.len();
        let jtj = normal_matrix(&jacobian, n);
        let gradient = transpose_times(&jacobian, &run.r, n);

        let free: Vec<bool> = (0..n)
            .map(|i| {
                let (lo, hi) = self.bounds[i];
                let pinned_low = run.x[i] <= lo && gradient[i] > 0.0;
                let pinned_high = run.x[i] >= hi && gradient[i] < 0.0;
                lo < hi && !pinned_low && !pinned_high
            })
            .collect();
        if (0..n).all(|i| !free[i] || gradient[i] == 0.0) {
            return OptimizerState::Converged;
        }

        let max_diag = (0..n).map(|i| jtj[i][i]).fold(1.0f64, f64::max);
        let diag_floor = 1e-12 * max_diag;

        loop {
            let mut a = vec![vec![0.0; n]; n];
            let mut rhs = vec![0.0; n];
            for i in 0..n {
                if !free[i] {
                    a[i][i] = 1.0;
                    continue;
                }
                for j in 0..n {
                    if free[j] {
                        a[i][j] = jtj[i][j];
                    }
                }
                a[i][i] += run.damping * (jtj[i][i] + diag_floor);
                rhs[i] = -gradient[i];
            }

            if let Some(delta) = solve_cholesky(&a, &rhs) {
                let trial: Vec<f64> = run.x.iter().zip(&delta).map(|(x, d)| x + d).collect();
                let trial = self.project(&trial);
                if trial == run.x {
                    return OptimizerState::Converged;
                }

                let trial_r = (self.residuals)(&trial);
                let trial_objective = sum_of_squares(&trial_r);
                if trial_objective.is_finite() && trial_objective < run.objective {
                    let relative_change = (run.objective - trial_objective) / run.objective;
                    run.x = trial;
                    run.r = trial_r;
                    run.objective = trial_objective;
                    run.damping = (run.damping * self.settings.damping_down).max(self.settings.min_damping);
                    tracing::trace!(
                        iteration = run.iterations,
                        objective = run.objective,
                        relative_change,
                        damping = run.damping,
                        "accepted step"
                    );
                    return if relative_change < self.settings.tolerance
                        || run.objective <= self.settings.objective_floor
                    {
                        OptimizerState::Converged
                    } else {
                        OptimizerState::Iterating
                    };
                }
            }

            // Rejected (or singular) step: lean further towards gradient descent.
            run.damping *= self.settings.damping_up;
            if run.damping > self.settings.max_damping {
                // No descent step survives at machine precision: stationary.
                return OptimizerState::Converged;
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.settings
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn project(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.bounds)
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect()
    }

    /// Central-difference Jacobian, one-sided against a bound.
    fn jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
        let n = x.len();
        let mut columns = Vec::with_capacity(n);
        for j in 0..n {
            let (lo, hi) = self.bounds[j];
            let h = 1e-6 * x[j].abs().max(1e-2);
            let up = (x[j] + h).min(hi);
            let down = (x[j] - h).max(lo);
            if up <= down {
                columns.push(None);
                continue;
            }
            let mut x_up = x.to_vec();
            x_up[j] = up;
            let mut x_down = x.to_vec();
            x_down[j] = down;
            let r_up = (self.residuals)(&x_up);
            let r_down = (self.residuals)(&x_down);
            let width = up - down;
            columns.push(Some(
                r_up.iter()
                    .zip(&r_down)
                    .map(|(a, b)| (a - b) / width)
                    .collect::<Vec<f64>>(),
            ));
        }

        let m = columns
            .iter()
            .flatten()
            .map(|c| c.len())
            .next()
            .unwrap_or(0);
        let mut jacobian = vec![vec![0.0; n]; m];
        for (j, column) in columns.iter().enumerate() {
            if let Some(column) = column {
                for (i, value) in column.iter().enumerate().take(m) {
                    jacobian[i][j] = *value;
                }
            }
        }
        jacobian
    }
}

#[inline]
fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// JᵀJ for an m×n Jacobian stored row-major.
fn normal_matrix(jacobian: &[Vec<f64>], n: usize) -> Vec<Vec<f64>> {
    let mut jtj = vec![vec![0.0; n]; n];
    for row in jacobian {
        for i in 0..n {
            for j in 0..n {
                jtj[i][j] += row[i] * row[j];
            }
        }
    }
    jtj
}

/// Jᵀr.
fn transpose_times(jacobian: &[Vec<f64>], r: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for (row, ri) in jacobian.iter().zip(r) {
        for i in 0..n {
            out[i] += row[i] * ri;
        }
    }
    out
}

/// Solve Ax = b for symmetric positive definite A using Cholesky decomposition.
fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }

    // Lᵀ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }
    Some(x)
}
