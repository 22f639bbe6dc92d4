//! Numerical solvers shared by the curve-fit families
//!
//! - `levenberg_marquardt` - bounded nonlinear least squares, numeric Jacobian
//! - `secant` - scalar root search
//! - `solve_linear` - Gaussian elimination with partial pivoting
//! - `linear_regression` / `polynomial_least_squares` - closed-form fits

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{EngineError, EngineResult};

/// Iteration budgets and tolerances for the solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Relative SSE decrease / step size below which LM stops.
    pub tolerance: f64,
    pub initial_damping: f64,
    pub secant_max_iterations: usize,
    /// Absolute residual accepted as a root.
    pub secant_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_damping: 1e-3,
            secant_max_iterations: 100,
            secant_tolerance: 1e-9,
        }
    }
}

/// Converged least-squares solution.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquares {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Damping above which no downhill step exists at machine precision.
const MAX_DAMPING: f64 = 1e16;

fn sum_squared_residuals<F>(x: &[f64], y: &[f64], params: &[f64], model: &F) -> f64
where
    F: Fn(f64, &[f64]) -> f64,
{
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - model(xi, params);
            r * r
        })
        .sum()
}

fn clamp_to(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (p, &(lo, hi)) in params.iter_mut().zip(bounds) {
        *p = p.clamp(lo, hi);
    }
}

/// Forward-difference Jacobian of the model, stepping inward at an upper bound.
fn jacobian<F>(x: &[f64], params: &[f64], bounds: &[(f64, f64)], model: &F) -> Vec<Vec<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let base: Vec<f64> = x.iter().map(|&xi| model(xi, params)).collect();
    let mut columns = Vec::with_capacity(params.len());
    for j in 0..params.len() {
        let mut h = f64::EPSILON.sqrt() * params[j].abs().max(1e-6);
        if params[j] + h > bounds[j].1 {
            h = -h;
        }
        let mut shifted = params.to_vec();
        shifted[j] += h;
        columns.push(
            x.iter()
                .zip(&base)
                .map(|(&xi, &f0)| (model(xi, &shifted) - f0) / h)
                .collect(),
        );
    }
    columns
}

/// Bounded Levenberg-Marquardt minimisation of `Σ (y - model(x, p))²`.
///
/// `bounds[j]` is the closed interval for parameter `j`; steps are projected
/// onto the box. Fails with `ConvergenceError` when the iteration budget is
/// exhausted or the model produces non-finite values.
pub fn levenberg_marquardt<F>(
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    bounds: &[(f64, f64)],
    model: F,
    settings: &SolverSettings,
) -> EngineResult<LeastSquares>
where
    F: Fn(f64, &[f64]) -> f64,
{
    if x.len() != y.len() || initial.len() != bounds.len() {
        return Err(EngineError::numeric("least squares inputs differ in length"));
    }
    if x.len() < initial.len() {
        return Err(EngineError::numeric(format!(
            "{} samples cannot determine {} parameters",
            x.len(),
            initial.len()
        )));
    }

    let mut params = initial.to_vec();
    clamp_to(&mut params, bounds);
    let mut sse = sum_squared_residuals(x, y, &params, &model);
    if !sse.is_finite() {
        return Err(EngineError::convergence("model is not finite at the initial guess"));
    }

    let floor = f64::EPSILON * y.iter().map(|v| v * v).sum::<f64>();
    let mut damping = settings.initial_damping;
    let m = params.len();

    for iteration in 0..settings.max_iterations {
        if sse <= floor {
            return Ok(LeastSquares { params, sse, iterations: iteration });
        }

        let jac = jacobian(x, &params, bounds, &model);
        if jac.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EngineError::convergence("model Jacobian is not finite"));
        }
        let residuals: Vec<f64> = x.iter().zip(y).map(|(&xi, &yi)| yi - model(xi, &params)).collect();

        // Normal equations JᵀJ δ = Jᵀr
        let mut jtj = vec![vec![0.0; m]; m];
        let mut jtr = vec![0.0; m];
        for a in 0..m {
            jtr[a] = jac[a].iter().zip(&residuals).map(|(j, r)| j * r).sum();
            for b in 0..m {
                jtj[a][b] = jac[a].iter().zip(&jac[b]).map(|(u, v)| u * v).sum();
            }
        }

        let mut accepted = None;
        while damping <= MAX_DAMPING {
            let mut damped = jtj.clone();
            for (k, row) in damped.iter_mut().enumerate() {
                row[k] += damping * jtj[k][k].max(1e-12);
            }
            if let Ok(step) = solve_linear(damped, jtr.clone()) {
                let mut trial: Vec<f64> = params.iter().zip(&step).map(|(p, s)| p + s).collect();
                clamp_to(&mut trial, bounds);
                let trial_sse = sum_squared_residuals(x, y, &trial, &model);
                if trial_sse.is_finite() && trial_sse < sse {
                    accepted = Some((trial, trial_sse));
                    damping = (damping / 10.0).max(1e-15);
                    break;
                }
            }
            damping *= 10.0;
        }

        let Some((trial, trial_sse)) = accepted else {
            debug!(iteration, sse, "levenberg-marquardt reached a stationary point");
            return Ok(LeastSquares { params, sse, iterations: iteration });
        };

        let small_step = trial
            .iter()
            .zip(&params)
            .all(|(new, old)| (new - old).abs() <= settings.tolerance * (old.abs() + settings.tolerance));
        let small_gain = sse - trial_sse <= settings.tolerance * sse;
        params = trial;
        sse = trial_sse;
        if small_step || small_gain {
            return Ok(LeastSquares { params, sse, iterations: iteration + 1 });
        }
    }

    Err(EngineError::convergence(format!(
        "least squares did not converge in {} iterations (sse = {:.6e})",
        settings.max_iterations, sse
    )))
}

/// Secant search for a root of `f` starting from `x0`, `x1`.
pub fn secant<F>(mut f: F, mut x0: f64, mut x1: f64, settings: &SolverSettings) -> EngineResult<f64>
where
    F: FnMut(f64) -> f64,
{
    let mut f0 = f(x0);
    if f0.abs() <= settings.secant_tolerance {
        return Ok(x0);
    }
    let mut f1 = f(x1);

    for _ in 0..settings.secant_max_iterations {
        if !f0.is_finite() || !f1.is_finite() {
            return Err(EngineError::convergence("secant search left the function domain"));
        }
        if f1.abs() <= settings.secant_tolerance {
            return Ok(x1);
        }
        if f1 == f0 {
            return Err(EngineError::convergence("secant search hit a flat segment"));
        }
        let x2 = x1 - f1 * (x1 - x0) / (f1 - f0);
        x0 = x1;
        f0 = f1;
        x1 = x2;
        f1 = f(x1);
    }

    Err(EngineError::convergence(format!(
        "secant search did not converge in {} iterations",
        settings.secant_max_iterations
    )))
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
pub fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> EngineResult<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(EngineError::numeric("linear system is not square"));
    }
    let scale = a.iter().flatten().fold(0.0_f64, |m, v| m.max(v.abs()));

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= f64::EPSILON * scale * n as f64 || !a[pivot][col].is_finite() {
            return Err(EngineError::numeric("linear system is singular"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// Ordinary least squares line `y = intercept + slope · x`.
///
/// With `intercept` fixed only the slope is estimated.
pub fn linear_regression(x: &[f64], y: &[f64], intercept: Option<f64>) -> EngineResult<(f64, f64)> {
    let coefficients = polynomial_least_squares(x, y, 1, intercept)?;
    Ok((coefficients[0], coefficients[1]))
}

/// Least-squares polynomial `Σ c_k x^k`, `k = 0..=degree`, via normal equations.
///
/// The abscissa is scaled to `[-1, 1]` before forming the normal matrix and
/// the coefficients are mapped back afterwards. A fixed `c0` removes the
/// constant term from the system.
pub fn polynomial_least_squares(
    x: &[f64],
    y: &[f64],
    degree: usize,
    constant: Option<f64>,
) -> EngineResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(EngineError::numeric("polynomial samples differ in length"));
    }
    let first = usize::from(constant.is_some());
    let unknowns = degree + 1 - first;
    if x.len() < unknowns {
        return Err(EngineError::numeric(format!(
            "{} samples cannot determine a degree {} polynomial",
            x.len(),
            degree
        )));
    }

    let scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    let c0 = constant.unwrap_or(0.0);
    let powers: Vec<Vec<f64>> = x
        .iter()
        .map(|&xi| {
            let u = xi / scale;
            (first..=degree).map(|k| u.powi(k as i32)).collect()
        })
        .collect();

    let mut normal = vec![vec![0.0; unknowns]; unknowns];
    let mut rhs = vec![0.0; unknowns];
    for (row, &yi) in powers.iter().zip(y) {
        for a in 0..unknowns {
            rhs[a] += row[a] * (yi - c0);
            for b in 0..unknowns {
                normal[a][b] += row[a] * row[b];
            }
        }
    }
    let scaled = solve_linear(normal, rhs)?;

    let mut coefficients = vec![c0; degree + 1];
    for (offset, value) in scaled.into_iter().enumerate() {
        let k = offset + first;
        coefficients[k] = value / scale.powi(k as i32);
    }
    Ok(coefficients)
}
