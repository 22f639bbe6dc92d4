//! Calculus Kernel
//!
//! Cumulative integration and finite differencing on irregular samples.
//! Every routine accepts an optional x-axis; without one, unit spacing is
//! assumed. All formulas handle non-uniform spacing.
//!
//! ## Integration
//! - `forward_integration()` - left-rectangle rule from an initial value
//! - `backward_integration()` - right-rectangle rule to a terminal value
//! - `trapezoidal_integration()` - trapezoidal rule from an initial value
//!
//! ## Differencing
//! - `forward_difference()` / `backward_difference()` - one-sided first order
//! - `central_difference()` - two-interval first order
//! - `central_difference_2nd()` - non-uniform second order central scheme
//!
//! Boundaries fall back to one-sided differences. A zero x-interval or a
//! non-finite sample is rejected with `EngineError::Numeric`.

use crate::types::{EngineError, EngineResult};

// ============================================================================
// Input checks
// ============================================================================

/// Resolve the x-axis (explicit or unit-spaced) and validate both arrays.
fn resolve_axis(y: &[f64], x: Option<&[f64]>) -> EngineResult<Vec<f64>> {
    if let Some(v) = y.iter().find(|v| !v.is_finite()) {
        return Err(EngineError::numeric(format!("non-finite sample value {v}")));
    }

    let axis = match x {
        Some(x) => {
            if x.len() != y.len() {
                return Err(EngineError::numeric(format!(
                    "x has {} points but y has {}",
                    x.len(),
                    y.len()
                )));
            }
            if let Some(v) = x.iter().find(|v| !v.is_finite()) {
                return Err(EngineError::numeric(format!("non-finite x value {v}")));
            }
            x.to_vec()
        }
        None => (0..y.len()).map(|i| i as f64).collect(),
    };

    if let Some(i) = axis.windows(2).position(|w| w[1] == w[0]) {
        return Err(EngineError::numeric(format!(
            "zero x-interval between points {i} and {}",
            i + 1
        )));
    }

    Ok(axis)
}

// ============================================================================
// Integration
// ============================================================================

/// Left-rectangle running integral starting at zero, without input checks.
///
/// Callers guarantee equal lengths and a strictly monotone axis.
pub(crate) fn accumulate_left(y: &[f64], x: &[f64]) -> Vec<f64> {
    let mut c = Vec::with_capacity(y.len());
    let mut total = 0.0;
    for i in 0..y.len() {
        if i > 0 {
            total += y[i - 1] * (x[i] - x[i - 1]);
        }
        c.push(total);
    }
    c
}

/// Left-rectangle cumulative integral.
///
/// `c[0] = initial`, `c[i] = c[i-1] + y[i-1] * (x[i] - x[i-1])`.
pub fn forward_integration(y: &[f64], x: Option<&[f64]>, initial: f64) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    Ok(accumulate_left(y, &axis)
        .into_iter()
        .map(|c| c + initial)
        .collect())
}

/// Right-rectangle cumulative integral ending at a terminal value.
///
/// `c[N-1] = terminal`, `c[i-1] = c[i] - y[i] * (x[i] - x[i-1])`.
pub fn backward_integration(y: &[f64], x: Option<&[f64]>, terminal: f64) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let n = y.len();
    let mut c = vec![0.0; n];
    if n == 0 {
        return Ok(c);
    }

    c[n - 1] = terminal;
    for i in (1..n).rev() {
        c[i - 1] = c[i] - y[i] * (axis[i] - axis[i - 1]);
    }
    Ok(c)
}

/// Trapezoidal cumulative integral.
///
/// `c[i] = c[i-1] + 0.5 * (y[i-1] + y[i]) * (x[i] - x[i-1])`.
pub fn trapezoidal_integration(y: &[f64], x: Option<&[f64]>, initial: f64) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let mut c = Vec::with_capacity(y.len());
    let mut total = initial;
    for i in 0..y.len() {
        if i > 0 {
            total += 0.5 * (y[i - 1] + y[i]) * (axis[i] - axis[i - 1]);
        }
        c.push(total);
    }
    Ok(c)
}

// ============================================================================
// Differencing
// ============================================================================

#[inline]
fn slope(y: &[f64], x: &[f64], lo: usize, hi: usize) -> f64 {
    (y[hi] - y[lo]) / (x[hi] - x[lo])
}

/// `d[i] = (y[i+1] - y[i]) / (x[i+1] - x[i])`; the last point uses the
/// backward slope.
pub fn forward_difference(y: &[f64], x: Option<&[f64]>) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let n = y.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }

    Ok((0..n)
        .map(|i| if i + 1 < n { slope(y, &axis, i, i + 1) } else { slope(y, &axis, n - 2, n - 1) })
        .collect())
}

/// `d[i] = (y[i] - y[i-1]) / (x[i] - x[i-1])`; the first point uses the
/// forward slope.
pub fn backward_difference(y: &[f64], x: Option<&[f64]>) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let n = y.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }

    Ok((0..n)
        .map(|i| if i == 0 { slope(y, &axis, 0, 1) } else { slope(y, &axis, i - 1, i) })
        .collect())
}

/// `d[i] = (y[i+1] - y[i-1]) / (x[i+1] - x[i-1])` on interior points,
/// one-sided at both ends.
pub fn central_difference(y: &[f64], x: Option<&[f64]>) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let n = y.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }

    Ok((0..n)
        .map(|i| {
            if i == 0 {
                slope(y, &axis, 0, 1)
            } else if i == n - 1 {
                slope(y, &axis, n - 2, n - 1)
            } else {
                slope(y, &axis, i - 1, i + 1)
            }
        })
        .collect())
}

/// Second-order central difference for non-uniform spacing.
///
/// With `h_d = x[i+1] - x[i]` and `h_s = x[i] - x[i-1]`:
/// `d[i] = (h_s² y[i+1] + (h_d² - h_s²) y[i] - h_d² y[i-1]) / (h_s h_d (h_d + h_s))`.
/// One-sided at both ends.
pub fn central_difference_2nd(y: &[f64], x: Option<&[f64]>) -> EngineResult<Vec<f64>> {
    let axis = resolve_axis(y, x)?;
    let n = y.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }

    let mut d = Vec::with_capacity(n);
    for i in 0..n {
        if i == 0 {
            d.push(slope(y, &axis, 0, 1));
        } else if i == n - 1 {
            d.push(slope(y, &axis, n - 2, n - 1));
        } else {
            let h_d = axis[i + 1] - axis[i];
            let h_s = axis[i] - axis[i - 1];
            let den = h_s * h_d * (h_d + h_s);
            if den == 0.0 {
                return Err(EngineError::numeric(format!(
                    "degenerate stencil around point {i}"
                )));
            }
            d.push((h_s * h_s * y[i + 1] + (h_d * h_d - h_s * h_s) * y[i] - h_d * h_d * y[i - 1]) / den);
        }
    }
    Ok(d)
}

// ============================================================================
// Interpolation
// ============================================================================

/// Piecewise-linear interpolation with constant extrapolation.
///
/// `xp` must be sorted ascending; duplicate abscissae resolve to the later
/// sample. Returns 0.0 for an empty table.
pub fn interpolate(xp: &[f64], fp: &[f64], x: f64) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return 0.0;
    }

    let idx = xp[..n].partition_point(|&v| v <= x);
    if idx == 0 {
        return fp[0];
    }
    if idx == n {
        return fp[n - 1];
    }

    let (lo, hi) = (idx - 1, idx);
    let span = xp[hi] - xp[lo];
    if span <= 0.0 {
        return fp[hi];
    }
    let w = (x - xp[lo]) / span;
    fp[lo] + w * (fp[hi] - fp[lo])
}

/// Vectorised form of [`interpolate`].
pub fn interpolate_many(xp: &[f64], fp: &[f64], xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| interpolate(xp, fp, x)).collect()
}
