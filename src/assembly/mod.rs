//! Assembled functions
//!
//! Composes fitted models into one piecewise function `g(x)` of a real axis.
//! Every included model contributes `f_k(x - x0)·mult_k + add_k` from its
//! merge point onwards; the first model starts at the offset `x0`.
//!
//! ## Merges
//! - **Hard**: the next model takes over at the merge point.
//! - **Smooth**: over `[mp, mp + rate)` the result blends linearly from the
//!   previous composed value to the next model.
//!
//! ## Offset
//! `x0` is fixed by a [`ReferencePoint`]: zero, an explicit x, or the first x
//! at which a reference profile's `(x_var, y_var)` curve reaches a value.

mod forecast;

pub use forecast::{forecast_profile, ForecastAxis};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculus::interpolate;
use crate::curve_fit::solver::{secant, SolverSettings};
use crate::curve_fit::Model;
use crate::profile::Profile;
use crate::types::{EngineError, EngineResult, SeriesId};

// ============================================================================
// Composition inputs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeType {
    Hard,
    Smooth,
}

/// How a model takes over from the one before it. Ignored for the first
/// included model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub kind: MergeType,
    /// Real x at which the model takes over.
    pub point: f64,
    /// Width of the smooth blend window.
    pub rate: Option<f64>,
}

impl Merge {
    pub fn hard(point: f64) -> Self {
        Self { kind: MergeType::Hard, point, rate: None }
    }

    pub fn smooth(point: f64, rate: f64) -> Self {
        Self { kind: MergeType::Smooth, point, rate: Some(rate) }
    }
}

impl Default for Merge {
    fn default() -> Self {
        Self::hard(0.0)
    }
}

/// Affine adjustment `y·multiplier + addition` applied to a model's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub multiplier: f64,
    pub addition: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self { multiplier: 1.0, addition: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub model: Model,
    pub include: bool,
    pub merge: Merge,
    pub modifiers: Modifiers,
}

impl ModelEntry {
    pub fn new(model: Model) -> Self {
        Self { model, include: true, merge: Merge::default(), modifiers: Modifiers::default() }
    }

    pub fn with_merge(mut self, merge: Merge) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_modifiers(mut self, multiplier: f64, addition: f64) -> Self {
        self.modifiers = Modifiers { multiplier, addition };
        self
    }

    pub fn excluded(mut self) -> Self {
        self.include = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

/// Where the composed function's origin sits on the real axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePoint {
    #[default]
    None,
    Specific { axis: Axis, value: f64 },
}

// ============================================================================
// Assembled function
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Piece {
    model: Model,
    merge: Merge,
    modifiers: Modifiers,
}

impl Piece {
    fn value(&self, t: f64) -> EngineResult<f64> {
        Ok(self.model.evaluate_local(t)? * self.modifiers.multiplier + self.modifiers.addition)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFunction {
    pieces: Vec<Piece>,
    point: ReferencePoint,
    x0: f64,
    run_to: Option<f64>,
}

impl AssembledFunction {
    /// Validate and compose the included entries, in order.
    ///
    /// An explicit x reference point sets the offset immediately; a y
    /// reference point needs [`calculate_offset`](Self::calculate_offset).
    pub fn assemble(entries: Vec<ModelEntry>, point: ReferencePoint, run_to: Option<f64>) -> EngineResult<Self> {
        let pieces: Vec<Piece> = entries
            .into_iter()
            .filter(|e| e.include)
            .map(|e| Piece { model: e.model, merge: e.merge, modifiers: e.modifiers })
            .collect();

        if pieces.is_empty() {
            return Err(EngineError::assemble("no models are included"));
        }
        if let Some(r) = run_to {
            if !r.is_finite() {
                return Err(EngineError::assemble("run-to limit must be finite"));
            }
        }

        for (k, piece) in pieces.iter().enumerate() {
            if !piece.model.is_fitted() {
                return Err(EngineError::assemble(format!(
                    "included model {} ({}) has no fit",
                    k,
                    piece.model.kind()
                )));
            }
            let m = piece.modifiers;
            if !(m.multiplier.is_finite() && m.addition.is_finite()) {
                return Err(EngineError::assemble(format!("model {} modifiers are not finite", k)));
            }
            if k == 0 {
                continue;
            }
            if !piece.merge.point.is_finite() {
                return Err(EngineError::assemble(format!("model {} merge point is not finite", k)));
            }
            if piece.merge.kind == MergeType::Smooth {
                match piece.merge.rate {
                    Some(rate) if rate > 0.0 && rate.is_finite() => {}
                    other => {
                        return Err(EngineError::assemble(format!(
                            "model {} smooth merge needs a positive rate, got {:?}",
                            k, other
                        )))
                    }
                }
            }
        }

        if let Some(k) = pieces
            .windows(2)
            .skip(1)
            .position(|w| w[1].merge.point <= w[0].merge.point)
        {
            return Err(EngineError::assemble(format!(
                "merge points must increase: model {} merges at {} after {}",
                k + 2,
                pieces[k + 2].merge.point,
                pieces[k + 1].merge.point
            )));
        }

        for (k, piece) in pieces.iter().enumerate() {
            let checkpoints = std::iter::once(0.0).chain(piece.model.samples().x().iter().copied());
            for t in checkpoints {
                let y = piece.value(t)?;
                if !y.is_finite() {
                    return Err(EngineError::assemble(format!(
                        "model {} is not finite at local x = {}",
                        k, t
                    )));
                }
            }
        }

        let x0 = match point {
            ReferencePoint::Specific { axis: Axis::X, value } => value,
            _ => 0.0,
        };
        debug!(models = pieces.len(), x0, ?run_to, "assembled function");
        Ok(Self { pieces, point, x0, run_to })
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn run_to(&self) -> Option<f64> {
        self.run_to
    }

    pub fn reference_point(&self) -> ReferencePoint {
        self.point
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Resolve `x0` from the reference point, storing and returning it.
    ///
    /// For a y reference point the smallest x at which the reference curve
    /// `(x_var, y_var)` reaches the value is located by secant search on the
    /// first segment that brackets it.
    pub fn calculate_offset(
        &mut self,
        x_var: SeriesId,
        y_var: SeriesId,
        reference: &Profile,
        settings: &SolverSettings,
    ) -> EngineResult<f64> {
        let x0 = match self.point {
            ReferencePoint::None => 0.0,
            ReferencePoint::Specific { axis: Axis::X, value } => value,
            ReferencePoint::Specific { axis: Axis::Y, value } => {
                let xs = reference.axis_values(x_var);
                let ys = reference.axis_values(y_var);
                crossing(&xs, &ys, value, settings)?
            }
        };
        if !x0.is_finite() {
            return Err(EngineError::convergence("reference offset is not finite"));
        }
        debug!(%x_var, %y_var, x0, "reference offset resolved");
        self.x0 = x0;
        Ok(x0)
    }

    /// `g(x)`; fails outside `[x0, run_to]`.
    pub fn evaluate(&self, x: f64) -> EngineResult<f64> {
        if x < self.x0 {
            return Err(EngineError::limit(format!("x = {} precedes the origin {}", x, self.x0)));
        }
        if let Some(limit) = self.run_to {
            if x > limit {
                return Err(EngineError::limit(format!("x = {} is beyond run-to {}", x, limit)));
            }
        }
        let active = self.pieces[1..].partition_point(|p| p.merge.point <= x);
        self.compose(active, x)
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> EngineResult<Vec<f64>> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }

    /// Whether `x` lies in the evaluable domain.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.x0 && self.run_to.map_or(true, |limit| x <= limit)
    }

    /// Value of the composition of pieces `0..=k` at `x`.
    fn compose(&self, k: usize, x: f64) -> EngineResult<f64> {
        let piece = &self.pieces[k];
        let current = piece.value(x - self.x0)?;
        if k == 0 || piece.merge.kind == MergeType::Hard {
            return Ok(current);
        }
        let rate = piece.merge.rate.unwrap_or(0.0);
        let alpha = ((x - piece.merge.point) / rate).clamp(0.0, 1.0);
        if alpha >= 1.0 {
            return Ok(current);
        }
        let previous = self.compose(k - 1, x)?;
        Ok((1.0 - alpha) * previous + alpha * current)
    }
}

/// Smallest x at which the piecewise linear curve `(xs, ys)` equals `value`.
///
/// Zero-width segments (x unchanged, as cumulative x over a shut-in) carry
/// no crossing and are skipped. Decreasing x is rejected.
fn crossing(xs: &[f64], ys: &[f64], value: f64, settings: &SolverSettings) -> EngineResult<f64> {
    if xs.len() != ys.len() {
        return Err(EngineError::numeric("reference series differ in length"));
    }
    for segment in 0..xs.len().saturating_sub(1) {
        let (xa, xb) = (xs[segment], xs[segment + 1]);
        if xb < xa {
            return Err(EngineError::convergence(format!(
                "reference x decreases at sample {}",
                segment + 1
            )));
        }
        let (ya, yb) = (ys[segment], ys[segment + 1]);
        if xb == xa || (ya - value) * (yb - value) > 0.0 {
            continue;
        }
        let local_x = &xs[segment..=segment + 1];
        let local_y = &ys[segment..=segment + 1];
        return secant(|x| interpolate(local_x, local_y, x) - value, xa, xb, settings);
    }
    Err(EngineError::convergence(format!("reference curve never reaches {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve_fit::{CurveFitSettings, FitMethod, SampleSet};

    fn constant(value: f64, until: f64) -> Model {
        let samples = SampleSet::new(vec![0.0, until], vec![value, value], false).unwrap();
        let mut model = Model::history(samples);
        model.find_fit(FitMethod::History, None, &CurveFitSettings::default()).unwrap();
        model
    }

    fn line(intercept: f64, slope: f64) -> Model {
        let samples = SampleSet::new(vec![0.0, 100.0], vec![intercept, intercept + 100.0 * slope], false).unwrap();
        let mut model = Model::history(samples);
        model.find_fit(FitMethod::History, None, &CurveFitSettings::default()).unwrap();
        model
    }

    #[test]
    fn test_crossing_skips_zero_width_segments() {
        let settings = SolverSettings::default();
        // Cumulative x stalls over a shut-in while the rate drops to zero
        let xs = [0.0, 1.0, 1.0, 1.0, 2.0];
        let ys = [10.0, 8.0, 0.0, 6.0, 4.0];
        let x = crossing(&xs, &ys, 5.0, &settings).unwrap();
        assert!((x - 1.5).abs() < 1e-9, "x = {x}");

        assert!(matches!(crossing(&xs, &ys, 20.0, &settings), Err(EngineError::Convergence(_))));
        let backwards = [0.0, 2.0, 1.0];
        assert!(matches!(
            crossing(&backwards, &[3.0, 2.0, 1.0], 1.5, &settings),
            Err(EngineError::Convergence(_))
        ));
    }

    #[test]
    fn test_smooth_merge_blends() {
        let entries = vec![
            ModelEntry::new(constant(100.0, 100.0)),
            ModelEntry::new(constant(50.0, 1.0)).with_merge(Merge::smooth(50.0, 10.0)),
        ];
        let g = AssembledFunction::assemble(entries, ReferencePoint::None, None).unwrap();
        let expect = [(49.0, 100.0), (50.0, 100.0), (55.0, 75.0), (60.0, 50.0), (200.0, 50.0)];
        for (x, y) in expect {
            assert!((g.evaluate(x).unwrap() - y).abs() < 1e-12, "g({}) = {}", x, g.evaluate(x).unwrap());
        }
    }

    #[test]
    fn test_smooth_merge_continuity_with_modifiers() {
        let (mp, rate) = (30.0, 20.0);
        let entries = vec![
            ModelEntry::new(line(10.0, 1.0)).with_modifiers(2.0, 1.0),
            ModelEntry::new(line(200.0, -1.0))
                .with_merge(Merge::smooth(mp, rate))
                .with_modifiers(0.5, -3.0),
        ];
        let x0 = 5.0;
        let point = ReferencePoint::Specific { axis: Axis::X, value: x0 };
        let g = AssembledFunction::assemble(entries, point, None).unwrap();

        let prev = |x: f64| (10.0 + (x - x0)) * 2.0 + 1.0;
        let next = |x: f64| (200.0 - (x - x0)) * 0.5 - 3.0;
        assert!((g.evaluate(mp).unwrap() - prev(mp)).abs() < 1e-12);
        assert!((g.evaluate(mp + rate).unwrap() - next(mp + rate)).abs() < 1e-12);

        let x = mp + 0.25 * rate;
        let blended = 0.75 * prev(x) + 0.25 * next(x);
        assert!((g.evaluate(x).unwrap() - blended).abs() < 1e-12);
    }

    #[test]
    fn test_hard_merge_and_exclusion() {
        let entries = vec![
            ModelEntry::new(constant(100.0, 10.0)),
            ModelEntry::new(constant(7.0, 10.0)).with_merge(Merge::hard(20.0)).excluded(),
            ModelEntry::new(constant(50.0, 10.0)).with_merge(Merge::hard(40.0)),
        ];
        let g = AssembledFunction::assemble(entries, ReferencePoint::None, Some(100.0)).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.evaluate(39.9).unwrap(), 100.0);
        assert_eq!(g.evaluate(40.0).unwrap(), 50.0);
        assert!(g.evaluate(100.5).is_err());
        assert!(!g.contains(-1.0));
    }

    #[test]
    fn test_assembly_rejections() {
        let fitted = || ModelEntry::new(constant(1.0, 1.0));

        let none = AssembledFunction::assemble(vec![fitted().excluded()], ReferencePoint::None, None);
        assert!(matches!(none, Err(EngineError::Assemble(_))));

        let unordered = vec![
            fitted(),
            fitted().with_merge(Merge::hard(20.0)),
            fitted().with_merge(Merge::hard(20.0)),
        ];
        assert!(matches!(
            AssembledFunction::assemble(unordered, ReferencePoint::None, None),
            Err(EngineError::Assemble(_))
        ));

        let zero_rate = vec![fitted(), fitted().with_merge(Merge::smooth(5.0, 0.0))];
        assert!(matches!(
            AssembledFunction::assemble(zero_rate, ReferencePoint::None, None),
            Err(EngineError::Assemble(_))
        ));

        let unfitted = Model::curvefit(SampleSet::new(vec![0.0, 1.0], vec![1.0, 2.0], false).unwrap());
        assert!(matches!(
            AssembledFunction::assemble(vec![ModelEntry::new(unfitted)], ReferencePoint::None, None),
            Err(EngineError::Assemble(_))
        ));

        let infinite = vec![fitted().with_modifiers(f64::INFINITY, 0.0)];
        assert!(matches!(
            AssembledFunction::assemble(infinite, ReferencePoint::None, None),
            Err(EngineError::Assemble(_))
        ));
    }

    #[test]
    fn test_crossing_finds_first_segment() {
        let xs = [0.0, 10.0, 20.0, 30.0];
        let ys = [0.0, 5.0, 2.0, 8.0];
        let x = crossing(&xs, &ys, 4.0, &SolverSettings::default()).unwrap();
        assert!((x - 8.0).abs() < 1e-9);
        assert_eq!(crossing(&xs, &ys, 5.0, &SolverSettings::default()).unwrap(), 10.0);
        assert!(matches!(
            crossing(&xs, &ys, 9.0, &SolverSettings::default()),
            Err(EngineError::Convergence(_))
        ));
    }
}
