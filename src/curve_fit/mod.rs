//! Curve-fit models
//!
//! Four closed model families share one capability surface (fit, evaluate,
//! parameters, best-fit selection) through the `Model` sum type:
//!
//! - `History` - replay of the input samples (piecewise linear)
//! - `Curvefit` - linear, power, exponential, logarithmic and polynomial laws
//! - `Dca` - Arps decline laws in the time or cumulative domain
//! - `NonParametric` - nearest-sample lookup, never fitted
//!
//! ## Axes
//!
//! Samples live on a local axis `x - origin`. For date axes the x values are
//! day numbers (`day_number`), the origin is the first (smallest) one and the
//! local axis is elapsed days. Any other axis keeps origin 0, so local and
//! real x coincide. `evaluate` always takes the real x, `evaluate_local` the
//! shifted one. Assembled functions compose models on the local axis.
//!
//! A failed fit leaves the model empty: no stale parameters survive.

mod dca;
mod history;
mod non_parametric;
mod parametric;
pub mod solver;

pub use dca::{DcaDomain, DcaModel, DeclineFit, DeclineLaw};
pub use history::HistoryModel;
pub use non_parametric::NonParametricModel;
pub use parametric::{CurveFamily, CurveFit, CurvefitModel};
pub use solver::SolverSettings;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use tracing::{debug, warn};

use crate::profile::Profile;
use crate::types::{EngineError, EngineResult, SeriesId};

// ============================================================================
// Settings
// ============================================================================

/// Tuning for parametric fits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveFitSettings {
    pub solver: SolverSettings,
    /// Relative SSE margin a later candidate must beat to displace an earlier one.
    pub best_fit_tie_tolerance: f64,
    pub best_fit_polynomial_degree: usize,
    pub max_polynomial_degree: usize,
    pub hyperbolic_b_min: f64,
    pub hyperbolic_b_max: f64,
}

impl Default for CurveFitSettings {
    fn default() -> Self {
        Self {
            solver: SolverSettings::default(),
            best_fit_tie_tolerance: 1e-9,
            best_fit_polynomial_degree: 2,
            max_polynomial_degree: 6,
            hyperbolic_b_min: 1e-4,
            hyperbolic_b_max: 2.0,
        }
    }
}

// ============================================================================
// Samples
// ============================================================================

/// Day number of a calendar date, used as the numeric x of date axes.
pub fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

/// Sorted `(x, y)` observations on a local axis; date axes start at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    x: Vec<f64>,
    y: Vec<f64>,
    origin: f64,
    x_is_date: bool,
}

impl SampleSet {
    /// Build from raw pairs; sorted by x. With `x_is_date` the x values are
    /// day numbers and the local axis is shifted to start at the first one.
    pub fn new(x: Vec<f64>, y: Vec<f64>, x_is_date: bool) -> EngineResult<Self> {
        if x.len() != y.len() {
            return Err(EngineError::numeric(format!(
                "sample lengths differ: {} x values, {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(EngineError::numeric("samples must be finite"));
        }

        let mut pairs: Vec<(f64, f64)> = x.into_iter().zip(y).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let origin = match pairs.first() {
            Some(&(first, _)) if x_is_date => first,
            _ => 0.0,
        };
        let (x, y) = pairs.into_iter().map(|(xi, yi)| (xi - origin, yi)).unzip();
        Ok(Self { x, y, origin, x_is_date })
    }

    /// Date-axis samples.
    pub fn from_dates(dates: &[NaiveDate], y: Vec<f64>) -> EngineResult<Self> {
        Self::new(dates.iter().map(|d| day_number(*d)).collect(), y, true)
    }

    /// Project two series of a profile into samples. A `date` x-axis
    /// produces a date-axis sample set.
    pub fn from_profile(profile: &Profile, x_var: SeriesId, y_var: SeriesId) -> EngineResult<Self> {
        let y = profile.axis_values(y_var);
        match x_var {
            SeriesId::Date => Self::from_dates(profile.dates(), y),
            _ => Self::new(profile.axis_values(x_var), y, false),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Local x (shifted by `origin`).
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn x_is_date(&self) -> bool {
        self.x_is_date
    }

    /// Real x values.
    pub fn absolute_x(&self) -> Vec<f64> {
        self.x.iter().map(|t| t + self.origin).collect()
    }

    /// Samples with real x in `[from, to]`, keeping this set's origin.
    pub fn window(&self, from: f64, to: f64) -> Self {
        let (x, y) = self
            .x
            .iter()
            .zip(&self.y)
            .filter(|(t, _)| (from..=to).contains(&(*t + self.origin)))
            .map(|(t, v)| (*t, *v))
            .unzip();
        Self { x, y, origin: self.origin, x_is_date: self.x_is_date }
    }

    pub(crate) fn require(&self, count: usize, what: &str) -> EngineResult<()> {
        if self.len() < count {
            return Err(EngineError::numeric(format!(
                "{} needs at least {} samples, got {}",
                what,
                count,
                self.len()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Fit reporting
// ============================================================================

/// Goodness of fit over the input samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    pub points: usize,
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
}

impl FitStatistics {
    pub(crate) fn compute(observed: &[f64], predicted: &[f64]) -> Self {
        let points = observed.len();
        let sse: f64 = observed
            .iter()
            .zip(predicted)
            .map(|(o, p)| (o - p) * (o - p))
            .sum();
        if points == 0 {
            return Self { points, sse, rmse: 0.0, r_squared: 0.0 };
        }
        let n = points as f64;
        let sst = observed.iter().population_variance() * n;
        let r_squared = if sst > 0.0 {
            1.0 - sse / sst
        } else if sse <= f64::EPSILON {
            1.0
        } else {
            0.0
        };
        Self { points, sse, rmse: (sse / n).sqrt(), r_squared }
    }
}

/// Named fitted parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

impl Parameter {
    pub(crate) fn new(name: &str, value: f64) -> Self {
        Self { name: name.to_string(), value }
    }
}

/// Snapshot of a fitted model for display or export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub method: FitMethod,
    pub parameters: Vec<Parameter>,
    /// Real x of the local axis origin.
    pub origin: f64,
    pub x_is_date: bool,
    pub statistics: Option<FitStatistics>,
}

// ============================================================================
// Model
// ============================================================================

/// Fit request for a model family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    History,
    Curve(CurveFamily),
    Decline(DeclineLaw),
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::History => write!(f, "history"),
            Self::Curve(family) => write!(f, "{}", family),
            Self::Decline(law) => write!(f, "{} decline", law),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    History,
    Curvefit,
    DcaTime,
    DcaCumulative,
    NonParametric,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::History => "history",
            Self::Curvefit => "curvefit",
            Self::DcaTime => "dca_time",
            Self::DcaCumulative => "dca_cumulative",
            Self::NonParametric => "non_parametric",
        };
        f.write_str(name)
    }
}

/// A fitted (or fittable) function of one variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    History(HistoryModel),
    Curvefit(CurvefitModel),
    Dca(DcaModel),
    NonParametric(NonParametricModel),
}

impl Model {
    pub fn history(samples: SampleSet) -> Self {
        Self::History(HistoryModel::new(samples))
    }

    pub fn curvefit(samples: SampleSet) -> Self {
        Self::Curvefit(CurvefitModel::new(samples))
    }

    pub fn dca_time(samples: SampleSet) -> Self {
        Self::Dca(DcaModel::new(DcaDomain::Time, samples))
    }

    pub fn dca_cumulative(samples: SampleSet) -> Self {
        Self::Dca(DcaModel::new(DcaDomain::Cumulative, samples))
    }

    pub fn non_parametric(samples: SampleSet) -> Self {
        Self::NonParametric(NonParametricModel::new(samples))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::History(_) => ModelKind::History,
            Self::Curvefit(_) => ModelKind::Curvefit,
            Self::Dca(m) => match m.domain() {
                DcaDomain::Time => ModelKind::DcaTime,
                DcaDomain::Cumulative => ModelKind::DcaCumulative,
            },
            Self::NonParametric(_) => ModelKind::NonParametric,
        }
    }

    pub fn samples(&self) -> &SampleSet {
        match self {
            Self::History(m) => m.samples(),
            Self::Curvefit(m) => m.samples(),
            Self::Dca(m) => m.samples(),
            Self::NonParametric(m) => m.samples(),
        }
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    pub fn can_fit(&self) -> bool {
        !matches!(self, Self::NonParametric(_))
    }

    /// Only the curve-fit family enumerates candidate laws.
    pub fn can_fit_best(&self) -> bool {
        matches!(self, Self::Curvefit(_))
    }

    pub fn is_parametric(&self) -> bool {
        matches!(self, Self::Curvefit(_) | Self::Dca(_))
    }

    /// Whether `evaluate` is defined.
    pub fn is_fitted(&self) -> bool {
        match self {
            Self::History(m) => m.is_fitted(),
            Self::Curvefit(m) => m.fitted().is_some(),
            Self::Dca(m) => m.fitted().is_some(),
            Self::NonParametric(m) => !m.samples().is_empty(),
        }
    }

    // ------------------------------------------------------------------------
    // Fitting
    // ------------------------------------------------------------------------

    /// Fit with `method`; `input` fixes the leading parameter (initial rate
    /// for declines, intercept or scale for curve laws).
    pub fn find_fit(
        &mut self,
        method: FitMethod,
        input: Option<f64>,
        settings: &CurveFitSettings,
    ) -> EngineResult<()> {
        let kind = self.kind();
        let result = match (&mut *self, method) {
            (Self::History(m), FitMethod::History) => m.fit(),
            (Self::Curvefit(m), FitMethod::Curve(family)) => m.fit(family, input, settings),
            (Self::Dca(m), FitMethod::Decline(law)) => m.fit(law, input, settings),
            _ => {
                return Err(EngineError::unsupported(format!(
                    "{} models cannot fit {}",
                    kind, method
                )))
            }
        };

        match &result {
            Ok(()) => debug!(model = %kind, method = %method, "fit complete"),
            Err(e) => warn!(model = %kind, method = %method, error = %e, "fit failed, model cleared"),
        }
        result
    }

    /// Try every curve law and keep the one with the least SSE.
    pub fn find_best_fit(&mut self, settings: &CurveFitSettings) -> EngineResult<CurveFamily> {
        match self {
            Self::Curvefit(m) => m.fit_best(settings),
            other => Err(EngineError::unsupported(format!(
                "{} models do not select a best fit",
                other.kind()
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluate at local x (elapsed from the sample origin).
    pub fn evaluate_local(&self, t: f64) -> EngineResult<f64> {
        let value = match self {
            Self::History(m) => m.evaluate_local(t),
            Self::Curvefit(m) => m.evaluate_local(t),
            Self::Dca(m) => m.evaluate_local(t),
            Self::NonParametric(m) => m.evaluate_local(t),
        };
        value.ok_or_else(|| EngineError::convergence(format!("{} model has no fit", self.kind())))
    }

    /// Evaluate at real x (a day number for date axes).
    pub fn evaluate(&self, x: f64) -> EngineResult<f64> {
        self.evaluate_local(x - self.samples().origin())
    }

    pub fn evaluate_date(&self, date: NaiveDate) -> EngineResult<f64> {
        self.evaluate(day_number(date))
    }

    /// Fitted values at every sample x, or `None` before a fit.
    pub fn get_values(&self) -> Option<Vec<f64>> {
        self.samples()
            .x()
            .iter()
            .map(|&t| self.evaluate_local(t).ok())
            .collect()
    }

    pub fn get_parameters(&self) -> Option<FitParameters> {
        let samples = self.samples();
        let (method, parameters, statistics) = match self {
            Self::History(m) if m.is_fitted() => (FitMethod::History, Vec::new(), None),
            Self::Curvefit(m) => {
                let fit = m.fitted()?;
                (FitMethod::Curve(fit.family), fit.parameters(), Some(fit.statistics))
            }
            Self::Dca(m) => {
                let fit = m.fitted()?;
                (FitMethod::Decline(fit.law), fit.parameters(), Some(fit.statistics))
            }
            _ => return None,
        };
        Some(FitParameters {
            method,
            parameters,
            origin: samples.origin(),
            x_is_date: samples.x_is_date(),
            statistics,
        })
    }

    /// Real x at which the fitted function reaches `target`, by secant search
    /// from the end of the samples.
    pub fn solve_for_x(&self, target: f64, settings: &SolverSettings) -> EngineResult<f64> {
        let start = self.samples().x().last().copied().unwrap_or(0.0);
        let mut failure = None;
        let root = solver::secant(
            |t| match self.evaluate_local(t) {
                Ok(y) => y - target,
                Err(e) => {
                    failure = Some(e);
                    f64::NAN
                }
            },
            start,
            start + 1.0,
            settings,
        );
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(root? + self.samples().origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(f: impl Fn(f64) -> f64, xs: impl Iterator<Item = f64>) -> SampleSet {
        let x: Vec<f64> = xs.collect();
        let y = x.iter().map(|v| f(*v)).collect();
        SampleSet::new(x, y, false).unwrap()
    }

    #[test]
    fn test_sample_set_sorts_and_validates() {
        let s = SampleSet::new(vec![3.0, 1.0, 2.0], vec![30.0, 10.0, 20.0], false).unwrap();
        assert_eq!(s.x(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.y(), &[10.0, 20.0, 30.0]);
        assert!(SampleSet::new(vec![1.0], vec![1.0, 2.0], false).is_err());
        assert!(SampleSet::new(vec![f64::NAN], vec![1.0], false).is_err());
    }

    #[test]
    fn test_date_axis_shifts_origin() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let s = SampleSet::from_dates(&[d0, d1], vec![100.0, 70.0]).unwrap();
        assert_eq!(s.x(), &[0.0, 30.0]);
        assert_eq!(s.origin(), day_number(d0));

        let mut m = Model::history(s);
        m.find_fit(FitMethod::History, None, &CurveFitSettings::default()).unwrap();
        let mid = NaiveDate::from_ymd_opt(2020, 1, 16).unwrap();
        assert!((m.evaluate_date(mid).unwrap() - 85.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_filters_on_real_x() {
        let plain = SampleSet::new(vec![1.0, 2.0, 3.0, 4.0], vec![10.0, 20.0, 30.0, 40.0], false).unwrap();
        assert_eq!(plain.origin(), 0.0);
        let w = plain.window(2.0, 3.0);
        assert_eq!(w.x(), &[2.0, 3.0]);
        assert_eq!(w.y(), &[20.0, 30.0]);

        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = [d0, d0 + chrono::Duration::days(10), d0 + chrono::Duration::days(20)];
        let dated = SampleSet::from_dates(&dates, vec![3.0, 2.0, 1.0]).unwrap();
        let w = dated.window(day_number(dates[1]), f64::INFINITY);
        assert_eq!(w.x(), &[10.0, 20.0]);
        assert_eq!(w.origin(), day_number(d0));
        assert!(w.x_is_date());
        assert!(dated.window(0.0, 1.0).is_empty());
    }

    #[test]
    fn test_capabilities() {
        let s = samples(|x| x, (0..4).map(f64::from));
        let history = Model::history(s.clone());
        let curve = Model::curvefit(s.clone());
        let dca = Model::dca_time(s.clone());
        let lookup = Model::non_parametric(s);

        assert!(history.can_fit() && !history.can_fit_best() && !history.is_parametric());
        assert!(curve.can_fit() && curve.can_fit_best() && curve.is_parametric());
        assert!(dca.can_fit() && !dca.can_fit_best() && dca.is_parametric());
        assert!(!lookup.can_fit() && !lookup.can_fit_best() && !lookup.is_parametric());
        assert!(lookup.is_fitted());
        assert!(!curve.is_fitted());
    }

    #[test]
    fn test_method_mismatch_is_rejected() {
        let mut m = Model::history(samples(|x| x, (0..4).map(f64::from)));
        let result = m.find_fit(
            FitMethod::Decline(DeclineLaw::Exponential),
            None,
            &CurveFitSettings::default(),
        );
        assert!(matches!(result, Err(EngineError::Unsupported(_))));
        assert!(matches!(
            m.find_best_fit(&CurveFitSettings::default()),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unfitted_model_has_no_values() {
        let m = Model::curvefit(samples(|x| x, (0..4).map(f64::from)));
        assert!(m.get_values().is_none());
        assert!(m.get_parameters().is_none());
        assert!(matches!(m.evaluate(1.0), Err(EngineError::Convergence(_))));
    }

    #[test]
    fn test_fit_statistics() {
        let stats = FitStatistics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        assert_eq!(stats.points, 3);
        assert!((stats.sse - 1.0).abs() < 1e-12);
        assert!((stats.rmse - (1.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        // sst = 2
        assert!((stats.r_squared - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_solve_for_x_inverts_decline() {
        let s = samples(|t| 1000.0 * (-0.002 * t).exp(), (0..13).map(|i| f64::from(i) * 30.0));
        let mut m = Model::dca_time(s);
        m.find_fit(FitMethod::Decline(DeclineLaw::Exponential), None, &CurveFitSettings::default())
            .unwrap();
        let x = m.solve_for_x(500.0, &SolverSettings::default()).unwrap();
        assert!((x - 2.0_f64.ln() / 0.002).abs() < 1e-4);
    }
}
