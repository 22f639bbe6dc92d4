//! Parametric curve laws: linear, power, exponential, logarithmic, polynomial

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::solver::{levenberg_marquardt, linear_regression, polynomial_least_squares};
use super::{CurveFitSettings, FitStatistics, Parameter, SampleSet};
use crate::types::{EngineError, EngineResult};

/// Curve law fitted by the `Curvefit` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveFamily {
    /// `y = a + b·x`
    Linear,
    /// `y = a·x^b`, x > 0
    Power,
    /// `y = a·e^(b·x)`
    Exponential,
    /// `y = a + b·ln x`, x > 0
    Logarithmic,
    /// `y = Σ c_k·x^k`
    Polynomial(usize),
}

impl CurveFamily {
    /// Candidates tried by best-fit selection, simplest first.
    pub fn candidates(polynomial_degree: usize) -> [Self; 5] {
        [
            Self::Linear,
            Self::Exponential,
            Self::Logarithmic,
            Self::Power,
            Self::Polynomial(polynomial_degree),
        ]
    }

    pub fn evaluate(self, coefficients: &[f64], x: f64) -> f64 {
        match self {
            Self::Linear => coefficients[0] + coefficients[1] * x,
            Self::Power => coefficients[0] * x.powf(coefficients[1]),
            Self::Exponential => coefficients[0] * (coefficients[1] * x).exp(),
            Self::Logarithmic => coefficients[0] + coefficients[1] * x.ln(),
            Self::Polynomial(_) => coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c),
        }
    }

    pub fn parameter_names(self) -> Vec<String> {
        match self {
            Self::Linear => vec!["intercept".into(), "slope".into()],
            Self::Power | Self::Exponential | Self::Logarithmic => vec!["a".into(), "b".into()],
            Self::Polynomial(degree) => (0..=degree).map(|k| format!("c{}", k)).collect(),
        }
    }

    fn requires_positive_x(self) -> bool {
        matches!(self, Self::Power | Self::Logarithmic)
    }
}

impl fmt::Display for CurveFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Power => write!(f, "power"),
            Self::Exponential => write!(f, "exponential"),
            Self::Logarithmic => write!(f, "logarithmic"),
            Self::Polynomial(degree) => write!(f, "polynomial{}", degree),
        }
    }
}

impl FromStr for CurveFamily {
    type Err = EngineError;

    /// `polynomial` alone means degree 2; `polynomialN` sets the degree.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "linear" => Ok(Self::Linear),
            "power" => Ok(Self::Power),
            "exponential" => Ok(Self::Exponential),
            "logarithmic" => Ok(Self::Logarithmic),
            "polynomial" => Ok(Self::Polynomial(2)),
            other => other
                .strip_prefix("polynomial")
                .and_then(|d| d.parse().ok())
                .map(Self::Polynomial)
                .ok_or_else(|| EngineError::unsupported(format!("unknown curve law '{}'", s))),
        }
    }
}

/// Fitted curve law with its coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFit {
    pub family: CurveFamily,
    pub coefficients: Vec<f64>,
    pub statistics: FitStatistics,
}

impl CurveFit {
    pub fn parameters(&self) -> Vec<Parameter> {
        self.family
            .parameter_names()
            .iter()
            .zip(&self.coefficients)
            .map(|(name, value)| Parameter::new(name, *value))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvefitModel {
    samples: SampleSet,
    fit: Option<CurveFit>,
}

impl CurvefitModel {
    pub fn new(samples: SampleSet) -> Self {
        Self { samples, fit: None }
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn fitted(&self) -> Option<&CurveFit> {
        self.fit.as_ref()
    }

    pub fn evaluate_local(&self, t: f64) -> Option<f64> {
        self.fit.as_ref().map(|f| f.family.evaluate(&f.coefficients, t))
    }

    /// Fit `family`; `input` fixes the leading coefficient.
    pub fn fit(&mut self, family: CurveFamily, input: Option<f64>, settings: &CurveFitSettings) -> EngineResult<()> {
        self.fit = None;
        let fit = estimate(&self.samples, family, input, settings)?;
        self.fit = Some(fit);
        Ok(())
    }

    /// Fit every candidate law and keep the least-SSE one. A later candidate
    /// must beat the incumbent by more than the tie tolerance, so exact data
    /// resolves to the simplest law that reproduces it.
    pub fn fit_best(&mut self, settings: &CurveFitSettings) -> EngineResult<CurveFamily> {
        self.fit = None;
        let scale = 1.0 + self.samples.y().iter().map(|v| v * v).sum::<f64>();
        let margin = settings.best_fit_tie_tolerance * scale;

        let mut best: Option<CurveFit> = None;
        for family in CurveFamily::candidates(settings.best_fit_polynomial_degree) {
            match estimate(&self.samples, family, None, settings) {
                Ok(candidate) => {
                    debug!(family = %family, sse = candidate.statistics.sse, "best-fit candidate");
                    let better = best
                        .as_ref()
                        .map_or(true, |b| candidate.statistics.sse < b.statistics.sse - margin);
                    if better {
                        best = Some(candidate);
                    }
                }
                Err(e) => debug!(family = %family, error = %e, "best-fit candidate skipped"),
            }
        }

        let best = best.ok_or_else(|| EngineError::convergence("no curve law could be fitted to the samples"))?;
        let family = best.family;
        debug!(family = %family, "best fit selected");
        self.fit = Some(best);
        Ok(family)
    }
}

fn estimate(
    samples: &SampleSet,
    family: CurveFamily,
    input: Option<f64>,
    settings: &CurveFitSettings,
) -> EngineResult<CurveFit> {
    let x = samples.x();
    let y = samples.y();
    if family.requires_positive_x() && x.iter().any(|v| *v <= 0.0) {
        return Err(EngineError::numeric(format!("{} law requires positive x", family)));
    }
    if let Some(value) = input {
        if !value.is_finite() {
            return Err(EngineError::numeric("fixed coefficient must be finite"));
        }
    }

    let coefficients = match family {
        CurveFamily::Linear => {
            samples.require(if input.is_some() { 1 } else { 2 }, "linear fit")?;
            let (a, b) = linear_regression(x, y, input)?;
            vec![a, b]
        }
        CurveFamily::Logarithmic => {
            samples.require(if input.is_some() { 1 } else { 2 }, "logarithmic fit")?;
            let ln_x: Vec<f64> = x.iter().map(|v| v.ln()).collect();
            let (a, b) = linear_regression(&ln_x, y, input)?;
            vec![a, b]
        }
        CurveFamily::Polynomial(degree) => {
            if degree == 0 || degree > settings.max_polynomial_degree {
                return Err(EngineError::limit(format!(
                    "polynomial degree {} outside 1..={}",
                    degree, settings.max_polynomial_degree
                )));
            }
            polynomial_least_squares(x, y, degree, input)?
        }
        CurveFamily::Exponential | CurveFamily::Power => nonlinear(samples, family, input, settings)?,
    };

    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(EngineError::convergence(format!("{} fit produced non-finite coefficients", family)));
    }
    let predicted: Vec<f64> = x.iter().map(|&t| family.evaluate(&coefficients, t)).collect();
    if predicted.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::convergence(format!("{} fit is not finite on the samples", family)));
    }
    let statistics = FitStatistics::compute(y, &predicted);
    Ok(CurveFit { family, coefficients, statistics })
}

/// Exponential and power laws: log-linear start, then bounded least squares.
fn nonlinear(
    samples: &SampleSet,
    family: CurveFamily,
    input: Option<f64>,
    settings: &CurveFitSettings,
) -> EngineResult<Vec<f64>> {
    let free = if input.is_some() { 1 } else { 2 };
    samples.require(free, &format!("{} fit", family))?;

    let transform = |v: f64| if family == CurveFamily::Power { v.ln() } else { v };
    let (lx, ly): (Vec<f64>, Vec<f64>) = samples
        .x()
        .iter()
        .zip(samples.y())
        .filter(|(_, v)| **v > 0.0)
        .map(|(t, v)| (transform(*t), v.ln()))
        .unzip();

    let fixed_ln = input.filter(|a| *a > 0.0).map(f64::ln);
    let start = if lx.len() >= free {
        linear_regression(&lx, &ly, fixed_ln).map(|(ln_a, b)| (ln_a.exp(), b)).ok()
    } else {
        None
    };
    let (a0, b0) = start.unwrap_or_else(|| {
        let mean = samples.y().iter().sum::<f64>() / samples.len() as f64;
        (mean, 0.0)
    });

    let unbounded = (f64::NEG_INFINITY, f64::INFINITY);
    let solution = match input {
        Some(a) => levenberg_marquardt(
            samples.x(),
            samples.y(),
            &[b0],
            &[unbounded],
            |t, p| family.evaluate(&[a, p[0]], t),
            &settings.solver,
        )
        .map(|s| vec![a, s.params[0]])?,
        None => levenberg_marquardt(
            samples.x(),
            samples.y(),
            &[a0, b0],
            &[unbounded, unbounded],
            |t, p| family.evaluate(p, t),
            &settings.solver,
        )
        .map(|s| s.params)?,
    };
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(f: impl Fn(f64) -> f64, xs: impl Iterator<Item = f64>) -> CurvefitModel {
        let x: Vec<f64> = xs.collect();
        let y = x.iter().map(|v| f(*v)).collect();
        CurvefitModel::new(SampleSet::new(x, y, false).unwrap())
    }

    fn coefficients(m: &CurvefitModel) -> Vec<f64> {
        m.fitted().unwrap().coefficients.clone()
    }

    #[test]
    fn test_linear_recovery() {
        let mut m = model(|x| 4.0 - 0.25 * x, (0..10).map(f64::from));
        m.fit(CurveFamily::Linear, None, &CurveFitSettings::default()).unwrap();
        let c = coefficients(&m);
        assert!((c[0] - 4.0).abs() < 1e-10);
        assert!((c[1] + 0.25).abs() < 1e-10);
        assert!((m.fitted().unwrap().statistics.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_power_recovery() {
        let mut m = model(|x| 2.0 * x.powf(1.5), (1..21).map(f64::from));
        m.fit(CurveFamily::Power, None, &CurveFitSettings::default()).unwrap();
        let c = coefficients(&m);
        assert!((c[0] - 2.0).abs() < 1e-6);
        assert!((c[1] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_recovery_with_fixed_scale() {
        let mut m = model(|x| 5.0 * (0.1 * x).exp(), (0..20).map(f64::from));
        m.fit(CurveFamily::Exponential, Some(5.0), &CurveFitSettings::default()).unwrap();
        let c = coefficients(&m);
        assert_eq!(c[0], 5.0);
        assert!((c[1] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_logarithmic_recovery() {
        let mut m = model(|x| 3.0 + 2.0 * x.ln(), (1..15).map(f64::from));
        m.fit(CurveFamily::Logarithmic, None, &CurveFitSettings::default()).unwrap();
        let c = coefficients(&m);
        assert!((c[0] - 3.0).abs() < 1e-10);
        assert!((c[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_polynomial_recovery_and_degree_limit() {
        let mut m = model(|x| 1.0 + 2.0 * x - 0.5 * x * x + 0.01 * x.powi(3), (0..12).map(f64::from));
        m.fit(CurveFamily::Polynomial(3), None, &CurveFitSettings::default()).unwrap();
        let c = coefficients(&m);
        for (got, want) in c.iter().zip([1.0, 2.0, -0.5, 0.01]) {
            assert!((got - want).abs() < 1e-8, "{} vs {}", got, want);
        }

        let result = m.fit(CurveFamily::Polynomial(9), None, &CurveFitSettings::default());
        assert!(matches!(result, Err(EngineError::Limit(_))));
        assert!(m.fitted().is_none());
    }

    #[test]
    fn test_log_law_rejects_zero_x() {
        let mut m = model(|x| x, (0..5).map(f64::from));
        assert!(m.fit(CurveFamily::Logarithmic, None, &CurveFitSettings::default()).is_err());
    }

    #[test]
    fn test_best_fit_selects_generating_law() {
        let settings = CurveFitSettings::default();
        let cases: Vec<(CurvefitModel, CurveFamily)> = vec![
            (model(|x| 4.0 - 0.25 * x, (1..12).map(f64::from)), CurveFamily::Linear),
            (model(|x| 2.0 * x.powf(1.5), (1..21).map(f64::from)), CurveFamily::Power),
            (model(|x| 5.0 * (0.1 * x).exp(), (0..20).map(f64::from)), CurveFamily::Exponential),
            (model(|x| 3.0 + 2.0 * x.ln(), (1..15).map(f64::from)), CurveFamily::Logarithmic),
        ];
        for (mut m, expected) in cases {
            assert_eq!(m.fit_best(&settings).unwrap(), expected);
            assert_eq!(m.fitted().unwrap().family, expected);
        }
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("linear".parse::<CurveFamily>().unwrap(), CurveFamily::Linear);
        assert_eq!("polynomial".parse::<CurveFamily>().unwrap(), CurveFamily::Polynomial(2));
        assert_eq!("polynomial4".parse::<CurveFamily>().unwrap(), CurveFamily::Polynomial(4));
        assert_eq!(CurveFamily::Polynomial(4).to_string(), "polynomial4");
        assert!("spline".parse::<CurveFamily>().is_err());
    }
}
