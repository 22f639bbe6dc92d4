//! Decline-curve analysis
//!
//! Arps decline laws in two domains:
//!
//! | law         | time domain `q(t)`              | cumulative domain `q(Np)`                              |
//! |-------------|---------------------------------|--------------------------------------------------------|
//! | exponential | `qi·e^(-D·t)`                   | `qi - D·Np`                                            |
//! | hyperbolic  | `qi / (1 + b·D·t)^(1/b)`        | `(qi^(1-b) - (1-b)·D·Np / qi^b)^(1/(1-b))`             |
//! | harmonic    | `qi / (1 + D·t)`                | `qi·e^(-D·Np/qi)`                                      |
//!
//! Cumulative-domain rates are clipped at zero once the law is exhausted.
//! Fits start from a log-linear (or linear) regression and are refined by
//! bounded least squares with `qi > 0`, `D >= 0` and `b` inside the
//! configured hyperbolic range.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::solver::{levenberg_marquardt, linear_regression};
use super::{CurveFitSettings, FitStatistics, Parameter, SampleSet};
use crate::types::{EngineError, EngineResult};

/// Exponent within which a hyperbolic law is treated as harmonic.
const HARMONIC_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaDomain {
    /// Rate against elapsed time.
    Time,
    /// Rate against cumulative production.
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineLaw {
    Exponential,
    Hyperbolic,
    Harmonic,
}

impl DeclineLaw {
    /// Arps exponent for the laws that fix it.
    fn fixed_exponent(self) -> Option<f64> {
        match self {
            Self::Exponential => Some(0.0),
            Self::Harmonic => Some(1.0),
            Self::Hyperbolic => None,
        }
    }
}

impl fmt::Display for DeclineLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exponential => "exponential",
            Self::Hyperbolic => "hyperbolic",
            Self::Harmonic => "harmonic",
        };
        f.write_str(name)
    }
}

impl FromStr for DeclineLaw {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" => Ok(Self::Exponential),
            "hyperbolic" => Ok(Self::Hyperbolic),
            "harmonic" => Ok(Self::Harmonic),
            _ => Err(EngineError::unsupported(format!("unknown decline law '{}'", s))),
        }
    }
}

/// Arps rate for exponent `b` (0 = exponential, 1 = harmonic).
pub fn decline_rate(domain: DcaDomain, qi: f64, d: f64, b: f64, x: f64) -> f64 {
    match domain {
        DcaDomain::Time if b == 0.0 => qi * (-d * x).exp(),
        DcaDomain::Time => qi / (1.0 + b * d * x).powf(1.0 / b),
        DcaDomain::Cumulative if b == 0.0 => (qi - d * x).max(0.0),
        DcaDomain::Cumulative if (b - 1.0).abs() < HARMONIC_EPSILON => qi * (-d * x / qi).exp(),
        DcaDomain::Cumulative => {
            let base = qi.powf(1.0 - b) - (1.0 - b) * d * x / qi.powf(b);
            if base <= 0.0 {
                0.0
            } else {
                base.powf(1.0 / (1.0 - b))
            }
        }
    }
}

/// Fitted decline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclineFit {
    pub law: DeclineLaw,
    pub qi: f64,
    /// Nominal decline per unit x.
    pub d: f64,
    pub b: f64,
    pub statistics: FitStatistics,
}

impl DeclineFit {
    pub fn parameters(&self) -> Vec<Parameter> {
        let mut parameters = vec![Parameter::new("qi", self.qi), Parameter::new("d", self.d)];
        if self.law == DeclineLaw::Hyperbolic {
            parameters.push(Parameter::new("b", self.b));
        }
        parameters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcaModel {
    domain: DcaDomain,
    samples: SampleSet,
    fit: Option<DeclineFit>,
}

impl DcaModel {
    pub fn new(domain: DcaDomain, samples: SampleSet) -> Self {
        Self { domain, samples, fit: None }
    }

    pub fn domain(&self) -> DcaDomain {
        self.domain
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn fitted(&self) -> Option<&DeclineFit> {
        self.fit.as_ref()
    }

    pub fn evaluate_local(&self, x: f64) -> Option<f64> {
        self.fit
            .as_ref()
            .map(|f| decline_rate(self.domain, f.qi, f.d, f.b, x))
    }

    /// Fit `law`; `input` fixes the initial rate `qi`.
    pub fn fit(&mut self, law: DeclineLaw, input: Option<f64>, settings: &CurveFitSettings) -> EngineResult<()> {
        self.fit = None;
        let fit = self.estimate(law, input, settings)?;
        self.fit = Some(fit);
        Ok(())
    }

    fn estimate(&self, law: DeclineLaw, input: Option<f64>, settings: &CurveFitSettings) -> EngineResult<DeclineFit> {
        if let Some(qi) = input {
            if !(qi.is_finite() && qi > 0.0) {
                return Err(EngineError::limit(format!("initial rate must be positive, got {}", qi)));
            }
        }
        let b_range = (settings.hyperbolic_b_min, settings.hyperbolic_b_max);
        if law == DeclineLaw::Hyperbolic && !(b_range.0 > 0.0 && b_range.0 < b_range.1) {
            return Err(EngineError::limit(format!(
                "hyperbolic exponent range [{}, {}] is empty",
                b_range.0, b_range.1
            )));
        }

        let free = match law {
            DeclineLaw::Hyperbolic => 3,
            _ => 2,
        } - usize::from(input.is_some());
        self.samples.require(free, &format!("{} decline fit", law))?;

        let (qi0, d0) = self.initial_guess(law, input)?;
        let b0 = law.fixed_exponent().unwrap_or_else(|| 0.5_f64.clamp(b_range.0, b_range.1));
        let domain = self.domain;
        let hyperbolic = law == DeclineLaw::Hyperbolic;

        let mut initial = Vec::with_capacity(3);
        let mut bounds = Vec::with_capacity(3);
        if input.is_none() {
            initial.push(qi0);
            bounds.push((f64::MIN_POSITIVE, f64::INFINITY));
        }
        initial.push(d0);
        bounds.push((0.0, f64::INFINITY));
        if hyperbolic {
            initial.push(b0);
            bounds.push(b_range);
        }

        let unpack = move |p: &[f64]| -> (f64, f64, f64) {
            let (qi, rest) = match input {
                Some(qi) => (qi, p),
                None => (p[0], &p[1..]),
            };
            let b = if hyperbolic { rest[1] } else { b0 };
            (qi, rest[0], b)
        };

        let solution = levenberg_marquardt(
            self.samples.x(),
            self.samples.y(),
            &initial,
            &bounds,
            |x, p| {
                let (qi, d, b) = unpack(p);
                decline_rate(domain, qi, d, b, x)
            },
            &settings.solver,
        )?;

        let (qi, d, b) = unpack(&solution.params);
        let predicted: Vec<f64> = self
            .samples
            .x()
            .iter()
            .map(|&x| decline_rate(domain, qi, d, b, x))
            .collect();
        if predicted.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::convergence(format!("{} decline is not finite on the samples", law)));
        }

        Ok(DeclineFit {
            law,
            qi,
            d,
            b,
            statistics: FitStatistics::compute(self.samples.y(), &predicted),
        })
    }

    /// Regression start: `ln q` against x for rate-time and harmonic laws,
    /// `q` against `Np` for the cumulative exponential law.
    fn initial_guess(&self, law: DeclineLaw, input: Option<f64>) -> EngineResult<(f64, f64)> {
        let linear_in_cumulative = self.domain == DcaDomain::Cumulative && law == DeclineLaw::Exponential;
        if linear_in_cumulative {
            let (qi, slope) = linear_regression(self.samples.x(), self.samples.y(), input)?;
            let qi = if qi > 0.0 { qi } else { self.samples.y().iter().fold(0.0, |m: f64, v| m.max(*v)) };
            return Ok((qi.max(f64::MIN_POSITIVE), (-slope).max(0.0)));
        }

        let (x, ln_q): (Vec<f64>, Vec<f64>) = self
            .samples
            .x()
            .iter()
            .zip(self.samples.y())
            .filter(|(_, q)| **q > 0.0)
            .map(|(x, q)| (*x, q.ln()))
            .unzip();
        let needed = if input.is_some() { 1 } else { 2 };
        if x.len() < needed {
            return Err(EngineError::numeric(format!(
                "{} decline fit needs {} positive rates, got {}",
                law,
                needed,
                x.len()
            )));
        }

        let (ln_qi, slope) = linear_regression(&x, &ln_q, input.map(f64::ln))?;
        let qi = ln_qi.exp();
        let d = match self.domain {
            DcaDomain::Time => -slope,
            DcaDomain::Cumulative => -slope * qi,
        };
        Ok((qi, d.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(domain: DcaDomain, f: impl Fn(f64) -> f64, xs: impl Iterator<Item = f64>) -> DcaModel {
        let x: Vec<f64> = xs.collect();
        let y = x.iter().map(|v| f(*v)).collect();
        DcaModel::new(domain, SampleSet::new(x, y, false).unwrap())
    }

    fn monthly(n: i32) -> impl Iterator<Item = f64> {
        (0..n).map(|i| f64::from(i) * 30.0)
    }

    #[test]
    fn test_exponential_time_decline() {
        let mut m = model(DcaDomain::Time, |t| 1000.0 * (-0.002 * t).exp(), monthly(13));
        m.fit(DeclineLaw::Exponential, None, &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert!((fit.qi - 1000.0).abs() < 1e-6);
        assert!((fit.d - 0.002).abs() < 1e-10);
        let q365 = m.evaluate_local(365.0).unwrap();
        assert!((q365 - 1000.0 * (-0.73_f64).exp()).abs() < 1e-6);
        assert!((q365 - 481.9).abs() < 0.1);
    }

    #[test]
    fn test_harmonic_time_with_fixed_initial_rate() {
        let mut m = model(DcaDomain::Time, |t| 500.0 / (1.0 + 0.004 * t), monthly(20));
        m.fit(DeclineLaw::Harmonic, Some(500.0), &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert_eq!(fit.qi, 500.0);
        assert!((fit.d - 0.004).abs() < 1e-8);
        assert_eq!(fit.parameters().len(), 2);
    }

    #[test]
    fn test_hyperbolic_time_recovery() {
        let truth = |t: f64| 800.0 / (1.0 + 0.6 * 0.01 * t).powf(1.0 / 0.6);
        let mut m = model(DcaDomain::Time, truth, monthly(25));
        m.fit(DeclineLaw::Hyperbolic, None, &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert!((fit.qi - 800.0).abs() < 0.5, "qi = {}", fit.qi);
        assert!((fit.d - 0.01).abs() < 1e-4, "d = {}", fit.d);
        assert!((fit.b - 0.6).abs() < 1e-2, "b = {}", fit.b);
        assert_eq!(fit.parameters().len(), 3);
    }

    #[test]
    fn test_exponential_cumulative_is_linear_in_np() {
        let mut m = model(DcaDomain::Cumulative, |np| 300.0 - 0.5 * np, (0..10).map(|i| f64::from(i) * 40.0));
        m.fit(DeclineLaw::Exponential, None, &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert!((fit.qi - 300.0).abs() < 1e-8);
        assert!((fit.d - 0.5).abs() < 1e-10);
        // exhausted at Np = 600
        assert_eq!(m.evaluate_local(700.0), Some(0.0));
    }

    #[test]
    fn test_harmonic_cumulative_recovery() {
        let mut m = model(
            DcaDomain::Cumulative,
            |np| 400.0 * (-0.8 * np / 400.0).exp(),
            (0..12).map(|i| f64::from(i) * 50.0),
        );
        m.fit(DeclineLaw::Harmonic, None, &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert!((fit.qi - 400.0).abs() < 1e-6);
        assert!((fit.d - 0.8).abs() < 1e-8);
    }

    #[test]
    fn test_hyperbolic_cumulative_recovery() {
        let mut m = model(
            DcaDomain::Cumulative,
            |np| decline_rate(DcaDomain::Cumulative, 500.0, 0.2, 0.5, np),
            (0..21).map(|i| f64::from(i) * 100.0),
        );
        m.fit(DeclineLaw::Hyperbolic, None, &CurveFitSettings::default()).unwrap();
        let fit = m.fitted().unwrap();
        assert!((fit.qi - 500.0).abs() < 0.5, "qi = {}", fit.qi);
        assert!((fit.b - 0.5).abs() < 1e-2, "b = {}", fit.b);
    }

    #[test]
    fn test_rate_laws_agree_at_origin() {
        for domain in [DcaDomain::Time, DcaDomain::Cumulative] {
            for b in [0.0, 0.5, 1.0, 1.5] {
                assert!((decline_rate(domain, 250.0, 0.1, b, 0.0) - 250.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_failed_fit_clears_parameters() {
        let truth = |t: f64| 800.0 / (1.0 + 0.6 * 0.01 * t).powf(1.0 / 0.6);
        let mut m = model(DcaDomain::Time, truth, monthly(25));
        m.fit(DeclineLaw::Exponential, None, &CurveFitSettings::default()).unwrap();
        assert!(m.fitted().is_some());

        let mut starved = CurveFitSettings::default();
        starved.solver.max_iterations = 1;
        let result = m.fit(DeclineLaw::Hyperbolic, None, &starved);
        assert!(matches!(result, Err(EngineError::Convergence(_))));
        assert!(m.fitted().is_none());
        assert_eq!(m.evaluate_local(10.0), None);
    }

    #[test]
    fn test_non_positive_initial_rate_rejected() {
        let mut m = model(DcaDomain::Time, |t| 100.0 - t, monthly(3));
        let result = m.fit(DeclineLaw::Exponential, Some(0.0), &CurveFitSettings::default());
        assert!(matches!(result, Err(EngineError::Limit(_))));
    }
}
