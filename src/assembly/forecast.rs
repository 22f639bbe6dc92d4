//! Forecast profiles from assembled functions

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AssembledFunction;
use crate::profile::{Profile, RATE_TO_VOLUME};
use crate::types::{EngineResult, Phase, Stream};

/// What the assembled function's x measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAxis {
    /// Elapsed days; `potential[i] = g(start + t_i)`.
    Time,
    /// Cumulative volume; the function is stepped forward with
    /// `Np_{i+1} = Np_i + g(Np_i)·Δt / 1000`.
    Cumulative,
}

/// Generate a single-phase forecast on `dateline` with full uptime.
///
/// Samples outside the function's domain (before `x0` or after `run_to`)
/// get zero potential. A lift-gas forecast also fills total gas with the
/// same values, all of it lift gas.
pub fn forecast_profile(
    function: &AssembledFunction,
    phase: Phase,
    dateline: &[NaiveDate],
    axis: ForecastAxis,
    start: f64,
) -> EngineResult<Profile> {
    let mut profile = Profile::allocate(dateline)?;
    let times = profile.times().to_vec();

    let sample = |x: f64| -> EngineResult<f64> {
        if function.contains(x) {
            Ok(function.evaluate(x)?.max(0.0))
        } else {
            Ok(0.0)
        }
    };

    let potential = match axis {
        ForecastAxis::Time => times.iter().map(|t| sample(start + t)).collect::<EngineResult<Vec<_>>>()?,
        ForecastAxis::Cumulative => {
            let mut values = Vec::with_capacity(times.len());
            let mut cumulative = start;
            for (i, t) in times.iter().enumerate() {
                let q = sample(cumulative)?;
                values.push(q);
                if let Some(next) = times.get(i + 1) {
                    cumulative += q * (next - t) / RATE_TO_VOLUME;
                }
            }
            values
        }
    };

    if phase == Phase::LiftGas {
        // Lift gas is carried inside total gas
        profile.set_potential(Phase::TotalGas, potential.clone())?;
        profile.fill_uptime(Stream::Production, 1.0)?;
    }
    profile.set_potential(phase, potential)?;
    profile.fill_uptime(phase.stream(), 1.0)?;
    debug!(%phase, ?axis, samples = times.len(), "forecast profile generated");
    Ok(profile)
}
