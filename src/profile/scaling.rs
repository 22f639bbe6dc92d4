//! Temporal scaling for analogue-to-target transformation
//!
//! An analogue profile is stretched in time, scaled in rate, and optionally
//! has its water and gas breakthrough re-balanced through a reservoir-volume
//! mass balance, so that it can stand in for a target well.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_dateline, dates_from_times, Profile};
use crate::types::{EngineError, EngineResult, Phase};

/// Scaling factors for [`Profile::temporal_scale`]. `None` leaves the
/// corresponding aspect untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalScalers {
    /// Multiplies elapsed time; stretches or compresses the time axis.
    pub cumulative: Option<f64>,
    /// Multiplies potentials and divides elapsed time; volumes are kept.
    pub rate: Option<f64>,
    /// Multiplies the water-to-hydrocarbon reservoir volume ratio.
    pub ffw: Option<f64>,
    /// Multiplies the free-gas-to-oil reservoir volume ratio.
    pub ffg: Option<f64>,
}

/// Formation volume factors and solution gas-oil ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidProperties {
    /// Oil formation volume factor (rb/stb)
    pub bo: f64,
    /// Gas formation volume factor (rb/Mscf)
    pub bg: f64,
    /// Water formation volume factor (rb/stb)
    pub bw: f64,
    /// Solution gas-oil ratio (Mscf/stb)
    pub rs: f64,
}

impl Default for FluidProperties {
    fn default() -> Self {
        Self {
            bo: 1.2,
            bg: 0.8,
            bw: 1.0,
            rs: 0.5,
        }
    }
}

impl FluidProperties {
    pub fn validate(&self) -> EngineResult<()> {
        for (name, v) in [("bo", self.bo), ("bg", self.bg), ("bw", self.bw)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(EngineError::limit(format!("{name} must be positive, got {v}")));
            }
        }
        if !(self.rs.is_finite() && self.rs >= 0.0) {
            return Err(EngineError::limit(format!("rs must be non-negative, got {}", self.rs)));
        }
        Ok(())
    }
}

/// Reservoir-volume breakdown of one timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReservoirVolumes {
    pub oil: f64,
    pub free_gas: f64,
    pub water: f64,
}

impl ReservoirVolumes {
    pub(crate) fn at(oil: f64, total_gas: f64, lift_gas: f64, water: f64, fluids: &FluidProperties) -> Self {
        let gas_surface = (total_gas - lift_gas).max(0.0);
        Self {
            oil: fluids.bo * oil,
            free_gas: fluids.bg * (gas_surface - fluids.rs * oil).max(0.0),
            water: fluids.bw * water,
        }
    }

    pub(crate) fn total(&self) -> f64 {
        self.oil + self.free_gas + self.water
    }
}

fn check_positive(name: &str, value: Option<f64>) -> EngineResult<()> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(EngineError::limit(format!("{name} scaler must be positive, got {v}")))
        }
        _ => Ok(()),
    }
}

fn check_non_negative(name: &str, value: Option<f64>) -> EngineResult<()> {
    match value {
        Some(v) if !(v.is_finite() && v >= 0.0) => {
            Err(EngineError::limit(format!("{name} scaler must be non-negative, got {v}")))
        }
        _ => Ok(()),
    }
}

/// Fractional flows `(ffw, ffg)` after applying the scalers.
fn fractional_flows(res: &ReservoirVolumes, s_ffw: f64, s_ffg: f64) -> EngineResult<(f64, f64)> {
    let hydrocarbon = res.oil + res.free_gas;
    let ffw = if hydrocarbon > 0.0 {
        let whcr = res.water / hydrocarbon * s_ffw;
        whcr / (1.0 + whcr)
    } else {
        1.0
    };
    let ffg = if res.oil > 0.0 {
        let fgor = res.free_gas / res.oil * s_ffg;
        fgor / (1.0 + fgor)
    } else if res.free_gas > 0.0 {
        1.0
    } else {
        0.0
    };

    if !(0.0..=1.0).contains(&ffw) || !(0.0..=1.0).contains(&ffg) {
        return Err(EngineError::limit(format!(
            "fractional flow out of bounds: ffw={ffw}, ffg={ffg}"
        )));
    }
    Ok((ffw, ffg))
}

impl Profile {
    /// Scale this profile in place.
    ///
    /// 1. `cumulative` multiplies elapsed time.
    /// 2. `rate` divides elapsed time and multiplies every potential.
    /// 3. Dates are rebuilt as `dates[0] + times`.
    /// 4. When `ffw` or `ffg` is given (the other defaulting to 1), oil, water
    ///    and gas potentials are redistributed at constant total reservoir
    ///    volume. The original total-gas/liquid ratio is preserved through
    ///    lift gas where it was defined. Without liquid, total gas becomes
    ///    the rebalanced gas and lift gas is capped at it.
    ///
    /// Fails with `EngineError::Limit` for non-positive time/rate scalers,
    /// negative flow scalers, invalid fluids, out-of-bounds fractional flows,
    /// or a compression that collapses two samples onto one date.
    pub fn temporal_scale(&mut self, scalers: &TemporalScalers, fluids: &FluidProperties) -> EngineResult<()> {
        check_positive("cumulative", scalers.cumulative)?;
        check_positive("rate", scalers.rate)?;
        check_non_negative("ffw", scalers.ffw)?;
        check_non_negative("ffg", scalers.ffg)?;
        fluids.validate()?;

        let Some(start) = self.start_date() else {
            return Ok(());
        };

        let s_cum = scalers.cumulative.unwrap_or(1.0);
        let s_rate = scalers.rate.unwrap_or(1.0);
        let times: Vec<f64> = self.times.iter().map(|t| t * s_cum / s_rate).collect();
        let dates = dates_from_times(start, &times);
        check_dateline(&dates).map_err(|e| EngineError::limit(format!("time compression collapses dates: {e}")))?;

        let mut potentials = self.potentials.clone();
        if scalers.rate.is_some() {
            for column in &mut potentials {
                column.iter_mut().for_each(|v| *v *= s_rate);
            }
        }

        if scalers.ffw.is_some() || scalers.ffg.is_some() {
            let s_ffw = scalers.ffw.unwrap_or(1.0);
            let s_ffg = scalers.ffg.unwrap_or(1.0);
            let [oil, total_gas, water, lift_gas] =
                [Phase::Oil, Phase::TotalGas, Phase::Water, Phase::LiftGas].map(Phase::index);

            for t in 0..self.len() {
                let res = ReservoirVolumes::at(
                    potentials[oil][t],
                    potentials[total_gas][t],
                    potentials[lift_gas][t],
                    potentials[water][t],
                    fluids,
                );
                let reservoir = res.total();
                if reservoir <= 0.0 {
                    continue;
                }

                let liquid = potentials[oil][t] + potentials[water][t];
                let tglr = (liquid > 0.0).then(|| potentials[total_gas][t] / liquid);
                let (ffw, ffg) = fractional_flows(&res, s_ffw, s_ffg)?;

                let new_water = reservoir * ffw / fluids.bw;
                let new_oil = reservoir * (1.0 - ffw) * (1.0 - ffg) / fluids.bo;
                let new_gas = fluids.rs * new_oil + reservoir * (1.0 - ffw) * ffg / fluids.bg;

                potentials[water][t] = new_water;
                potentials[oil][t] = new_oil;
                match tglr {
                    Some(tglr) => {
                        let lift = (tglr * (new_oil + new_water) - new_gas).max(0.0);
                        potentials[lift_gas][t] = lift;
                        potentials[total_gas][t] = new_gas + lift;
                    }
                    None => {
                        potentials[total_gas][t] = new_gas;
                        potentials[lift_gas][t] = potentials[lift_gas][t].min(new_gas);
                    }
                }
            }
        }

        debug!(s_cum, s_rate, ffw = ?scalers.ffw, ffg = ?scalers.ffg, "Temporal scale applied");
        self.times = times;
        self.dates = dates;
        self.potentials = potentials;
        Ok(())
    }
}
