//! Derived series: potentials, rates, cumulatives, ratios and axes
//!
//! All getters are pure functions of the stored columns.

use chrono::Datelike;

use super::Profile;
use crate::calculus::accumulate_left;
use crate::types::{EngineResult, Phase, Quantity, Ratio, Series, SeriesId, Stream};

/// Rate units (Mstb/d, MMscf/d) times days to cumulative units (MMstb, Bscf).
pub(crate) const RATE_TO_VOLUME: f64 = 1000.0;

/// `num / den`, or 0 when the gate is closed or the denominator is not positive.
#[inline]
fn gated_ratio(num: f64, den: f64, open: bool) -> f64 {
    if open && den > 0.0 {
        num / den
    } else {
        0.0
    }
}

impl Profile {
    // ========================================================================
    // Potentials
    // ========================================================================

    /// Potential of a stored or derived quantity.
    ///
    /// `liquid = oil + water`; `gas = total_gas - lift_gas`, clamped at zero.
    pub fn potential_of(&self, quantity: Quantity) -> Vec<f64> {
        match quantity.phase() {
            Some(phase) => self.potential(phase).to_vec(),
            None => match quantity {
                Quantity::Liquid => self
                    .potential(Phase::Oil)
                    .iter()
                    .zip(self.potential(Phase::Water))
                    .map(|(o, w)| o + w)
                    .collect(),
                _ => self
                    .potential(Phase::TotalGas)
                    .iter()
                    .zip(self.potential(Phase::LiftGas))
                    .map(|(t, l)| (t - l).max(0.0))
                    .collect(),
            },
        }
    }

    // ========================================================================
    // Rates
    // ========================================================================

    fn gated(&self, potential: Vec<f64>, stream: Stream) -> Vec<f64> {
        potential
            .into_iter()
            .zip(self.uptime(stream))
            .map(|(p, u)| p * u)
            .collect()
    }

    /// Rate (potential x applicable uptime) of a quantity.
    ///
    /// Oil, water, liquid and sales gas use the production uptime; total gas
    /// is sales gas rate plus lift gas rate; lift gas and the injection
    /// phases use their own streams.
    pub fn rate(&self, quantity: Quantity) -> Vec<f64> {
        match quantity {
            Quantity::Oil | Quantity::Water | Quantity::Liquid | Quantity::Gas => {
                self.gated(self.potential_of(quantity), Stream::Production)
            }
            Quantity::TotalGas => self
                .rate(Quantity::Gas)
                .into_iter()
                .zip(self.rate(Quantity::LiftGas))
                .map(|(g, l)| g + l)
                .collect(),
            Quantity::LiftGas => self.gated(self.potential_of(quantity), Stream::LiftGas),
            Quantity::GasInjection => self.gated(self.potential_of(quantity), Stream::GasInjection),
            Quantity::WaterInjection => self.gated(self.potential_of(quantity), Stream::WaterInjection),
        }
    }

    /// Rates of the six stored phases, in [`Phase::ALL`] order.
    pub(crate) fn stored_rates(&self) -> super::PhaseColumns {
        Phase::ALL.map(|phase| self.rate(phase.into()))
    }

    // ========================================================================
    // Cumulatives
    // ========================================================================

    /// Offset applying to a stored or derived quantity.
    pub fn offset_for(&self, quantity: Quantity) -> f64 {
        match quantity.phase() {
            Some(phase) => self.offset_of(phase),
            None => match quantity {
                Quantity::Liquid => self.offset_of(Phase::Oil) + self.offset_of(Phase::Water),
                _ => self.offset_of(Phase::TotalGas) - self.offset_of(Phase::LiftGas),
            },
        }
    }

    /// Left-rectangle integral of `rate / 1000` over `times`, plus the offset.
    pub fn cumulative(&self, quantity: Quantity) -> Vec<f64> {
        let volume_rate: Vec<f64> = self
            .rate(quantity)
            .into_iter()
            .map(|r| r / RATE_TO_VOLUME)
            .collect();
        let offset = self.offset_for(quantity);
        accumulate_left(&volume_rate, &self.times)
            .into_iter()
            .map(|c| c + offset)
            .collect()
    }

    // ========================================================================
    // Ratios
    // ========================================================================

    fn potential_ratio(&self, num: Quantity, den: Quantity) -> Vec<f64> {
        let num = self.potential_of(num);
        let den = self.potential_of(den);
        num.iter()
            .zip(&den)
            .zip(self.uptime(Stream::Production))
            .map(|((n, d), u)| gated_ratio(*n, *d, *u > 0.0))
            .collect()
    }

    /// Ratio series.
    ///
    /// Potential-based ratios are zero wherever the denominator potential or
    /// the production uptime is zero. `total_gas_liquid_ratio` divides rates,
    /// since its numerator mixes the production and lift streams.
    pub fn ratio(&self, ratio: Ratio) -> Vec<f64> {
        match ratio {
            Ratio::WaterCut => self.potential_ratio(Quantity::Water, Quantity::Liquid),
            Ratio::OilCut => self.potential_ratio(Quantity::Oil, Quantity::Liquid),
            Ratio::GasOilRatio => self.potential_ratio(Quantity::Gas, Quantity::Oil),
            Ratio::WaterOilRatio => self.potential_ratio(Quantity::Water, Quantity::Oil),
            Ratio::GasLiquidRatio => self.potential_ratio(Quantity::Gas, Quantity::Liquid),
            Ratio::WaterGasRatio => self.potential_ratio(Quantity::Water, Quantity::Gas),
            Ratio::OilGasRatio => self.potential_ratio(Quantity::Oil, Quantity::Gas),
            Ratio::TotalGasLiquidRatio => self
                .rate(Quantity::TotalGas)
                .iter()
                .zip(self.rate(Quantity::Liquid))
                .map(|(t, l)| gated_ratio(*t, l, true))
                .collect(),
        }
    }

    // ========================================================================
    // Axes
    // ========================================================================

    /// Decimal calendar year of each date.
    pub fn years(&self) -> Vec<f64> {
        self.dates
            .iter()
            .map(|d| {
                let days_in_year = if d.leap_year() { 366.0 } else { 365.0 };
                f64::from(d.year()) + f64::from(d.ordinal0()) / days_in_year
            })
            .collect()
    }

    // ========================================================================
    // Series lookup
    // ========================================================================

    /// Materialise a series by identifier.
    pub fn get(&self, id: SeriesId) -> Series {
        match id {
            SeriesId::Date => Series::Dates(self.dates.clone()),
            SeriesId::Time => Series::Values(self.times.clone()),
            SeriesId::Year => Series::Values(self.years()),
            SeriesId::Potential(q) => Series::Values(self.potential_of(q)),
            SeriesId::Rate(q) => Series::Values(self.rate(q)),
            SeriesId::Cumulative(q) => Series::Values(self.cumulative(q)),
            SeriesId::Uptime(s) => Series::Values(self.uptime(s).to_vec()),
            SeriesId::Ratio(r) => Series::Values(self.ratio(r)),
        }
    }

    /// Materialise a series by its documented string key.
    pub fn get_by_key(&self, key: &str) -> EngineResult<Series> {
        Ok(self.get(key.parse()?))
    }

    /// Numeric series used as a curve axis; dates map to elapsed days.
    pub fn axis_values(&self, id: SeriesId) -> Vec<f64> {
        match self.get(id) {
            Series::Values(v) => v,
            Series::Dates(_) => self.times.clone(),
        }
    }
}

macro_rules! quantity_getters {
    ($($quantity:ident => $potential:ident, $rate:ident, $cumulative:ident;)*) => {
        impl Profile {
            $(
                pub fn $potential(&self) -> Vec<f64> {
                    self.potential_of(Quantity::$quantity)
                }

                pub fn $rate(&self) -> Vec<f64> {
                    self.rate(Quantity::$quantity)
                }

                pub fn $cumulative(&self) -> Vec<f64> {
                    self.cumulative(Quantity::$quantity)
                }
            )*
        }
    };
}

quantity_getters! {
    Oil => oil_potential, oil_rate, oil_cumulative;
    Gas => gas_potential, gas_rate, gas_cumulative;
    TotalGas => total_gas_potential, total_gas_rate, total_gas_cumulative;
    Water => water_potential, water_rate, water_cumulative;
    Liquid => liquid_potential, liquid_rate, liquid_cumulative;
    LiftGas => lift_gas_potential, lift_gas_rate, lift_gas_cumulative;
    GasInjection => gas_injection_potential, gas_injection_rate, gas_injection_cumulative;
    WaterInjection => water_injection_potential, water_injection_rate, water_injection_cumulative;
}

macro_rules! ratio_getters {
    ($($ratio:ident => $getter:ident;)*) => {
        impl Profile {
            $(
                pub fn $getter(&self) -> Vec<f64> {
                    self.ratio(Ratio::$ratio)
                }
            )*
        }
    };
}

ratio_getters! {
    WaterCut => water_cut;
    OilCut => oil_cut;
    GasOilRatio => gas_oil_ratio;
    WaterOilRatio => water_oil_ratio;
    GasLiquidRatio => gas_liquid_ratio;
    WaterGasRatio => water_gas_ratio;
    OilGasRatio => oil_gas_ratio;
    TotalGasLiquidRatio => total_gas_liquid_ratio;
}
