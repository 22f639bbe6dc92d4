//! Production Profile
//!
//! A `Profile` is a dense, column-stored table over an irregular, strictly
//! monotone date axis. It holds per-phase potentials (unconstrained rates),
//! per-stream uptime fractions and per-phase cumulative offsets, and derives
//! every rate, cumulative and ratio on demand.
//!
//! ## Lifecycle
//! - `Profile::new()` / `Profile::allocate()` - empty or zero-filled on a dateline
//! - `set_potential()` / `set_uptime()` / `set_offsets()` - column import
//! - `add()` / `sum()` - rate-preserving additive composition (see `resample`)
//! - `resample()` - move onto a new dateline conserving produced volume
//! - `temporal_scale()` - analogue-to-target transformation (see `scaling`)
//! - `stack()` / `prepend()` / `append()` / `truncate()` / `replace()` - splicing
//! - `set_offset()` - continue cumulatives from another profile's end
//!
//! Every mutator validates first and commits last: a failed call leaves the
//! profile untouched.

mod derived;
mod resample;
mod scaling;
mod splice;

pub(crate) use derived::RATE_TO_VOLUME;
pub use resample::calculate_uptime;
pub use scaling::{FluidProperties, TemporalScalers};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{EngineError, EngineResult, Phase, Stream};

/// Per-phase potential columns, in [`Phase::ALL`] order.
pub type PhaseColumns = [Vec<f64>; Phase::COUNT];

/// Per-stream uptime columns, in [`Stream::ALL`] order.
pub type StreamColumns = [Vec<f64>; Stream::COUNT];

/// Irregular production/injection time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    dates: Vec<NaiveDate>,
    /// Elapsed days since `dates[0]`; fractional after temporal scaling.
    times: Vec<f64>,
    potentials: PhaseColumns,
    uptimes: StreamColumns,
    /// Cumulative offsets (MMstb / Bscf) folded into every cumulative.
    offset: [f64; Phase::COUNT],
}

/// Reject a dateline that is not strictly increasing.
pub(crate) fn check_dateline(dates: &[NaiveDate]) -> EngineResult<()> {
    match dates.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(EngineError::numeric(format!(
            "dates must be strictly increasing: {} is followed by {}",
            dates[i],
            dates[i + 1]
        ))),
        None => Ok(()),
    }
}

fn check_lift_within_total(total: &[f64], lift: &[f64]) -> EngineResult<()> {
    match total.iter().zip(lift).position(|(t, l)| l > t) {
        Some(i) => Err(EngineError::limit(format!(
            "lift gas potential {} exceeds total gas potential {} at index {i}",
            lift[i], total[i]
        ))),
        None => Ok(()),
    }
}

/// Elapsed days from the first date.
pub(crate) fn times_from_dates(dates: &[NaiveDate]) -> Vec<f64> {
    match dates.first() {
        Some(&start) => dates.iter().map(|d| (*d - start).num_days() as f64).collect(),
        None => Vec::new(),
    }
}

/// Calendar dates for elapsed times, rounded to whole days.
pub(crate) fn dates_from_times(start: NaiveDate, times: &[f64]) -> Vec<NaiveDate> {
    times
        .iter()
        .map(|t| start + Duration::days(t.round() as i64))
        .collect()
}

impl Profile {
    /// Empty profile (N = 0, zero offsets).
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled profile on `dateline`.
    ///
    /// Potentials and uptimes start at zero; the dateline must be strictly
    /// increasing.
    pub fn allocate(dateline: &[NaiveDate]) -> EngineResult<Self> {
        check_dateline(dateline)?;
        let n = dateline.len();
        Ok(Self {
            dates: dateline.to_vec(),
            times: times_from_dates(dateline),
            potentials: std::array::from_fn(|_| vec![0.0; n]),
            uptimes: std::array::from_fn(|_| vec![0.0; n]),
            offset: [0.0; Phase::COUNT],
        })
    }

    pub(crate) fn from_parts(
        dates: Vec<NaiveDate>,
        times: Vec<f64>,
        potentials: PhaseColumns,
        uptimes: StreamColumns,
        offset: [f64; Phase::COUNT],
    ) -> Self {
        Self { dates, times, potentials, uptimes, offset }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Stored potential column.
    pub fn potential(&self, phase: Phase) -> &[f64] {
        &self.potentials[phase.index()]
    }

    /// Stored uptime column.
    pub fn uptime(&self, stream: Stream) -> &[f64] {
        &self.uptimes[stream.index()]
    }

    pub const fn offset(&self) -> &[f64; Phase::COUNT] {
        &self.offset
    }

    pub const fn offset_of(&self, phase: Phase) -> f64 {
        self.offset[phase.index()]
    }

    /// Independent deep copy.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    // ========================================================================
    // Column import
    // ========================================================================

    fn check_column(&self, name: &str, values: &[f64]) -> EngineResult<()> {
        if values.len() != self.len() {
            return Err(EngineError::numeric(format!(
                "{name} column has {} values, profile has {} dates",
                values.len(),
                self.len()
            )));
        }
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(EngineError::limit(format!(
                "{name} value {v} at index {i} must be finite and non-negative"
            )));
        }
        Ok(())
    }

    /// Replace a potential column. Values must be finite and non-negative.
    ///
    /// Lift gas is part of total gas: setting either column fails with
    /// `EngineError::Limit` if lift gas would exceed total gas at any date.
    /// Set total gas first when loading both.
    pub fn set_potential(&mut self, phase: Phase, values: Vec<f64>) -> EngineResult<()> {
        self.check_column(phase.name(), &values)?;
        match phase {
            Phase::LiftGas => check_lift_within_total(&self.potentials[Phase::TotalGas.index()], &values)?,
            Phase::TotalGas => check_lift_within_total(&values, &self.potentials[Phase::LiftGas.index()])?,
            _ => {}
        }
        self.potentials[phase.index()] = values;
        Ok(())
    }

    /// Replace an uptime column. Values must lie in `[0, 1]`.
    pub fn set_uptime(&mut self, stream: Stream, values: Vec<f64>) -> EngineResult<()> {
        let name = format!("{stream} uptime");
        self.check_column(&name, &values)?;
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| **v > 1.0) {
            return Err(EngineError::limit(format!(
                "{name} value {v} at index {i} exceeds 1"
            )));
        }
        self.uptimes[stream.index()] = values;
        Ok(())
    }

    /// Set a whole uptime column to one value.
    pub fn fill_uptime(&mut self, stream: Stream, value: f64) -> EngineResult<()> {
        self.set_uptime(stream, vec![value; self.len()])
    }

    /// Set every uptime stream to one value.
    pub fn fill_uptimes(&mut self, value: f64) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::limit(format!("uptime {value} outside [0, 1]")));
        }
        let n = self.len();
        self.uptimes = std::array::from_fn(|_| vec![value; n]);
        Ok(())
    }

    /// Replace all offsets. Offsets must be finite and non-negative.
    pub fn set_offsets(&mut self, offset: [f64; Phase::COUNT]) -> EngineResult<()> {
        if let Some((i, v)) = offset.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(EngineError::limit(format!(
                "{} offset {v} must be finite and non-negative",
                Phase::ALL[i]
            )));
        }
        self.offset = offset;
        Ok(())
    }

    /// Continue this profile's cumulatives from the end of `history`.
    ///
    /// Each offset becomes the final cumulative of the matching phase in
    /// `history` (its own offset included). An empty history contributes
    /// only its offsets.
    pub fn set_offset(&mut self, history: &Self) {
        let mut offset = history.offset;
        if !history.is_empty() {
            for phase in Phase::ALL {
                if let Some(last) = history.cumulative(phase.into()).last() {
                    offset[phase.index()] = *last;
                }
            }
        }
        self.offset = offset;
    }

    // ========================================================================
    // Axis maintenance
    // ========================================================================

    /// Recompute dates as `start + times`, rounded to whole days.
    pub fn set_dates(&mut self, start: NaiveDate) -> EngineResult<()> {
        let dates = dates_from_times(start, &self.times);
        check_dateline(&dates)?;
        self.dates = dates;
        Ok(())
    }

    /// Recompute times as elapsed days from the first date.
    pub fn set_times(&mut self) {
        self.times = times_from_dates(&self.dates);
    }

    /// Elapsed days from this profile's first date to `date`.
    pub(crate) fn time_at(&self, date: NaiveDate) -> f64 {
        self.dates
            .first()
            .map_or(0.0, |start| (date - *start).num_days() as f64)
    }
}
