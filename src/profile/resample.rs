//! Rate-preserving resampling and additive composition
//!
//! Potentials are never interpolated directly. Each column is integrated to
//! a volume curve on its own time axis, the volume curve is sampled at the
//! target times, and the rate over each target interval is recovered by
//! differencing. This conserves produced volume across any dateline change.
//!
//! Under the left-rectangle convention a sample's rate applies over the
//! interval that starts at its date, so target sample `i` receives the
//! volume between targets `i` and `i + 1`. The last target has no interval
//! and takes the source rate in force at its date. Resampling onto the
//! source's own dateline is therefore exact.
//!
//! Uptimes are rebuilt from the resampled rates and potentials by
//! [`calculate_uptime`]; they are never averaged.

use chrono::NaiveDate;
use tracing::debug;

use super::{check_dateline, times_from_dates, PhaseColumns, Profile, StreamColumns};
use super::derived::RATE_TO_VOLUME;
use crate::calculus::{accumulate_left, interpolate_many};
use crate::types::{EngineError, EngineResult, Fractions, Phase};

// ============================================================================
// Column reindexing
// ============================================================================

/// Source rate in force at time `t`: zero outside `[times[0], times[N-1]]`.
fn step_rate(times: &[f64], rate: &[f64], t: f64) -> f64 {
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return 0.0;
    };
    if t < first || t > last {
        return 0.0;
    }
    let idx = times.partition_point(|&v| v <= t);
    rate[idx.saturating_sub(1)]
}

/// Volume-conserving transfer of a rate column onto `targets`.
///
/// Returns the per-target rates and the volume accumulated before the
/// first target.
fn reindex_column(times: &[f64], rate: &[f64], targets: &[f64]) -> (Vec<f64>, f64) {
    let volume = interpolate_many(times, &accumulate_left(rate, times), targets);
    let m = targets.len();

    let mut out = Vec::with_capacity(m);
    for i in 0..m {
        if i + 1 < m {
            out.push((volume[i + 1] - volume[i]) / (targets[i + 1] - targets[i]));
        } else {
            out.push(step_rate(times, rate, targets[i]));
        }
    }

    let before = volume.first().copied().unwrap_or(0.0);
    (out, before)
}

/// Target dates expressed on `source`'s elapsed-time axis.
fn target_times(source: &Profile, dates: &[NaiveDate]) -> Vec<f64> {
    dates.iter().map(|d| source.time_at(*d)).collect()
}

// ============================================================================
// Uptime reconstruction
// ============================================================================

#[inline]
fn share(rate: f64, potential: f64) -> f64 {
    if potential > 0.0 {
        (rate / potential).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Rebuild the four uptime streams from potentials and rates.
///
/// Production uptime is `oil_rate / oil_potential`, falling back to water,
/// then to sales gas (`total_gas - lift_gas`), then to zero. The other
/// streams are `rate / potential` of their own phase, zero when the
/// potential is zero. Results are clamped to `[0, 1]`.
pub fn calculate_uptime(potentials: &PhaseColumns, rates: &PhaseColumns) -> StreamColumns {
    let n = potentials[Phase::Oil.index()].len();
    let col = |cols: &PhaseColumns, phase: Phase, t: usize| cols[phase.index()][t];

    let production = (0..n)
        .map(|t| {
            let oil = col(potentials, Phase::Oil, t);
            let water = col(potentials, Phase::Water, t);
            let gas = col(potentials, Phase::TotalGas, t) - col(potentials, Phase::LiftGas, t);
            if oil > 0.0 {
                share(col(rates, Phase::Oil, t), oil)
            } else if water > 0.0 {
                share(col(rates, Phase::Water, t), water)
            } else if gas > 0.0 {
                share(col(rates, Phase::TotalGas, t) - col(rates, Phase::LiftGas, t), gas)
            } else {
                0.0
            }
        })
        .collect();

    let own = |phase: Phase| -> Vec<f64> {
        (0..n)
            .map(|t| share(col(rates, phase, t), col(potentials, phase, t)))
            .collect()
    };

    [
        production,
        own(Phase::LiftGas),
        own(Phase::GasInjection),
        own(Phase::WaterInjection),
    ]
}

// ============================================================================
// Resample / add / sum
// ============================================================================

impl Profile {
    /// Profile on `dateline` carrying the same produced volumes.
    ///
    /// Volume produced before the new first date moves into the offsets so
    /// cumulatives stay continuous. An empty profile is returned unchanged.
    pub fn resample(&self, dateline: &[NaiveDate]) -> EngineResult<Self> {
        check_dateline(dateline)?;
        if self.is_empty() {
            return Ok(self.clone());
        }

        let targets = target_times(self, dateline);
        let rates = self.stored_rates();
        let mut potentials: PhaseColumns = Default::default();
        let mut new_rates: PhaseColumns = Default::default();
        let mut offset = self.offset;

        for phase in Phase::ALL {
            let i = phase.index();
            potentials[i] = reindex_column(&self.times, &self.potentials[i], &targets).0;
            let (r, before) = reindex_column(&self.times, &rates[i], &targets);
            new_rates[i] = r;
            offset[i] += before / RATE_TO_VOLUME;
        }

        let uptimes = calculate_uptime(&potentials, &new_rates);
        debug!(from = self.len(), to = dateline.len(), "Resampled profile");

        Ok(Self::from_parts(
            dateline.to_vec(),
            times_from_dates(dateline),
            potentials,
            uptimes,
            offset,
        ))
    }

    /// Resample onto `dateline`, replacing this profile.
    pub fn resample_in_place(&mut self, dateline: &[NaiveDate]) -> EngineResult<()> {
        *self = self.resample(dateline)?;
        Ok(())
    }

    /// Add `other` onto this profile's dateline.
    ///
    /// Shorthand for [`Profile::sum`] with a single contributor.
    pub fn add(&mut self, other: &Self, fractions: Fractions) -> EngineResult<()> {
        self.sum(&[other], Some(&[fractions]))
    }

    /// Add every profile in `profiles` onto this profile's dateline.
    ///
    /// Each contributor's potentials and rates are transferred
    /// volume-conservatively and scaled by its fractions (default 1 for every
    /// phase). Volume a contributor produced before this profile's first date
    /// is scaled the same way and folded into the offsets; the contributor's
    /// own offsets are added unscaled. Uptimes are then reconstructed
    /// from the summed rates and potentials. Contributors are visited in the
    /// order given. An empty target or contributor is left out.
    pub fn sum(&mut self, profiles: &[&Self], fractions: Option<&[Fractions]>) -> EngineResult<()> {
        if let Some(fractions) = fractions {
            if fractions.len() != profiles.len() {
                return Err(EngineError::numeric(format!(
                    "{} fractions supplied for {} profiles",
                    fractions.len(),
                    profiles.len()
                )));
            }
            if let Some(bad) = fractions.iter().find(|f| !f.is_valid()) {
                return Err(EngineError::limit(format!(
                    "fractions must be finite and non-negative, got {bad:?}"
                )));
            }
        }
        if self.is_empty() {
            debug!("Sum onto empty profile ignored");
            return Ok(());
        }

        let mut potentials = self.potentials.clone();
        let mut rates = self.stored_rates();
        let mut offset = self.offset;

        for (k, other) in profiles.iter().enumerate() {
            if other.is_empty() {
                continue;
            }
            let share = fractions.map_or_else(Fractions::default, |f| f[k]);
            let targets = target_times(other, &self.dates);
            let other_rates = other.stored_rates();

            for phase in Phase::ALL {
                let i = phase.index();
                let f = share.get(phase);
                let (pot, _) = reindex_column(&other.times, &other.potentials[i], &targets);
                let (rate, before) = reindex_column(&other.times, &other_rates[i], &targets);
                for t in 0..self.len() {
                    potentials[i][t] += f * pot[t];
                    rates[i][t] += f * rate[t];
                }
                offset[i] += other.offset[i] + f * before / RATE_TO_VOLUME;
            }
        }

        self.uptimes = calculate_uptime(&potentials, &rates);
        self.potentials = potentials;
        self.offset = offset;
        debug!(contributors = profiles.len(), points = self.len(), "Summed profiles");
        Ok(())
    }
}

/// Sorted union of the datelines of `profiles`.
pub(crate) fn union_dateline(profiles: &[&Profile]) -> Vec<NaiveDate> {
    let merged: std::collections::BTreeSet<NaiveDate> =
        profiles.iter().flat_map(|p| p.dates().iter().copied()).collect();
    merged.into_iter().collect()
}

impl Profile {
    /// Sum of `profiles` on the union of their datelines.
    pub fn merged(profiles: &[&Self], fractions: Option<&[Fractions]>) -> EngineResult<Self> {
        let mut total = Self::allocate(&union_dateline(profiles))?;
        total.sum(profiles, fractions)?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::{Quantity, Stream};

    fn varied_profile() -> Profile {
        let mut p = monthly_profile(date(2020, 1, 1), date(2021, 1, 1), [0.0; 6]);
        let n = p.len();
        p.set_potential(Phase::Oil, (0..n).map(|i| 10.0 + i as f64).collect()).unwrap();
        p.set_potential(Phase::Water, (0..n).map(|i| 0.5 * i as f64).collect()).unwrap();
        p.set_potential(Phase::TotalGas, vec![4.0; n]).unwrap();
        p.set_potential(Phase::LiftGas, vec![1.0; n]).unwrap();
        p.set_potential(Phase::WaterInjection, vec![7.0; n]).unwrap();
        p.set_uptime(Stream::Production, (0..n).map(|i| if i % 4 == 0 { 0.6 } else { 0.95 }).collect())
            .unwrap();
        p.set_uptime(Stream::LiftGas, vec![0.9; n]).unwrap();
        p.set_uptime(Stream::WaterInjection, vec![0.7; n]).unwrap();
        p.set_offsets([1.0, 0.5, 0.2, 0.1, 0.0, 0.3]).unwrap();
        p
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < tol, "index {i}: {x} vs {y}");
        }
    }

    #[test]
    fn test_resample_identity() {
        let p = varied_profile();
        let r = p.resample(p.dates()).unwrap();
        for phase in Phase::ALL {
            assert_close(r.potential(phase), p.potential(phase), 1e-9);
            assert_close(&r.cumulative(phase.into()), &p.cumulative(phase.into()), 1e-9);
        }
        assert_close(r.uptime(Stream::Production), p.uptime(Stream::Production), 1e-12);
        assert_close(r.uptime(Stream::LiftGas), p.uptime(Stream::LiftGas), 1e-12);
    }

    #[test]
    fn test_resample_idempotent() {
        let p = varied_profile();
        let quarterly = crate::timeline::dateline(date(2020, 1, 1), date(2021, 1, 1), crate::timeline::Frequency::Quarterly)
            .unwrap();
        let once = p.resample(&quarterly).unwrap();
        let twice = once.resample(&quarterly).unwrap();
        for phase in Phase::ALL {
            assert_close(once.potential(phase), twice.potential(phase), 1e-9);
        }
    }

    #[test]
    fn test_resample_conserves_volume() {
        let p = varied_profile();
        let quarterly = crate::timeline::dateline(date(2020, 1, 1), date(2021, 1, 1), crate::timeline::Frequency::Quarterly)
            .unwrap();
        let q = p.resample(&quarterly).unwrap();
        for quantity in [Quantity::Oil, Quantity::Water, Quantity::TotalGas, Quantity::WaterInjection] {
            let full = p.cumulative(quantity);
            let coarse = q.cumulative(quantity);
            assert!((full.last().unwrap() - coarse.last().unwrap()).abs() < 1e-9, "{quantity}");
        }
    }

    #[test]
    fn test_resample_late_start_moves_volume_into_offset() {
        let p = varied_profile();
        let late = [date(2020, 4, 1), date(2020, 7, 1), date(2021, 1, 1)];
        let r = p.resample(&late).unwrap();
        let expected = p.oil_cumulative()[3];
        assert!((r.oil_cumulative()[0] - expected).abs() < 1e-12);
        assert!((r.oil_cumulative()[2] - p.oil_cumulative()[12]).abs() < 1e-9);
    }

    #[test]
    fn test_resample_empty_and_invalid() {
        let empty = Profile::new();
        assert_eq!(empty.resample(&[date(2020, 1, 1)]).unwrap(), empty);
        let p = varied_profile();
        assert!(p.resample(&[date(2020, 2, 1), date(2020, 1, 1)]).is_err());
    }

    #[test]
    fn test_calculate_uptime_fallbacks() {
        let mut pots: PhaseColumns = Default::default();
        let mut rates: PhaseColumns = Default::default();
        // t0: oil, t1: water only, t2: gas only, t3: nothing
        pots[Phase::Oil.index()] = vec![10.0, 0.0, 0.0, 0.0];
        pots[Phase::Water.index()] = vec![5.0, 4.0, 0.0, 0.0];
        pots[Phase::TotalGas.index()] = vec![3.0, 0.0, 6.0, 0.0];
        pots[Phase::LiftGas.index()] = vec![1.0, 0.0, 2.0, 0.0];
        pots[Phase::GasInjection.index()] = vec![0.0; 4];
        pots[Phase::WaterInjection.index()] = vec![8.0, 8.0, 0.0, 0.0];
        rates[Phase::Oil.index()] = vec![5.0, 0.0, 0.0, 0.0];
        rates[Phase::Water.index()] = vec![2.5, 1.0, 0.0, 0.0];
        rates[Phase::TotalGas.index()] = vec![2.0, 0.0, 3.0, 0.0];
        rates[Phase::LiftGas.index()] = vec![0.5, 0.0, 1.0, 0.0];
        rates[Phase::GasInjection.index()] = vec![0.0; 4];
        rates[Phase::WaterInjection.index()] = vec![4.0, 8.0, 0.0, 0.0];

        let up = calculate_uptime(&pots, &rates);
        assert_eq!(up[Stream::Production.index()], vec![0.5, 0.25, 0.5, 0.0]);
        assert_eq!(up[Stream::LiftGas.index()], vec![0.5, 0.0, 0.5, 0.0]);
        assert_eq!(up[Stream::GasInjection.index()], vec![0.0; 4]);
        assert_eq!(up[Stream::WaterInjection.index()], vec![0.5, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_add_scales_by_fraction() {
        let child = monthly_profile(date(2020, 1, 1), date(2020, 7, 1), [5.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        let mut parent = Profile::allocate(child.dates()).unwrap();
        parent.add(&child, Fractions::PerPhase([0.5, 1.0, 1.0, 1.0, 1.0, 1.0])).unwrap();
        assert!(parent.oil_potential().iter().all(|v| (*v - 2.5).abs() < 1e-12));
        assert!(parent.water_potential().iter().all(|v| (*v - 2.0).abs() < 1e-12));
        assert!(parent.uptime(Stream::Production).iter().all(|v| (*v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_sum_reconstructs_weighted_uptime() {
        let mut a = monthly_profile(date(2020, 1, 1), date(2020, 7, 1), [6.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let mut b = monthly_profile(date(2020, 1, 1), date(2020, 7, 1), [2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        a.fill_uptime(Stream::Production, 1.0).unwrap();
        b.fill_uptime(Stream::Production, 0.5).unwrap();

        let mut total = Profile::allocate(a.dates()).unwrap();
        total.sum(&[&a, &b], None).unwrap();

        // (6 * 1.0 + 2 * 0.5) / 8, not the arithmetic mean 0.75
        for u in total.uptime(Stream::Production) {
            assert!((u - 7.0 / 8.0).abs() < 1e-12);
        }
        assert_close(
            &total.oil_rate(),
            &a.oil_rate().iter().zip(b.oil_rate()).map(|(x, y)| x + y).collect::<Vec<_>>(),
            1e-12,
        );
    }

    #[test]
    fn test_sum_keeps_volume_before_target_start() {
        let child = monthly_profile(date(2023, 12, 1), date(2024, 2, 1), [10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let parent_dates = [date(2024, 1, 1), date(2024, 2, 1)];

        let mut parent = Profile::allocate(&parent_dates).unwrap();
        parent.sum(&[&child], None).unwrap();
        let resampled = child.resample(&parent_dates).unwrap();
        assert_close(&parent.oil_cumulative(), &resampled.oil_cumulative(), 1e-12);
        // December's 31 days at 10 Mstb/d
        assert!((parent.oil_cumulative()[0] - 0.31).abs() < 1e-12);

        let mut half = Profile::allocate(&parent_dates).unwrap();
        half.add(&child, Fractions::Uniform(0.5)).unwrap();
        assert!((half.oil_cumulative()[0] - 0.155).abs() < 1e-12);
    }

    #[test]
    fn test_sum_rejects_bad_fractions() {
        let child = monthly_profile(date(2020, 1, 1), date(2020, 3, 1), [1.0; 6]);
        let mut parent = Profile::allocate(child.dates()).unwrap();
        let before = parent.clone();
        assert!(parent.sum(&[&child], Some(&[])).is_err());
        assert!(parent.sum(&[&child], Some(&[Fractions::Uniform(f64::NAN)])).is_err());
        assert_eq!(parent, before);
    }

    #[test]
    fn test_merged_union_dateline() {
        let a = monthly_profile(date(2020, 1, 1), date(2020, 4, 1), [4.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = monthly_profile(date(2020, 3, 1), date(2020, 6, 1), [2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let total = Profile::merged(&[&a, &b], None).unwrap();
        assert_eq!(total.len(), 6);
        // Jan, Feb: a only; Mar: both; from Apr on a has ended
        assert_eq!(total.oil_potential(), vec![4.0, 4.0, 6.0, 2.0, 2.0, 2.0]);
        let expected = a.oil_cumulative().last().unwrap() + b.oil_cumulative().last().unwrap();
        assert!((total.oil_cumulative().last().unwrap() - expected).abs() < 1e-12);
    }
}
