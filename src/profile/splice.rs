//! Splicing: truncate, stack, prepend, append, replace

use chrono::NaiveDate;

use super::{check_dateline, dates_from_times, times_from_dates, Profile};
use crate::types::{EngineError, EngineResult};

impl Profile {
    /// Samples `range` of this profile, times left on this profile's axis.
    fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self::from_parts(
            self.dates[range.clone()].to_vec(),
            self.times[range.clone()].to_vec(),
            std::array::from_fn(|i| self.potentials[i][range.clone()].to_vec()),
            std::array::from_fn(|i| self.uptimes[i][range.clone()].to_vec()),
            self.offset,
        )
    }

    /// Raw column concatenation; dates and times are taken as given.
    fn concat(&mut self, other: &Self) {
        self.dates.extend_from_slice(&other.dates);
        self.times.extend_from_slice(&other.times);
        for i in 0..self.potentials.len() {
            self.potentials[i].extend_from_slice(&other.potentials[i]);
        }
        for i in 0..self.uptimes.len() {
            self.uptimes[i].extend_from_slice(&other.uptimes[i]);
        }
    }

    /// Drop every sample dated on or after `date`.
    pub fn truncate(&mut self, date: NaiveDate) {
        let keep = self.dates.partition_point(|d| *d < date);
        *self = self.slice(0..keep);
    }

    /// Concatenate `other` after this profile.
    ///
    /// `other` must start strictly after this profile ends. Times are
    /// rebuilt from the dates; this profile's offsets are kept.
    pub fn stack(&mut self, other: &Self) -> EngineResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let mut joined = self.clone();
        joined.concat(other);
        check_dateline(&joined.dates)?;
        joined.times = times_from_dates(&joined.dates);
        *self = joined;
        Ok(())
    }

    /// Concatenate `other` before this profile.
    ///
    /// `other` must end strictly before this profile starts. The result
    /// takes `other`'s offsets, since its cumulatives now begin there.
    pub fn prepend(&mut self, other: &Self) -> EngineResult<()> {
        let mut joined = other.clone();
        joined.stack(self)?;
        *self = joined;
        Ok(())
    }

    /// Glue `other` onto the end of this profile on the time axis.
    ///
    /// `other`'s times are shifted by this profile's final time and dates
    /// are reassigned from this profile's first date. The junction sample
    /// takes `other`'s values: this profile's last sample owns no interval
    /// under the left-rectangle convention, so cumulatives are continuous.
    pub fn append(&mut self, other: &Self) -> EngineResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        let (Some(start), Some(&shift)) = (self.start_date(), self.times.last()) else {
            *self = other.clone();
            return Ok(());
        };

        let mut joined = self.slice(0..self.len() - 1);
        let mut tail = other.clone();
        tail.times.iter_mut().for_each(|t| *t += shift);
        joined.concat(&tail);

        if let Some(i) = joined.times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EngineError::numeric(format!(
                "appended times are not increasing at index {}",
                i + 1
            )));
        }
        joined.dates = dates_from_times(start, &joined.times);
        check_dateline(&joined.dates)?;
        *self = joined;
        Ok(())
    }

    /// Overwrite the span covered by `other` with `other`'s samples.
    ///
    /// Samples of this profile dated before `other` starts and after it ends
    /// are kept around it. Offsets come from whichever profile now supplies
    /// the first sample.
    pub fn replace(&mut self, other: &Self) -> EngineResult<()> {
        let (Some(first), Some(last)) = (other.start_date(), other.end_date()) else {
            return Ok(());
        };

        let head_end = self.dates.partition_point(|d| *d < first);
        let tail_start = self.dates.partition_point(|d| *d <= last);

        let mut joined = if head_end > 0 {
            self.slice(0..head_end)
        } else {
            other.slice(0..0)
        };
        joined.concat(other);
        joined.concat(&self.slice(tail_start..self.len()));
        check_dateline(&joined.dates)?;
        joined.times = times_from_dates(&joined.dates);
        *self = joined;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::Phase;

    fn oil_profile(start: NaiveDate, end: NaiveDate, oil: f64) -> Profile {
        monthly_profile(start, end, [oil, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_truncate_drops_on_and_after() {
        let mut p = oil_profile(date(2020, 1, 1), date(2020, 6, 1), 1.0);
        p.truncate(date(2020, 3, 1));
        assert_eq!(p.dates(), &[date(2020, 1, 1), date(2020, 2, 1)]);
        assert_eq!(p.potential(Phase::Oil).len(), 2);
        p.truncate(date(2019, 1, 1));
        assert!(p.is_empty());
    }

    #[test]
    fn test_stack_concatenates_and_rebuilds_times() {
        let mut a = oil_profile(date(2020, 1, 1), date(2020, 3, 1), 1.0);
        let b = oil_profile(date(2020, 4, 1), date(2020, 5, 1), 2.0);
        a.stack(&b).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a.times(), &[0.0, 31.0, 60.0, 91.0, 121.0]);
        assert_eq!(a.potential(Phase::Oil), &[1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_stack_rejects_overlap() {
        let mut a = oil_profile(date(2020, 1, 1), date(2020, 3, 1), 1.0);
        let before = a.clone();
        let b = oil_profile(date(2020, 3, 1), date(2020, 5, 1), 2.0);
        assert!(a.stack(&b).is_err());
        assert_eq!(a, before);
    }

    #[test]
    fn test_prepend_takes_earlier_offsets() {
        let mut later = oil_profile(date(2020, 4, 1), date(2020, 5, 1), 2.0);
        later.set_offsets([9.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let mut earlier = oil_profile(date(2020, 1, 1), date(2020, 3, 1), 1.0);
        earlier.set_offsets([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        later.prepend(&earlier).unwrap();
        assert_eq!(later.start_date(), Some(date(2020, 1, 1)));
        assert_eq!(later.offset_of(Phase::Oil), 1.0);
    }

    #[test]
    fn test_append_shifts_times_and_keeps_cumulative() {
        let mut a = oil_profile(date(2020, 1, 1), date(2020, 3, 1), 1.0);
        let cum_a = *a.oil_cumulative().last().unwrap();
        let b = oil_profile(date(2030, 1, 1), date(2030, 3, 1), 2.0);
        a.append(&b).unwrap();

        // a: 0, 31, 60 ; b shifted by 60: 60, 91, 119
        assert_eq!(a.times(), &[0.0, 31.0, 60.0, 91.0, 119.0]);
        assert_eq!(a.dates()[2], date(2020, 3, 1));
        assert_eq!(a.potential(Phase::Oil), &[1.0, 1.0, 2.0, 2.0, 2.0]);
        assert!((a.oil_cumulative()[2] - cum_a).abs() < 1e-12);
    }

    #[test]
    fn test_append_onto_empty() {
        let mut p = Profile::new();
        let b = oil_profile(date(2030, 1, 1), date(2030, 3, 1), 2.0);
        p.append(&b).unwrap();
        assert_eq!(p, b);
    }

    #[test]
    fn test_replace_overwrites_covered_span() {
        let mut base = oil_profile(date(2020, 1, 1), date(2020, 7, 1), 1.0);
        let patch = Profile::allocate(&[date(2020, 3, 1), date(2020, 3, 15), date(2020, 4, 1)]).unwrap();
        base.replace(&patch).unwrap();
        assert_eq!(
            base.dates(),
            &[
                date(2020, 1, 1),
                date(2020, 2, 1),
                date(2020, 3, 1),
                date(2020, 3, 15),
                date(2020, 4, 1),
                date(2020, 5, 1),
                date(2020, 6, 1),
                date(2020, 7, 1)
            ]
        );
        assert_eq!(base.potential(Phase::Oil), &[1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
