//! Timeline Sampler
//!
//! Produces strictly monotone day-offset arrays (and the matching datelines)
//! between two dates at a yearly, quarterly, monthly or fixed-delta cadence.
//!
//! Calendar cadences snap to the first day of the containing period: a
//! mid-period `start` yields a partial first interval up to the next period
//! boundary and a mid-period `end` yields a partial tail. Leap days are
//! counted by the calendar arithmetic itself.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{EngineError, EngineResult};

/// Calendar cadence name, as used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Yearly,
    Quarterly,
    Monthly,
    FixedDelta,
}

/// Sampling frequency of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Yearly,
    Quarterly,
    Monthly,
    /// Fixed step in days.
    FixedDelta(i64),
}

impl Frequency {
    /// Build from a configured cadence; `delta_days` is used only for
    /// `Cadence::FixedDelta`.
    pub const fn from_cadence(cadence: Cadence, delta_days: i64) -> Self {
        match cadence {
            Cadence::Yearly => Self::Yearly,
            Cadence::Quarterly => Self::Quarterly,
            Cadence::Monthly => Self::Monthly,
            Cadence::FixedDelta => Self::FixedDelta(delta_days),
        }
    }

    const fn months(self) -> Option<u32> {
        match self {
            Self::Yearly => Some(12),
            Self::Quarterly => Some(3),
            Self::Monthly => Some(1),
            Self::FixedDelta(_) => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yearly => f.write_str("yearly"),
            Self::Quarterly => f.write_str("quarterly"),
            Self::Monthly => f.write_str("monthly"),
            Self::FixedDelta(days) => write!(f, "{days}d"),
        }
    }
}

impl FromStr for Frequency {
    type Err = EngineError;

    /// Accepts `yearly`, `quarterly`, `monthly` or a day count such as `30d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yearly" | "annual" => Ok(Self::Yearly),
            "quarterly" => Ok(Self::Quarterly),
            "monthly" => Ok(Self::Monthly),
            other => other
                .strip_suffix('d')
                .and_then(|n| n.parse::<i64>().ok())
                .filter(|n| *n > 0)
                .map(Self::FixedDelta)
                .ok_or_else(|| EngineError::numeric(format!("unrecognised frequency '{s}'"))),
        }
    }
}

/// First day of the calendar period of `months` length containing `date`.
fn period_start(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let month0 = date.month0() / months * months;
    NaiveDate::from_ymd_opt(date.year(), month0 + 1, 1)
}

/// Day offsets from `start` to `end` at the requested cadence.
///
/// The result begins at 0 and ends at `end - start` in days. Returns an
/// empty vector when `start == end`.
pub fn sample_offsets(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> EngineResult<Vec<f64>> {
    if end < start {
        return Err(EngineError::numeric(format!(
            "timeline end {end} precedes start {start}"
        )));
    }
    if end == start {
        return Ok(Vec::new());
    }

    let total = (end - start).num_days();
    let mut offsets = vec![0.0];

    if let Frequency::FixedDelta(delta) = frequency {
        if delta <= 0 {
            return Err(EngineError::numeric(format!(
                "fixed-delta step must be positive, got {delta}"
            )));
        }
        let mut t = delta;
        while t < total {
            offsets.push(t as f64);
            t += delta;
        }
    } else if let Some(months) = frequency.months() {
        let step = Months::new(months);
        let out_of_range = || EngineError::numeric(format!("timeline date out of range after {start}"));
        let mut boundary = period_start(start, months)
            .and_then(|d| d.checked_add_months(step))
            .ok_or_else(out_of_range)?;
        while boundary < end {
            offsets.push((boundary - start).num_days() as f64);
            boundary = boundary.checked_add_months(step).ok_or_else(out_of_range)?;
        }
    }

    offsets.push(total as f64);
    Ok(offsets)
}

/// Dates matching [`sample_offsets`].
pub fn dateline(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> EngineResult<Vec<NaiveDate>> {
    Ok(sample_offsets(start, end, frequency)?
        .into_iter()
        .map(|days| start + chrono::Duration::days(days as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_yearly_across_leap_year() {
        let offsets = sample_offsets(date(2019, 1, 1), date(2021, 1, 1), Frequency::Yearly).unwrap();
        assert_eq!(offsets, vec![0.0, 365.0, 731.0]);
    }

    #[test]
    fn test_monthly_full_year() {
        let offsets = sample_offsets(date(2020, 1, 1), date(2021, 1, 1), Frequency::Monthly).unwrap();
        assert_eq!(offsets.len(), 13);
        assert_eq!(offsets[1], 31.0);
        assert_eq!(offsets[2], 60.0); // Feb 2020 has 29 days
        assert_eq!(offsets[12], 366.0);
    }

    #[test]
    fn test_mid_period_start_and_end() {
        let offsets = sample_offsets(date(2021, 2, 15), date(2021, 5, 10), Frequency::Monthly).unwrap();
        // Feb 15 -> Mar 1 (14), Apr 1 (45), May 1 (75), May 10 (84)
        assert_eq!(offsets, vec![0.0, 14.0, 45.0, 75.0, 84.0]);
    }

    #[test]
    fn test_quarterly_snaps_to_quarter_start() {
        let offsets = sample_offsets(date(2021, 2, 1), date(2021, 12, 31), Frequency::Quarterly).unwrap();
        let dates: Vec<NaiveDate> = offsets
            .iter()
            .map(|d| date(2021, 2, 1) + chrono::Duration::days(*d as i64))
            .collect();
        assert_eq!(
            dates,
            vec![date(2021, 2, 1), date(2021, 4, 1), date(2021, 7, 1), date(2021, 10, 1), date(2021, 12, 31)]
        );
    }

    #[test]
    fn test_fixed_delta_with_overshoot() {
        let offsets = sample_offsets(date(2021, 1, 1), date(2021, 1, 26), Frequency::FixedDelta(10)).unwrap();
        assert_eq!(offsets, vec![0.0, 10.0, 20.0, 25.0]);

        let exact = sample_offsets(date(2021, 1, 1), date(2021, 1, 21), Frequency::FixedDelta(10)).unwrap();
        assert_eq!(exact, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_equal_dates_empty() {
        assert!(sample_offsets(date(2021, 1, 1), date(2021, 1, 1), Frequency::Monthly)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(sample_offsets(date(2021, 2, 1), date(2021, 1, 1), Frequency::Monthly).is_err());
        assert!(sample_offsets(date(2021, 1, 1), date(2021, 2, 1), Frequency::FixedDelta(0)).is_err());
    }

    #[test]
    fn test_frequency_parsing() {
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("30d".parse::<Frequency>().unwrap(), Frequency::FixedDelta(30));
        assert!("0d".parse::<Frequency>().is_err());
        assert!("weekly".parse::<Frequency>().is_err());
        assert_eq!(Frequency::from_cadence(Cadence::FixedDelta, 7), Frequency::FixedDelta(7));
    }

    #[test]
    fn test_dateline_matches_offsets() {
        let dates = dateline(date(2020, 1, 1), date(2020, 4, 1), Frequency::Monthly).unwrap();
        assert_eq!(dates, vec![date(2020, 1, 1), date(2020, 2, 1), date(2020, 3, 1), date(2020, 4, 1)]);
    }
}
