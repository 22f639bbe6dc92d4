//! String-keyed series catalogue
//!
//! The GUI and export layers address derived series by fixed string keys
//! such as `"oil_potential"` or `"water_injection_cumulative"`. `SeriesId`
//! is the typed form of those keys; `Display` and `FromStr` convert between
//! the two and round-trip exactly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EngineError, Quantity, Stream};

/// Quotients exposed as ratio series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ratio {
    WaterCut,
    OilCut,
    GasOilRatio,
    WaterOilRatio,
    GasLiquidRatio,
    WaterGasRatio,
    OilGasRatio,
    TotalGasLiquidRatio,
}

impl Ratio {
    pub const ALL: [Self; 8] = [
        Self::WaterCut,
        Self::OilCut,
        Self::GasOilRatio,
        Self::WaterOilRatio,
        Self::GasLiquidRatio,
        Self::WaterGasRatio,
        Self::OilGasRatio,
        Self::TotalGasLiquidRatio,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::WaterCut => "water_cut",
            Self::OilCut => "oil_cut",
            Self::GasOilRatio => "gas_oil_ratio",
            Self::WaterOilRatio => "water_oil_ratio",
            Self::GasLiquidRatio => "gas_liquid_ratio",
            Self::WaterGasRatio => "water_gas_ratio",
            Self::OilGasRatio => "oil_gas_ratio",
            Self::TotalGasLiquidRatio => "total_gas_liquid_ratio",
        }
    }
}

/// Identifier of a series a profile can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesId {
    /// Calendar dates.
    Date,
    /// Elapsed days since the first date.
    Time,
    /// Decimal calendar year.
    Year,
    Potential(Quantity),
    Rate(Quantity),
    Cumulative(Quantity),
    Uptime(Stream),
    Ratio(Ratio),
}

impl SeriesId {
    /// Every documented key, in catalogue order.
    pub fn all() -> Vec<Self> {
        let mut ids = vec![Self::Date, Self::Time, Self::Year];
        ids.extend(Quantity::ALL.iter().map(|q| Self::Potential(*q)));
        ids.extend(Quantity::ALL.iter().map(|q| Self::Rate(*q)));
        ids.extend(Quantity::ALL.iter().map(|q| Self::Cumulative(*q)));
        ids.extend(Stream::ALL.iter().map(|s| Self::Uptime(*s)));
        ids.extend(Ratio::ALL.iter().map(|r| Self::Ratio(*r)));
        ids
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::Year => f.write_str("year"),
            Self::Potential(q) => write!(f, "{}_potential", q.name()),
            Self::Rate(q) => write!(f, "{}_rate", q.name()),
            Self::Cumulative(q) => write!(f, "{}_cumulative", q.name()),
            Self::Uptime(s) => write!(f, "{}_uptime", s.name()),
            Self::Ratio(r) => f.write_str(r.name()),
        }
    }
}

impl FromStr for SeriesId {
    type Err = EngineError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "date" => return Ok(Self::Date),
            "time" => return Ok(Self::Time),
            "year" => return Ok(Self::Year),
            _ => {}
        }

        if let Some(ratio) = Ratio::ALL.into_iter().find(|r| r.name() == key) {
            return Ok(Self::Ratio(ratio));
        }

        let parsed = if let Some(base) = key.strip_suffix("_potential") {
            Quantity::from_name(base).map(Self::Potential)
        } else if let Some(base) = key.strip_suffix("_rate") {
            Quantity::from_name(base).map(Self::Rate)
        } else if let Some(base) = key.strip_suffix("_cumulative") {
            Quantity::from_name(base).map(Self::Cumulative)
        } else if let Some(base) = key.strip_suffix("_uptime") {
            Stream::from_name(base).map(Self::Uptime)
        } else {
            None
        };

        parsed.ok_or_else(|| EngineError::UnknownSeries(key.to_string()))
    }
}

impl Serialize for SeriesId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SeriesId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}

/// A materialised series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Series {
    Dates(Vec<NaiveDate>),
    Values(Vec<f64>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Self::Dates(d) => d.len(),
            Self::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the series, if it is not a date column.
    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Self::Values(v) => Some(v),
            Self::Dates(_) => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<f64>> {
        match self {
            Self::Values(v) => Some(v),
            Self::Dates(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_round_trips() {
        for id in SeriesId::all() {
            let key = id.to_string();
            let parsed: SeriesId = key.parse().unwrap();
            assert_eq!(parsed, id, "key {key} did not round-trip");
        }
    }

    #[test]
    fn test_catalogue_size() {
        // 3 axes + 3 x 8 quantities + 4 uptimes + 8 ratios
        assert_eq!(SeriesId::all().len(), 3 + 24 + 4 + 8);
    }

    #[test]
    fn test_documented_keys_parse() {
        assert_eq!(
            "oil_potential".parse::<SeriesId>().unwrap(),
            SeriesId::Potential(Quantity::Oil)
        );
        assert_eq!(
            "water_injection_cumulative".parse::<SeriesId>().unwrap(),
            SeriesId::Cumulative(Quantity::WaterInjection)
        );
        assert_eq!(
            "production_uptime".parse::<SeriesId>().unwrap(),
            SeriesId::Uptime(Stream::Production)
        );
        assert_eq!(
            "gas_oil_ratio".parse::<SeriesId>().unwrap(),
            SeriesId::Ratio(Ratio::GasOilRatio)
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = "oil_velocity".parse::<SeriesId>().unwrap_err();
        assert_eq!(err, EngineError::UnknownSeries("oil_velocity".to_string()));
        assert!("liquid_uptime".parse::<SeriesId>().is_err());
    }
}
