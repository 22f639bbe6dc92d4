//! Phases, derived quantities and uptime streams

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored potential column of a profile.
///
/// The order is fixed and matches the `offset` array:
/// oil (Mstb/d), total gas (MMscf/d), water (Mstb/d), lift gas (MMscf/d),
/// gas injection (MMscf/d), water injection (Mstb/d).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Oil,
    TotalGas,
    Water,
    LiftGas,
    GasInjection,
    WaterInjection,
}

impl Phase {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Oil,
        Self::TotalGas,
        Self::Water,
        Self::LiftGas,
        Self::GasInjection,
        Self::WaterInjection,
    ];

    /// Column index inside the potential table and the offset array.
    pub const fn index(self) -> usize {
        match self {
            Self::Oil => 0,
            Self::TotalGas => 1,
            Self::Water => 2,
            Self::LiftGas => 3,
            Self::GasInjection => 4,
            Self::WaterInjection => 5,
        }
    }

    /// Uptime stream that gates this phase's rate.
    ///
    /// Total gas is a mix of the production and lift streams and is
    /// reported against the production stream here.
    pub const fn stream(self) -> Stream {
        match self {
            Self::Oil | Self::TotalGas | Self::Water => Stream::Production,
            Self::LiftGas => Stream::LiftGas,
            Self::GasInjection => Stream::GasInjection,
            Self::WaterInjection => Stream::WaterInjection,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Oil => "oil",
            Self::TotalGas => "total_gas",
            Self::Water => "water",
            Self::LiftGas => "lift_gas",
            Self::GasInjection => "gas_injection",
            Self::WaterInjection => "water_injection",
        }
    }

    /// Rate unit (per day) of the potential column.
    pub const fn rate_unit(self) -> &'static str {
        match self {
            Self::Oil | Self::Water | Self::WaterInjection => "Mstb/d",
            Self::TotalGas | Self::LiftGas | Self::GasInjection => "MMscf/d",
        }
    }

    /// Volume unit of the cumulative and offset.
    pub const fn volume_unit(self) -> &'static str {
        match self {
            Self::Oil | Self::Water | Self::WaterInjection => "MMstb",
            Self::TotalGas | Self::LiftGas | Self::GasInjection => "Bscf",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored phase or one of the two quantities derived from stored phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Oil,
    /// Sales gas: total gas minus lift gas, clamped at zero.
    Gas,
    TotalGas,
    Water,
    /// Oil plus water.
    Liquid,
    LiftGas,
    GasInjection,
    WaterInjection,
}

impl Quantity {
    pub const ALL: [Self; 8] = [
        Self::Oil,
        Self::Gas,
        Self::TotalGas,
        Self::Water,
        Self::Liquid,
        Self::LiftGas,
        Self::GasInjection,
        Self::WaterInjection,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Oil => "oil",
            Self::Gas => "gas",
            Self::TotalGas => "total_gas",
            Self::Water => "water",
            Self::Liquid => "liquid",
            Self::LiftGas => "lift_gas",
            Self::GasInjection => "gas_injection",
            Self::WaterInjection => "water_injection",
        }
    }

    /// The stored phase this quantity maps to, if it is not derived.
    pub const fn phase(self) -> Option<Phase> {
        match self {
            Self::Oil => Some(Phase::Oil),
            Self::TotalGas => Some(Phase::TotalGas),
            Self::Water => Some(Phase::Water),
            Self::LiftGas => Some(Phase::LiftGas),
            Self::GasInjection => Some(Phase::GasInjection),
            Self::WaterInjection => Some(Phase::WaterInjection),
            Self::Gas | Self::Liquid => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.name() == name)
    }
}

impl From<Phase> for Quantity {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Oil => Self::Oil,
            Phase::TotalGas => Self::TotalGas,
            Phase::Water => Self::Water,
            Phase::LiftGas => Self::LiftGas,
            Phase::GasInjection => Self::GasInjection,
            Phase::WaterInjection => Self::WaterInjection,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Independent uptime streams, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Applies to oil, sales gas and water.
    Production,
    LiftGas,
    GasInjection,
    WaterInjection,
}

impl Stream {
    pub const COUNT: usize = 4;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Production,
        Self::LiftGas,
        Self::GasInjection,
        Self::WaterInjection,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Production => 0,
            Self::LiftGas => 1,
            Self::GasInjection => 2,
            Self::WaterInjection => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::LiftGas => "lift_gas",
            Self::GasInjection => "gas_injection",
            Self::WaterInjection => "water_injection",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Share of a contributing profile that is added into a target.
///
/// `Uniform` applies one factor to every phase; `PerPhase` carries one
/// factor per stored phase in [`Phase::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fractions {
    Uniform(f64),
    PerPhase([f64; Phase::COUNT]),
}

impl Fractions {
    pub const fn get(&self, phase: Phase) -> f64 {
        match self {
            Self::Uniform(f) => *f,
            Self::PerPhase(fs) => fs[phase.index()],
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Uniform(f) => f.is_finite() && *f >= 0.0,
            Self::PerPhase(fs) => fs.iter().all(|f| f.is_finite() && *f >= 0.0),
        }
    }
}

impl Default for Fractions {
    fn default() -> Self {
        Self::Uniform(1.0)
    }
}
