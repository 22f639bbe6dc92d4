//! prodcast: Production Profile Engine
//!
//! Rates, cumulatives and ratios of per-phase production/injection
//! profiles on irregular date axes, plus the curve-fit stack that turns
//! history into forecasts and the aggregator that rolls profiles up an
//! entity tree.
//!
//! ## Architecture
//!
//! - **Calculus**: integration and differencing on irregular samples
//! - **Timeline**: yearly / quarterly / monthly / fixed-delta datelines
//! - **Profile**: potentials, uptimes and offsets with every derived series
//! - **Curve fit**: history, curve laws, Arps declines, nearest-sample lookup
//! - **Assembly**: merged, modified compositions of fitted models
//! - **Aggregator**: entity tree with per-case profiles and link fractions
//!
//! The core is synchronous and holds no global state; configuration is
//! passed by value.

pub mod aggregator;
pub mod assembly;
pub mod calculus;
pub mod config;
pub mod curve_fit;
pub mod io;
pub mod profile;
pub mod timeline;
pub mod types;

// Re-export commonly used types
pub use types::{EngineError, EngineResult, Fractions, Phase, Quantity, Ratio, Series, SeriesId, Stream};

pub use profile::{calculate_uptime, FluidProperties, Profile, TemporalScalers};

pub use timeline::{dateline, sample_offsets, Cadence, Frequency};

pub use curve_fit::{
    CurveFamily, CurveFitSettings, DcaDomain, DeclineLaw, FitMethod, FitParameters, FitStatistics, Model,
    ModelKind, SampleSet, SolverSettings,
};

pub use assembly::{
    forecast_profile, AssembledFunction, Axis, ForecastAxis, Merge, MergeType, ModelEntry, Modifiers,
    ReferencePoint,
};

pub use aggregator::{EntityId, EntityKind, EntityTree};

pub use config::{ConfigError, EngineConfig};
