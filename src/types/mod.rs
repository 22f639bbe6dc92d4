//! Shared data structures for the production profile engine
//!
//! - `Phase` / `Quantity` / `Stream`: column vocabulary of a profile
//! - `Fractions`: typed contribution share used by composition
//! - `SeriesId` / `Series`: string-keyed lookup bridge for consumers
//! - `EngineError`: error taxonomy of the core

mod error;
mod phase;
mod series;

pub use error::*;
pub use phase::*;
pub use series::*;
