//! Engine Configuration Module
//!
//! Operator-tunable solver budgets, curve-fit limits, default timeline
//! cadence and default fluid properties, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `PRODCAST_CONFIG` environment variable (path to TOML file)
//! 2. `prodcast.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Only the binary loads a config. Library operations take the derived
//! settings by value:
//!
//! ```ignore
//! let config = EngineConfig::load();
//! model.find_fit(method, None, &config.fit_settings())?;
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
