//! Engine Configuration - solver budgets, fit tuning, timeline and fluid defaults
//!
//! Every tunable of the engine is a field here. Each section implements
//! `Default` with the engine's built-in values, so a missing file or a
//! partial file behaves exactly like the defaults for everything not set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use crate::curve_fit::{CurveFitSettings, SolverSettings};
use crate::profile::FluidProperties;
use crate::timeline::{Cadence, Frequency};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the `prodcast` binary.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$PRODCAST_CONFIG` env var
/// 2. `./prodcast.toml`
/// 3. Built-in defaults
///
/// The library never loads this itself; callers hand the derived settings
/// to the operations that need them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Levenberg-Marquardt and secant budgets
    #[serde(default)]
    pub solver: SolverSettings,

    /// Curve-fit family tuning
    #[serde(default)]
    pub curve_fit: CurveFitConfig,

    /// Default sampling cadence
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Default fluid properties for temporal scaling
    #[serde(default)]
    pub fluids: FluidProperties,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PRODCAST_CONFIG` environment variable
    /// 2. `./prodcast.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./prodcast.toml
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", DEFAULT_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", DEFAULT_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged as warnings.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Validate every section, collecting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Settings for curve fitting, solver included.
    pub fn fit_settings(&self) -> CurveFitSettings {
        CurveFitSettings {
            solver: self.solver,
            best_fit_tie_tolerance: self.curve_fit.best_fit_tie_tolerance,
            best_fit_polynomial_degree: self.curve_fit.best_fit_polynomial_degree,
            max_polynomial_degree: self.curve_fit.max_polynomial_degree,
            hyperbolic_b_min: self.curve_fit.hyperbolic_b_min,
            hyperbolic_b_max: self.curve_fit.hyperbolic_b_max,
        }
    }

    /// Default sampling frequency.
    pub fn frequency(&self) -> Frequency {
        Frequency::from_cadence(self.timeline.frequency, self.timeline.delta_days)
    }
}

// ============================================================================
// Error Type
// ============================================================================

/// Failure to read, parse, write or accept an engine config.
///
/// A path is empty when the TOML came from a string rather than a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("engine config {} unreadable or unwritable: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("engine config {} is not valid TOML for this schema: {1}", origin(.0))]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("engine config could not be rendered as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("engine config rejected ({} problem(s)): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),
}

fn origin(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "<inline>".to_string()
    } else {
        path.display().to_string()
    }
}

// ============================================================================
// Curve Fit
// ============================================================================

/// Best-fit selection and parameter limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveFitConfig {
    /// Relative SSE margin a later best-fit candidate must beat
    pub best_fit_tie_tolerance: f64,
    /// Polynomial degree tried by best-fit selection
    pub best_fit_polynomial_degree: usize,
    /// Highest polynomial degree accepted by `find_fit`
    pub max_polynomial_degree: usize,
    /// Lower bound of the hyperbolic exponent
    pub hyperbolic_b_min: f64,
    /// Upper bound of the hyperbolic exponent
    pub hyperbolic_b_max: f64,
}

impl Default for CurveFitConfig {
    fn default() -> Self {
        let s = CurveFitSettings::default();
        Self {
            best_fit_tie_tolerance: s.best_fit_tie_tolerance,
            best_fit_polynomial_degree: s.best_fit_polynomial_degree,
            max_polynomial_degree: s.max_polynomial_degree,
            hyperbolic_b_min: s.hyperbolic_b_min,
            hyperbolic_b_max: s.hyperbolic_b_max,
        }
    }
}

// ============================================================================
// Timeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// `yearly`, `quarterly`, `monthly` or `fixed_delta`
    pub frequency: Cadence,
    /// Step in days when `frequency = "fixed_delta"`
    pub delta_days: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            frequency: Cadence::Monthly,
            delta_days: 30,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: EngineConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.solver.max_iterations, 200);
        assert_eq!(config.curve_fit.max_polynomial_degree, 6);
        assert_eq!(config.timeline.frequency, Cadence::Monthly);
        assert_eq!(config.fluids.bo, 1.2);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[solver]
max_iterations = 500

[timeline]
frequency = "fixed_delta"
delta_days = 7
"#;
        let config = EngineConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.solver.max_iterations, 500);
        // Non-overridden values retain defaults
        assert_eq!(config.solver.tolerance, 1e-10);
        assert_eq!(config.frequency(), Frequency::FixedDelta(7));
        assert_eq!(config.fit_settings().solver.max_iterations, 500);
    }

    #[test]
    fn test_validation_catches_inverted_exponent_range() {
        let mut config = EngineConfig::default();
        config.curve_fit.hyperbolic_b_min = 1.5;
        config.curve_fit.hyperbolic_b_max = 0.5;
        let result = config.validate();
        assert!(result.is_err(), "Inverted exponent range should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("hyperbolic")));
        }
    }

    #[test]
    fn test_error_messages_name_the_source() {
        let err = EngineConfig::from_toml_str("[solver\n").unwrap_err();
        assert!(err.to_string().contains("<inline>"), "{err}");
        assert!(std::error::Error::source(&err).is_some());

        let mut config = EngineConfig::default();
        config.solver.max_iterations = 0;
        config.fluids.bw = -1.0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("2 problem(s)"), "{message}");
        assert!(message.contains("solver.max_iterations"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = EngineConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: EngineConfig = toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original, roundtripped);
    }
}
