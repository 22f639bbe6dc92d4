//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::EngineConfig;
use crate::timeline::Cadence;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for EngineConfig.
///
/// Any new field added to EngineConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [solver]
        "solver",
        "solver.max_iterations",
        "solver.tolerance",
        "solver.initial_damping",
        "solver.secant_max_iterations",
        "solver.secant_tolerance",
        // [curve_fit]
        "curve_fit",
        "curve_fit.best_fit_tie_tolerance",
        "curve_fit.best_fit_polynomial_degree",
        "curve_fit.max_polynomial_degree",
        "curve_fit.hyperbolic_b_min",
        "curve_fit.hyperbolic_b_max",
        // [timeline]
        "timeline",
        "timeline.frequency",
        "timeline.delta_days",
        // [fluids]
        "fluids",
        "fluids.bo",
        "fluids.bg",
        "fluids.bw",
        "fluids.rs",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Dotted paths of every key in a TOML document, sections included, sorted.
///
/// `[solver]\ntolerance = 1e-8` yields `["solver", "solver.tolerance"]`.
/// Arrays are leaves; their elements are not walked.
pub fn walk_toml_keys(document: &toml::Value) -> Vec<String> {
    let mut keys = Vec::new();
    let mut pending: Vec<(String, &toml::Value)> = vec![(String::new(), document)];
    while let Some((section, value)) = pending.pop() {
        let Some(table) = value.as_table() else { continue };
        for (name, child) in table {
            let path = if section.is_empty() { name.clone() } else { format!("{section}.{name}") };
            if child.is_table() {
                pending.push((path.clone(), child));
            }
            keys.push(path);
        }
    }
    keys.sort();
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the alphabetically first key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value)
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    // NaN comparisons silently pass; catch them explicitly
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{name} = {value} must be finite and > 0"));
    }
}

/// Collect every out-of-range value in `config`.
pub fn validate_ranges(config: &EngineConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let s = &config.solver;
    if s.max_iterations == 0 {
        errors.push("solver.max_iterations must be > 0".to_string());
    }
    if s.secant_max_iterations == 0 {
        errors.push("solver.secant_max_iterations must be > 0".to_string());
    }
    check_positive(s.tolerance, "solver.tolerance", &mut errors);
    check_positive(s.initial_damping, "solver.initial_damping", &mut errors);
    check_positive(s.secant_tolerance, "solver.secant_tolerance", &mut errors);

    let c = &config.curve_fit;
    if !(c.best_fit_tie_tolerance.is_finite() && c.best_fit_tie_tolerance >= 0.0) {
        errors.push(format!(
            "curve_fit.best_fit_tie_tolerance = {} must be finite and >= 0",
            c.best_fit_tie_tolerance
        ));
    }
    if c.max_polynomial_degree == 0 {
        errors.push("curve_fit.max_polynomial_degree must be > 0".to_string());
    }
    if c.best_fit_polynomial_degree == 0 || c.best_fit_polynomial_degree > c.max_polynomial_degree {
        errors.push(format!(
            "curve_fit.best_fit_polynomial_degree = {} must lie in 1..={}",
            c.best_fit_polynomial_degree, c.max_polynomial_degree
        ));
    }
    check_positive(c.hyperbolic_b_min, "curve_fit.hyperbolic_b_min", &mut errors);
    if !(c.hyperbolic_b_max.is_finite() && c.hyperbolic_b_max > c.hyperbolic_b_min) {
        errors.push(format!(
            "curve_fit.hyperbolic_b_max ({}) must exceed hyperbolic_b_min ({})",
            c.hyperbolic_b_max, c.hyperbolic_b_min
        ));
    }

    if config.timeline.frequency == Cadence::FixedDelta && config.timeline.delta_days <= 0 {
        errors.push(format!(
            "timeline.delta_days = {} must be > 0 for fixed_delta",
            config.timeline.delta_days
        ));
    }

    if let Err(e) = config.fluids.validate() {
        errors.push(format!("fluids: {e}"));
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================
