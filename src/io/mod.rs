//! Profile CSV Import / Export
//!
//! Reads a `Profile` from a CSV file whose header row names series keys and
//! writes any list of derived series back out as CSV.
//!
//! ## Import format
//!
//! ```text
//! date,oil_potential,water_potential,production_uptime
//! 2024-01-01,5.0,1.2,1.0
//! 2024-02-01,4.8,1.3,0.95
//! ```
//!
//! - `date` (ISO `YYYY-MM-DD`) is required and must be strictly increasing.
//! - Stored columns are `<phase>_potential` for the six phases and
//!   `<stream>_uptime` for the four streams, in any order.
//! - Phases without a column are zero; streams without a column are fully up.
//! - Derived keys (rates, cumulatives, ratios) are rejected on import.
//!
//! ## Usage
//!
//! ```ignore
//! use prodcast::io::{read_profile_csv, write_series_csv};
//!
//! let profile = read_profile_csv("well_a.csv")?;
//! write_series_csv(std::io::stdout(), &profile, &[SeriesId::Date, "oil_cumulative".parse()?])?;
//! ```

use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

use crate::profile::Profile;
use crate::types::{EngineError, Phase, Series, SeriesId, Stream};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// CSV import/export errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Header error: {0}")]
    Header(String),

    #[error("Row error at line {line}: {message}")]
    Row { line: usize, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Stored column a header field feeds.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Date,
    Potential(Phase),
    Uptime(Stream),
}

fn map_header(header: &str) -> Result<Vec<Column>, ImportError> {
    let mut columns: Vec<Column> = Vec::new();
    for key in csv_split(header) {
        let id: SeriesId = key
            .parse()
            .map_err(|_| ImportError::Header(format!("unknown series key '{key}'")))?;
        let column = match id {
            SeriesId::Date => Column::Date,
            SeriesId::Potential(q) => match q.phase() {
                Some(phase) => Column::Potential(phase),
                None => return Err(ImportError::Header(format!("'{key}' is derived, import its phases instead"))),
            },
            SeriesId::Uptime(stream) => Column::Uptime(stream),
            _ => return Err(ImportError::Header(format!("'{key}' is a derived series and cannot be imported"))),
        };
        if columns.contains(&column) {
            return Err(ImportError::Header(format!("duplicate column '{key}'")));
        }
        columns.push(column);
    }

    if !columns.contains(&Column::Date) {
        return Err(ImportError::Header("a 'date' column is required".to_string()));
    }
    Ok(columns)
}

// ============================================================================
// Import
// ============================================================================

/// Load a profile from a CSV file.
pub fn read_profile_csv(path: impl AsRef<Path>) -> Result<Profile, ImportError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| ImportError::Io { path: path_str.clone(), source })?;
    let profile = parse_profile_csv(BufReader::new(file), &path_str)?;
    tracing::info!(file = %path_str, samples = profile.len(), "profile imported");
    Ok(profile)
}

/// Parse profile CSV text from any buffered reader.
///
/// The whole input is validated before the profile is built; a bad row
/// fails the import instead of being skipped.
pub fn parse_profile_csv(reader: impl BufRead, source: &str) -> Result<Profile, ImportError> {
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| ImportError::Header(format!("empty input: {source}")))?
        .map_err(|e| ImportError::Io { path: source.to_string(), source: e })?;
    let columns = map_header(&header)?;

    let mut dates = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    for (idx, line) in lines.enumerate() {
        let line_num = idx + 2;
        let line = line.map_err(|e| ImportError::Io { path: source.to_string(), source: e })?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = csv_split(&line);
        if fields.len() != columns.len() {
            return Err(ImportError::Row {
                line: line_num,
                message: format!("expected {} fields, found {}", columns.len(), fields.len()),
            });
        }

        for (col_idx, (column, field)) in columns.iter().zip(&fields).enumerate() {
            match column {
                Column::Date => {
                    let date = NaiveDate::parse_from_str(field, DATE_FORMAT).map_err(|e| ImportError::Row {
                        line: line_num,
                        message: format!("bad date '{field}': {e}"),
                    })?;
                    dates.push(date);
                }
                _ => {
                    let value: f64 = field.parse().map_err(|_| ImportError::Row {
                        line: line_num,
                        message: format!("bad number '{field}'"),
                    })?;
                    values[col_idx].push(value);
                }
            }
        }
    }

    let mut profile = Profile::allocate(&dates)?;
    profile.fill_uptimes(1.0)?;
    let mut loaded: Vec<_> = columns.into_iter().zip(values).collect();
    // Total gas bounds lift gas, so it is applied first
    loaded.sort_by_key(|(column, _)| matches!(column, Column::Potential(Phase::LiftGas)));
    for (column, column_values) in loaded {
        match column {
            Column::Date => {}
            Column::Potential(phase) => profile.set_potential(phase, column_values)?,
            Column::Uptime(stream) => profile.set_uptime(stream, column_values)?,
        }
    }
    Ok(profile)
}

// ============================================================================
// Export
// ============================================================================

/// Write the chosen series of `profile` as CSV, one row per sample.
pub fn write_series_csv<W: Write>(mut writer: W, profile: &Profile, ids: &[SeriesId]) -> std::io::Result<()> {
    let header: Vec<String> = ids.iter().map(ToString::to_string).collect();
    writeln!(writer, "{}", header.join(","))?;

    let columns: Vec<Series> = ids.iter().map(|id| profile.get(*id)).collect();
    for row in 0..profile.len() {
        let fields: Vec<String> = columns
            .iter()
            .map(|series| match series {
                Series::Dates(d) => d[row].format(DATE_FORMAT).to_string(),
                Series::Values(v) => v[row].to_string(),
            })
            .collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()
}
