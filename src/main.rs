//! prodcast - production profile engine CLI
//!
//! Thin command-line surface over the library: timelines, derived series of
//! profile CSV files, curve fits with optional forecasts, and aggregation
//! of several profiles onto their union dateline.
//!
//! # Usage
//!
//! ```bash
//! # Monthly sample offsets for 2024
//! prodcast timeline --start 2024-01-01 --end 2025-01-01
//!
//! # Oil rate and cumulative of a well, resampled quarterly
//! prodcast series well_a.csv --series date,oil_rate,oil_cumulative --resample quarterly
//!
//! # Exponential decline of oil potential against elapsed time, forecast to 2030
//! prodcast fit well_a.csv --x time --y oil_potential --model dca-time --method exponential \
//!     --forecast-until 2030-01-01
//!
//! # Same fit restricted to the samples from 2023 on
//! prodcast fit well_a.csv --x date --y oil_potential --from 2023-01-01
//!
//! # Field total of two wells, the second at 50% working interest
//! prodcast aggregate well_a.csv well_b.csv --fraction 1.0 --fraction 0.5
//! ```
//!
//! # Environment Variables
//!
//! - `PRODCAST_CONFIG`: Path to the engine config TOML (default: ./prodcast.toml)
//! - `RUST_LOG`: Logging level (default: info)
//!
//! Results go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use prodcast::aggregator::{EntityKind, EntityTree};
use prodcast::assembly::{forecast_profile, AssembledFunction, ForecastAxis, ModelEntry, ReferencePoint};
use prodcast::config::EngineConfig;
use prodcast::curve_fit::{day_number, CurveFamily, DeclineLaw, FitMethod, Model, SampleSet};
use prodcast::io::{read_profile_csv, write_series_csv};
use prodcast::{dateline, sample_offsets, Fractions, Frequency, Phase, Profile, SeriesId};

/// Simulation case used for profiles loaded from the command line.
const CLI_CASE: &str = "base";

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "prodcast")]
#[command(about = "Production profile engine: derived series, curve fits and aggregation")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine config TOML (overrides PRODCAST_CONFIG and ./prodcast.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print day offsets and dates between two dates
    Timeline {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// yearly, quarterly, monthly or a step such as 30d (default: from config)
        #[arg(long)]
        frequency: Option<Frequency>,
    },

    /// Print derived series of a profile CSV
    Series {
        /// Profile CSV (date column plus potentials and uptimes)
        input: PathBuf,
        /// Comma-separated series keys
        #[arg(long, value_delimiter = ',', default_value = "date,oil_rate,oil_cumulative")]
        series: Vec<String>,
        /// Print every documented series
        #[arg(long, conflicts_with = "series")]
        all: bool,
        /// Resample onto a dateline of this frequency first
        #[arg(long)]
        resample: Option<Frequency>,
    },

    /// Fit a model to two series of a profile CSV and print its parameters
    Fit {
        input: PathBuf,
        /// Independent series key (date, time or a cumulative)
        #[arg(long, default_value = "time")]
        x: String,
        /// Dependent series key
        #[arg(long, default_value = "oil_potential")]
        y: String,
        #[arg(long, value_enum, default_value = "dca-time")]
        model: ModelArg,
        /// Curve family or decline law (ignored for history)
        #[arg(long, default_value = "exponential")]
        method: String,
        /// Select the best curve family instead of --method
        #[arg(long)]
        best: bool,
        /// Fix the leading parameter (initial rate or intercept)
        #[arg(long)]
        input_value: Option<f64>,
        /// Only fit samples with x at or after this value (a number, or a date for --x date)
        #[arg(long)]
        from: Option<String>,
        /// Only fit samples with x at or before this value
        #[arg(long)]
        to: Option<String>,
        /// Forecast the fitted phase from the last history date until this date
        #[arg(long)]
        forecast_until: Option<NaiveDate>,
    },

    /// Sum several profile CSVs onto their union dateline
    Aggregate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Share of each input, in input order (default 1.0 each)
        #[arg(long)]
        fraction: Vec<f64>,
        #[arg(long, value_delimiter = ',', default_value = "date,oil_potential,oil_rate,oil_cumulative,production_uptime")]
        series: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModelArg {
    History,
    Curvefit,
    DcaTime,
    DcaCumulative,
}

// ============================================================================
// Commands
// ============================================================================

fn parse_series(keys: &[String]) -> Result<Vec<SeriesId>> {
    keys.iter()
        .map(|k| k.parse::<SeriesId>().with_context(|| format!("Invalid series key '{}'", k)))
        .collect()
}

fn print_series(profile: &Profile, ids: &[SeriesId]) -> Result<()> {
    let stdout = std::io::stdout();
    write_series_csv(stdout.lock(), profile, ids).context("Failed to write series")
}

fn load_profile(path: &Path) -> Result<Profile> {
    read_profile_csv(path).with_context(|| format!("Failed to import {}", path.display()))
}

fn run_timeline(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> Result<()> {
    let offsets = sample_offsets(start, end, frequency)?;
    let dates = dateline(start, end, frequency)?;
    println!("offset,date");
    for (offset, date) in offsets.iter().zip(&dates) {
        println!("{},{}", offset, date.format("%Y-%m-%d"));
    }
    info!(%frequency, samples = dates.len(), "timeline generated");
    Ok(())
}

fn run_series(input: &Path, ids: &[SeriesId], resample: Option<Frequency>) -> Result<()> {
    let mut profile = load_profile(input)?;
    if let Some(frequency) = resample {
        match (profile.start_date(), profile.end_date()) {
            (Some(start), Some(end)) => {
                let target = dateline(start, end, frequency)?;
                profile.resample_in_place(&target).context("Resample failed")?;
            }
            _ => bail!("{} has no samples to resample", input.display()),
        }
    }
    print_series(&profile, ids)
}

/// Stored phase behind a potential or rate series.
fn fitted_phase(y: SeriesId) -> Result<Phase> {
    match y {
        SeriesId::Potential(q) | SeriesId::Rate(q) => {
            q.phase().with_context(|| format!("'{}' is derived and cannot be forecast", y))
        }
        other => bail!("'{}' is not a rate or potential series and cannot be forecast", other),
    }
}

/// Bound of a fit window: a date on a date axis, otherwise a number.
fn parse_axis_value(value: &str, x_is_date: bool) -> Result<f64> {
    if x_is_date {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .with_context(|| format!("Invalid window date '{}'", value))?;
        Ok(day_number(date))
    } else {
        value.parse().with_context(|| format!("Invalid window value '{}'", value))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_fit(
    config: &EngineConfig,
    input: &Path,
    x: &str,
    y: &str,
    model_arg: ModelArg,
    method: &str,
    best: bool,
    input_value: Option<f64>,
    window: (Option<&str>, Option<&str>),
    forecast_until: Option<NaiveDate>,
) -> Result<()> {
    let history = load_profile(input)?;
    let x_id: SeriesId = x.parse().with_context(|| format!("Invalid x series '{}'", x))?;
    let y_id: SeriesId = y.parse().with_context(|| format!("Invalid y series '{}'", y))?;
    let mut samples = SampleSet::from_profile(&history, x_id, y_id)?;
    if window.0.is_some() || window.1.is_some() {
        let from = window.0.map(|v| parse_axis_value(v, samples.x_is_date())).transpose()?;
        let to = window.1.map(|v| parse_axis_value(v, samples.x_is_date())).transpose()?;
        let all = samples.len();
        samples = samples.window(from.unwrap_or(f64::NEG_INFINITY), to.unwrap_or(f64::INFINITY));
        info!(kept = samples.len(), of = all, "fit window applied");
    }
    let settings = config.fit_settings();

    let mut model = match model_arg {
        ModelArg::History => Model::history(samples),
        ModelArg::Curvefit => Model::curvefit(samples),
        ModelArg::DcaTime => Model::dca_time(samples),
        ModelArg::DcaCumulative => Model::dca_cumulative(samples),
    };

    if best {
        let family = model.find_best_fit(&settings)?;
        info!(%family, "best fit selected");
    } else {
        let fit_method = match model_arg {
            ModelArg::History => FitMethod::History,
            ModelArg::Curvefit => FitMethod::Curve(method.parse::<CurveFamily>()?),
            ModelArg::DcaTime | ModelArg::DcaCumulative => FitMethod::Decline(method.parse::<DeclineLaw>()?),
        };
        model.find_fit(fit_method, input_value, &settings)?;
    }

    let parameters = model.get_parameters().context("Model has no parameters after fitting")?;
    println!("{}", serde_json::to_string_pretty(&parameters)?);

    if let Some(until) = forecast_until {
        let phase = fitted_phase(y_id)?;
        let axis = match model_arg {
            ModelArg::DcaCumulative => ForecastAxis::Cumulative,
            _ => ForecastAxis::Time,
        };
        let start_date = history.end_date().context("History profile is empty")?;
        let start = model.samples().x().last().copied().unwrap_or(0.0);

        let function = AssembledFunction::assemble(vec![ModelEntry::new(model)], ReferencePoint::None, None)?;
        let dates = dateline(start_date, until, config.frequency())?;
        let mut forecast = forecast_profile(&function, phase, &dates, axis, start)?;
        forecast.set_offset(&history);
        info!(
            %phase,
            rate_unit = phase.rate_unit(),
            volume_unit = phase.volume_unit(),
            samples = dates.len(),
            "forecast generated"
        );

        let ids = [
            SeriesId::Date,
            SeriesId::Potential(phase.into()),
            SeriesId::Cumulative(phase.into()),
        ];
        print_series(&forecast, &ids)?;
    }
    Ok(())
}

fn run_aggregate(inputs: &[PathBuf], fractions: &[f64], ids: &[SeriesId]) -> Result<()> {
    if !fractions.is_empty() && fractions.len() != inputs.len() {
        bail!("{} fractions given for {} inputs", fractions.len(), inputs.len());
    }

    let mut tree = EntityTree::new();
    let total = tree.add_entity("total", EntityKind::Group);
    for (i, path) in inputs.iter().enumerate() {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let child = tree.add_entity(name, EntityKind::Well);
        tree.set_profile(child, CLI_CASE, load_profile(path)?)?;
        let share = fractions.get(i).copied().unwrap_or(1.0);
        tree.link(total, child, Fractions::Uniform(share))?;
    }

    let profile = tree.aggregate(total, CLI_CASE)?;
    print_series(&profile, ids)
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json);

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load(),
    };

    match args.command {
        SubCommand::Timeline { start, end, frequency } => {
            run_timeline(start, end, frequency.unwrap_or_else(|| config.frequency()))
        }
        SubCommand::Series { input, series, all, resample } => {
            let ids = if all { SeriesId::all() } else { parse_series(&series)? };
            run_series(&input, &ids, resample)
        }
        SubCommand::Fit {
            input,
            x,
            y,
            model,
            method,
            best,
            input_value,
            from,
            to,
            forecast_until,
        } => run_fit(
            &config,
            &input,
            &x,
            &y,
            model,
            &method,
            best,
            input_value,
            (from.as_deref(), to.as_deref()),
            forecast_until,
        ),
        SubCommand::Aggregate { inputs, fraction, series } => {
            let ids = parse_series(&series)?;
            run_aggregate(&inputs, &fraction, &ids)
        }
    }
}
