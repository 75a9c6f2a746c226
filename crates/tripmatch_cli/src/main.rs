use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};

use tripmatch_core::{
    MatchError, MatcherConfig, ReferenceData, RouteFamilyRule, SearchStrategy, TimeComparison,
    TripMatch, TripMatcher,
};
use tripmatch_model::{Coordinate, TimeOfDay};

mod telemetry;

use telemetry::TelemetryLine;

#[derive(Debug, Parser)]
#[command(name = "tripmatch")]
#[command(about = "Match vehicle position fixes to scheduled trips")]
struct Args {
    /// Directory holding the shapes, trips, stops and stop-times tables
    #[arg(short = 'd', long = "dataset", env = "TRIPMATCH_DATASET")]
    dataset: PathBuf,

    /// JSON matcher configuration (table layout, route family rule, search)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "lat", allow_hyphen_values = true, requires = "lon", conflicts_with = "fixes")]
    lat: Option<String>,

    #[arg(long = "lon", allow_hyphen_values = true, requires = "lat", conflicts_with = "fixes")]
    lon: Option<String>,

    /// Observed time of day as HH:MM:SS, defaults to the local clock
    #[arg(short = 't', long = "time", conflicts_with = "fixes")]
    time: Option<String>,

    /// File of telemetry lines, one fix per line
    #[arg(short = 'f', long = "fixes")]
    fixes: Option<PathBuf>,

    #[arg(long = "time-comparison", alias = "time_comparison", value_enum)]
    time_comparison: Option<TimeComparisonArg>,

    #[arg(long = "search", value_enum)]
    search: Option<SearchArg>,

    /// Override the route family rule with a fixed-length shape id prefix
    #[arg(long = "route-prefix", alias = "route_prefix")]
    route_prefix: Option<usize>,

    /// Print results as JSON, one document per fix
    #[arg(long = "json")]
    json: bool,

    #[arg(short = 'p', long = "pretty", requires = "json")]
    pretty: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeComparisonArg {
    Linear,
    Circular,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchArg {
    Linear,
    Indexed,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome {
    Matched {
        #[serde(flatten)]
        trip: TripMatch,
    },
    Failed {
        code: &'static str,
        message: String,
    },
}

impl From<Result<TripMatch, MatchError>> for Outcome {
    fn from(result: Result<TripMatch, MatchError>) -> Self {
        match result {
            Ok(trip) => Outcome::Matched { trip },
            Err(err) => Outcome::Failed {
                code: err.code(),
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FixReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    position: Coordinate,
    observed: TimeOfDay,
    #[serde(skip_serializing_if = "Option::is_none")]
    heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    altitude: Option<f64>,
    #[serde(flatten)]
    outcome: Outcome,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&args)?;
    let started_at = Instant::now();
    let (data, report) = ReferenceData::load_with_report(&args.dataset, &config.layout)
        .with_context(|| format!("load dataset {}", args.dataset.display()))?;
    if report.skipped() > 0 {
        warn!("{} malformed rows skipped while loading", report.skipped());
    }
    let matcher = TripMatcher::new(Arc::new(data), config).context("build matcher")?;
    info!(
        "dataset ready in {:.2}s ({})",
        started_at.elapsed().as_secs_f64(),
        report
    );

    if let Some(fixes) = args.fixes.as_ref() {
        return run_batch(&args, &matcher, fixes);
    }

    let (Some(lat), Some(lon)) = (args.lat.as_deref(), args.lon.as_deref()) else {
        bail!("either --lat and --lon or --fixes is required");
    };
    let position = Coordinate::parse(lat, lon).context("parse --lat/--lon")?;
    let observed = match args.time.as_deref() {
        Some(value) => TimeOfDay::parse(value).context("parse --time")?,
        None => TimeOfDay::from(chrono::Local::now().time()),
    };

    let result = matcher.match_fix(position, observed);
    let failed = result.is_err();
    print_report(
        &args,
        &FixReport {
            device: None,
            position,
            observed,
            heading: None,
            speed: None,
            altitude: None,
            outcome: result.into(),
        },
    )?;
    if failed {
        bail!("no trip matched {} at {}", position, observed);
    }
    Ok(())
}

fn resolve_config(args: &Args) -> anyhow::Result<MatcherConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => MatcherConfig::from_json_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => MatcherConfig::default(),
    };
    if let Some(comparison) = args.time_comparison {
        config.time_comparison = match comparison {
            TimeComparisonArg::Linear => TimeComparison::Linear,
            TimeComparisonArg::Circular => TimeComparison::Circular,
        };
    }
    if let Some(search) = args.search {
        config.search = match search {
            SearchArg::Linear => SearchStrategy::Linear,
            SearchArg::Indexed => SearchStrategy::Indexed,
        };
    }
    if let Some(chars) = args.route_prefix {
        config.route_family = RouteFamilyRule::Prefix { chars };
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_batch(args: &Args, matcher: &TripMatcher, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("open fixes {}", path.display()))?;
    let mut matched = 0usize;
    let mut failed = 0usize;
    let mut malformed = 0usize;

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read fixes {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let telemetry = match TelemetryLine::parse(&line) {
            Ok(telemetry) => telemetry,
            Err(err) => {
                malformed += 1;
                warn!("line {}: skipped: {:#}", number + 1, err);
                continue;
            }
        };

        let result = matcher.match_fix(telemetry.fix.position, telemetry.fix.time);
        if result.is_ok() {
            matched += 1;
        } else {
            failed += 1;
        }
        print_report(
            args,
            &FixReport {
                device: Some(&telemetry.device),
                position: telemetry.fix.position,
                observed: telemetry.fix.time,
                heading: telemetry.heading,
                speed: telemetry.speed,
                altitude: telemetry.altitude,
                outcome: result.into(),
            },
        )?;
    }

    info!(
        "{} fixes matched, {} unmatched, {} malformed lines",
        matched, failed, malformed
    );
    Ok(())
}

fn print_report(args: &Args, report: &FixReport<'_>) -> anyhow::Result<()> {
    if args.json {
        let json = if args.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        println!("{}", json);
        return Ok(());
    }

    let prefix = match report.device {
        Some(device) => format!("{} {} {}", device, report.observed, report.position),
        None => format!("{} {}", report.observed, report.position),
    };
    match &report.outcome {
        Outcome::Matched { trip } => println!(
            "{}: trip {} (route {}, shape {} at {:.1} m, stop {} at {:.1} m, departs {}, {}s apart)",
            prefix,
            trip.trip_id,
            trip.route_code,
            trip.shape_id,
            trip.shape_distance_m,
            trip.stop_id,
            trip.stop_distance_m,
            trip.scheduled_departure,
            trip.delta_seconds
        ),
        Outcome::Failed { code, message } => println!("{}: {} ({})", prefix, message, code),
    }
    Ok(())
}
