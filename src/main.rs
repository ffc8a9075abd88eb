use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};

use overpass_predictor::cache::ResultCache;
use overpass_predictor::predict::{Sgp4Propagator, TleDirectory, TleResolver};
use overpass_predictor::scheduler::{
    parse_duration, parse_time, partition_by_kind, TimeRangeArgs,
};
use overpass_predictor::{
    Config, LogAlerter, OutputMode, OverPass, PredictRequest, Prediction, Scheduler, SectorList,
};

#[derive(Parser)]
#[command(name = "overpass-predictor")]
#[command(about = "Predict satellite overpasses of geographic sectors")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict overpasses, reusing cached predictions when available
    Predict(PredictArgs),
    /// Print cached overpasses without predicting
    Lookup {
        #[arg(required = true)]
        satellites: Vec<String>,
        #[arg(short = 'S', long, value_parser = parse_time)]
        start: DateTime<Utc>,
        #[arg(short = 'E', long, value_parser = parse_time)]
        end: DateTime<Utc>,
        #[arg(long, value_delimiter = ',')]
        sectorlist: Option<Vec<String>>,
    },
    /// Validate a sector list
    Validate {
        #[arg(long)]
        sectors: PathBuf,
    },
}

#[derive(Args)]
struct PredictArgs {
    #[arg(required = true)]
    satellites: Vec<String>,
    /// Sector list file
    #[arg(long)]
    sectors: PathBuf,
    /// Sensors to predict for; all configured sensors when omitted
    #[arg(long, value_delimiter = ',')]
    sensors: Vec<String>,
    #[arg(short = 'S', long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,
    #[arg(short = 'E', long, value_parser = parse_time)]
    end: Option<DateTime<Utc>>,
    /// Start this many hours before now
    #[arg(short = 'B', long)]
    hours_back: Option<i64>,
    /// Check this many hours
    #[arg(short = 'N', long)]
    hours_to_check: Option<i64>,
    /// Window length as a duration, e.g. "6h"
    #[arg(long, value_parser = parse_duration, conflicts_with = "hours_to_check")]
    span: Option<Duration>,
    #[arg(long, value_delimiter = ',')]
    sectorlist: Option<Vec<String>>,
    /// Ignore cached predictions
    #[arg(long)]
    force: bool,
    /// Only reduce per sector set
    #[arg(long, conflicts_with = "both")]
    individual: bool,
    /// Print individual and combined lists
    #[arg(long)]
    both: bool,
    /// Store freshly predicted overpasses in the cache
    #[arg(long)]
    write_cache: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { sectors } => validate(&sectors),
        Commands::Predict(args) => predict(&cli.config, args),
        Commands::Lookup {
            satellites,
            start,
            end,
            sectorlist,
        } => lookup(&cli.config, &satellites, start, end, sectorlist),
    }
}

fn load_config(path: &Path) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error reading config {}: {}", path.display(), e);
            None
        }
    }
}

fn validate(path: &Path) -> ExitCode {
    let list = match SectorList::from_file(path) {
        Ok(list) => list,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Sector list is valid ({} sectors)", list.sectors.len());
    let mut failed = false;
    for (i, sector) in list.sectors.iter().enumerate() {
        match overpass_predictor::predict::sample_points(sector) {
            Ok(_) => println!(
                "  {}: {}{}{} ({} x {} km at {:.2},{:.2})",
                i + 1,
                sector.name,
                if sector.dynamic { " dynamic" } else { "" },
                if sector.active { "" } else { " inactive" },
                sector.width_km,
                sector.height_km,
                sector.center_lon,
                sector.center_lat
            ),
            Err(e) => {
                failed = true;
                println!("  {}: {}", i + 1, e);
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn predict(config_path: &Path, args: PredictArgs) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };
    let sectors = match SectorList::from_file(&args.sectors) {
        Ok(list) => list.sectors,
        Err(e) => {
            eprintln!("Error reading sectors {}: {}", args.sectors.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let output = if args.individual {
        OutputMode::Individual
    } else if args.both {
        OutputMode::Both
    } else {
        OutputMode::Combined
    };
    let request = PredictRequest {
        satellites: args.satellites,
        sensors: args.sensors,
        time_range: TimeRangeArgs {
            start: args.start,
            end: args.end,
            hours_back: args.hours_back.map(Duration::hours),
            hours_to_check: args.span.or(args.hours_to_check.map(Duration::hours)),
        },
        sector_filter: args.sectorlist,
        force: args.force,
        output,
    };

    let resolver = TleResolver::new(TleDirectory::new(config.tle_dir.clone()), LogAlerter);
    let mut scheduler = Scheduler::new(config.scheduling.clone(), resolver, Sgp4Propagator);
    if let Some(dir) = &config.cache_dir {
        scheduler = scheduler.with_cache(ResultCache::new(dir.clone()));
    }

    let prediction = match scheduler.predict(&request, &sectors, Utc::now()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Prediction failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.write_cache && !prediction.from_cache {
        write_cache(scheduler.cache(), &prediction, &sectors);
    }
    print_prediction(&prediction, output);
    ExitCode::SUCCESS
}

fn write_cache(
    cache: Option<&ResultCache>,
    prediction: &Prediction,
    sectors: &[overpass_predictor::Sector],
) {
    let Some(cache) = cache else {
        log::warn!("No cache_dir configured, not writing pass prediction list");
        return;
    };
    for (kind, batch) in partition_by_kind(&prediction.individual, sectors) {
        if let Err(e) = cache.store(&batch, prediction.start, prediction.end, kind) {
            log::error!("Failed to write {} pass prediction list: {}", kind, e);
        }
    }
}

fn lookup(
    config_path: &Path,
    satellites: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    sectorlist: Option<Vec<String>>,
) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };
    let Some(dir) = config.cache_dir else {
        eprintln!("No cache_dir configured");
        return ExitCode::FAILURE;
    };

    let mut passes = ResultCache::new(dir).lookup(satellites, start, end, sectorlist.as_deref());
    passes.sort_by(overpass_predictor::predict::chronological);
    print_passes(&passes);
    ExitCode::SUCCESS
}

fn print_prediction(prediction: &Prediction, output: OutputMode) {
    if prediction.from_cache {
        log::info!("Using cached pass predictions");
    }
    match (output, &prediction.combined) {
        (OutputMode::Both, Some(combined)) => {
            println!("# individual");
            print_sorted(&prediction.individual);
            println!("# combined");
            print_sorted(combined);
        }
        _ => print_sorted(prediction.preferred()),
    }
}

fn print_sorted(passes: &[OverPass]) {
    let mut sorted = passes.to_vec();
    sorted.sort_by(overpass_predictor::predict::chronological);
    print_passes(&sorted);
}

fn print_passes(passes: &[OverPass]) {
    for pass in passes {
        println!("{}", pass);
    }
}
