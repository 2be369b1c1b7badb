#[allow(dead_code)]
#[path = "../database.rs"]
mod database;
#[allow(dead_code)]
#[path = "../loader.rs"]
mod loader;
#[allow(dead_code)]
#[path = "../logging.rs"]
mod logging;
#[allow(dead_code)]
#[path = "../query/mod.rs"]
mod query;
#[allow(dead_code)]
#[path = "../restaurant.rs"]
mod restaurant;
#[allow(dead_code)]
#[path = "../settings.rs"]
mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use database::Database;
use loader::LoadStats;
use settings::Settings;
use tracing::{error, info, warn};

const EXIT_INVALID_ENTRIES: u8 = 1;
const EXIT_FATAL: u8 = 2;

/// Validates a JSON array of restaurants and inserts the valid ones.
///
/// Exits with 0 when every entry was valid, 1 when some entries were
/// rejected, and 2 when the file or the database could not be used at all.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Remove all stored restaurants before loading.
    #[arg(long)]
    clear: bool,

    /// The restaurants file. Defaults to `loader.restaurants_file`.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Problem while loading settings. {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    logging::init_tracing(&settings.log);

    match run(&args, &settings) {
        Ok(stats) => {
            println!("\n{stats}");
            if stats.invalid > 0 {
                println!("\nSome entries were invalid. Check the logs above.");
                ExitCode::from(EXIT_INVALID_ENTRIES)
            } else {
                println!("\nAll entries processed successfully.");
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Fatal error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: &Args, settings: &Settings) -> Result<LoadStats> {
    let path = args
        .file
        .as_deref()
        .unwrap_or(settings.loader.restaurants_file.as_path());
    info!("Loading from: {}", path.display());
    let entries = loader::read_entries(path)?;

    let db = Database::connect(&settings.database.path)
        .context("Problem while connecting to the database")?;
    if args.clear {
        let removed = db.clear()?;
        warn!("Removed {removed} existing restaurants");
    }
    let stats = loader::load_entries(&db, &entries)?;
    db.disconnect()?;
    Ok(stats)
}
