mod database;
mod logging;
mod query;
mod restaurant;
mod settings;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use database::Database;
use settings::{Args, Settings};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())
        .context("Problem while loading settings")?;
    logging::init_tracing(&settings.log);

    info!("Starting Restaurant Recommendation Service");
    let database = Database::connect(&settings.database.path)
        .context("Problem while connecting to the database")?;
    match database.count() {
        Ok(count) => info!("Database ready with {count} restaurants"),
        Err(e) => error!("Problem while counting restaurants: {e:#}"),
    }

    web::serve(database.clone(), settings.web.address, shutdown_signal()).await?;

    info!("Shutting down");
    database.disconnect()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Problem while waiting for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
