//! Keep-alive prober binary

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use keepalive_prober::controllers::configure;
use keepalive_prober::{
    run_stored_round, AppState, Config, JsonFileStore, ProbeExecutor, Result, Scheduler, SchedulerOptions,
    StateStore,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "keepalive-prober", version, about = "Keeps registered URLs warm with periodic probes")]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDRESS")]
    bind: Option<String>,

    /// Path of the JSON state file
    #[arg(long, env = "STATE_FILE")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler and the HTTP API (default)
    Serve,
    /// Run one round against the stored state and print the report
    Trigger,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();

    info!("Starting keepalive prober v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Prober configuration - Bind: {}, State file: {}, Default interval: {} min",
        config.bind_address,
        config.state_file.display(),
        config.default_interval_minutes
    );

    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(config.state_file.clone()));
    let executor = ProbeExecutor::new(config.probe_settings())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store, executor).await,
        Command::Trigger => {
            let report = run_stored_round(store.as_ref(), &executor, config.default_interval_minutes).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(config: Config, store: Arc<dyn StateStore>, executor: ProbeExecutor) -> Result<()> {
    let scheduler = Scheduler::restore(executor, store, SchedulerOptions::from(&config)).await;

    let state = web::Data::new(AppState {
        scheduler: scheduler.clone(),
    });

    info!("Server is live at http://{}", config.bind_address);
    let result = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(config.bind_address.as_str())?
        .run()
        .await;

    info!("Server stopped, shutting down scheduler");
    scheduler.shutdown().await;

    result.map_err(Into::into)
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
