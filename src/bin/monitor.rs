use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch::config::Config;
use sitewatch::db::store::PgMonitorStore;
use sitewatch::monitor::prober::HttpProber;
use sitewatch::monitor::scheduler::MonitorEngine;
use sitewatch::notifications::AlertNotifier;
use sitewatch::version::VERSION;

/// Monitor all active websites and log their health status.
#[derive(Parser, Debug)]
#[command(name = "monitor", version = VERSION)]
struct Cli {
    /// Run monitoring once instead of continuously
    #[arg(long)]
    once: bool,

    /// Check interval in seconds
    #[arg(long, default_value_t = 60)]
    interval: u64,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "monitor.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    info!(version = VERSION, once = cli.once, "Starting website monitor.");

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Critical error loading configuration. Exiting.");
        e
    })?;

    let store = PgMonitorStore::connect(&config.database_url)
        .await
        .map_err(|e| {
            error!(error = %e, "Could not reach the database. Exiting.");
            e
        })?;

    let notifier = Arc::new(AlertNotifier::from_config(&config));
    if notifier.is_empty() {
        info!("No alert channel configured; alerts will only be recorded.");
    }

    let engine = MonitorEngine::new(Arc::new(store), Arc::new(HttpProber::new()), notifier);
    engine
        .run(Duration::from_secs(cli.interval), cli.once)
        .await?;

    Ok(())
}
