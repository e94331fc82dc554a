use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use dotenvy::dotenv;
use finance_tracker_client::session::FileStorage;
use finance_tracker_client::{cli, Config, Endpoint, SessionStore};
use tracing::info;

/// Initializes tracing collection into the log file, away from the terminal UI.
fn setup_tracing(log_path: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let fmt_layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create data directory {}", config.data_dir.display()))?;
    setup_tracing(&config.log_path())?;

    info!(api = %config.api_url, data_dir = %config.data_dir.display(), "starting");

    let endpoint = Endpoint::new(&config)?;
    let session = SessionStore::new(endpoint, FileStorage::new(config.session_path()));

    cli::run(session).await
}
