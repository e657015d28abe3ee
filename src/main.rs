use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wardroom::api::HttpBackend;
use wardroom::app::App;
use wardroom::config::{Config, ThreadStorage};
use wardroom::speech::SpeechCapability;
use wardroom::storage::StorageTiers;

#[derive(Parser)]
#[command(name = "wardroom")]
#[command(version)]
#[command(about = "Interview simulated patients from the terminal", long_about = None)]
struct Cli {
    /// Chat service base URL (overrides config and WARDROOM_SERVER_URL)
    #[arg(long)]
    server: Option<String>,

    /// Keep the conversation id across restarts instead of starting a new case each launch
    #[arg(long)]
    durable_thread: bool,

    /// Client home directory (defaults to ~/.wardroom)
    #[arg(long)]
    home: Option<PathBuf>,
}

fn init_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(config.log_dir()).context("Failed to create log directory")?;
    let appender = tracing_appender::rolling::never(config.log_dir(), "wardroom.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.home)?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if cli.durable_thread {
        config.thread_storage = ThreadStorage::Durable;
    }

    let _log_guard = init_logging(&config)?;
    tracing::info!(server = %config.base_url(), thread_storage = ?config.thread_storage, "starting wardroom");

    let backend = Arc::new(HttpBackend::new(&config)?);
    let tiers = StorageTiers::open(config.storage_path())?;
    let speech_config = config.speech.clone();
    let app = App::new(
        &config,
        backend,
        tiers,
        Box::new(move || SpeechCapability::detect(&speech_config)),
    );

    wardroom::tui::run(app).await
}
