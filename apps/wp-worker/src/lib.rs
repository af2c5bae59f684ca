pub mod error;
pub mod worker;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wp_service::Providers;
use wp_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = wp_cli::VERSION,
	rename_all = "kebab",
	styles = wp_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = wp_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let state = worker::WorkerState::new(&config, db, Providers::default().embedding);
	let shutdown = CancellationToken::new();
	let signal = shutdown.clone();

	tokio::spawn(async move {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "Failed to listen for the shutdown signal.");
		}

		tracing::info!("Shutdown signal received.");

		signal.cancel();
	});

	worker::run_worker(state, shutdown).await?;

	Ok(())
}
