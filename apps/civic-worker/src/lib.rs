pub mod worker;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use civic_service::{CivicService, Vectorizer};
use civic_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = civic_cli::VERSION,
	rename_all = "kebab",
	styles = civic_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = civic_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.embedding.dimensions).await?;

	let embedding = config.embedding.clone();
	let vectorizer = tokio::task::spawn_blocking(move || Vectorizer::from_config(&embedding))
		.await?
		.wrap_err("Failed to load the embedding model.")?;
	let state = worker::WorkerState {
		batch_size: config.worker.batch_size,
		poll_interval_ms: config.worker.poll_interval_ms,
		service: CivicService::new(config, Arc::new(db), vectorizer),
	};

	worker::run_worker(state).await
}
