pub mod worker;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley_pipeline::{BatchWorker, PgQueue, PgStore, Providers, WorkerSettings};
use parley_storage::db::Db;

/// Consumes embedding deliveries until interrupted.
#[derive(Debug, Parser)]
#[command(
	version = parley_cli::VERSION,
	rename_all = "kebab",
	styles = parley_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = parley_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let store = Arc::new(PgStore { db: db.clone() });
	let batch_worker = BatchWorker {
		settings: WorkerSettings::from_config(&config),
		claims: store.clone(),
		messages: store,
		providers: Providers::from_config(&config.providers)?,
	};
	let state = worker::WorkerState {
		batch_worker,
		queue: PgQueue::new(db, &config.dispatch, &config.worker),
		poll_interval_ms: config.worker.poll_interval_ms,
	};

	worker::run_worker(state).await
}
