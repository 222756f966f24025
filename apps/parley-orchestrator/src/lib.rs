use clap::Parser;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use parley_pipeline::{ClaimSettings, PgQueue, PgStore};
use parley_storage::db::Db;

/// Runs one claim cycle and exits. Safe to schedule with overlapping runs.
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

	let store = PgStore { db: db.clone() };
	let queue = PgQueue::new(db, &config.dispatch, &config.worker);
	let settings = ClaimSettings::from_config(&config);
	let now = OffsetDateTime::now_utc();
	let report = parley_pipeline::run_claim_cycle(&store, &queue, &settings, now)
		.await
		.inspect_err(|err| tracing::error!(error = %err, "Claim cycle failed."))?;

	if report.failed > 0 {
		tracing::warn!(
			failed = report.failed,
			"Some messages were not dispatched. They will be reclaimed once their claim goes stale."
		);
	}

	Ok(())
}
