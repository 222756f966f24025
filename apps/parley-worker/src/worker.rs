use std::time::Duration;

use color_eyre::Result;
use time::OffsetDateTime;
use tokio::time as tokio_time;

use parley_pipeline::{BatchWorker, PgQueue};

pub struct WorkerState {
	pub batch_worker: BatchWorker,
	pub queue: PgQueue,
	pub poll_interval_ms: u64,
}

/// Polls until Ctrl-C. Deliveries are processed one at a time. An idle or failed poll waits one
/// interval before the next.
pub async fn run_worker(state: WorkerState) -> Result<()> {
	let poll_interval = Duration::from_millis(state.poll_interval_ms);

	loop {
		let idle = tokio::select! {
			result = poll(&state) => result,
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Shutdown requested. Stopping worker.");

				return Ok(());
			},
		};

		if idle {
			tokio_time::sleep(poll_interval).await;
		}
	}
}

/// Returns true when the worker should back off before polling again.
async fn poll(state: &WorkerState) -> bool {
	match state.batch_worker.poll_once(&state.queue, OffsetDateTime::now_utc()).await {
		Ok(Some(report)) => {
			tracing::debug!(
				received = report.received,
				acked = report.acked,
				embedded = report.outcome.embedded.len(),
				failed = report.outcome.failures.len(),
				"Delivery processed."
			);

			false
		},
		Ok(None) => true,
		Err(err) => {
			tracing::error!(error = %err, "Delivery processing failed.");

			true
		},
	}
}
