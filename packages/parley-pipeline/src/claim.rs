use std::collections::HashSet;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use parley_domain::group_by_workspace;

use crate::{ClaimStore, DispatchSink, Result, dispatch};

#[derive(Clone, Debug)]
pub struct ClaimSettings {
	pub batch_size: u32,
	pub stale_after: Duration,
	pub max_messages_per_run: u32,
	pub wire_batch_size: usize,
}
impl ClaimSettings {
	pub fn from_config(cfg: &parley_config::Config) -> Self {
		Self {
			batch_size: cfg.claim.batch_size,
			stale_after: Duration::seconds(
				i64::try_from(cfg.claim.stale_after_seconds).unwrap_or(i64::MAX),
			),
			max_messages_per_run: cfg.claim.max_messages_per_run,
			wire_batch_size: cfg.dispatch.wire_batch_size as usize,
		}
	}
}

/// Totals for one orchestrator run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClaimCycleReport {
	pub claimed: usize,
	/// Claimed messages with nothing to embed.
	pub skipped_empty: usize,
	/// Workspace batches across every claim round.
	pub workspaces: usize,
	pub wire_batches: usize,
	pub dispatched: usize,
	pub failed: usize,
}

/// Claims, groups, and dispatches pending messages until the pending set is drained or the
/// per-run cap is reached.
///
/// Only claim errors abort the run. Messages with empty text are marked processed right away,
/// since no embedding will ever be produced for them.
pub async fn run_claim_cycle(
	store: &dyn ClaimStore,
	sink: &dyn DispatchSink,
	settings: &ClaimSettings,
	now: OffsetDateTime,
) -> Result<ClaimCycleReport> {
	let mut report = ClaimCycleReport::default();

	let cap = settings.max_messages_per_run as usize;

	while report.claimed < cap {
		let remaining = u32::try_from(cap - report.claimed).unwrap_or(u32::MAX);
		let limit = settings.batch_size.min(remaining);
		let claimed = store.claim_batch(limit, settings.stale_after, now).await?;
		let claimed_count = claimed.len();

		if claimed_count == 0 {
			break;
		}

		report.claimed += claimed_count;

		let claimed_ids = claimed.iter().map(|entry| entry.message_id).collect::<Vec<_>>();
		let batches = group_by_workspace(claimed);
		let kept = batches
			.iter()
			.flat_map(|batch| batch.messages.iter().map(|entry| entry.message_id))
			.collect::<HashSet<_>>();
		let empty = claimed_ids.into_iter().filter(|id| !kept.contains(id)).collect::<Vec<Uuid>>();

		if !empty.is_empty() {
			report.skipped_empty += empty.len();

			if let Err(err) = store.mark_processed(&empty).await {
				tracing::warn!(
					error = %err,
					messages = empty.len(),
					"Failed to settle messages with empty text."
				);
			}
		}

		report.workspaces += batches.len();

		let sent = dispatch::send(sink, &batches, settings.wire_batch_size).await;

		report.wire_batches += sent.batch_count;
		report.dispatched += sent.dispatched;
		report.failed += sent.failure_count;

		if claimed_count < limit as usize {
			break;
		}
	}

	tracing::info!(
		claimed = report.claimed,
		skipped_empty = report.skipped_empty,
		workspaces = report.workspaces,
		wire_batches = report.wire_batches,
		dispatched = report.dispatched,
		failed = report.failed,
		"Claim cycle finished."
	);

	Ok(report)
}
