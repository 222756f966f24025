use std::time::Duration;

use parley_config::Context;
use parley_domain::QueueEntry;
use parley_storage::{models::Neighbor, neighbors::NeighborQuery};

use crate::{Error, MessageStore, Result};

/// Neighbors of one freshly embedded message, bounded by the configured lookup timeout.
pub async fn resolve_neighbors(
	store: &dyn MessageStore,
	entry: &QueueEntry,
	embedding: &[f32],
	cfg: &Context,
) -> Result<Vec<Neighbor>> {
	let query = NeighborQuery {
		embedding,
		workspace_id: entry.workspace_id,
		message_id: entry.message_id,
		parent_message_id: entry.parent_message_id,
		channel_id: entry.channel_id,
		conversation_id: entry.conversation_id,
		time_window_hours: cfg.time_window_hours,
		similarity_threshold: cfg.similarity_threshold,
		limit: cfg.neighbor_limit,
	};

	let timeout = Duration::from_millis(cfg.neighbor_timeout_ms);

	tokio::time::timeout(timeout, store.find_neighbors(&query)).await.map_err(|_| {
		Error::Timeout { operation: "Neighbor lookup", timeout_ms: cfg.neighbor_timeout_ms }
	})?
}
