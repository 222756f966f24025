use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use parley_domain::QueueEntry;

use crate::{Error, Result, db::Db, models::ClaimedMessage};

/// Claims up to `limit` pending messages and returns their snapshots in `(created_at, id)` order.
///
/// A message is eligible while `needs_embedding` is set, it is not deleted, and it is unclaimed or
/// its claim is at least `stale_after` old. Selection and marking happen in one statement, and rows
/// locked by a concurrent claimer are skipped, so overlapping claimers never return the same row.
pub async fn claim_batch(
	db: &Db,
	limit: u32,
	stale_after: Duration,
	now: OffsetDateTime,
) -> Result<Vec<QueueEntry>> {
	if stale_after.is_negative() {
		return Err(Error::InvalidArgument("stale_after must not be negative.".to_string()));
	}

	let stale_before = now - stale_after;
	let mut rows = sqlx::query_as::<_, ClaimedMessage>(
		"\
WITH candidates AS (
	SELECT id
	FROM messages
	WHERE needs_embedding
		AND deleted_at IS NULL
		AND (claimed_at IS NULL OR claimed_at <= $1)
	ORDER BY created_at ASC, id ASC
	LIMIT $2
	FOR UPDATE SKIP LOCKED
)
UPDATE messages m
SET claimed_at = $3
FROM candidates c
WHERE m.id = c.id
RETURNING
	m.id,
	m.workspace_id,
	m.channel_id,
	m.conversation_id,
	m.parent_message_id,
	m.created_at,
	m.body,
	m.text",
	)
	.bind(stale_before)
	.bind(i64::from(limit))
	.bind(now)
	.fetch_all(&db.pool)
	.await?;

	rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

	Ok(rows.into_iter().map(QueueEntry::from).collect())
}

/// Clears the pending flag and the claim for messages that were embedded.
pub async fn mark_processed(db: &Db, message_ids: &[Uuid]) -> Result<u64> {
	if message_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query(
		"\
UPDATE messages
SET needs_embedding = false,
	claimed_at = NULL
WHERE id = ANY($1)",
	)
	.bind(message_ids)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}
