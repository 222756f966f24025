use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, Result, db::Db, models::QueueMessage};

/// One message of a wire batch, already serialized.
#[derive(Clone, Debug)]
pub struct OutgoingEntry {
	pub message_id: Uuid,
	pub payload: Value,
	pub attributes: Value,
}

/// Delivery settings for [`receive`].
#[derive(Clone, Copy, Debug)]
pub struct ReceiveOptions {
	pub max_entries: u32,
	pub visibility_timeout: Duration,
	pub max_receive_count: u32,
}

/// Sends one wire batch. All entries share a fresh `batch_id` and land in one statement, so the
/// batch is accepted or rejected as a whole.
pub async fn send_wire_batch(db: &Db, queue_name: &str, entries: &[OutgoingEntry]) -> Result<Uuid> {
	if entries.is_empty() {
		return Err(Error::InvalidArgument(
			"A wire batch must contain at least one entry.".to_string(),
		));
	}

	let batch_id = Uuid::new_v4();
	let mut builder = QueryBuilder::<Postgres>::new(
		"INSERT INTO embedding_queue \
		 (entry_id, queue_name, batch_id, message_id, payload, attributes) ",
	);

	builder.push_values(entries, |mut row, entry| {
		row.push_bind(Uuid::new_v4())
			.push_bind(queue_name)
			.push_bind(batch_id)
			.push_bind(entry.message_id)
			.push_bind(&entry.payload)
			.push_bind(&entry.attributes);
	});
	builder.build().execute(&db.pool).await?;

	Ok(batch_id)
}

/// Receives up to `opts.max_entries` visible entries and hides them for the visibility timeout.
///
/// Entries that were already delivered `max_receive_count` times are removed instead of being
/// returned again.
pub async fn receive(
	db: &Db,
	queue_name: &str,
	opts: ReceiveOptions,
	now: OffsetDateTime,
) -> Result<Vec<QueueMessage>> {
	let mut tx = db.pool.begin().await?;
	let dropped = sqlx::query_scalar::<_, Uuid>(
		"\
DELETE FROM embedding_queue
WHERE entry_id IN (
	SELECT entry_id
	FROM embedding_queue
	WHERE queue_name = $1 AND visible_at <= $2 AND receive_count >= $3
	FOR UPDATE SKIP LOCKED
)
RETURNING message_id",
	)
	.bind(queue_name)
	.bind(now)
	.bind(i32::try_from(opts.max_receive_count).unwrap_or(i32::MAX))
	.fetch_all(&mut *tx)
	.await?;

	for message_id in dropped {
		tracing::warn!(
			%message_id,
			queue = queue_name,
			"Dropping queue entry after too many deliveries."
		);
	}

	let mut rows = sqlx::query_as::<_, QueueMessage>(
		"\
SELECT
	entry_id,
	batch_id,
	message_id,
	payload,
	attributes,
	receive_count,
	visible_at,
	created_at
FROM embedding_queue
WHERE queue_name = $1 AND visible_at <= $2
ORDER BY created_at ASC, entry_id ASC
LIMIT $3
FOR UPDATE SKIP LOCKED",
	)
	.bind(queue_name)
	.bind(now)
	.bind(i64::from(opts.max_entries))
	.fetch_all(&mut *tx)
	.await?;

	if !rows.is_empty() {
		let visible_at = now + opts.visibility_timeout;
		let ids = rows.iter().map(|row| row.entry_id).collect::<Vec<_>>();

		sqlx::query(
			"\
UPDATE embedding_queue
SET visible_at = $1,
	receive_count = receive_count + 1
WHERE entry_id = ANY($2)",
		)
		.bind(visible_at)
		.bind(&ids)
		.execute(&mut *tx)
		.await?;

		for row in &mut rows {
			row.visible_at = visible_at;
			row.receive_count += 1;
		}
	}

	tx.commit().await?;

	Ok(rows)
}

/// Deletes delivered entries. Unacknowledged entries reappear once their visibility lapses.
pub async fn ack(db: &Db, entry_ids: &[Uuid]) -> Result<u64> {
	if entry_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query("DELETE FROM embedding_queue WHERE entry_id = ANY($1)")
		.bind(entry_ids)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}
