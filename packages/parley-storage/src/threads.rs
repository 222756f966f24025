use uuid::Uuid;

use parley_domain::MessageDetail;

use crate::{Result, db::Db, models::MessageDetailRow};

/// Live messages among `ids`. Missing or deleted ids are silently absent.
pub async fn fetch_messages(db: &Db, ids: &[Uuid]) -> Result<Vec<MessageDetail>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, MessageDetailRow>(
		"\
SELECT
	id,
	text,
	body,
	created_at,
	parent_message_id
FROM messages
WHERE id = ANY($1) AND deleted_at IS NULL",
	)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(MessageDetail::from).collect())
}

/// Every live reply to any of `parent_ids`, ordered by `(created_at, id)`.
pub async fn fetch_replies(db: &Db, parent_ids: &[Uuid]) -> Result<Vec<MessageDetail>> {
	if parent_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, MessageDetailRow>(
		"\
SELECT
	id,
	text,
	body,
	created_at,
	parent_message_id
FROM messages
WHERE parent_message_id = ANY($1) AND deleted_at IS NULL
ORDER BY created_at ASC, id ASC",
	)
	.bind(parent_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(MessageDetail::from).collect())
}
