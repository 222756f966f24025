use crate::{Error, Result, db::Db, models::EmbeddingRecord};

/// Inserts or overwrites the embedding of one message. Re-running with the same `message_id`
/// replaces the vector and every derived column, keeping the original `created_at`.
pub async fn upsert_embedding(db: &Db, record: &EmbeddingRecord) -> Result<()> {
	if record.context_message_ids.len() != record.context_scores.len()
		|| record.context_message_ids.len() != record.context_types.len()
	{
		return Err(Error::InvalidArgument(format!(
			"Context arrays for message {} have mismatched lengths.",
			record.message_id
		)));
	}

	let vec_text = format_vector_text(&record.embedding);

	sqlx::query(
		"\
INSERT INTO message_embeddings (
	message_id,
	workspace_id,
	channel_id,
	conversation_id,
	parent_message_id,
	embedding,
	embedding_model,
	embedding_version,
	context_message_ids,
	context_scores,
	context_types,
	thread_summary,
	is_short_answer,
	is_thread_message,
	token_count
)
VALUES ($1, $2, $3, $4, $5, $6::text::vector, $7, $8, $9, $10, $11, $12, $13, $14, $15)
ON CONFLICT (message_id) DO UPDATE
SET
	workspace_id = EXCLUDED.workspace_id,
	channel_id = EXCLUDED.channel_id,
	conversation_id = EXCLUDED.conversation_id,
	parent_message_id = EXCLUDED.parent_message_id,
	embedding = EXCLUDED.embedding,
	embedding_model = EXCLUDED.embedding_model,
	embedding_version = EXCLUDED.embedding_version,
	context_message_ids = EXCLUDED.context_message_ids,
	context_scores = EXCLUDED.context_scores,
	context_types = EXCLUDED.context_types,
	thread_summary = EXCLUDED.thread_summary,
	is_short_answer = EXCLUDED.is_short_answer,
	is_thread_message = EXCLUDED.is_thread_message,
	token_count = EXCLUDED.token_count,
	updated_at = now()",
	)
	.bind(record.message_id)
	.bind(record.workspace_id)
	.bind(record.channel_id)
	.bind(record.conversation_id)
	.bind(record.parent_message_id)
	.bind(vec_text.as_str())
	.bind(record.embedding_model.as_str())
	.bind(record.embedding_version.as_str())
	.bind(&record.context_message_ids)
	.bind(&record.context_scores)
	.bind(&record.context_types)
	.bind(record.thread_summary.as_deref())
	.bind(record.is_short_answer)
	.bind(record.is_thread_message)
	.bind(record.token_count)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// pgvector text literal, e.g. `[0.1,0.2]`.
pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}
