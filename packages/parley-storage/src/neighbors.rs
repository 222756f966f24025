use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	embeddings,
	models::{ContextType, Neighbor, NeighborRow},
};

/// Inputs to one similarity lookup. The query vector is the message's own new embedding.
#[derive(Clone, Debug)]
pub struct NeighborQuery<'a> {
	pub embedding: &'a [f32],
	pub workspace_id: Uuid,
	pub message_id: Uuid,
	pub parent_message_id: Option<Uuid>,
	pub channel_id: Option<Uuid>,
	pub conversation_id: Option<Uuid>,
	pub time_window_hours: u32,
	pub similarity_threshold: f32,
	pub limit: u32,
}

pub async fn find_neighbors(db: &Db, query: &NeighborQuery<'_>) -> Result<Vec<Neighbor>> {
	let vec_text = embeddings::format_vector_text(query.embedding);
	let rows = sqlx::query_as::<_, NeighborRow>(
		"\
SELECT
	message_id,
	similarity,
	context_type
FROM find_similar_messages($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(vec_text.as_str())
	.bind(query.workspace_id)
	.bind(query.message_id)
	.bind(query.parent_message_id)
	.bind(query.channel_id)
	.bind(query.conversation_id)
	.bind(i32::try_from(query.time_window_hours).unwrap_or(i32::MAX))
	.bind(query.similarity_threshold)
	.bind(i32::try_from(query.limit).unwrap_or(i32::MAX))
	.fetch_all(&db.pool)
	.await?;

	Ok(parse_neighbor_rows(rows, query.message_id, query.similarity_threshold, query.limit))
}

/// Keeps rows that are complete, above `threshold`, and not the message itself, capped at `limit`.
pub fn parse_neighbor_rows(
	rows: Vec<NeighborRow>,
	exclude: Uuid,
	threshold: f32,
	limit: u32,
) -> Vec<Neighbor> {
	let mut out = Vec::new();

	for row in rows {
		let (Some(message_id), Some(similarity), Some(raw_type)) =
			(row.message_id, row.similarity, row.context_type)
		else {
			tracing::warn!("Skipping neighbor row with missing columns.");

			continue;
		};
		let Some(context_type) = ContextType::parse(&raw_type) else {
			tracing::warn!(
				%message_id,
				context_type = %raw_type,
				"Skipping neighbor with unknown context type."
			);

			continue;
		};

		if message_id == exclude || !similarity.is_finite() || similarity < threshold {
			continue;
		}

		out.push(Neighbor { message_id, similarity, context_type });

		if out.len() >= limit as usize {
			break;
		}
	}

	out
}
