use parley_domain::{QueueEntry, content};
use parley_providers::EmbeddingBatch;

use crate::{EmbeddingProvider, Error, Result, thread_context::ThreadContexts};

/// Embedding input for every entry, in batch order.
pub fn build_inputs(
	batch: &[QueueEntry],
	contexts: &ThreadContexts,
	max_tokens: u32,
) -> Vec<String> {
	batch
		.iter()
		.map(|entry| {
			let summary = contexts.for_entry(entry).map(|ctx| ctx.thread_summary.as_str());

			content::build_embedding_content(&entry.normalized_text(), summary, max_tokens)
		})
		.collect()
}

/// One embedding call for the whole batch. Vector `i` belongs to input `i`.
pub async fn request_embeddings(
	provider: &dyn EmbeddingProvider,
	inputs: &[String],
	dimensions: u32,
) -> Result<EmbeddingBatch> {
	let batch = provider.embed(inputs).await?;

	if batch.vectors.len() != inputs.len() {
		return Err(Error::Validation {
			message: format!(
				"{} vectors returned for {} inputs.",
				batch.vectors.len(),
				inputs.len()
			),
		});
	}
	if let Some(vector) = batch.vectors.iter().find(|vector| vector.len() != dimensions as usize) {
		return Err(Error::Validation {
			message: format!("Vector has {} dimensions, expected {dimensions}.", vector.len()),
		});
	}

	Ok(batch)
}
