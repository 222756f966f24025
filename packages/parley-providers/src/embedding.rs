use reqwest::Client;
use serde_json::Value;

use parley_config::EmbeddingProviderConfig;

use crate::{Error, Result};

/// Vectors in input order plus the token usage the provider reported, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingBatch {
	pub vectors: Vec<Vec<f32>>,
	pub total_tokens: Option<u64>,
}

pub struct EmbeddingClient {
	http: Client,
	url: String,
	model: String,
	dimensions: u32,
}
impl EmbeddingClient {
	pub fn new(cfg: &EmbeddingProviderConfig) -> Result<Self> {
		let http = crate::build_client(&cfg.api_key, &cfg.default_headers, cfg.timeout_ms)?;

		Ok(Self {
			http,
			url: format!("{}{}", cfg.api_base, cfg.path),
			model: cfg.model.clone(),
			dimensions: cfg.dimensions,
		})
	}

	/// Embeds every input in a single request. Vector `i` belongs to input `i`.
	pub async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
		if texts.is_empty() {
			return Ok(EmbeddingBatch { vectors: Vec::new(), total_tokens: Some(0) });
		}

		tracing::debug!(inputs = texts.len(), model = %self.model, "Requesting embeddings.");

		let body = serde_json::json!({
			"model": self.model,
			"input": texts,
			"dimensions": self.dimensions,
		});
		let res = self.http.post(&self.url).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;
		let batch = parse_embedding_response(json, texts.len())?;

		for vector in &batch.vectors {
			if vector.len() != self.dimensions as usize {
				return Err(Error::response(format!(
					"Embedding dimension {} does not match configured dimensions {}.",
					vector.len(),
					self.dimensions
				)));
			}
		}

		Ok(batch)
	}
}

fn parse_embedding_response(json: Value, expected: usize) -> Result<EmbeddingBatch> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::response("Embedding response is missing data array."))?;

	if data.len() != expected {
		return Err(Error::response(format!(
			"Embedding provider returned {} vectors for {expected} inputs.",
			data.len()
		)));
	}

	let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| Error::response("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number =
				value.as_f64().ok_or_else(|| Error::response("Embedding value must be numeric."))?;

			vec.push(number as f32);
		}

		let Some(slot) = slots.get_mut(index) else {
			return Err(Error::response(format!("Embedding index {index} is out of range.")));
		};

		if slot.replace(vec).is_some() {
			return Err(Error::response(format!("Embedding index {index} appears twice.")));
		}
	}

	let vectors = slots.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
		Error::response("Embedding response does not cover every input.")
	})?;
	let total_tokens = json
		.get("usage")
		.and_then(|usage| usage.get("total_tokens").or_else(|| usage.get("prompt_tokens")))
		.and_then(|v| v.as_u64());

	Ok(EmbeddingBatch { vectors, total_tokens })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			],
			"usage": { "prompt_tokens": 7, "total_tokens": 7 }
		});
		let parsed = parse_embedding_response(json, 2).expect("parse failed");

		assert_eq!(parsed.vectors, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
		assert_eq!(parsed.total_tokens, Some(7));
	}

	#[test]
	fn missing_index_falls_back_to_position() {
		let json = serde_json::json!({
			"data": [ { "embedding": [1.0] }, { "embedding": [2.0] } ]
		});
		let parsed = parse_embedding_response(json, 2).expect("parse failed");

		assert_eq!(parsed.vectors, vec![vec![1.0], vec![2.0]]);
		assert_eq!(parsed.total_tokens, None);
	}

	#[test]
	fn count_mismatch_is_rejected() {
		let json = serde_json::json!({ "data": [ { "index": 0, "embedding": [1.0] } ] });

		assert!(parse_embedding_response(json, 2).is_err());
	}

	#[test]
	fn duplicate_index_is_rejected() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [1.0] },
				{ "index": 0, "embedding": [2.0] }
			]
		});

		assert!(parse_embedding_response(json, 2).is_err());
	}
}
