use std::{collections::HashMap, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use parley_config::Context;
use parley_domain::{QueueEntry, content, text, usage};
use parley_storage::models::{EmbeddingRecord, QueueMessage, UsageIncrement};

use crate::{
	ClaimStore, DeliverySource, Error, MessageStore, Providers, Result, embed, neighbors,
	thread_context::{self, SummaryLimits, ThreadContexts},
};

#[derive(Clone, Debug)]
pub struct WorkerSettings {
	pub embedding_model: String,
	pub embedding_version: String,
	pub dimensions: u32,
	pub max_input_tokens: u32,
	pub cost_per_million_tokens: f64,
	pub summary: SummaryLimits,
	pub context: Context,
}
impl WorkerSettings {
	pub fn from_config(cfg: &parley_config::Config) -> Self {
		let embedding = &cfg.providers.embedding;

		Self {
			embedding_model: embedding.model.clone(),
			embedding_version: embedding.embedding_version.clone(),
			dimensions: embedding.dimensions,
			max_input_tokens: embedding.max_input_tokens,
			cost_per_million_tokens: embedding.cost_per_million_tokens,
			summary: SummaryLimits::from_config(&cfg.providers.summary),
			context: cfg.context.clone(),
		}
	}
}

/// A message that could not be completed. It stays claimed and is retried after staleness.
#[derive(Debug)]
pub struct MessageFailure {
	pub message_id: Uuid,
	pub error: Error,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
	/// Messages that were upserted and marked processed.
	pub embedded: Vec<Uuid>,
	pub failures: Vec<MessageFailure>,
	pub summaries_degraded: usize,
	/// Tokens spent on the embedding call, as reported or estimated.
	pub tokens: u64,
}

#[derive(Debug, Default)]
pub struct DeliveryReport {
	pub received: usize,
	pub acked: u64,
	pub outcome: BatchOutcome,
}

/// Processes delivered batches. Every collaborator is constructed once and shared.
#[derive(Clone)]
pub struct BatchWorker {
	pub settings: WorkerSettings,
	pub claims: Arc<dyn ClaimStore>,
	pub messages: Arc<dyn MessageStore>,
	pub providers: Providers,
}
impl BatchWorker {
	/// Receives one delivery and processes it. Returns `None` when the queue had nothing visible.
	pub async fn poll_once(
		&self,
		source: &dyn DeliverySource,
		now: OffsetDateTime,
	) -> Result<Option<DeliveryReport>> {
		let delivery = source.receive(now).await?;

		if delivery.is_empty() {
			return Ok(None);
		}

		self.process_delivery(source, delivery, now).await.map(Some)
	}

	/// Decodes, processes, and acknowledges one delivery.
	///
	/// The delivery is left unacknowledged when the embedding call fails, so the queue redelivers
	/// it after the visibility timeout. Per-message failures do not block the acknowledgement.
	pub async fn process_delivery(
		&self,
		source: &dyn DeliverySource,
		delivery: Vec<QueueMessage>,
		now: OffsetDateTime,
	) -> Result<DeliveryReport> {
		let received = delivery.len();
		let entry_ids = delivery.iter().map(|message| message.entry_id).collect::<Vec<_>>();
		let mut batch = Vec::with_capacity(received);
		let mut undecodable = Vec::new();

		for message in delivery {
			match serde_json::from_value::<QueueEntry>(message.payload) {
				Ok(entry) => batch.push(entry),
				Err(err) => {
					tracing::warn!(
						entry_id = %message.entry_id,
						message_id = %message.message_id,
						error = %err,
						"Skipping undecodable queue entry."
					);

					undecodable
						.push(MessageFailure { message_id: message.message_id, error: err.into() });
				},
			}
		}

		let mut outcome = match self.process_batch(&batch, now).await {
			Ok(outcome) => outcome,
			Err(err) => {
				tracing::error!(
					error = %err,
					entries = received,
					"Batch failed. Leaving the delivery for redelivery."
				);

				return Err(err);
			},
		};

		outcome.failures.extend(undecodable);

		let acked = source.ack(&entry_ids).await?;

		Ok(DeliveryReport { received, acked, outcome })
	}

	/// Enriches, embeds, and persists one batch.
	///
	/// Only a failed embedding call fails the batch. Neighbor and upsert failures are recorded per
	/// message, and only messages that were fully persisted are marked processed.
	pub async fn process_batch(
		&self,
		batch: &[QueueEntry],
		now: OffsetDateTime,
	) -> Result<BatchOutcome> {
		if batch.is_empty() {
			return Ok(BatchOutcome::default());
		}

		let contexts = thread_context::build_thread_contexts(
			self.messages.as_ref(),
			self.providers.summary.as_ref(),
			batch,
			self.settings.summary,
		)
		.await;
		let inputs = embed::build_inputs(batch, &contexts, self.settings.max_input_tokens);
		let embedded = embed::request_embeddings(
			self.providers.embedding.as_ref(),
			&inputs,
			self.settings.dimensions,
		)
		.await?;
		let mut outcome =
			BatchOutcome { summaries_degraded: contexts.degraded, ..Default::default() };

		for ((entry, input), vector) in batch.iter().zip(&inputs).zip(&embedded.vectors) {
			match self.persist_message(entry, input, vector, &contexts).await {
				Ok(()) => outcome.embedded.push(entry.message_id),
				Err(error) => {
					tracing::warn!(
						message_id = %entry.message_id,
						workspace_id = %entry.workspace_id,
						error = %error,
						"Failed to persist embedding."
					);

					outcome.failures.push(MessageFailure { message_id: entry.message_id, error });
				},
			}
		}

		self.claims.mark_processed(&outcome.embedded).await?;

		outcome.tokens = self
			.record_usage(batch, &inputs, &outcome.embedded, embedded.total_tokens, now)
			.await;

		if outcome.failures.is_empty() {
			tracing::info!(
				embedded = outcome.embedded.len(),
				tokens = outcome.tokens,
				summaries_degraded = outcome.summaries_degraded,
				"Batch embedded."
			);
		} else {
			tracing::warn!(
				embedded = outcome.embedded.len(),
				failed = outcome.failures.len(),
				tokens = outcome.tokens,
				summaries_degraded = outcome.summaries_degraded,
				"Batch embedded with failures."
			);
		}

		Ok(outcome)
	}

	async fn persist_message(
		&self,
		entry: &QueueEntry,
		input: &str,
		vector: &[f32],
		contexts: &ThreadContexts,
	) -> Result<()> {
		let found = neighbors::resolve_neighbors(
			self.messages.as_ref(),
			entry,
			vector,
			&self.settings.context,
		)
		.await?;
		let context = contexts.for_entry(entry);
		let normalized = entry.normalized_text();
		let record = EmbeddingRecord {
			message_id: entry.message_id,
			workspace_id: entry.workspace_id,
			channel_id: entry.channel_id,
			conversation_id: entry.conversation_id,
			parent_message_id: entry.parent_message_id,
			embedding: vector.to_vec(),
			embedding_model: self.settings.embedding_model.clone(),
			embedding_version: self.settings.embedding_version.clone(),
			context_message_ids: found.iter().map(|neighbor| neighbor.message_id).collect(),
			context_scores: found.iter().map(|neighbor| neighbor.similarity).collect(),
			context_types: found
				.iter()
				.map(|neighbor| neighbor.context_type.as_str().to_string())
				.collect(),
			thread_summary: context.map(|ctx| ctx.thread_summary.clone()),
			is_short_answer: text::is_short_answer(&normalized),
			is_thread_message: entry.is_thread_reply()
				|| contexts.by_parent.contains_key(&entry.message_id),
			token_count: i32::try_from(content::estimate_tokens(input)).unwrap_or(i32::MAX),
		};

		self.messages.upsert_embedding(&record).await
	}

	/// Adds the batch to each workspace's monthly usage. Failures are logged and ignored.
	async fn record_usage(
		&self,
		batch: &[QueueEntry],
		inputs: &[String],
		embedded: &[Uuid],
		reported_tokens: Option<u64>,
		now: OffsetDateTime,
	) -> u64 {
		let mut order = Vec::new();
		let mut per_workspace: HashMap<Uuid, (i64, u64)> = HashMap::new();

		for (entry, input) in batch.iter().zip(inputs) {
			let slot = per_workspace.entry(entry.workspace_id).or_insert_with(|| {
				order.push(entry.workspace_id);

				(0, 0)
			});

			slot.1 += u64::from(content::estimate_tokens(input));

			if embedded.contains(&entry.message_id) {
				slot.0 += 1;
			}
		}

		let estimates = order.iter().map(|id| per_workspace[id].1).collect::<Vec<_>>();
		let tokens = match reported_tokens {
			Some(total) => usage::apportion_tokens(&estimates, total),
			None => estimates,
		};
		let month = usage::month_start(now);

		for (workspace_id, tokens) in order.iter().zip(&tokens) {
			let embeddings = per_workspace[workspace_id].0;

			if embeddings == 0 && *tokens == 0 {
				continue;
			}

			let increment = UsageIncrement {
				workspace_id: *workspace_id,
				month,
				embeddings,
				tokens: i64::try_from(*tokens).unwrap_or(i64::MAX),
				cost: usage::estimate_cost(*tokens, self.settings.cost_per_million_tokens),
			};

			if let Err(err) = self.messages.increment_usage(&increment).await {
				tracing::warn!(error = %err, %workspace_id, "Failed to record embedding usage.");
			}
		}

		tokens.iter().sum()
	}
}
