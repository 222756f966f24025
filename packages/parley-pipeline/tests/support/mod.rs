use std::{
	sync::{Arc, Mutex},
	time::Duration as StdDuration,
};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use parley_config::Context;
use parley_domain::{MessageDetail, QueueEntry};
use parley_pipeline::{
	BatchWorker, BoxFuture, ClaimStore, DeliverySource, DispatchSink, EmbeddingProvider, Error,
	MessageStore, Providers, Result, SummaryLimits, SummaryProvider, WorkerSettings,
};
use parley_providers::EmbeddingBatch;
use parley_storage::{
	models::{ContextType, EmbeddingRecord, Neighbor, QueueMessage, UsageIncrement},
	neighbors::NeighborQuery,
	queue::OutgoingEntry,
};

pub const DIMS: u32 = 3;

pub fn failure(message: &str) -> Error {
	Error::Provider(parley_providers::Error::InvalidResponse { message: message.to_string() })
}

pub fn entry(workspace_id: Uuid, ordinal: i64, text: &str) -> QueueEntry {
	QueueEntry {
		message_id: Uuid::new_v4(),
		workspace_id,
		channel_id: Some(Uuid::from_u128(7)),
		conversation_id: None,
		parent_message_id: None,
		created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(ordinal),
		body: format!("<p>{text}</p>"),
		text: Some(text.to_string()),
	}
}

pub fn detail(parent: Option<Uuid>, ordinal: i64, text: &str) -> MessageDetail {
	MessageDetail {
		id: Uuid::new_v4(),
		text: Some(text.to_string()),
		body: String::new(),
		created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(ordinal),
		parent_message_id: parent,
	}
}

pub fn delivery(entries: &[QueueEntry]) -> Vec<QueueMessage> {
	entries
		.iter()
		.map(|entry| QueueMessage {
			entry_id: Uuid::new_v4(),
			batch_id: Uuid::nil(),
			message_id: entry.message_id,
			payload: serde_json::to_value(entry).expect("encode failed"),
			attributes: serde_json::json!({}),
			receive_count: 1,
			visible_at: OffsetDateTime::UNIX_EPOCH,
			created_at: OffsetDateTime::UNIX_EPOCH,
		})
		.collect()
}

#[derive(Default)]
pub struct FakeStore {
	pub pending: Mutex<Vec<QueueEntry>>,
	pub stored: Vec<MessageDetail>,
	pub fail_thread_fetch: bool,
	pub fail_upsert_for: Option<Uuid>,
	pub fail_usage: bool,
	pub neighbor_delay: Option<StdDuration>,
	pub neighbors: Vec<Neighbor>,
	pub claim_limits: Mutex<Vec<u32>>,
	pub fetched_roots: Mutex<Vec<Uuid>>,
	pub upserts: Mutex<Vec<EmbeddingRecord>>,
	pub marked: Mutex<Vec<Uuid>>,
	pub usage: Mutex<Vec<UsageIncrement>>,
}
impl ClaimStore for FakeStore {
	fn claim_batch<'a>(
		&'a self,
		limit: u32,
		_stale_after: Duration,
		_now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<QueueEntry>>> {
		Box::pin(async move {
			self.claim_limits.lock().expect("lock").push(limit);

			let mut pending = self.pending.lock().expect("lock");
			let take = pending.len().min(limit as usize);

			Ok(pending.drain(..take).collect())
		})
	}

	fn mark_processed<'a>(&'a self, message_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			self.marked.lock().expect("lock").extend_from_slice(message_ids);

			Ok(message_ids.len() as u64)
		})
	}
}
impl MessageStore for FakeStore {
	fn fetch_messages<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<MessageDetail>>> {
		Box::pin(async move {
			if self.fail_thread_fetch {
				return Err(failure("thread fetch down"));
			}

			self.fetched_roots.lock().expect("lock").extend_from_slice(ids);

			Ok(self.stored.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
		})
	}

	fn fetch_replies<'a>(
		&'a self,
		parent_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<MessageDetail>>> {
		Box::pin(async move {
			if self.fail_thread_fetch {
				return Err(failure("thread fetch down"));
			}

			Ok(self
				.stored
				.iter()
				.filter(|m| m.parent_message_id.is_some_and(|parent| parent_ids.contains(&parent)))
				.cloned()
				.collect())
		})
	}

	fn find_neighbors<'a>(
		&'a self,
		query: &'a NeighborQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<Neighbor>>> {
		Box::pin(async move {
			if let Some(delay) = self.neighbor_delay {
				tokio::time::sleep(delay).await;
			}

			Ok(self
				.neighbors
				.iter()
				.filter(|n| n.message_id != query.message_id)
				.filter(|n| n.similarity >= query.similarity_threshold)
				.cloned()
				.collect())
		})
	}

	fn upsert_embedding<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.fail_upsert_for == Some(record.message_id) {
				return Err(failure("upsert rejected"));
			}

			self.upserts.lock().expect("lock").push(record.clone());

			Ok(())
		})
	}

	fn increment_usage<'a>(&'a self, increment: &'a UsageIncrement) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.fail_usage {
				return Err(failure("usage down"));
			}

			self.usage.lock().expect("lock").push(increment.clone());

			Ok(())
		})
	}
}

/// Vector `i` is `[i, 1, 0]`, so attribution by position is observable.
#[derive(Default)]
pub struct FakeEmbedder {
	pub fail: bool,
	pub reported_tokens: Option<u64>,
	pub calls: Mutex<Vec<Vec<String>>>,
}
impl EmbeddingProvider for FakeEmbedder {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<EmbeddingBatch>> {
		Box::pin(async move {
			self.calls.lock().expect("lock").push(texts.to_vec());

			if self.fail {
				return Err(failure("embedding service down"));
			}

			Ok(EmbeddingBatch {
				vectors: (0..texts.len()).map(|i| vec![i as f32, 1.0, 0.0]).collect(),
				total_tokens: self.reported_tokens,
			})
		})
	}
}

#[derive(Default)]
pub struct FakeSummarizer {
	pub fail: bool,
	pub transcripts: Mutex<Vec<String>>,
}
impl SummaryProvider for FakeSummarizer {
	fn summarize<'a>(&'a self, transcript: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.transcripts.lock().expect("lock").push(transcript.to_string());

			if self.fail {
				return Err(failure("summary service down"));
			}

			Ok(format!("Summary of {} lines.", transcript.lines().count()))
		})
	}
}

#[derive(Default)]
pub struct FakeQueue {
	/// 1-based index of the wire batch that should fail.
	pub fail_batch: Option<usize>,
	pub sent: Mutex<Vec<Vec<OutgoingEntry>>>,
	pub attempts: Mutex<usize>,
	pub visible: Mutex<Vec<QueueMessage>>,
	pub acked: Mutex<Vec<Uuid>>,
}
impl DispatchSink for FakeQueue {
	fn send_wire_batch<'a>(&'a self, entries: &'a [OutgoingEntry]) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			let attempt = {
				let mut attempts = self.attempts.lock().expect("lock");

				*attempts += 1;

				*attempts
			};

			if self.fail_batch == Some(attempt) {
				return Err(Error::Storage(parley_storage::Error::InvalidArgument(
					"queue throttled".to_string(),
				)));
			}

			self.sent.lock().expect("lock").push(entries.to_vec());

			Ok(Uuid::new_v4())
		})
	}
}
impl DeliverySource for FakeQueue {
	fn receive<'a>(&'a self, _now: OffsetDateTime) -> BoxFuture<'a, Result<Vec<QueueMessage>>> {
		Box::pin(async move { Ok(std::mem::take(&mut *self.visible.lock().expect("lock"))) })
	}

	fn ack<'a>(&'a self, entry_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			self.acked.lock().expect("lock").extend_from_slice(entry_ids);

			Ok(entry_ids.len() as u64)
		})
	}
}

pub fn settings() -> WorkerSettings {
	WorkerSettings {
		embedding_model: "test-embed".to_string(),
		embedding_version: "v1".to_string(),
		dimensions: DIMS,
		max_input_tokens: 8_191,
		cost_per_million_tokens: 0.02,
		summary: SummaryLimits { max_input_tokens: 4_000, max_output_tokens: 200 },
		context: Context { neighbor_timeout_ms: 50, ..Context::default() },
	}
}

pub fn worker(
	store: &Arc<FakeStore>,
	embedder: &Arc<FakeEmbedder>,
	summarizer: &Arc<FakeSummarizer>,
) -> BatchWorker {
	BatchWorker {
		settings: settings(),
		claims: store.clone(),
		messages: store.clone(),
		providers: Providers { embedding: embedder.clone(), summary: summarizer.clone() },
	}
}

pub fn neighbor(similarity: f32, context_type: ContextType) -> Neighbor {
	Neighbor { message_id: Uuid::new_v4(), similarity, context_type }
}
