pub mod claim;
pub mod dispatch;
pub mod embed;
pub mod neighbors;
pub mod thread_context;
pub mod worker;

mod error;

pub use claim::{ClaimCycleReport, ClaimSettings, run_claim_cycle};
pub use dispatch::DispatchReport;
pub use error::{Error, Result};
pub use thread_context::SummaryLimits;
pub use worker::{BatchOutcome, BatchWorker, DeliveryReport, MessageFailure, WorkerSettings};

use std::{future::Future, pin::Pin, sync::Arc};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use parley_domain::{MessageDetail, QueueEntry};
use parley_providers::{EmbeddingBatch, EmbeddingClient, SummaryClient};
use parley_storage::{
	claims,
	db::Db,
	embeddings,
	models::{EmbeddingRecord, Neighbor, QueueMessage, UsageIncrement},
	neighbors::{self as neighbor_rpc, NeighborQuery},
	queue::{self, OutgoingEntry, ReceiveOptions},
	threads, usage,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Exclusive claiming over the pending message set.
pub trait ClaimStore
where
	Self: Send + Sync,
{
	fn claim_batch<'a>(
		&'a self,
		limit: u32,
		stale_after: Duration,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<QueueEntry>>>;

	fn mark_processed<'a>(&'a self, message_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>>;
}

/// Everything the worker reads or writes besides the claim flag.
pub trait MessageStore
where
	Self: Send + Sync,
{
	fn fetch_messages<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<MessageDetail>>>;

	fn fetch_replies<'a>(
		&'a self,
		parent_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<MessageDetail>>>;

	fn find_neighbors<'a>(
		&'a self,
		query: &'a NeighborQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<Neighbor>>>;

	fn upsert_embedding<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>>;

	fn increment_usage<'a>(&'a self, increment: &'a UsageIncrement) -> BoxFuture<'a, Result<()>>;
}

/// Accepts one wire batch per call. A batch is accepted or rejected as a whole.
pub trait DispatchSink
where
	Self: Send + Sync,
{
	fn send_wire_batch<'a>(&'a self, entries: &'a [OutgoingEntry]) -> BoxFuture<'a, Result<Uuid>>;
}

/// The consuming side of the queue.
pub trait DeliverySource
where
	Self: Send + Sync,
{
	fn receive<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<Vec<QueueMessage>>>;

	fn ack<'a>(&'a self, entry_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<EmbeddingBatch>>;
}

pub trait SummaryProvider
where
	Self: Send + Sync,
{
	fn summarize<'a>(&'a self, transcript: &'a str) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub summary: Arc<dyn SummaryProvider>,
}
impl Providers {
	pub fn from_config(cfg: &parley_config::Providers) -> Result<Self> {
		Ok(Self {
			embedding: Arc::new(EmbeddingClient::new(&cfg.embedding)?),
			summary: Arc::new(SummaryClient::new(&cfg.summary)?),
		})
	}
}

/// Postgres implementation of the claim and message stores.
#[derive(Clone)]
pub struct PgStore {
	pub db: Db,
}

/// Postgres-table implementation of the dispatch queue.
#[derive(Clone)]
pub struct PgQueue {
	pub db: Db,
	pub queue_name: String,
	pub receive: ReceiveOptions,
}
impl PgQueue {
	pub fn new(db: Db, dispatch: &parley_config::Dispatch, worker: &parley_config::Worker) -> Self {
		Self {
			db,
			queue_name: dispatch.queue_name.clone(),
			receive: ReceiveOptions {
				max_entries: worker.delivery_batch_size,
				visibility_timeout: Duration::seconds(
					i64::try_from(worker.visibility_timeout_seconds).unwrap_or(i64::MAX),
				),
				max_receive_count: worker.max_receive_count,
			},
		}
	}
}

impl ClaimStore for PgStore {
	fn claim_batch<'a>(
		&'a self,
		limit: u32,
		stale_after: Duration,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<QueueEntry>>> {
		Box::pin(async move { Ok(claims::claim_batch(&self.db, limit, stale_after, now).await?) })
	}

	fn mark_processed<'a>(&'a self, message_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(claims::mark_processed(&self.db, message_ids).await?) })
	}
}

impl MessageStore for PgStore {
	fn fetch_messages<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<MessageDetail>>> {
		Box::pin(async move { Ok(threads::fetch_messages(&self.db, ids).await?) })
	}

	fn fetch_replies<'a>(
		&'a self,
		parent_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<MessageDetail>>> {
		Box::pin(async move { Ok(threads::fetch_replies(&self.db, parent_ids).await?) })
	}

	fn find_neighbors<'a>(
		&'a self,
		query: &'a NeighborQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<Neighbor>>> {
		Box::pin(async move { Ok(neighbor_rpc::find_neighbors(&self.db, query).await?) })
	}

	fn upsert_embedding<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(embeddings::upsert_embedding(&self.db, record).await?) })
	}

	fn increment_usage<'a>(&'a self, increment: &'a UsageIncrement) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(usage::increment_usage(&self.db, increment).await?) })
	}
}

impl DispatchSink for PgQueue {
	fn send_wire_batch<'a>(&'a self, entries: &'a [OutgoingEntry]) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			Ok(queue::send_wire_batch(&self.db, &self.queue_name, entries).await?)
		})
	}
}

impl DeliverySource for PgQueue {
	fn receive<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<Vec<QueueMessage>>> {
		Box::pin(async move {
			Ok(queue::receive(&self.db, &self.queue_name, self.receive, now).await?)
		})
	}

	fn ack<'a>(&'a self, entry_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(queue::ack(&self.db, entry_ids).await?) })
	}
}

impl EmbeddingProvider for EmbeddingClient {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<EmbeddingBatch>> {
		Box::pin(async move { Ok(EmbeddingClient::embed(self, texts).await?) })
	}
}

impl SummaryProvider for SummaryClient {
	fn summarize<'a>(&'a self, transcript: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(SummaryClient::summarize(self, transcript).await?) })
	}
}
