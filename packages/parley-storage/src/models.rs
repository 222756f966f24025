use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use parley_domain::{MessageDetail, QueueEntry};

/// A row returned by the claim statement.
#[derive(Debug, sqlx::FromRow)]
pub struct ClaimedMessage {
	pub id: Uuid,
	pub workspace_id: Uuid,
	pub channel_id: Option<Uuid>,
	pub conversation_id: Option<Uuid>,
	pub parent_message_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub body: String,
	pub text: Option<String>,
}
impl From<ClaimedMessage> for QueueEntry {
	fn from(row: ClaimedMessage) -> Self {
		Self {
			message_id: row.id,
			workspace_id: row.workspace_id,
			channel_id: row.channel_id,
			conversation_id: row.conversation_id,
			parent_message_id: row.parent_message_id,
			created_at: row.created_at,
			body: row.body,
			text: row.text,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct MessageDetailRow {
	pub id: Uuid,
	pub text: Option<String>,
	pub body: String,
	pub created_at: OffsetDateTime,
	pub parent_message_id: Option<Uuid>,
}
impl From<MessageDetailRow> for MessageDetail {
	fn from(row: MessageDetailRow) -> Self {
		Self {
			id: row.id,
			text: row.text,
			body: row.body,
			created_at: row.created_at,
			parent_message_id: row.parent_message_id,
		}
	}
}

/// One embedding per message, keyed by `message_id`.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
	pub message_id: Uuid,
	pub workspace_id: Uuid,
	pub channel_id: Option<Uuid>,
	pub conversation_id: Option<Uuid>,
	pub parent_message_id: Option<Uuid>,
	pub embedding: Vec<f32>,
	pub embedding_model: String,
	pub embedding_version: String,
	pub context_message_ids: Vec<Uuid>,
	pub context_scores: Vec<f32>,
	pub context_types: Vec<String>,
	pub thread_summary: Option<String>,
	pub is_short_answer: bool,
	pub is_thread_message: bool,
	pub token_count: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextType {
	Thread,
	Channel,
	Conversation,
	Workspace,
}
impl ContextType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Thread => "thread",
			Self::Channel => "channel",
			Self::Conversation => "conversation",
			Self::Workspace => "workspace",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"thread" => Some(Self::Thread),
			"channel" => Some(Self::Channel),
			"conversation" => Some(Self::Conversation),
			"workspace" => Some(Self::Workspace),
			_ => None,
		}
	}
}

/// Raw neighbor row as the stored function returns it. Every column may be NULL.
#[derive(Debug, sqlx::FromRow)]
pub struct NeighborRow {
	pub message_id: Option<Uuid>,
	pub similarity: Option<f32>,
	pub context_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
	pub message_id: Uuid,
	pub similarity: f32,
	pub context_type: ContextType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UsageIncrement {
	pub workspace_id: Uuid,
	/// First day of the month.
	pub month: Date,
	pub embeddings: i64,
	pub tokens: i64,
	pub cost: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct WorkspaceEmbeddingUsage {
	pub workspace_id: Uuid,
	pub month: Date,
	pub embeddings_count: i64,
	pub tokens_count: i64,
	pub cost_estimate: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct QueueMessage {
	pub entry_id: Uuid,
	pub batch_id: Uuid,
	pub message_id: Uuid,
	pub payload: Value,
	pub attributes: Value,
	pub receive_count: i32,
	pub visible_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
}
