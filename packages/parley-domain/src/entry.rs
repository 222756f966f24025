use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::text;

/// Immutable snapshot of a claimed message, taken at claim time and carried through the queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
	pub message_id: Uuid,
	pub workspace_id: Uuid,
	pub channel_id: Option<Uuid>,
	pub conversation_id: Option<Uuid>,
	pub parent_message_id: Option<Uuid>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	pub body: String,
	pub text: Option<String>,
}
impl QueueEntry {
	pub fn message_type(&self) -> MessageType {
		if self.conversation_id.is_some() && self.channel_id.is_none() {
			MessageType::Conversation
		} else {
			MessageType::Channel
		}
	}

	pub fn is_thread_reply(&self) -> bool {
		self.parent_message_id.is_some()
	}

	/// The text that will be embedded, before thread enrichment.
	pub fn normalized_text(&self) -> String {
		text::normalize_message_text(self.text.as_deref(), &self.body)
	}

	pub fn routing_attributes(&self) -> RoutingAttributes {
		RoutingAttributes {
			workspace_id: self.workspace_id.to_string(),
			message_type: self.message_type(),
			is_thread_message: self.is_thread_reply(),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
	Channel,
	Conversation,
}
impl MessageType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Channel => "channel",
			Self::Conversation => "conversation",
		}
	}
}

/// Attributes sent next to each queue entry so consumers can route without decoding the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingAttributes {
	pub workspace_id: String,
	pub message_type: MessageType,
	pub is_thread_message: bool,
}
impl RoutingAttributes {
	/// String-valued pairs, the shape queue transports accept.
	pub fn to_pairs(&self) -> [(&'static str, String); 3] {
		[
			("workspaceId", self.workspace_id.clone()),
			("messageType", self.message_type.as_str().to_string()),
			("isThreadMessage", self.is_thread_message.to_string()),
		]
	}
}
