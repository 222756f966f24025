use time::OffsetDateTime;
use uuid::Uuid;

use crate::{entry::QueueEntry, text};

#[derive(Clone, Debug, PartialEq)]
pub struct MessageDetail {
	pub id: Uuid,
	pub text: Option<String>,
	pub body: String,
	pub created_at: OffsetDateTime,
	pub parent_message_id: Option<Uuid>,
}
impl MessageDetail {
	pub fn normalized_text(&self) -> String {
		text::normalize_message_text(self.text.as_deref(), &self.body)
	}
}
impl From<&QueueEntry> for MessageDetail {
	fn from(entry: &QueueEntry) -> Self {
		Self {
			id: entry.message_id,
			text: entry.text.clone(),
			body: entry.body.clone(),
			created_at: entry.created_at,
			parent_message_id: entry.parent_message_id,
		}
	}
}

/// A thread root and every stored reply, rebuilt for each worker batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ThreadContext {
	/// `None` when the root is deleted or could not be fetched.
	pub parent_message: Option<MessageDetail>,
	/// Replies ordered by `(created_at, id)`.
	pub all_thread_messages: Vec<MessageDetail>,
	pub thread_summary: String,
}

/// Root first, then replies in order, one message per line. Blank messages are skipped.
pub fn transcript(parent: Option<&MessageDetail>, replies: &[MessageDetail]) -> String {
	parent
		.into_iter()
		.chain(replies.iter())
		.map(MessageDetail::normalized_text)
		.filter(|line| !text::is_blank(line))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Orders replies deterministically and removes duplicates by id.
pub fn order_replies(mut replies: Vec<MessageDetail>) -> Vec<MessageDetail> {
	replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
	replies.dedup_by(|a, b| a.id == b.id);

	replies
}
