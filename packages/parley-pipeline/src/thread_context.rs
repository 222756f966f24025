use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use parley_domain::{MessageDetail, QueueEntry, ThreadContext, content, thread};

use crate::{MessageStore, SummaryProvider};

/// Token budgets for one thread summary, in estimated tokens.
#[derive(Clone, Copy, Debug)]
pub struct SummaryLimits {
	/// Transcript sent to the summary service.
	pub max_input_tokens: u32,
	/// Stored thread summary, including the raw-transcript fallback.
	pub max_output_tokens: u32,
}
impl SummaryLimits {
	pub fn from_config(cfg: &parley_config::SummaryProviderConfig) -> Self {
		Self { max_input_tokens: cfg.max_input_tokens, max_output_tokens: cfg.max_output_tokens }
	}
}

/// Thread contexts keyed by root message id.
#[derive(Debug, Default)]
pub struct ThreadContexts {
	pub by_parent: HashMap<Uuid, ThreadContext>,
	/// Threads whose summary fell back to the raw transcript.
	pub degraded: usize,
}
impl ThreadContexts {
	/// The context that enriches `entry`: its own thread as a reply, or the thread it roots.
	pub fn for_entry(&self, entry: &QueueEntry) -> Option<&ThreadContext> {
		entry
			.parent_message_id
			.and_then(|parent| self.by_parent.get(&parent))
			.or_else(|| self.by_parent.get(&entry.message_id))
	}
}

/// Rebuilds every thread referenced by `batch` and summarizes it.
///
/// Roots outside the batch and every stored reply are fetched in two queries. A fetch failure
/// leaves the batch without thread enrichment. A summary failure keeps the head of the transcript
/// as the thread summary. Both the request and the stored summary stay within `limits`.
pub async fn build_thread_contexts(
	store: &dyn MessageStore,
	summary: &dyn SummaryProvider,
	batch: &[QueueEntry],
	limits: SummaryLimits,
) -> ThreadContexts {
	let mut parent_ids = Vec::new();
	let mut seen = HashSet::new();

	for entry in batch {
		if let Some(parent) = entry.parent_message_id
			&& seen.insert(parent)
		{
			parent_ids.push(parent);
		}
	}

	if parent_ids.is_empty() {
		return ThreadContexts::default();
	}

	let in_batch = batch
		.iter()
		.map(|entry| (entry.message_id, MessageDetail::from(entry)))
		.collect::<HashMap<_, _>>();
	let missing =
		parent_ids.iter().copied().filter(|id| !in_batch.contains_key(id)).collect::<Vec<_>>();
	let fetched_parents = match store.fetch_messages(&missing).await {
		Ok(rows) => rows,
		Err(err) => {
			tracing::warn!(
				error = %err,
				threads = parent_ids.len(),
				"Failed to fetch thread roots."
			);

			return ThreadContexts::default();
		},
	};
	let replies = match store.fetch_replies(&parent_ids).await {
		Ok(rows) => rows,
		Err(err) => {
			tracing::warn!(
				error = %err,
				threads = parent_ids.len(),
				"Failed to fetch thread replies."
			);

			return ThreadContexts::default();
		},
	};
	let mut parents =
		fetched_parents.into_iter().map(|row| (row.id, row)).collect::<HashMap<_, _>>();
	let mut grouped: HashMap<Uuid, Vec<MessageDetail>> = HashMap::new();

	for reply in replies.into_iter().chain(
		batch.iter().filter(|entry| entry.parent_message_id.is_some()).map(MessageDetail::from),
	) {
		if let Some(parent) = reply.parent_message_id {
			grouped.entry(parent).or_default().push(reply);
		}
	}

	let mut contexts = ThreadContexts::default();

	for parent_id in parent_ids {
		let parent_message =
			parents.remove(&parent_id).or_else(|| in_batch.get(&parent_id).cloned());
		let all_thread_messages =
			thread::order_replies(grouped.remove(&parent_id).unwrap_or_default());
		let transcript = thread::transcript(parent_message.as_ref(), &all_thread_messages);

		if transcript.is_empty() {
			continue;
		}

		let request = content::truncate_to_token_budget(&transcript, limits.max_input_tokens);

		if request.len() < transcript.len() {
			tracing::debug!(
				parent_message_id = %parent_id,
				thread_messages = all_thread_messages.len(),
				"Thread transcript truncated for summary."
			);
		}

		let thread_summary = match summary.summarize(request).await {
			Ok(text) => text,
			Err(err) => {
				tracing::warn!(
					error = %err,
					parent_message_id = %parent_id,
					"Thread summary failed. Using the raw transcript."
				);

				contexts.degraded += 1;

				request.to_string()
			},
		};
		let thread_summary =
			content::truncate_to_token_budget(&thread_summary, limits.max_output_tokens);
		let context = ThreadContext {
			parent_message,
			all_thread_messages,
			thread_summary: thread_summary.to_string(),
		};

		contexts.by_parent.insert(parent_id, context);
	}

	contexts
}
