use std::collections::HashMap;

use uuid::Uuid;

use crate::{entry::QueueEntry, text};

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceBatch {
	pub workspace_id: Uuid,
	pub messages: Vec<QueueEntry>,
}

/// Groups claimed entries by workspace, dropping entries with nothing to embed.
///
/// Messages keep their claim order inside a group. Groups are ordered by ascending size so small
/// workspaces reach the queue first; ties fall back to the workspace id.
pub fn group_by_workspace(entries: Vec<QueueEntry>) -> Vec<WorkspaceBatch> {
	let mut order = Vec::new();
	let mut groups: HashMap<Uuid, Vec<QueueEntry>> = HashMap::new();

	for entry in entries {
		if text::is_blank(&entry.normalized_text()) {
			continue;
		}

		let workspace_id = entry.workspace_id;
		let slot = groups.entry(workspace_id).or_insert_with(|| {
			order.push(workspace_id);

			Vec::new()
		});

		slot.push(entry);
	}

	let mut batches: Vec<WorkspaceBatch> = order
		.into_iter()
		.filter_map(|workspace_id| {
			groups
				.remove(&workspace_id)
				.map(|messages| WorkspaceBatch { workspace_id, messages })
		})
		.collect();

	batches.sort_by(|a, b| {
		a.messages.len().cmp(&b.messages.len()).then_with(|| a.workspace_id.cmp(&b.workspace_id))
	});

	batches
}

/// Splits a flat list into fixed-size wire batches. The last batch may be shorter.
pub fn wire_batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
	items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;

	fn entry(workspace: u128, id: u128, text: &str) -> QueueEntry {
		QueueEntry {
			message_id: Uuid::from_u128(id),
			workspace_id: Uuid::from_u128(workspace),
			channel_id: Some(Uuid::from_u128(99)),
			conversation_id: None,
			parent_message_id: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
			body: String::new(),
			text: Some(text.to_string()),
		}
	}

	#[test]
	fn smaller_workspaces_come_first() {
		let entries = vec![
			entry(1, 1, "a"),
			entry(1, 2, "b"),
			entry(1, 3, "c"),
			entry(2, 4, "d"),
		];
		let batches = group_by_workspace(entries);

		assert_eq!(batches.len(), 2);
		assert_eq!(batches[0].workspace_id, Uuid::from_u128(2));
		assert_eq!(batches[1].messages.len(), 3);
	}

	#[test]
	fn blank_messages_are_dropped() {
		let entries = vec![entry(1, 1, "  "), entry(1, 2, "kept")];
		let batches = group_by_workspace(entries);

		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].messages[0].message_id, Uuid::from_u128(2));
	}

	#[test]
	fn workspace_with_only_blank_messages_is_omitted() {
		let batches = group_by_workspace(vec![entry(7, 1, "")]);

		assert!(batches.is_empty());
	}

	#[test]
	fn wire_batches_cap_size() {
		let items: Vec<u32> = (0..29).collect();
		let sizes: Vec<usize> = wire_batches(&items, 10).map(<[u32]>::len).collect();

		assert_eq!(sizes, vec![10, 10, 9]);
	}
}
