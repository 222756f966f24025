use serde_json::{Map, Value};

use parley_domain::{QueueEntry, WorkspaceBatch, wire_batches};
use parley_storage::queue::OutgoingEntry;

use crate::{DispatchSink, Result};

/// Outcome of one [`send`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Wire batches attempted.
	pub batch_count: usize,
	/// Entries that were accepted by the queue.
	pub dispatched: usize,
	/// Entries in wire batches that could not be built or sent.
	pub failure_count: usize,
}

/// Flattens the workspace batches and sends them in wire batches of `wire_batch_size`.
///
/// A failed wire batch only adds its size to `failure_count`. Its messages stay claimed and are
/// picked up again once the claim goes stale.
pub async fn send(
	sink: &dyn DispatchSink,
	batches: &[WorkspaceBatch],
	wire_batch_size: usize,
) -> DispatchReport {
	let flat = batches.iter().flat_map(|batch| batch.messages.iter()).collect::<Vec<_>>();
	let mut report = DispatchReport::default();

	for chunk in wire_batches(&flat, wire_batch_size) {
		report.batch_count += 1;

		let encoded = chunk.iter().map(|entry| outgoing_entry(entry)).collect::<Result<Vec<_>>>();
		let entries = match encoded {
			Ok(entries) => entries,
			Err(err) => {
				tracing::error!(
					error = %err,
					entries = chunk.len(),
					"Failed to encode wire batch."
				);

				report.failure_count += chunk.len();

				continue;
			},
		};

		match sink.send_wire_batch(&entries).await {
			Ok(batch_id) => {
				tracing::debug!(%batch_id, entries = entries.len(), "Dispatched wire batch.");

				report.dispatched += entries.len();
			},
			Err(err) => {
				tracing::error!(
					error = %err,
					entries = entries.len(),
					"Failed to dispatch wire batch."
				);

				report.failure_count += entries.len();
			},
		}
	}

	report
}

/// JSON snapshot plus string-valued routing attributes for one message.
pub fn outgoing_entry(entry: &QueueEntry) -> Result<OutgoingEntry> {
	let payload = serde_json::to_value(entry)?;
	let attributes = entry
		.routing_attributes()
		.to_pairs()
		.into_iter()
		.map(|(key, value)| (key.to_string(), Value::String(value)))
		.collect::<Map<_, _>>();

	Ok(OutgoingEntry {
		message_id: entry.message_id,
		payload,
		attributes: Value::Object(attributes),
	})
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;
	use uuid::Uuid;

	use super::*;

	#[test]
	fn attributes_are_strings() {
		let entry = QueueEntry {
			message_id: Uuid::new_v4(),
			workspace_id: Uuid::new_v4(),
			channel_id: None,
			conversation_id: Some(Uuid::new_v4()),
			parent_message_id: Some(Uuid::new_v4()),
			created_at: OffsetDateTime::UNIX_EPOCH,
			body: "hi".to_string(),
			text: None,
		};
		let outgoing = outgoing_entry(&entry).expect("encode failed");

		assert_eq!(outgoing.attributes["messageType"], "conversation");
		assert_eq!(outgoing.attributes["isThreadMessage"], "true");
		assert_eq!(outgoing.attributes["workspaceId"], entry.workspace_id.to_string());
		assert_eq!(outgoing.payload["messageId"], entry.message_id.to_string());
	}
}
