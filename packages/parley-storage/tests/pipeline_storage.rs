use std::collections::HashSet;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use parley_storage::{
	claims,
	db::Db,
	embeddings,
	models::{ContextType, EmbeddingRecord, UsageIncrement, WorkspaceEmbeddingUsage},
	neighbors::{self, NeighborQuery},
	queue::{self, OutgoingEntry, ReceiveOptions},
	threads, usage,
};
use parley_testkit::TestDatabase;

const DIMS: u32 = 3;

async fn setup() -> Option<(TestDatabase, Db)> {
	let base_dsn = parley_testkit::env_dsn()?;
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = Db::connect(&test_db.postgres(4)).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(DIMS).await.expect("Failed to ensure schema.");

	Some((test_db, db))
}

async fn insert_message(
	db: &Db,
	workspace_id: Uuid,
	channel_id: Uuid,
	parent_message_id: Option<Uuid>,
	created_at: OffsetDateTime,
	text: &str,
) -> Uuid {
	let id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO messages (id, workspace_id, channel_id, parent_message_id, body, text, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(id)
	.bind(workspace_id)
	.bind(channel_id)
	.bind(parent_message_id)
	.bind(format!("<p>{text}</p>"))
	.bind(text)
	.bind(created_at)
	.execute(&db.pool)
	.await
	.expect("Failed to insert message.");

	id
}

fn record(
	message_id: Uuid,
	workspace_id: Uuid,
	channel_id: Uuid,
	embedding: Vec<f32>,
) -> EmbeddingRecord {
	EmbeddingRecord {
		message_id,
		workspace_id,
		channel_id: Some(channel_id),
		conversation_id: None,
		parent_message_id: None,
		embedding,
		embedding_model: "test-model".to_string(),
		embedding_version: "v1".to_string(),
		context_message_ids: Vec::new(),
		context_scores: Vec::new(),
		context_types: Vec::new(),
		thread_summary: None,
		is_short_answer: false,
		is_thread_message: false,
		token_count: 3,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn concurrent_claims_never_overlap() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping concurrent_claims_never_overlap; set PARLEY_PG_DSN to run this test.");

		return;
	};
	let workspace = Uuid::new_v4();
	let channel = Uuid::new_v4();
	let base = OffsetDateTime::now_utc() - Duration::minutes(10);

	for i in 0..40 {
		insert_message(&db, workspace, channel, None, base + Duration::seconds(i), "hello").await;
	}

	let now = OffsetDateTime::now_utc();
	let stale = Duration::seconds(900);
	let (a, b) = tokio::join!(
		claims::claim_batch(&db, 25, stale, now),
		claims::claim_batch(&db, 25, stale, now)
	);
	let a = a.expect("First claim failed.");
	let b = b.expect("Second claim failed.");
	let a_ids = a.iter().map(|entry| entry.message_id).collect::<HashSet<_>>();
	let b_ids = b.iter().map(|entry| entry.message_id).collect::<HashSet<_>>();

	assert!(a_ids.is_disjoint(&b_ids));
	assert!(a_ids.len() <= 25 && b_ids.len() <= 25);
	assert!(
		a.windows(2)
			.all(|w| (w[0].created_at, w[0].message_id) <= (w[1].created_at, w[1].message_id))
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn stale_claims_become_claimable_at_the_window_edge() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping stale_claims_become_claimable_at_the_window_edge; set PARLEY_PG_DSN.");

		return;
	};
	let id = insert_message(
		&db,
		Uuid::new_v4(),
		Uuid::new_v4(),
		None,
		OffsetDateTime::now_utc(),
		"pending",
	)
	.await;
	let stale = Duration::seconds(900);
	let t0 = OffsetDateTime::now_utc().replace_nanosecond(0).expect("Invalid timestamp.");
	let first = claims::claim_batch(&db, 10, stale, t0).await.expect("Claim failed.");

	assert_eq!(first.len(), 1);
	assert_eq!(first[0].message_id, id);

	let early = claims::claim_batch(&db, 10, stale, t0 + stale - Duration::seconds(1))
		.await
		.expect("Claim failed.");

	assert!(early.is_empty());

	let reclaimed = claims::claim_batch(&db, 10, stale, t0 + stale).await.expect("Claim failed.");

	assert_eq!(reclaimed.len(), 1);

	claims::mark_processed(&db, &[id]).await.expect("Mark failed.");

	let after_done = claims::claim_batch(&db, 10, stale, t0 + stale * 3)
		.await
		.expect("Claim failed.");

	assert!(after_done.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn upsert_keeps_one_row_with_latest_values() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping upsert_keeps_one_row_with_latest_values; set PARLEY_PG_DSN to run.");

		return;
	};
	let workspace = Uuid::new_v4();
	let channel = Uuid::new_v4();
	let id = insert_message(&db, workspace, channel, None, OffsetDateTime::now_utc(), "hi").await;
	let mut rec = record(id, workspace, channel, vec![1.0, 0.0, 0.0]);

	embeddings::upsert_embedding(&db, &rec).await.expect("First upsert failed.");

	rec.embedding = vec![0.0, 1.0, 0.0];
	rec.token_count = 9;
	rec.thread_summary = Some("summary".to_string());

	embeddings::upsert_embedding(&db, &rec).await.expect("Second upsert failed.");

	let (count, tokens, summary): (i64, i32, Option<String>) = sqlx::query_as(
		"\
SELECT count(*) OVER (), token_count, thread_summary
FROM message_embeddings
WHERE message_id = $1",
	)
	.bind(id)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to read embedding.");

	assert_eq!(count, 1);
	assert_eq!(tokens, 9);
	assert_eq!(summary.as_deref(), Some("summary"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn neighbors_below_threshold_are_excluded() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping neighbors_below_threshold_are_excluded; set PARLEY_PG_DSN to run.");

		return;
	};
	let workspace = Uuid::new_v4();
	let channel = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();
	let close = insert_message(&db, workspace, channel, None, now, "close").await;
	let far = insert_message(&db, workspace, channel, None, now, "far").await;
	let current = insert_message(&db, workspace, channel, None, now, "current").await;
	let query_vec = vec![1.0, 0.0, 0.0];

	// cos = 0.9 and cos = 0.65 against the query vector.
	for (id, embedding) in [(close, vec![0.9, 0.435_89, 0.0]), (far, vec![0.65, 0.759_93, 0.0])] {
		embeddings::upsert_embedding(&db, &record(id, workspace, channel, embedding))
			.await
			.expect("Upsert failed.");
	}

	let found = neighbors::find_neighbors(
		&db,
		&NeighborQuery {
			embedding: &query_vec,
			workspace_id: workspace,
			message_id: current,
			parent_message_id: None,
			channel_id: Some(channel),
			conversation_id: None,
			time_window_hours: 168,
			similarity_threshold: 0.7,
			limit: 5,
		},
	)
	.await
	.expect("Neighbor lookup failed.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].message_id, close);
	assert_eq!(found[0].context_type, ContextType::Channel);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn usage_increments_accumulate_per_month() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping usage_increments_accumulate_per_month; set PARLEY_PG_DSN to run.");

		return;
	};
	let workspace = Uuid::new_v4();
	let month = time::macros::date!(2026 - 10 - 01);
	let increment =
		UsageIncrement { workspace_id: workspace, month, embeddings: 3, tokens: 120, cost: 0.5 };

	usage::increment_usage(&db, &increment).await.expect("Increment failed.");
	usage::increment_usage(&db, &increment).await.expect("Increment failed.");

	let row = sqlx::query_as::<_, WorkspaceEmbeddingUsage>(
		"\
SELECT workspace_id, month, embeddings_count, tokens_count, cost_estimate
FROM workspace_embedding_usage
WHERE workspace_id = $1",
	)
	.bind(workspace)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to read usage.");

	assert_eq!(row.month, month);
	assert_eq!(row.embeddings_count, 6);
	assert_eq!(row.tokens_count, 240);
	assert!((row.cost_estimate - 1.0).abs() < 1e-9);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn thread_fetch_returns_every_live_reply_in_order() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping thread_fetch_returns_every_live_reply_in_order; set PARLEY_PG_DSN.");

		return;
	};
	let workspace = Uuid::new_v4();
	let channel = Uuid::new_v4();
	let base = OffsetDateTime::now_utc() - Duration::hours(1);
	let parent = insert_message(&db, workspace, channel, None, base, "root").await;
	let mut replies = Vec::new();

	for i in 1..=5 {
		replies.push(
			insert_message(&db, workspace, channel, Some(parent), base + Duration::minutes(i), "r")
				.await,
		);
	}

	sqlx::query("UPDATE messages SET deleted_at = now() WHERE id = $1")
		.bind(replies[4])
		.execute(&db.pool)
		.await
		.expect("Failed to delete reply.");

	let fetched = threads::fetch_replies(&db, &[parent]).await.expect("Fetch failed.");
	let ids = fetched.iter().map(|m| m.id).collect::<Vec<_>>();

	assert_eq!(ids, replies[..4].to_vec());

	let parents =
		threads::fetch_messages(&db, &[parent, Uuid::new_v4()]).await.expect("Fetch failed.");

	assert_eq!(parents.len(), 1);
	assert_eq!(parents[0].id, parent);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PARLEY_PG_DSN to run."]
async fn unacknowledged_entries_are_redelivered_after_visibility() {
	let Some((test_db, db)) = setup().await else {
		eprintln!("Skipping unacknowledged_entries_are_redelivered_after_visibility.");

		return;
	};
	let entries = (0..3)
		.map(|_| OutgoingEntry {
			message_id: Uuid::new_v4(),
			payload: serde_json::json!({ "body": "x" }),
			attributes: serde_json::json!({ "workspaceId": "w" }),
		})
		.collect::<Vec<_>>();
	let batch_id = queue::send_wire_batch(&db, "q", &entries).await.expect("Send failed.");
	let opts = ReceiveOptions {
		max_entries: 10,
		visibility_timeout: Duration::seconds(60),
		max_receive_count: 2,
	};
	let t0 = OffsetDateTime::now_utc() + Duration::seconds(1);
	let first = queue::receive(&db, "q", opts, t0).await.expect("Receive failed.");

	assert_eq!(first.len(), 3);
	assert!(first.iter().all(|m| m.batch_id == batch_id && m.receive_count == 1));

	let hidden =
		queue::receive(&db, "q", opts, t0 + Duration::seconds(30)).await.expect("Receive failed.");

	assert!(hidden.is_empty());

	let second =
		queue::receive(&db, "q", opts, t0 + Duration::seconds(61)).await.expect("Receive failed.");

	assert_eq!(second.len(), 3);

	queue::ack(&db, &[second[0].entry_id]).await.expect("Ack failed.");

	// The two remaining entries hit the delivery cap and are dropped.
	let third =
		queue::receive(&db, "q", opts, t0 + Duration::seconds(200)).await.expect("Receive failed.");

	assert!(third.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
