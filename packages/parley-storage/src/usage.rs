use crate::{Result, db::Db, models::UsageIncrement};

/// Atomic upsert-increment of the workspace's monthly usage row.
pub async fn increment_usage(db: &Db, increment: &UsageIncrement) -> Result<()> {
	sqlx::query("SELECT increment_embedding_usage($1, $2, $3, $4, $5)")
		.bind(increment.workspace_id)
		.bind(increment.month)
		.bind(increment.embeddings)
		.bind(increment.tokens)
		.bind(increment.cost)
		.execute(&db.pool)
		.await?;

	Ok(())
}
