use sqlx::PgExecutor;

use crate::{
	Error, Result,
	models::{RecentItem, UserInteraction},
};

pub async fn insert_interaction<'e, E>(executor: E, interaction: &UserInteraction) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO user_interactions (
	interaction_id,
	app_id,
	index_id,
	user_id,
	item_id,
	item_type,
	interacted_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7)",
	)
	.bind(interaction.interaction_id)
	.bind(interaction.app_id.as_str())
	.bind(interaction.index_id.as_str())
	.bind(interaction.user_id.as_str())
	.bind(interaction.item_id.as_str())
	.bind(interaction.item_type.as_str())
	.bind(interaction.interacted_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// Up to `limit` distinct items the user touched in one tenant, most recent first.
pub async fn recent_items<'e, E>(
	executor: E,
	app_id: &str,
	index_id: &str,
	user_id: &str,
	limit: i64,
) -> Result<Vec<RecentItem>>
where
	E: PgExecutor<'e>,
{
	if limit < 0 {
		return Err(Error::InvalidArgument("Limit must be zero or greater.".to_string()));
	}

	let rows = sqlx::query_as::<_, RecentItem>(
		"\
SELECT item_id, item_type, max(interacted_at) AS last_interacted_at
FROM user_interactions
WHERE app_id = $1 AND index_id = $2 AND user_id = $3
GROUP BY item_id, item_type
ORDER BY last_interacted_at DESC, item_id ASC
LIMIT $4",
	)
	.bind(app_id)
	.bind(index_id)
	.bind(user_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
