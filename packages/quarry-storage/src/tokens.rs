use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{Error, Result, models::AccessToken};

pub async fn insert_token<'e, E>(executor: E, token: &AccessToken) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO access_tokens (
	token_uuid,
	app_id,
	indices,
	referrers,
	endpoints,
	plugins,
	seconds_valid,
	max_hits_per_query,
	ttl,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
ON CONFLICT (token_uuid) DO NOTHING",
	)
	.bind(token.token_uuid)
	.bind(token.app_id.as_str())
	.bind(&token.indices)
	.bind(&token.referrers)
	.bind(&token.endpoints)
	.bind(&token.plugins)
	.bind(token.seconds_valid)
	.bind(token.max_hits_per_query)
	.bind(token.ttl)
	.bind(token.created_at)
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!("Token {} already exists.", token.token_uuid)));
	}

	Ok(())
}

pub async fn get_token<'e, E>(executor: E, token_uuid: Uuid) -> Result<Option<AccessToken>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, AccessToken>(
		"\
SELECT
	token_uuid,
	app_id,
	indices,
	referrers,
	endpoints,
	plugins,
	seconds_valid,
	max_hits_per_query,
	ttl,
	created_at
FROM access_tokens
WHERE token_uuid = $1",
	)
	.bind(token_uuid)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Deletes a token owned by `app_id`; tokens of other applications are reported as missing.
pub async fn delete_token<'e, E>(executor: E, app_id: &str, token_uuid: Uuid) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM access_tokens WHERE token_uuid = $1 AND app_id = $2")
		.bind(token_uuid)
		.bind(app_id)
		.execute(executor)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Token {token_uuid} was not found.")));
	}

	Ok(())
}
