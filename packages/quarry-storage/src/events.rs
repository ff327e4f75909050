use sqlx::PgExecutor;
use time::OffsetDateTime;

use crate::{
	Error, Result,
	db::Db,
	models::{NewStoredEvent, StoredEventRow},
};

/// Expected state of a tenant chain at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainHead<'a> {
	/// Append without comparing the current head.
	Unchecked,
	/// Append only while the newest stored hash is this one, or while the chain is empty for
	/// `None`.
	Expect(Option<&'a str>),
}

/// Window over the event log. Bounds are `[from, to)` on `occurred_on`.
#[derive(Debug, Clone, Default)]
pub struct EventRange<'a> {
	pub tenant_key: Option<&'a str>,
	pub from: Option<OffsetDateTime>,
	pub to: Option<OffsetDateTime>,
	pub limit: Option<i64>,
	pub offset: i64,
}

pub async fn last_event<'e, E>(executor: E, tenant_key: &str) -> Result<Option<StoredEventRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, StoredEventRow>(
		"\
SELECT seq, hash, name, tenant_key, payload, occurred_on
FROM stored_events
WHERE tenant_key = $1
ORDER BY seq DESC
LIMIT 1",
	)
	.bind(tenant_key)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Appends one event under a per-tenant transaction lock.
///
/// With [`ChainHead::Expect`] the append fails with [`Error::Conflict`] when another writer moved
/// the head first.
pub async fn append_event(db: &Db, event: &NewStoredEvent, head: ChainHead<'_>) -> Result<i64> {
	if event.tenant_key.is_empty() {
		return Err(Error::InvalidArgument("Event tenant key must be non-empty.".to_string()));
	}

	let mut tx = db.pool.begin().await?;

	sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
		.bind(event.tenant_key.as_str())
		.execute(&mut *tx)
		.await?;

	if let ChainHead::Expect(expected) = head {
		let current = last_event(&mut *tx, event.tenant_key.as_str()).await?;
		let current_hash = current.as_ref().map(|row| row.hash.as_str());

		if current_hash != expected {
			return Err(Error::Conflict(format!(
				"Chain head for {} moved to {:?}, expected {:?}.",
				event.tenant_key, current_hash, expected
			)));
		}
	}

	let seq: i64 = sqlx::query_scalar(
		"\
INSERT INTO stored_events (hash, name, tenant_key, payload, occurred_on)
VALUES ($1,$2,$3,$4,$5)
RETURNING seq",
	)
	.bind(event.hash.as_str())
	.bind(event.name.as_str())
	.bind(event.tenant_key.as_str())
	.bind(event.payload.as_str())
	.bind(event.occurred_on)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(seq)
}

/// Events ordered by `occurred_on`, ties broken by append order.
pub async fn list_events<'e, E>(executor: E, range: &EventRange<'_>) -> Result<Vec<StoredEventRow>>
where
	E: PgExecutor<'e>,
{
	if range.offset < 0 {
		return Err(Error::InvalidArgument("Offset must be zero or greater.".to_string()));
	}
	if range.limit.is_some_and(|limit| limit < 0) {
		return Err(Error::InvalidArgument("Limit must be zero or greater.".to_string()));
	}

	let rows = sqlx::query_as::<_, StoredEventRow>(
		"\
SELECT seq, hash, name, tenant_key, payload, occurred_on
FROM stored_events
WHERE ($1::text IS NULL OR tenant_key = $1)
	AND ($2::timestamptz IS NULL OR occurred_on >= $2)
	AND ($3::timestamptz IS NULL OR occurred_on < $3)
ORDER BY occurred_on ASC, seq ASC
LIMIT $4
OFFSET $5",
	)
	.bind(range.tenant_key)
	.bind(range.from)
	.bind(range.to)
	.bind(range.limit)
	.bind(range.offset)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// A tenant's whole chain in append order.
pub async fn list_chain<'e, E>(executor: E, tenant_key: &str) -> Result<Vec<StoredEventRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, StoredEventRow>(
		"\
SELECT seq, hash, name, tenant_key, payload, occurred_on
FROM stored_events
WHERE tenant_key = $1
ORDER BY seq ASC",
	)
	.bind(tenant_key)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
