//! Production collaborators: the HTTP backend and queue, and Postgres-backed stores.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use quarry_config::Config;
use quarry_domain::{Item, ItemUuid, TenantReference, Token};
use quarry_providers::{
	backend::{BackendClient, BulkDocument},
	queue::QueueClient,
};
use quarry_storage::{
	db::Db,
	events::{self, EventRange},
	interactions,
	models::{AccessToken, NewStoredEvent, StoredEventRow, UserInteraction},
	tokens,
};

use crate::{
	BoxFuture, ChainHead, Collaborators, Error, EventLog, EventMessage, EventQuery,
	InteractionStore, QueuePublisher, Result, SearchBackend, StoredEvent, TokenStore,
};

impl Collaborators {
	/// Wires the HTTP clients from `cfg` and the Postgres stores over `db`.
	pub fn from_config(cfg: &Config, db: Arc<Db>) -> Result<Self> {
		let backend = BackendClient::new(&cfg.backend).map_err(backend_error)?;
		let queue = QueueClient::new(&cfg.queue).map_err(queue_error)?;
		let stores = Arc::new(PgStores::new(db));

		Ok(Self {
			backend: Arc::new(HttpBackend(backend)),
			queue: Arc::new(HttpQueue(queue)),
			events: stores.clone(),
			tokens: stores.clone(),
			interactions: stores,
		})
	}
}

pub struct HttpBackend(pub BackendClient);
impl SearchBackend for HttpBackend {
	fn search<'a>(&'a self, namespace: &'a str, body: &'a Value) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { self.0.search(namespace, body).await.map_err(backend_error) })
	}

	fn index<'a>(&'a self, namespace: &'a str, items: &'a [Item]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let docs: Vec<BulkDocument> = items
				.iter()
				.map(|item| BulkDocument { id: item.uuid.compose(), source: item.to_document() })
				.collect();

			self.0.index(namespace, &docs).await.map_err(backend_error)
		})
	}

	fn delete<'a>(
		&'a self,
		namespace: &'a str,
		uuids: &'a [ItemUuid],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let ids: Vec<String> = uuids.iter().map(ItemUuid::compose).collect();

			self.0.delete(namespace, &ids).await.map_err(backend_error)
		})
	}

	fn configure<'a>(
		&'a self,
		namespace: &'a str,
		settings: &'a Value,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.0.configure(namespace, settings).await.map_err(backend_error) })
	}

	fn reset<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let deleted = self.0.reset(namespace).await.map_err(backend_error)?;

			tracing::info!(namespace, deleted, "Index reset.");

			Ok(())
		})
	}
}

pub struct HttpQueue(pub QueueClient);
impl QueuePublisher for HttpQueue {
	fn publish<'a>(&'a self, message: &'a EventMessage) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.0.publish(message).await.map_err(queue_error) })
	}
}

pub struct PgStores {
	db: Arc<Db>,
}
impl PgStores {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl EventLog for PgStores {
	fn last<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredEvent>>> {
		Box::pin(async move {
			let row = events::last_event(&self.db.pool, key).await?;

			Ok(row.map(stored_event))
		})
	}

	fn append<'a>(
		&'a self,
		event: &'a StoredEvent,
		head: ChainHead<'a>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = NewStoredEvent {
				hash: event.hash.clone(),
				name: event.name.clone(),
				tenant_key: event.key.clone(),
				payload: event.payload.clone(),
				occurred_on: event.occurred_on,
			};
			let head = match head {
				ChainHead::Unchecked => events::ChainHead::Unchecked,
				ChainHead::Expect(hash) => events::ChainHead::Expect(hash),
			};

			events::append_event(&self.db, &row, head).await?;

			Ok(())
		})
	}

	fn range<'a>(&'a self, query: &'a EventQuery) -> BoxFuture<'a, Result<Vec<StoredEvent>>> {
		Box::pin(async move {
			let range = EventRange {
				tenant_key: query.key.as_deref(),
				from: query.from,
				to: query.to,
				limit: query.limit.map(i64::from),
				offset: i64::from(query.offset),
			};
			let rows = events::list_events(&self.db.pool, &range).await?;

			Ok(rows.into_iter().map(stored_event).collect())
		})
	}

	fn chain<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<StoredEvent>>> {
		Box::pin(async move {
			let rows = events::list_chain(&self.db.pool, key).await?;

			Ok(rows.into_iter().map(stored_event).collect())
		})
	}
}
impl TokenStore for PgStores {
	fn get(&self, uuid: Uuid) -> BoxFuture<'_, Result<Option<Token>>> {
		Box::pin(async move {
			let row = tokens::get_token(&self.db.pool, uuid).await?;

			row.map(token_from_row).transpose()
		})
	}

	fn insert<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let row = token_to_row(token)?;

			tokens::insert_token(&self.db.pool, &row).await?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, app_id: &'a str, uuid: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			tokens::delete_token(&self.db.pool, app_id, uuid).await?;

			Ok(())
		})
	}
}
impl InteractionStore for PgStores {
	fn record<'a>(
		&'a self,
		tenant: &'a TenantReference,
		user_id: &'a str,
		item: &'a ItemUuid,
		at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let interaction = UserInteraction {
				interaction_id: Uuid::new_v4(),
				app_id: tenant.app_id.clone(),
				index_id: tenant.index_id.clone(),
				user_id: user_id.to_string(),
				item_id: item.id.clone(),
				item_type: item.item_type.clone(),
				interacted_at: at,
			};

			interactions::insert_interaction(&self.db.pool, &interaction).await?;

			Ok(())
		})
	}

	fn recent<'a>(
		&'a self,
		tenant: &'a TenantReference,
		user_id: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<ItemUuid>>> {
		Box::pin(async move {
			let limit = i64::try_from(limit).unwrap_or(i64::MAX);
			let rows = interactions::recent_items(
				&self.db.pool,
				&tenant.app_id,
				&tenant.index_id,
				user_id,
				limit,
			)
			.await?;

			Ok(rows.into_iter().map(|row| ItemUuid::new(row.item_id, row.item_type)).collect())
		})
	}
}

fn stored_event(row: StoredEventRow) -> StoredEvent {
	StoredEvent {
		hash: row.hash,
		name: row.name,
		key: row.tenant_key,
		payload: row.payload,
		occurred_on: row.occurred_on,
	}
}

fn token_to_row(token: &Token) -> Result<AccessToken> {
	let out_of_range = |field: &str| Error::InvalidFormat {
		message: format!("token {field} is out of range."),
	};

	Ok(AccessToken {
		token_uuid: token.uuid,
		app_id: token.app_id.clone(),
		indices: token.indices.clone(),
		referrers: token.referrers.clone(),
		endpoints: token.endpoints.clone(),
		plugins: token.plugins.clone(),
		seconds_valid: i64::try_from(token.seconds_valid)
			.map_err(|_| out_of_range("seconds_valid"))?,
		max_hits_per_query: i32::try_from(token.max_hits_per_query)
			.map_err(|_| out_of_range("max_hits_per_query"))?,
		ttl: i64::try_from(token.ttl).map_err(|_| out_of_range("ttl"))?,
		created_at: token.created_at,
	})
}

fn token_from_row(row: AccessToken) -> Result<Token> {
	let out_of_range = |field: &str| Error::InvalidFormat {
		message: format!("stored token {field} is negative."),
	};

	Ok(Token {
		uuid: row.token_uuid,
		app_id: row.app_id,
		indices: row.indices,
		referrers: row.referrers,
		endpoints: row.endpoints,
		plugins: row.plugins,
		seconds_valid: u64::try_from(row.seconds_valid)
			.map_err(|_| out_of_range("seconds_valid"))?,
		max_hits_per_query: u32::try_from(row.max_hits_per_query)
			.map_err(|_| out_of_range("max_hits_per_query"))?,
		ttl: u64::try_from(row.ttl).map_err(|_| out_of_range("ttl"))?,
		created_at: row.created_at,
	})
}

fn backend_error(err: quarry_providers::Error) -> Error {
	if err.is_not_found() {
		return Error::ResourceNotAvailable { message: err.to_string() };
	}

	Error::Backend { message: err.to_string() }
}

fn queue_error(err: quarry_providers::Error) -> Error {
	Error::Queue { message: err.to_string() }
}
