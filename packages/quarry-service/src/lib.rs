//! Command pipeline, query compilation, and event store of the search gateway.

pub mod aggregator;
pub mod compiler;
pub mod defaults;
pub mod event_store;
pub mod handler;
pub mod pipeline;

mod error;

pub use error::{Error, Result};
pub use event_store::{
	ChainHead, ChainVerification, EventMessage, EventQuery, EventRegistry, EventStore, StoredEvent,
};
pub use pipeline::{Command, CommandOutput, CommandPayload};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use quarry_config::Config;
use quarry_domain::{Item, ItemUuid, TenantReference, Token};

use handler::GatewayHandler;
use pipeline::{EventCapture, KeyCheck, Personalization, Pipeline, TokenCheck};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Document store and search engine holding one namespace per tenant.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, namespace: &'a str, body: &'a Value) -> BoxFuture<'a, Result<Value>>;

	fn index<'a>(&'a self, namespace: &'a str, items: &'a [Item]) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, namespace: &'a str, uuids: &'a [ItemUuid])
	-> BoxFuture<'a, Result<()>>;

	fn configure<'a>(
		&'a self,
		namespace: &'a str,
		settings: &'a Value,
	) -> BoxFuture<'a, Result<()>>;

	/// Removes every document, keeping the namespace and its settings.
	fn reset<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<()>>;
}

pub trait QueuePublisher
where
	Self: Send + Sync,
{
	fn publish<'a>(&'a self, message: &'a EventMessage) -> BoxFuture<'a, Result<()>>;
}

/// Append-only persistence behind the [`EventStore`].
pub trait EventLog
where
	Self: Send + Sync,
{
	fn last<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredEvent>>>;

	/// Fails with [`Error::ResourceExists`] when `head` does not match the stored head.
	fn append<'a>(
		&'a self,
		event: &'a StoredEvent,
		head: ChainHead<'a>,
	) -> BoxFuture<'a, Result<()>>;

	/// Events in occurrence order.
	fn range<'a>(&'a self, query: &'a EventQuery) -> BoxFuture<'a, Result<Vec<StoredEvent>>>;

	/// A tenant's events in append order.
	fn chain<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<StoredEvent>>>;
}

pub trait TokenStore
where
	Self: Send + Sync,
{
	fn get(&self, uuid: Uuid) -> BoxFuture<'_, Result<Option<Token>>>;

	/// Fails with [`Error::ResourceExists`] for a known uuid.
	fn insert<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, Result<()>>;

	/// Fails with [`Error::ResourceNotAvailable`] unless `app_id` owns the token.
	fn delete<'a>(&'a self, app_id: &'a str, uuid: Uuid) -> BoxFuture<'a, Result<()>>;
}

pub trait InteractionStore
where
	Self: Send + Sync,
{
	fn record<'a>(
		&'a self,
		tenant: &'a TenantReference,
		user_id: &'a str,
		item: &'a ItemUuid,
		at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	/// Distinct items the user touched, most recent first.
	fn recent<'a>(
		&'a self,
		tenant: &'a TenantReference,
		user_id: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<ItemUuid>>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub backend: Arc<dyn SearchBackend>,
	pub queue: Arc<dyn QueuePublisher>,
	pub events: Arc<dyn EventLog>,
	pub tokens: Arc<dyn TokenStore>,
	pub interactions: Arc<dyn InteractionStore>,
}

pub struct QuarryService {
	pub cfg: Arc<Config>,
	collaborators: Collaborators,
	event_store: Arc<EventStore>,
	pipeline: Pipeline,
}
impl QuarryService {
	/// Interceptors run in a fixed order: key, token, personalization, event capture.
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		let cfg = Arc::new(cfg);
		let event_store =
			Arc::new(EventStore::new(collaborators.events.clone(), EventRegistry::builtin()));
		let handler =
			GatewayHandler::new(cfg.clone(), collaborators.clone(), event_store.clone());
		let pipeline = Pipeline::new(Arc::new(handler))
			.with(Arc::new(KeyCheck))
			.with(Arc::new(TokenCheck))
			.with(Arc::new(Personalization::new(
				&cfg.personalization,
				collaborators.interactions.clone(),
			)))
			.with(Arc::new(EventCapture::new(
				cfg.events.sink,
				event_store.clone(),
				collaborators.queue.clone(),
			)));

		Self { cfg, collaborators, event_store, pipeline }
	}

	pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
		self.execute_at(&command, OffsetDateTime::now_utc()).await
	}

	/// Runs `command` with an explicit clock reading.
	pub async fn execute_at(&self, command: &Command, now: OffsetDateTime) -> Result<CommandOutput> {
		let result = self.pipeline.run(command, now).await;

		if let Err(err) = &result {
			tracing::info!(
				endpoint = command.payload.endpoint(),
				code = err.code(),
				error = %err,
				"Command rejected."
			);
		}

		result
	}

	/// Looks up a presented token. Unknown tokens are [`Error::InvalidToken`].
	pub async fn resolve_token(&self, uuid: Uuid) -> Result<Token> {
		self.collaborators
			.tokens
			.get(uuid)
			.await?
			.ok_or_else(|| Error::InvalidToken { message: format!("token {uuid} is unknown.") })
	}

	pub fn event_store(&self) -> &EventStore {
		&self.event_store
	}

	pub async fn verify_chain(&self, tenant: &TenantReference) -> Result<ChainVerification> {
		self.event_store.verify(&tenant.event_key()).await
	}
}
