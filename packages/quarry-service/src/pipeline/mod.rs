//! Ordered interceptors around the terminal command handler.

mod events;
mod key;
mod personalization;
mod token;

pub use events::EventCapture;
pub use key::KeyCheck;
pub use personalization::Personalization;
pub use token::TokenCheck;

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use quarry_domain::{DomainEvent, Item, ItemUuid, Query, SearchResult, TenantReference, Token};

use crate::{BoxFuture, Error, Result, event_store::EventQuery};

/// A request addressed to one tenant.
#[derive(Debug, Clone)]
pub struct Command {
	pub tenant: Option<TenantReference>,
	pub token: Option<Token>,
	/// `Referer` of the originating request, checked against the token's allow-list.
	pub referrer: Option<String>,
	pub payload: CommandPayload,
}
impl Command {
	pub fn new(tenant: TenantReference, payload: CommandPayload) -> Self {
		Self { tenant: Some(tenant), token: None, referrer: None, payload }
	}

	pub fn with_token(mut self, token: Token) -> Self {
		self.token = Some(token);

		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());

		self
	}

	/// The addressed tenant, or [`Error::InvalidKey`] when it is absent or incomplete.
	pub fn require_tenant(&self) -> Result<&TenantReference> {
		self.tenant.as_ref().filter(|tenant| tenant.is_complete()).ok_or_else(|| {
			Error::InvalidKey {
				message: "application and index ids must be non-empty and match [a-z0-9-].".to_string(),
			}
		})
	}
}

#[derive(Debug, Clone)]
pub enum CommandPayload {
	Query(Query),
	IndexItems(Vec<Item>),
	DeleteItems(Vec<ItemUuid>),
	ConfigureIndex(Value),
	ResetIndex,
	AddToken(Token),
	DeleteToken(Uuid),
	AddInteraction { user_id: String, item: ItemUuid },
	QueryEvents(EventQuery),
}
impl CommandPayload {
	/// Endpoint name matched against a token's allowed endpoints.
	pub fn endpoint(&self) -> &'static str {
		match self {
			Self::Query(_) => "query",
			Self::IndexItems(_) => "index_items",
			Self::DeleteItems(_) => "delete_items",
			Self::ConfigureIndex(_) => "configure_index",
			Self::ResetIndex => "reset_index",
			Self::AddToken(_) => "add_token",
			Self::DeleteToken(_) => "delete_token",
			Self::AddInteraction { .. } => "add_interaction",
			Self::QueryEvents(_) => "query_events",
		}
	}

	/// Whether the command changes state and raises domain events.
	pub fn is_loggable(&self) -> bool {
		!matches!(self, Self::Query(_) | Self::QueryEvents(_))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
	Search(Box<SearchResult>),
	Events(Vec<DomainEvent>),
	Done,
}

/// State shared by the interceptors and the handler of one command.
#[derive(Debug)]
pub struct CommandContext {
	pub now: OffsetDateTime,
	/// Ids promoted by personalization, in promotion order.
	pub promoted: Vec<ItemUuid>,
	recorded: Option<Vec<DomainEvent>>,
}
impl CommandContext {
	pub fn new(now: OffsetDateTime) -> Self {
		Self { now, promoted: Vec::new(), recorded: None }
	}

	pub fn start_recording(&mut self) {
		self.recorded.get_or_insert_with(Vec::new);
	}

	/// Keeps `event` when a recorder is installed and discards it otherwise.
	pub fn record(&mut self, event: DomainEvent) {
		match &mut self.recorded {
			Some(recorded) => recorded.push(event),
			None => tracing::debug!(name = event.name(), "Domain event raised without a recorder."),
		}
	}

	pub fn take_recorded(&mut self) -> Vec<DomainEvent> {
		self.recorded.take().unwrap_or_default()
	}
}

pub trait Interceptor
where
	Self: Send + Sync,
{
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
		next: Next<'a>,
	) -> BoxFuture<'a, Result<CommandOutput>>;
}

pub trait CommandHandler
where
	Self: Send + Sync,
{
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
	) -> BoxFuture<'a, Result<CommandOutput>>;
}

/// The remaining interceptors and the handler.
#[derive(Clone, Copy)]
pub struct Next<'a> {
	interceptors: &'a [Arc<dyn Interceptor>],
	handler: &'a dyn CommandHandler,
}
impl<'a> Next<'a> {
	pub fn run<'b>(
		self,
		ctx: &'b mut CommandContext,
		command: &'b Command,
	) -> BoxFuture<'b, Result<CommandOutput>>
	where
		'a: 'b,
	{
		match self.interceptors.split_first() {
			Some((first, rest)) =>
				first.handle(ctx, command, Next { interceptors: rest, handler: self.handler }),
			None => self.handler.handle(ctx, command),
		}
	}
}

pub struct Pipeline {
	interceptors: Vec<Arc<dyn Interceptor>>,
	handler: Arc<dyn CommandHandler>,
}
impl Pipeline {
	pub fn new(handler: Arc<dyn CommandHandler>) -> Self {
		Self { interceptors: Vec::new(), handler }
	}

	/// Appends `interceptor`; interceptors run in the order they were added.
	pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
		self.interceptors.push(interceptor);

		self
	}

	pub async fn run(&self, command: &Command, now: OffsetDateTime) -> Result<CommandOutput> {
		let mut ctx = CommandContext::new(now);
		let next = Next { interceptors: &self.interceptors, handler: self.handler.as_ref() };

		next.run(&mut ctx, command).await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;

	struct Recorder {
		name: &'static str,
		trace: Arc<Mutex<Vec<String>>>,
		fail: bool,
	}
	impl Interceptor for Recorder {
		fn handle<'a>(
			&'a self,
			ctx: &'a mut CommandContext,
			command: &'a Command,
			next: Next<'a>,
		) -> BoxFuture<'a, Result<CommandOutput>> {
			Box::pin(async move {
				self.trace.lock().expect("trace lock").push(format!("{}:before", self.name));

				if self.fail {
					return Err(Error::InvalidKey { message: self.name.to_string() });
				}

				let output = next.run(&mut *ctx, command).await;

				self.trace.lock().expect("trace lock").push(format!("{}:after", self.name));

				output
			})
		}
	}

	struct Terminal {
		trace: Arc<Mutex<Vec<String>>>,
	}
	impl CommandHandler for Terminal {
		fn handle<'a>(
			&'a self,
			_ctx: &'a mut CommandContext,
			_command: &'a Command,
		) -> BoxFuture<'a, Result<CommandOutput>> {
			Box::pin(async move {
				self.trace.lock().expect("trace lock").push("handler".to_string());

				Ok(CommandOutput::Done)
			})
		}
	}

	fn pipeline(trace: &Arc<Mutex<Vec<String>>>, failing: Option<&'static str>) -> Pipeline {
		let mut pipeline = Pipeline::new(Arc::new(Terminal { trace: trace.clone() }));

		for name in ["first", "second", "third"] {
			pipeline = pipeline.with(Arc::new(Recorder {
				name,
				trace: trace.clone(),
				fail: failing == Some(name),
			}));
		}

		pipeline
	}

	fn command() -> Command {
		Command::new(TenantReference::new("shop", "products"), CommandPayload::ResetIndex)
	}

	#[tokio::test]
	async fn runs_interceptors_in_order_around_the_handler() {
		let trace = Arc::new(Mutex::new(Vec::new()));
		let output = pipeline(&trace, None)
			.run(&command(), OffsetDateTime::now_utc())
			.await
			.expect("pipeline failed");

		assert_eq!(output, CommandOutput::Done);
		assert_eq!(
			*trace.lock().expect("trace lock"),
			vec![
				"first:before",
				"second:before",
				"third:before",
				"handler",
				"third:after",
				"second:after",
				"first:after",
			]
		);
	}

	#[tokio::test]
	async fn failing_interceptor_short_circuits_the_rest() {
		let trace = Arc::new(Mutex::new(Vec::new()));
		let result = pipeline(&trace, Some("second")).run(&command(), OffsetDateTime::now_utc()).await;

		assert!(matches!(result, Err(Error::InvalidKey { .. })));
		assert_eq!(
			*trace.lock().expect("trace lock"),
			vec!["first:before", "second:before", "first:after"]
		);
	}

	#[test]
	fn only_state_changes_are_loggable() {
		assert!(!CommandPayload::Query(Query::match_all()).is_loggable());
		assert!(!CommandPayload::QueryEvents(EventQuery::default()).is_loggable());
		assert!(CommandPayload::ResetIndex.is_loggable());
		assert_eq!(CommandPayload::DeleteToken(Uuid::nil()).endpoint(), "delete_token");
	}
}
