//! Terminal stage of the pipeline: executes a command against the collaborators.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use quarry_config::Config;
use quarry_domain::{
	DomainEvent, EventPayload, Item, ItemUuid, Query, TenantReference, Token,
	event::{
		IndexConfigured, IndexReset, InteractionAdded, ItemsDeleted, ItemsIndexed, TokenAdded,
		TokenDeleted,
	},
};

use crate::{
	BoxFuture, Collaborators, Error, Result, aggregator,
	compiler::Compiler,
	event_store::{EventQuery, EventStore},
	pipeline::{Command, CommandContext, CommandHandler, CommandOutput, CommandPayload},
};

pub struct GatewayHandler {
	cfg: Arc<Config>,
	collaborators: Collaborators,
	event_store: Arc<EventStore>,
}
impl GatewayHandler {
	pub fn new(cfg: Arc<Config>, collaborators: Collaborators, event_store: Arc<EventStore>) -> Self {
		Self { cfg, collaborators, event_store }
	}

	async fn execute(&self, ctx: &mut CommandContext, command: &Command) -> Result<CommandOutput> {
		let tenant = command.require_tenant()?;

		match &command.payload {
			CommandPayload::Query(query) => self.query(ctx, tenant, query).await,
			CommandPayload::IndexItems(items) => self.index_items(ctx, tenant, items).await,
			CommandPayload::DeleteItems(uuids) => self.delete_items(ctx, tenant, uuids).await,
			CommandPayload::ConfigureIndex(settings) =>
				self.configure_index(ctx, tenant, settings).await,
			CommandPayload::ResetIndex => self.reset_index(ctx, tenant).await,
			CommandPayload::AddToken(token) => self.add_token(ctx, tenant, token).await,
			CommandPayload::DeleteToken(uuid) => self.delete_token(ctx, tenant, *uuid).await,
			CommandPayload::AddInteraction { user_id, item } =>
				self.add_interaction(ctx, tenant, user_id, item).await,
			CommandPayload::QueryEvents(query) => self.query_events(tenant, query).await,
		}
	}

	fn namespace(&self, tenant: &TenantReference) -> String {
		tenant.namespace(&self.cfg.backend.index_prefix)
	}

	async fn query(
		&self,
		ctx: &CommandContext,
		tenant: &TenantReference,
		query: &Query,
	) -> Result<CommandOutput> {
		let effective = query.with_promoted(ctx.promoted.iter());
		let compiled =
			Compiler::new(&self.cfg.backend.index_prefix, &self.cfg.search).compile(&effective, tenant)?;
		let raw = self.collaborators.backend.search(&compiled.namespace, &compiled.body).await?;
		let result = aggregator::aggregate(&raw, query)?;

		tracing::debug!(
			namespace = %compiled.namespace,
			total_hits = result.total_hits,
			items = result.items.len(),
			"Query executed."
		);

		Ok(CommandOutput::Search(Box::new(result)))
	}

	async fn index_items(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		items: &[Item],
	) -> Result<CommandOutput> {
		if items.is_empty() {
			return Err(Error::InvalidFormat { message: "no items to index.".to_string() });
		}

		for item in items {
			validate_uuid(&item.uuid)?;
		}

		self.collaborators.backend.index(&self.namespace(tenant), items).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::ItemsIndexed(ItemsIndexed {
				item_uuids: items.iter().map(|item| item.uuid.clone()).collect(),
			}),
		));

		Ok(CommandOutput::Done)
	}

	async fn delete_items(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		uuids: &[ItemUuid],
	) -> Result<CommandOutput> {
		if uuids.is_empty() {
			return Err(Error::InvalidFormat { message: "no items to delete.".to_string() });
		}

		for uuid in uuids {
			validate_uuid(uuid)?;
		}

		self.collaborators.backend.delete(&self.namespace(tenant), uuids).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::ItemsDeleted(ItemsDeleted { item_uuids: uuids.to_vec() }),
		));

		Ok(CommandOutput::Done)
	}

	async fn configure_index(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		settings: &Value,
	) -> Result<CommandOutput> {
		if !settings.is_object() {
			return Err(Error::InvalidFormat {
				message: "index settings must be a JSON object.".to_string(),
			});
		}

		self.collaborators.backend.configure(&self.namespace(tenant), settings).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::IndexConfigured(IndexConfigured { settings: settings.clone() }),
		));

		Ok(CommandOutput::Done)
	}

	async fn reset_index(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
	) -> Result<CommandOutput> {
		self.collaborators.backend.reset(&self.namespace(tenant)).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::IndexReset(IndexReset {}),
		));

		Ok(CommandOutput::Done)
	}

	async fn add_token(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		token: &Token,
	) -> Result<CommandOutput> {
		if token.app_id != tenant.app_id {
			return Err(Error::InvalidFormat {
				message: format!(
					"token belongs to application '{}', not '{}'.",
					token.app_id, tenant.app_id
				),
			});
		}

		self.collaborators.tokens.insert(token).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::TokenAdded(TokenAdded { token_uuid: token.uuid }),
		));

		Ok(CommandOutput::Done)
	}

	async fn delete_token(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		uuid: Uuid,
	) -> Result<CommandOutput> {
		self.collaborators.tokens.delete(&tenant.app_id, uuid).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::TokenDeleted(TokenDeleted { token_uuid: uuid }),
		));

		Ok(CommandOutput::Done)
	}

	async fn add_interaction(
		&self,
		ctx: &mut CommandContext,
		tenant: &TenantReference,
		user_id: &str,
		item: &ItemUuid,
	) -> Result<CommandOutput> {
		if user_id.trim().is_empty() {
			return Err(Error::InvalidFormat { message: "user_id must be non-empty.".to_string() });
		}

		validate_uuid(item)?;

		self.collaborators.interactions.record(tenant, user_id, item, ctx.now).await?;

		ctx.record(DomainEvent::at(
			tenant.event_key(),
			ctx.now,
			EventPayload::InteractionAdded(InteractionAdded {
				user_id: user_id.to_string(),
				item_uuid: item.clone(),
			}),
		));

		Ok(CommandOutput::Done)
	}

	async fn query_events(
		&self,
		tenant: &TenantReference,
		query: &EventQuery,
	) -> Result<CommandOutput> {
		let scoped = EventQuery { key: Some(tenant.event_key()), ..query.clone() };
		let events = self.event_store.query(&scoped).await?;

		Ok(CommandOutput::Events(events))
	}
}
impl CommandHandler for GatewayHandler {
	fn handle<'a>(
		&'a self,
		ctx: &'a mut CommandContext,
		command: &'a Command,
	) -> BoxFuture<'a, Result<CommandOutput>> {
		Box::pin(self.execute(ctx, command))
	}
}

fn validate_uuid(uuid: &ItemUuid) -> Result<()> {
	if uuid.id.trim().is_empty() || uuid.item_type.trim().is_empty() {
		return Err(Error::InvalidFormat {
			message: "item uuid requires a non-empty id and type.".to_string(),
		});
	}

	Ok(())
}
