use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ItemUuid, Result, TenantReference};

pub const ITEMS_INDEXED: &str = "items_indexed";
pub const ITEMS_DELETED: &str = "items_deleted";
pub const INDEX_CONFIGURED: &str = "index_configured";
pub const INDEX_RESET: &str = "index_reset";
pub const TOKEN_ADDED: &str = "token_added";
pub const TOKEN_DELETED: &str = "token_deleted";
pub const INTERACTION_ADDED: &str = "interaction_added";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsIndexed {
	pub item_uuids: Vec<ItemUuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsDeleted {
	pub item_uuids: Vec<ItemUuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfigured {
	pub settings: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReset {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAdded {
	pub token_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeleted {
	pub token_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionAdded {
	pub user_id: String,
	pub item_uuid: ItemUuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
	ItemsIndexed(ItemsIndexed),
	ItemsDeleted(ItemsDeleted),
	IndexConfigured(IndexConfigured),
	IndexReset(IndexReset),
	TokenAdded(TokenAdded),
	TokenDeleted(TokenDeleted),
	InteractionAdded(InteractionAdded),
}
impl EventPayload {
	pub fn name(&self) -> &'static str {
		match self {
			Self::ItemsIndexed(_) => ITEMS_INDEXED,
			Self::ItemsDeleted(_) => ITEMS_DELETED,
			Self::IndexConfigured(_) => INDEX_CONFIGURED,
			Self::IndexReset(_) => INDEX_RESET,
			Self::TokenAdded(_) => TOKEN_ADDED,
			Self::TokenDeleted(_) => TOKEN_DELETED,
			Self::InteractionAdded(_) => INTERACTION_ADDED,
		}
	}

	/// Subtype-specific JSON encoding stored in the event log.
	pub fn encode(&self) -> Result<Value> {
		let encoded = match self {
			Self::ItemsIndexed(payload) => serde_json::to_value(payload),
			Self::ItemsDeleted(payload) => serde_json::to_value(payload),
			Self::IndexConfigured(payload) => serde_json::to_value(payload),
			Self::IndexReset(payload) => serde_json::to_value(payload),
			Self::TokenAdded(payload) => serde_json::to_value(payload),
			Self::TokenDeleted(payload) => serde_json::to_value(payload),
			Self::InteractionAdded(payload) => serde_json::to_value(payload),
		};

		encoded.map_err(|err| {
			crate::Error::invalid(format!("event '{}' payload failed to encode: {err}", self.name()))
		})
	}
}

/// A state change raised by a command handler.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
	pub tenant_key: String,
	pub occurred_on: OffsetDateTime,
	pub payload: EventPayload,
}
impl DomainEvent {
	pub fn new(tenant: &TenantReference, payload: EventPayload) -> Self {
		Self::at(tenant.event_key(), OffsetDateTime::now_utc(), payload)
	}

	/// `occurred_on` is truncated to microseconds, the precision the event log keeps.
	pub fn at(tenant_key: impl Into<String>, occurred_on: OffsetDateTime, payload: EventPayload) -> Self {
		let micros = occurred_on.nanosecond() / 1_000 * 1_000;
		let occurred_on = occurred_on
			.to_offset(time::UtcOffset::UTC)
			.replace_nanosecond(micros)
			.unwrap_or(occurred_on);

		Self { tenant_key: tenant_key.into(), occurred_on, payload }
	}

	pub fn name(&self) -> &'static str {
		self.payload.name()
	}
}
