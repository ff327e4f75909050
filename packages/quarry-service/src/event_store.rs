//! Tamper-evident, per-tenant hash chain of domain events.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use quarry_domain::{DomainEvent, EventPayload, event};

use crate::{Error, EventLog, Result};

/// Previous hash of the first event of a chain.
pub const ROOT_HASH: &str = "";

pub type Decoder = fn(Value) -> Result<EventPayload>;

/// A persisted chain link. `payload` is the exact JSON text that was hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
	pub hash: String,
	pub name: String,
	pub key: String,
	pub payload: String,
	pub occurred_on: OffsetDateTime,
}

/// What the log must observe as the chain head when appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainHead<'a> {
	Unchecked,
	/// `None` expects an empty chain.
	Expect(Option<&'a str>),
}

/// Range over the event log; `from` is inclusive and `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
	#[serde(default)]
	pub key: Option<String>,
	#[serde(default, with = "quarry_domain::time_serde::option")]
	pub from: Option<OffsetDateTime>,
	#[serde(default, with = "quarry_domain::time_serde::option")]
	pub to: Option<OffsetDateTime>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerification {
	Intact { events: usize },
	/// `position` is the zero-based index, in append order, of the first link whose stored hash
	/// does not match its recomputation.
	Broken { position: usize, hash: String },
}

/// Queue message for a forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
	pub name: String,
	pub tenant_key: String,
	pub payload: Value,
	#[serde(with = "quarry_domain::time_serde")]
	pub occurred_on: OffsetDateTime,
}
impl EventMessage {
	pub fn from_event(event: &DomainEvent) -> Result<Self> {
		Ok(Self {
			name: event.name().to_string(),
			tenant_key: event.tenant_key.clone(),
			payload: event.payload.encode()?,
			occurred_on: event.occurred_on,
		})
	}
}

/// `blake3(previous ∥ name ∥ key ∥ payload ∥ occurred_on)`, fields NUL-separated, hex encoded.
pub fn consistency_hash(
	previous_hash: &str,
	name: &str,
	key: &str,
	payload: &str,
	occurred_on: OffsetDateTime,
) -> Result<String> {
	let occurred_on = occurred_on.format(&Rfc3339).map_err(|err| Error::InvalidFormat {
		message: format!("event time cannot be formatted: {err}."),
	})?;
	let mut hasher = blake3::Hasher::new();

	for part in [previous_hash, name, key, payload, occurred_on.as_str()] {
		hasher.update(part.as_bytes());
		hasher.update(&[0]);
	}

	Ok(hasher.finalize().to_hex().to_string())
}

/// Links `event` after `previous_hash`.
pub fn seal(event: &DomainEvent, previous_hash: &str) -> Result<StoredEvent> {
	let payload = serde_json::to_string(&event.payload.encode()?).map_err(|err| {
		Error::InvalidFormat { message: format!("event payload failed to serialize: {err}.") }
	})?;
	let hash =
		consistency_hash(previous_hash, event.name(), &event.tenant_key, &payload, event.occurred_on)?;

	Ok(StoredEvent {
		hash,
		name: event.name().to_string(),
		key: event.tenant_key.clone(),
		payload,
		occurred_on: event.occurred_on,
	})
}

/// Payload decoders by event name.
#[derive(Clone, Default)]
pub struct EventRegistry {
	decoders: HashMap<&'static str, Decoder>,
}
impl EventRegistry {
	/// Decoders for every event the gateway raises.
	pub fn builtin() -> Self {
		let mut registry = Self::default();

		registry.register(event::ITEMS_INDEXED, |payload| {
			decode_payload(payload).map(EventPayload::ItemsIndexed)
		});
		registry.register(event::ITEMS_DELETED, |payload| {
			decode_payload(payload).map(EventPayload::ItemsDeleted)
		});
		registry.register(event::INDEX_CONFIGURED, |payload| {
			decode_payload(payload).map(EventPayload::IndexConfigured)
		});
		registry.register(event::INDEX_RESET, |payload| {
			decode_payload(payload).map(EventPayload::IndexReset)
		});
		registry.register(event::TOKEN_ADDED, |payload| {
			decode_payload(payload).map(EventPayload::TokenAdded)
		});
		registry.register(event::TOKEN_DELETED, |payload| {
			decode_payload(payload).map(EventPayload::TokenDeleted)
		});
		registry.register(event::INTERACTION_ADDED, |payload| {
			decode_payload(payload).map(EventPayload::InteractionAdded)
		});

		registry
	}

	pub fn register(&mut self, name: &'static str, decoder: Decoder) {
		self.decoders.insert(name, decoder);
	}

	pub fn decode(&self, name: &str, payload: Value) -> Result<EventPayload> {
		let decoder = self.decoders.get(name).ok_or_else(|| Error::InvalidFormat {
			message: format!("no decoder is registered for event '{name}'."),
		})?;

		decoder(payload)
	}
}

fn decode_payload<T>(payload: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_json::from_value(payload).map_err(|err| Error::InvalidFormat {
		message: format!("event payload does not decode: {err}."),
	})
}

pub struct EventStore {
	log: Arc<dyn EventLog>,
	registry: EventRegistry,
	tenant_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}
impl EventStore {
	pub fn new(log: Arc<dyn EventLog>, registry: EventRegistry) -> Self {
		Self { log, registry, tenant_locks: Mutex::new(HashMap::new()) }
	}

	/// Appends after the tenant's current head.
	///
	/// Appends for one tenant are serialized in-process; the log rejects the write with
	/// [`Error::ResourceExists`] if another process moved the head in between.
	pub async fn append(&self, event: &DomainEvent) -> Result<StoredEvent> {
		let stored = self
			.serialized(&event.tenant_key, async {
				let previous = self.log.last(&event.tenant_key).await?;
				let previous_hash = previous.as_ref().map(|stored| stored.hash.as_str());
				let stored = seal(event, previous_hash.unwrap_or(ROOT_HASH))?;

				self.log.append(&stored, ChainHead::Expect(previous_hash)).await?;

				Ok(stored)
			})
			.await?;

		tracing::debug!(
			tenant_key = %stored.key,
			name = %stored.name,
			hash = %stored.hash,
			"Domain event appended."
		);

		Ok(stored)
	}

	/// Appends after an explicit `previous` event without consulting the log. `None` roots a
	/// new chain at [`ROOT_HASH`], even if the tenant already has events.
	pub async fn append_after(
		&self,
		event: &DomainEvent,
		previous: Option<&StoredEvent>,
	) -> Result<StoredEvent> {
		self.serialized(&event.tenant_key, async {
			let stored =
				seal(event, previous.map(|stored| stored.hash.as_str()).unwrap_or(ROOT_HASH))?;

			self.log.append(&stored, ChainHead::Unchecked).await?;

			Ok(stored)
		})
		.await
	}

	/// Events in occurrence order, decoded through the registry.
	pub async fn query(&self, query: &EventQuery) -> Result<Vec<DomainEvent>> {
		if let (Some(from), Some(to)) = (query.from, query.to)
			&& from > to
		{
			return Err(Error::InvalidFormat {
				message: "event range 'from' must not be after 'to'.".to_string(),
			});
		}

		let stored = self.log.range(query).await?;

		stored.iter().map(|stored| self.decode(stored)).collect()
	}

	/// Recomputes a tenant's chain from the root.
	pub async fn verify(&self, key: &str) -> Result<ChainVerification> {
		let chain = self.log.chain(key).await?;
		let mut previous_hash = ROOT_HASH.to_string();

		for (position, stored) in chain.iter().enumerate() {
			let expected = consistency_hash(
				&previous_hash,
				&stored.name,
				&stored.key,
				&stored.payload,
				stored.occurred_on,
			)?;

			if expected != stored.hash {
				tracing::warn!(tenant_key = key, position, "Event chain is broken.");

				return Ok(ChainVerification::Broken { position, hash: stored.hash.clone() });
			}

			previous_hash = expected;
		}

		Ok(ChainVerification::Intact { events: chain.len() })
	}

	pub fn decode(&self, stored: &StoredEvent) -> Result<DomainEvent> {
		let payload: Value = serde_json::from_str(&stored.payload).map_err(|err| {
			Error::InvalidFormat { message: format!("stored event payload is not JSON: {err}.") }
		})?;
		let payload = self.registry.decode(&stored.name, payload)?;

		Ok(DomainEvent::at(stored.key.clone(), stored.occurred_on, payload))
	}

	/// Runs `work` under the tenant's append lock. The lock entry is dropped once no other
	/// append holds or waits on it, so the map only tracks tenants with appends in flight.
	async fn serialized<T>(&self, key: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
		let lock = self.locks().entry(key.to_string()).or_default().clone();
		let result = {
			let _guard = lock.lock().await;

			work.await
		};

		drop(lock);

		let mut locks = self.locks();

		if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
			locks.remove(key);
		}

		result
	}

	fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
		self.tenant_locks.lock().unwrap_or_else(|err| err.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use quarry_domain::{
		ItemUuid,
		event::{
			IndexConfigured, IndexReset, InteractionAdded, ItemsDeleted, ItemsIndexed, TokenAdded,
			TokenDeleted,
		},
	};
	use uuid::Uuid;

	use super::*;
	use crate::BoxFuture;

	#[derive(Default)]
	struct VecLog(Mutex<Vec<StoredEvent>>);
	impl EventLog for VecLog {
		fn last<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<StoredEvent>>> {
			let last =
				self.0.lock().expect("log lock").iter().rev().find(|e| e.key == key).cloned();

			Box::pin(async move { Ok(last) })
		}

		fn append<'a>(
			&'a self,
			event: &'a StoredEvent,
			_head: ChainHead<'a>,
		) -> BoxFuture<'a, Result<()>> {
			self.0.lock().expect("log lock").push(event.clone());

			Box::pin(async { Ok(()) })
		}

		fn range<'a>(&'a self, _query: &'a EventQuery) -> BoxFuture<'a, Result<Vec<StoredEvent>>> {
			let events = self.0.lock().expect("log lock").clone();

			Box::pin(async move { Ok(events) })
		}

		fn chain<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<StoredEvent>>> {
			let events: Vec<StoredEvent> =
				self.0.lock().expect("log lock").iter().filter(|e| e.key == key).cloned().collect();

			Box::pin(async move { Ok(events) })
		}
	}

	#[test]
	fn hash_depends_on_every_field() {
		let at = time::macros::datetime!(2026-03-01 10:00 UTC);
		let base = consistency_hash("", "index_reset", "shop~~products", "{}", at).expect("hash");

		assert_eq!(base.len(), 64);
		assert_eq!(
			base,
			consistency_hash("", "index_reset", "shop~~products", "{}", at).expect("hash")
		);

		for other in [
			consistency_hash("x", "index_reset", "shop~~products", "{}", at),
			consistency_hash("", "items_deleted", "shop~~products", "{}", at),
			consistency_hash("", "index_reset", "shop~~blog", "{}", at),
			consistency_hash("", "index_reset", "shop~~products", "{\"a\":1}", at),
			consistency_hash("", "index_reset", "shop~~products", "{}", at + time::Duration::SECOND),
		] {
			assert_ne!(other.expect("hash"), base);
		}
	}

	#[test]
	fn field_boundaries_are_unambiguous() {
		let at = time::macros::datetime!(2026-03-01 10:00 UTC);

		assert_ne!(
			consistency_hash("", "ab", "c", "{}", at).expect("hash"),
			consistency_hash("", "a", "bc", "{}", at).expect("hash")
		);
	}

	#[test]
	fn builtin_registry_round_trips_every_event() {
		let registry = EventRegistry::builtin();
		let at = time::macros::datetime!(2026-03-01 10:00 UTC);
		let item = ItemUuid::new("1", "product");
		let token_uuid = Uuid::new_v4();
		let payloads = [
			EventPayload::ItemsIndexed(ItemsIndexed { item_uuids: vec![item.clone()] }),
			EventPayload::ItemsDeleted(ItemsDeleted { item_uuids: vec![item.clone()] }),
			EventPayload::IndexConfigured(IndexConfigured {
				settings: serde_json::json!({ "number_of_replicas": 1 }),
			}),
			EventPayload::IndexReset(IndexReset {}),
			EventPayload::TokenAdded(TokenAdded { token_uuid }),
			EventPayload::TokenDeleted(TokenDeleted { token_uuid }),
			EventPayload::InteractionAdded(InteractionAdded {
				user_id: "u-1".to_string(),
				item_uuid: item,
			}),
		];

		for payload in payloads {
			let event = DomainEvent::at("shop~~products", at, payload);
			let stored = seal(&event, ROOT_HASH).expect("seal");
			let decoded = registry
				.decode(&stored.name, serde_json::from_str(&stored.payload).expect("json"))
				.expect("decode");

			assert_eq!(decoded, event.payload, "{}", stored.name);
		}

		assert!(matches!(
			registry.decode("item_renamed", serde_json::json!({})),
			Err(Error::InvalidFormat { .. })
		));
	}

	#[tokio::test]
	async fn tenant_locks_are_released_after_appends() {
		let store = EventStore::new(Arc::new(VecLog::default()), EventRegistry::builtin());
		let at = time::macros::datetime!(2026-03-01 10:00 UTC);

		for index in 0..16 {
			let key = format!("shop~~index-{index}");
			let event = DomainEvent::at(key, at, EventPayload::IndexReset(IndexReset {}));

			store.append(&event).await.expect("append");
		}

		assert!(store.locks().is_empty());
		assert_eq!(
			store.verify("shop~~index-3").await.expect("verify"),
			ChainVerification::Intact { events: 1 }
		);
	}
}
