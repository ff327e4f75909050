use std::sync::Arc;

use time::{Duration, macros::datetime};

use quarry_domain::{
	DomainEvent, EventPayload, ItemUuid,
	event::{IndexReset, ItemsDeleted},
};
use quarry_service::{ChainVerification, Error, EventQuery, EventRegistry, EventStore};

use super::MemoryLog;

const KEY: &str = "shop~~products";

fn store() -> (Arc<MemoryLog>, EventStore) {
	let log = Arc::new(MemoryLog::default());

	(log.clone(), EventStore::new(log, EventRegistry::builtin()))
}

fn reset_at(minute: i64) -> DomainEvent {
	DomainEvent::at(
		KEY,
		datetime!(2026-03-01 10:00 UTC) + Duration::minutes(minute),
		EventPayload::IndexReset(IndexReset {}),
	)
}

#[tokio::test]
async fn appends_link_each_event_to_its_predecessor() {
	let (log, store) = store();
	let first = store.append(&reset_at(0)).await.expect("Failed to append.");
	let second = store.append(&reset_at(1)).await.expect("Failed to append.");

	assert_ne!(first.hash, second.hash);
	assert_eq!(log.stored().len(), 2);
	assert_eq!(
		store.verify(KEY).await.expect("Failed to verify."),
		ChainVerification::Intact { events: 2 }
	);
	assert_eq!(
		store.verify("shop~~blog").await.expect("Failed to verify."),
		ChainVerification::Intact { events: 0 }
	);
}

#[tokio::test]
async fn tampering_is_detected_at_the_altered_link() {
	let (log, store) = store();

	for minute in 0..3 {
		store.append(&reset_at(minute)).await.expect("Failed to append.");
	}

	log.tamper(1, r#"{"forged":true}"#);

	let verification = store.verify(KEY).await.expect("Failed to verify.");

	assert!(matches!(verification, ChainVerification::Broken { position: 1, .. }));
}

#[tokio::test]
async fn rooting_a_second_chain_breaks_verification() {
	let (_log, store) = store();
	let first = store.append(&reset_at(0)).await.expect("Failed to append.");

	store.append_after(&reset_at(1), Some(&first)).await.expect("Failed to append.");
	store.append_after(&reset_at(2), None).await.expect("Failed to append.");

	assert!(matches!(
		store.verify(KEY).await.expect("Failed to verify."),
		ChainVerification::Broken { position: 2, .. }
	));
}

#[tokio::test]
async fn concurrent_appends_keep_the_chain_intact() {
	let (_log, store) = store();
	let store = Arc::new(store);
	let mut handles = Vec::new();

	for minute in 0..8 {
		let store = store.clone();

		handles.push(tokio::spawn(async move { store.append(&reset_at(minute)).await }));
	}

	for handle in handles {
		handle.await.expect("Failed to join append.").expect("Failed to append.");
	}

	assert_eq!(
		store.verify(KEY).await.expect("Failed to verify."),
		ChainVerification::Intact { events: 8 }
	);
}

#[tokio::test]
async fn queries_decode_events_in_a_half_open_window() {
	let (_log, store) = store();

	store.append(&reset_at(0)).await.expect("Failed to append.");
	store
		.append(&DomainEvent::at(
			KEY,
			datetime!(2026-03-01 10:05 UTC),
			EventPayload::ItemsDeleted(ItemsDeleted { item_uuids: vec![ItemUuid::new("1", "p")] }),
		))
		.await
		.expect("Failed to append.");
	store.append(&reset_at(10)).await.expect("Failed to append.");

	let window = EventQuery {
		key: Some(KEY.to_string()),
		from: Some(datetime!(2026-03-01 10:05 UTC)),
		to: Some(datetime!(2026-03-01 10:10 UTC)),
		..Default::default()
	};
	let events = store.query(&window).await.expect("Failed to query.");

	assert_eq!(events.len(), 1);
	assert!(matches!(events[0].payload, EventPayload::ItemsDeleted(_)));

	let inverted = EventQuery {
		from: Some(datetime!(2026-03-01 11:00 UTC)),
		to: Some(datetime!(2026-03-01 10:00 UTC)),
		..Default::default()
	};

	assert!(matches!(store.query(&inverted).await, Err(Error::InvalidFormat { .. })));
}
