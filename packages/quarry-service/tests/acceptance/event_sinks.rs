use quarry_domain::{EventPayload, TenantReference};
use quarry_service::{Command, CommandOutput, CommandPayload, Error, EventQuery};

use super::{MemoryLog, MemoryQueue, harness, harness_with, item, tenant};

fn index_one() -> Command {
	Command::new(tenant(), CommandPayload::IndexItems(vec![item("1", "a")]))
}

#[tokio::test]
async fn inline_sink_failure_fails_the_command() {
	let h = harness_with(
		"inline",
		MemoryLog { fail: true, ..Default::default() },
		MemoryQueue::default(),
	);
	let err = h.service.execute(index_one()).await.expect_err("Expected the append to fail.");

	assert!(matches!(err, Error::Storage { .. }));
}

#[tokio::test]
async fn forward_sink_failure_is_tolerated() {
	let h = harness_with(
		"forward",
		MemoryLog::default(),
		MemoryQueue { fail: true, ..Default::default() },
	);

	assert_eq!(
		h.service.execute(index_one()).await.expect("Failed to index items."),
		CommandOutput::Done
	);
	assert!(h.queue.published.lock().expect("queue lock").is_empty());
	assert!(h.log.stored().is_empty());
}

#[tokio::test]
async fn forward_sink_publishes_encoded_events() {
	let h = harness("forward");

	h.service.execute(index_one()).await.expect("Failed to index items.");

	let published = h.queue.published.lock().expect("queue lock");

	assert_eq!(published.len(), 1);
	assert_eq!(published[0].name, "items_indexed");
	assert_eq!(published[0].tenant_key, "shop~~products");
	assert_eq!(published[0].payload["item_uuids"][0]["id"], "1");
}

#[tokio::test]
async fn drop_sink_keeps_nothing() {
	let h = harness("drop");

	h.service.execute(index_one()).await.expect("Failed to index items.");

	assert!(h.log.stored().is_empty());
	assert!(h.queue.published.lock().expect("queue lock").is_empty());
}

#[tokio::test]
async fn failed_commands_raise_no_events() {
	let h = harness("inline");
	let command = Command::new(tenant(), CommandPayload::IndexItems(Vec::new()));

	assert!(h.service.execute(command).await.is_err());
	assert!(h.log.stored().is_empty());
}

#[tokio::test]
async fn event_queries_are_scoped_to_the_tenant() {
	let h = harness("inline");
	let blog = TenantReference::new("shop", "blog");

	h.service.execute(index_one()).await.expect("Failed to index products.");
	h.service
		.execute(Command::new(blog, CommandPayload::IndexItems(vec![item("9", "post")])))
		.await
		.expect("Failed to index blog.");

	let query = EventQuery { key: Some("shop~~blog".to_string()), ..Default::default() };
	let output = h
		.service
		.execute(Command::new(tenant(), CommandPayload::QueryEvents(query)))
		.await
		.expect("Failed to query events.");
	let CommandOutput::Events(events) = output else {
		panic!("Expected events.");
	};

	assert_eq!(events.len(), 1);
	assert_eq!(events[0].tenant_key, "shop~~products");
	assert!(matches!(&events[0].payload, EventPayload::ItemsIndexed(indexed)
		if indexed.item_uuids[0].id == "1"));
	assert_eq!(h.log.stored().len(), 2);
}
