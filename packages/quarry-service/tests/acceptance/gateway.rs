use quarry_domain::{ItemUuid, Query, TenantReference};
use quarry_service::{ChainVerification, Command, CommandOutput, CommandPayload, Error};

use super::{harness, item, tenant};

#[tokio::test]
async fn indexed_items_come_back_from_a_query() {
	let h = harness("inline");
	let items = vec![item("1", "Trail runner"), item("2", "Road runner"), item("3", "Hiking boot")];

	h.service
		.execute(Command::new(tenant(), CommandPayload::IndexItems(items.clone())))
		.await
		.expect("Failed to index items.");

	assert_eq!(h.backend.count("quarry_shop_products"), 3);

	let output = h
		.service
		.execute(Command::new(tenant(), CommandPayload::Query(Query::match_all())))
		.await
		.expect("Failed to run query.");
	let CommandOutput::Search(result) = output else {
		panic!("Expected a search result.");
	};

	assert_eq!(result.total_hits, 3);
	assert_eq!(result.total_elements, 3);

	for (found, indexed) in result.items.iter().zip(&items) {
		assert_eq!(found.uuid, indexed.uuid);
		assert_eq!(found.searchable_metadata, indexed.searchable_metadata);
		assert!(!found.promoted);
	}
}

#[tokio::test]
async fn deletes_remove_documents_and_are_logged() {
	let h = harness("inline");

	h.service
		.execute(Command::new(
			tenant(),
			CommandPayload::IndexItems(vec![item("1", "a"), item("2", "b")]),
		))
		.await
		.expect("Failed to index items.");
	h.service
		.execute(Command::new(
			tenant(),
			CommandPayload::DeleteItems(vec![ItemUuid::new("1", "product")]),
		))
		.await
		.expect("Failed to delete items.");

	assert_eq!(h.backend.count("quarry_shop_products"), 1);

	let names: Vec<String> = h.log.stored().into_iter().map(|event| event.name).collect();

	assert_eq!(names, vec!["items_indexed", "items_deleted"]);
	assert_eq!(
		h.service.verify_chain(&tenant()).await.expect("Failed to verify chain."),
		ChainVerification::Intact { events: 2 }
	);
}

#[tokio::test]
async fn incomplete_tenants_are_rejected_before_any_work() {
	let h = harness("inline");
	let command = Command::new(
		TenantReference::new("shop", " "),
		CommandPayload::IndexItems(vec![item("1", "a")]),
	);
	let err = h.service.execute(command).await.expect_err("Expected a key rejection.");

	assert!(matches!(err, Error::InvalidKey { .. }));
	assert_eq!(err.code(), "INVALID_KEY");
	assert!(h.log.stored().is_empty());
}

#[tokio::test]
async fn tenants_outside_the_id_alphabet_never_reach_another_tenant() {
	let h = harness("inline");

	h.service
		.execute(Command::new(tenant(), CommandPayload::IndexItems(vec![item("1", "a")])))
		.await
		.expect("Failed to index items.");

	for other in [TenantReference::new("SHOP", "products"), TenantReference::new("shop~~x", "products")]
	{
		let command = Command::new(other, CommandPayload::ResetIndex);
		let err = h.service.execute(command).await.expect_err("Expected a key rejection.");

		assert!(matches!(err, Error::InvalidKey { .. }));
	}

	assert_eq!(h.backend.count("quarry_shop_products"), 1);
	assert_eq!(h.log.stored().len(), 1);
}

#[tokio::test]
async fn querying_an_unknown_index_is_not_available() {
	let h = harness("drop");
	let err = h
		.service
		.execute(Command::new(tenant(), CommandPayload::Query(Query::new("boots"))))
		.await
		.expect_err("Expected a missing index.");

	assert!(matches!(err, Error::ResourceNotAvailable { .. }));
}

#[tokio::test]
async fn configure_requires_object_settings() {
	let h = harness("inline");
	let err = h
		.service
		.execute(Command::new(tenant(), CommandPayload::ConfigureIndex(serde_json::json!([1]))))
		.await
		.expect_err("Expected invalid settings.");

	assert!(matches!(err, Error::InvalidFormat { .. }));

	h.service
		.execute(Command::new(
			tenant(),
			CommandPayload::ConfigureIndex(serde_json::json!({ "number_of_replicas": 1 })),
		))
		.await
		.expect("Failed to configure index.");
	h.service
		.execute(Command::new(tenant(), CommandPayload::ResetIndex))
		.await
		.expect("Failed to reset index.");

	let names: Vec<String> = h.log.stored().into_iter().map(|event| event.name).collect();

	assert_eq!(names, vec!["index_configured", "index_reset"]);
}
