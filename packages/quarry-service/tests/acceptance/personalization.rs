use uuid::Uuid;

use quarry_domain::{ItemUuid, Query, Token};
use quarry_service::{Command, CommandOutput, CommandPayload};

use super::{APP_ID, Harness, harness, item, tenant};

async fn seeded() -> Harness {
	let h = harness("drop");

	h.service
		.execute(Command::new(
			tenant(),
			CommandPayload::IndexItems(vec![item("a", "A"), item("b", "B"), item("c", "C")]),
		))
		.await
		.expect("Failed to index items.");
	h.service
		.execute(Command::new(
			tenant(),
			CommandPayload::AddInteraction {
				user_id: "u-1".to_string(),
				item: ItemUuid::new("c", "product"),
			},
		))
		.await
		.expect("Failed to add interaction.");

	h
}

async fn query_ids(h: &Harness, token: Token) -> Vec<(String, bool)> {
	let command = Command::new(tenant(), CommandPayload::Query(Query::match_all().by_user("u-1")))
		.with_token(token);
	let CommandOutput::Search(result) = h.service.execute(command).await.expect("Failed to query.")
	else {
		panic!("Expected a search result.");
	};

	result.items.into_iter().map(|item| (item.uuid.id, item.promoted)).collect()
}

#[tokio::test]
async fn recent_interactions_are_promoted_and_marked() {
	let h = seeded().await;
	let mut token = Token::new(Uuid::new_v4(), APP_ID);

	token.plugins = vec!["interactions".to_string()];

	let ids = query_ids(&h, token).await;

	assert_eq!(
		ids,
		vec![("c".to_string(), true), ("a".to_string(), false), ("b".to_string(), false)]
	);

	let searches = h.backend.searches.lock().expect("backend lock");
	let should = searches.last().and_then(|body| body.pointer("/query/bool/should"));

	assert!(should.is_some());
}

#[tokio::test]
async fn tokens_without_the_plugin_are_not_personalized() {
	let h = seeded().await;
	let ids = query_ids(&h, Token::new(Uuid::new_v4(), APP_ID)).await;

	assert_eq!(
		ids,
		vec![("a".to_string(), false), ("b".to_string(), false), ("c".to_string(), false)]
	);
}
