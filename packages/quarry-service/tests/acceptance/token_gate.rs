use uuid::Uuid;

use quarry_domain::{Query, Token};
use quarry_service::{Command, CommandPayload, Error};

use super::{APP_ID, harness, item, tenant};

fn limited_token(max_hits: u32) -> Token {
	let mut token = Token::new(Uuid::new_v4(), APP_ID);

	token.max_hits_per_query = max_hits;

	token
}

#[tokio::test]
async fn hit_limit_caps_query_size() {
	let h = harness("drop");

	h.service
		.execute(Command::new(tenant(), CommandPayload::IndexItems(vec![item("1", "a")])))
		.await
		.expect("Failed to index items.");

	let token = limited_token(10);
	let too_many = Command::new(tenant(), CommandPayload::Query(Query::match_all().paginate(0, 50)))
		.with_token(token.clone());
	let err = h.service.execute(too_many).await.expect_err("Expected the hit limit to apply.");

	assert!(matches!(err, Error::InvalidToken { .. }));

	let within = Command::new(tenant(), CommandPayload::Query(Query::match_all().paginate(0, 5)))
		.with_token(token);

	h.service.execute(within).await.expect("Failed to run query within the limit.");
}

#[tokio::test]
async fn endpoint_allow_list_blocks_writes() {
	let h = harness("inline");
	let mut token = limited_token(0);

	token.endpoints = vec!["query".to_string()];

	let command = Command::new(tenant(), CommandPayload::IndexItems(vec![item("1", "a")]))
		.with_token(token);
	let err = h.service.execute(command).await.expect_err("Expected the endpoint to be blocked.");

	assert_eq!(err.code(), "INVALID_TOKEN");
	assert_eq!(h.backend.count("quarry_shop_products"), 0);
	assert!(h.log.stored().is_empty());
}

#[tokio::test]
async fn referrer_must_match_the_allow_list() {
	let h = harness("drop");
	let mut token = limited_token(0);

	token.referrers = vec!["*.example.com".to_string()];

	let index = |referrer: &str| {
		Command::new(tenant(), CommandPayload::IndexItems(vec![item("1", "a")]))
			.with_token(token.clone())
			.with_referrer(referrer)
	};

	assert!(matches!(
		h.service.execute(index("https://evil.test/")).await,
		Err(Error::InvalidToken { .. })
	));

	h.service
		.execute(index("https://shop.example.com/cart"))
		.await
		.expect("Failed to index with an allowed referrer.");
}

#[tokio::test]
async fn tokens_are_managed_per_application() {
	let h = harness("inline");
	let token = limited_token(20);

	h.service
		.execute(Command::new(tenant(), CommandPayload::AddToken(token.clone())))
		.await
		.expect("Failed to add token.");

	assert_eq!(h.service.resolve_token(token.uuid).await.expect("Failed to resolve token."), token);
	assert!(matches!(
		h.service.execute(Command::new(tenant(), CommandPayload::AddToken(token.clone()))).await,
		Err(Error::ResourceExists { .. })
	));

	let foreign = Token::new(Uuid::new_v4(), "blog");

	assert!(matches!(
		h.service.execute(Command::new(tenant(), CommandPayload::AddToken(foreign))).await,
		Err(Error::InvalidFormat { .. })
	));

	h.service
		.execute(Command::new(tenant(), CommandPayload::DeleteToken(token.uuid)))
		.await
		.expect("Failed to delete token.");

	assert!(matches!(
		h.service.resolve_token(token.uuid).await,
		Err(Error::InvalidToken { .. })
	));
	assert!(matches!(
		h.service.execute(Command::new(tenant(), CommandPayload::DeleteToken(token.uuid))).await,
		Err(Error::ResourceNotAvailable { .. })
	));

	let names: Vec<String> = h.log.stored().into_iter().map(|event| event.name).collect();

	assert_eq!(names, vec!["token_added", "token_deleted"]);
	assert!(h.tokens.is_empty());
}

#[tokio::test]
async fn minting_tokens_needs_an_explicit_grant() {
	let h = harness("inline");
	let open = limited_token(0);
	let minted = Token::new(Uuid::new_v4(), APP_ID);
	let err = h
		.service
		.execute(
			Command::new(tenant(), CommandPayload::AddToken(minted.clone())).with_token(open),
		)
		.await
		.expect_err("Expected token management to need a grant.");

	assert!(matches!(err, Error::InvalidToken { .. }));
	assert!(h.tokens.is_empty());

	let mut admin = limited_token(0);

	admin.endpoints = vec!["add_token".to_string()];

	h.service
		.execute(Command::new(tenant(), CommandPayload::AddToken(minted)).with_token(admin))
		.await
		.expect("Failed to add a token with the add_token grant.");

	assert!(!h.tokens.is_empty());
}
