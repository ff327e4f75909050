use time::OffsetDateTime;
use uuid::Uuid;

/// One link of a tenant's hash chain. `payload` is the exact JSON text that was hashed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredEventRow {
	pub seq: i64,
	pub hash: String,
	pub name: String,
	pub tenant_key: String,
	pub payload: String,
	pub occurred_on: OffsetDateTime,
}

/// Insert shape for [`StoredEventRow`]; `seq` is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewStoredEvent {
	pub hash: String,
	pub name: String,
	pub tenant_key: String,
	pub payload: String,
	pub occurred_on: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
	pub token_uuid: Uuid,
	pub app_id: String,
	pub indices: Vec<String>,
	pub referrers: Vec<String>,
	pub endpoints: Vec<String>,
	pub plugins: Vec<String>,
	pub seconds_valid: i64,
	pub max_hits_per_query: i32,
	pub ttl: i64,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserInteraction {
	pub interaction_id: Uuid,
	pub app_id: String,
	pub index_id: String,
	pub user_id: String,
	pub item_id: String,
	pub item_type: String,
	pub interacted_at: OffsetDateTime,
}

/// Most recent interaction per item, newest first.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RecentItem {
	pub item_id: String,
	pub item_type: String,
	pub last_interacted_at: OffsetDateTime,
}
