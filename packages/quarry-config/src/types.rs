use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub backend: Backend,
	pub queue: Queue,
	pub search: Search,
	pub events: Events,
	#[serde(default)]
	pub personalization: Personalization,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Bearer secret that acts for every tenant without a token, e.g. to mint the first one.
	#[serde(default)]
	pub admin_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Elasticsearch-compatible REST endpoint that stores and searches tenant documents.
#[derive(Debug, Deserialize)]
pub struct Backend {
	pub api_base: String,
	/// Optional. Sent as a bearer token when present.
	pub api_key: Option<String>,
	pub index_prefix: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// HTTP publish endpoint of the queue that receives forwarded domain events.
#[derive(Debug, Deserialize)]
pub struct Queue {
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub topic: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub searchable_fields: Vec<SearchableField>,
	#[serde(default = "default_phrase_boost")]
	pub phrase_boost: f32,
	#[serde(default = "default_bucket_limit")]
	pub bucket_limit: u32,
	#[serde(default)]
	pub highlight: Highlight,
	#[serde(default)]
	pub suggest: Suggest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchableField {
	pub field: String,
	#[serde(default = "default_field_boost")]
	pub boost: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Highlight {
	pub fragment_size: u32,
	pub fragments: u32,
	pub pre_tag: String,
	pub post_tag: String,
}
impl Default for Highlight {
	fn default() -> Self {
		Self {
			fragment_size: 100,
			fragments: 1,
			pre_tag: "<em>".to_string(),
			post_tag: "</em>".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Suggest {
	pub field: String,
	pub size: u32,
}
impl Default for Suggest {
	fn default() -> Self {
		Self { field: "suggest".to_string(), size: 10 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Events {
	pub sink: EventSink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSink {
	/// Discard captured events.
	Drop,
	/// Publish captured events to the queue topic.
	Forward,
	/// Append captured events to the event store before the command returns.
	Inline,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Personalization {
	pub enabled: bool,
	/// Token plugin name that opts a token into interaction-based promotion.
	pub plugin: String,
	pub recent_interactions: u32,
}
impl Default for Personalization {
	fn default() -> Self {
		Self { enabled: true, plugin: "interactions".to_string(), recent_interactions: 10 }
	}
}

fn default_phrase_boost() -> f32 {
	2.0
}

fn default_field_boost() -> f32 {
	1.0
}

fn default_bucket_limit() -> u32 {
	1_000
}
