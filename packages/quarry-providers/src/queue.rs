//! Publisher for the queue that receives forwarded domain events.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize)]
struct Envelope<'a, T> {
	topic: &'a str,
	message: &'a T,
}

pub struct QueueClient {
	http: Client,
	url: String,
	topic: String,
}
impl QueueClient {
	pub fn new(cfg: &quarry_config::Queue) -> Result<Self> {
		let http = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;

		Ok(Self { http, url: format!("{}{}", cfg.api_base, cfg.path), topic: cfg.topic.clone() })
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub async fn publish<T>(&self, message: &T) -> Result<()>
	where
		T: Serialize + Sync,
	{
		let envelope = Envelope { topic: &self.topic, message };
		let res = self.http.post(&self.url).json(&envelope).send().await?;

		crate::check_status(res).await?;

		tracing::debug!(topic = %self.topic, "Queue message published.");

		Ok(())
	}
}
