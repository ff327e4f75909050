//! REST client for the Elasticsearch-compatible document store.

use std::time::Duration;

use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use crate::{Error, Result};

/// One document to write, keyed by its composed item uuid.
#[derive(Debug, Clone)]
pub struct BulkDocument {
	pub id: String,
	pub source: Value,
}

pub struct BackendClient {
	http: Client,
	api_base: String,
}
impl BackendClient {
	pub fn new(cfg: &quarry_config::Backend) -> Result<Self> {
		let http = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;

		Ok(Self { http, api_base: cfg.api_base.clone() })
	}

	pub async fn search(&self, namespace: &str, body: &Value) -> Result<Value> {
		let url = format!("{}/{namespace}/_search", self.api_base);
		let res = self.http.post(url).json(body).send().await?;
		let json: Value = crate::check_status(res).await?.json().await?;

		Ok(json)
	}

	pub async fn index(&self, namespace: &str, docs: &[BulkDocument]) -> Result<()> {
		if docs.is_empty() {
			return Ok(());
		}

		let mut body = String::new();

		for doc in docs {
			push_line(&mut body, &serde_json::json!({ "index": { "_index": namespace, "_id": doc.id } }))?;
			push_line(&mut body, &doc.source)?;
		}

		self.bulk(body).await
	}

	pub async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}

		let mut body = String::new();

		for id in ids {
			push_line(&mut body, &serde_json::json!({ "delete": { "_index": namespace, "_id": id } }))?;
		}

		self.bulk(body).await
	}

	/// Creates the index with `settings` when it does not exist yet, otherwise updates its
	/// dynamic settings.
	pub async fn configure(&self, namespace: &str, settings: &Value) -> Result<()> {
		let index_url = format!("{}/{namespace}", self.api_base);
		let exists = self.http.head(&index_url).send().await?;

		if exists.status().as_u16() == 404 {
			let res = self
				.http
				.put(index_url)
				.json(&serde_json::json!({ "settings": settings }))
				.send()
				.await?;

			crate::check_status(res).await?;

			tracing::info!(namespace, "Backend index created.");

			return Ok(());
		}

		crate::check_status(exists).await?;

		let res = self.http.put(format!("{index_url}/_settings")).json(settings).send().await?;

		crate::check_status(res).await?;

		Ok(())
	}

	/// Removes every document while keeping the index and its settings.
	pub async fn reset(&self, namespace: &str) -> Result<u64> {
		let url = format!("{}/{namespace}/_delete_by_query?refresh=true", self.api_base);
		let res = self
			.http
			.post(url)
			.json(&serde_json::json!({ "query": { "match_all": {} } }))
			.send()
			.await?;
		let json: Value = crate::check_status(res).await?.json().await?;

		Ok(json.get("deleted").and_then(Value::as_u64).unwrap_or(0))
	}

	async fn bulk(&self, body: String) -> Result<()> {
		let url = format!("{}/_bulk?refresh=wait_for", self.api_base);
		let res = self
			.http
			.post(url)
			.header(CONTENT_TYPE, "application/x-ndjson")
			.body(body)
			.send()
			.await?;
		let json: Value = crate::check_status(res).await?.json().await?;

		check_bulk_response(&json)
	}
}

fn push_line(body: &mut String, value: &Value) -> Result<()> {
	body.push_str(&serde_json::to_string(value)?);
	body.push('\n');

	Ok(())
}

/// Surfaces the first per-item failure of a bulk response. Deleting a missing document is not a
/// failure.
fn check_bulk_response(json: &Value) -> Result<()> {
	if !json.get("errors").and_then(Value::as_bool).unwrap_or(false) {
		return Ok(());
	}

	let items = json.get("items").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Bulk response is missing items array.".to_string() }
	})?;

	for item in items {
		let Some((action, outcome)) = item.as_object().and_then(|object| object.iter().next())
		else {
			continue;
		};
		let status = outcome.get("status").and_then(Value::as_u64).unwrap_or(0);

		if action == "delete" && status == 404 {
			continue;
		}
		if let Some(error) = outcome.get("error") {
			let id = outcome.get("_id").and_then(Value::as_str).unwrap_or_default();
			let reason = error
				.get("reason")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| error.to_string());

			return Err(Error::InvalidResponse {
				message: format!("Bulk {action} of {id} failed: {reason}."),
			});
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_bulk_response_without_errors() {
		let json = serde_json::json!({ "errors": false, "items": [] });

		assert!(check_bulk_response(&json).is_ok());
	}

	#[test]
	fn reports_first_failed_bulk_item() {
		let json = serde_json::json!({
			"errors": true,
			"items": [
				{ "index": { "_id": "1~product", "status": 201 } },
				{ "index": {
					"_id": "2~product",
					"status": 400,
					"error": { "type": "mapper_parsing_exception", "reason": "bad price" }
				} }
			]
		});
		let err = check_bulk_response(&json).expect_err("Expected bulk failure.");

		assert_eq!(err.to_string(), "Bulk index of 2~product failed: bad price.");
	}

	#[test]
	fn ignores_deletes_of_missing_documents() {
		let json = serde_json::json!({
			"errors": true,
			"items": [
				{ "delete": { "_id": "9~product", "status": 404, "error": { "reason": "not found" } } }
			]
		});

		assert!(check_bulk_response(&json).is_ok());
	}
}
