use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, FilterKind, Policy, Result};

pub const SORT_BY_COUNT: &str = "_count";
pub const SORT_BY_KEY: &str = "_key";

/// A requested facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
	pub name: String,
	pub field: String,
	#[serde(rename = "applicationPolicy", default)]
	pub policy: Policy,
	#[serde(default)]
	pub kind: FilterKind,
	/// `[key, direction]`, where key is `_count` or `_key`.
	#[serde(default = "default_sort")]
	pub sort: (String, String),
	/// Zero means the configured bucket limit.
	#[serde(default)]
	pub limit: u32,
	/// Bucket ids to keep. Empty keeps every bucket.
	#[serde(default)]
	pub subgroup: Vec<String>,
}
impl Aggregation {
	pub fn new(name: impl Into<String>, field: impl Into<String>, policy: Policy) -> Self {
		Self {
			name: name.into(),
			field: field.into(),
			policy,
			kind: FilterKind::Field,
			sort: default_sort(),
			limit: 0,
			subgroup: Vec::new(),
		}
	}

	pub fn with_kind(mut self, kind: FilterKind) -> Self {
		self.kind = kind;

		self
	}

	pub fn with_subgroup<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.subgroup = keys.into_iter().map(Into::into).collect();

		self
	}

	pub fn with_limit(mut self, limit: u32) -> Self {
		self.limit = limit;

		self
	}

	/// Backend bucket order, e.g. `{"_count": "desc"}`.
	pub fn order(&self) -> Result<Value> {
		let (key, direction) = &self.sort;

		if !matches!(key.as_str(), SORT_BY_COUNT | SORT_BY_KEY) {
			return Err(Error::invalid(format!(
				"aggregation '{}' sort key must be {SORT_BY_COUNT} or {SORT_BY_KEY}.",
				self.name
			)));
		}

		let direction = direction.to_ascii_lowercase();

		if !matches!(direction.as_str(), "asc" | "desc") {
			return Err(Error::invalid(format!(
				"aggregation '{}' sort direction must be asc or desc.",
				self.name
			)));
		}

		Ok(serde_json::json!({ key.as_str(): direction }))
	}

	pub fn keeps_bucket(&self, id: &str) -> bool {
		self.subgroup.is_empty() || self.subgroup.iter().any(|key| key == id)
	}
}

fn default_sort() -> (String, String) {
	(SORT_BY_COUNT.to_string(), "desc".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_order_is_count_descending() {
		let aggregation = Aggregation::new("color", "indexed_metadata.color", Policy::AtLeastOne);

		assert_eq!(aggregation.order().expect("order"), serde_json::json!({ "_count": "desc" }));
	}

	#[test]
	fn rejects_unknown_sort_key() {
		let mut aggregation = Aggregation::new("color", "indexed_metadata.color", Policy::MustAll);

		aggregation.sort = ("_score".to_string(), "desc".to_string());

		assert!(aggregation.order().is_err());
	}

	#[test]
	fn subgroup_restricts_buckets() {
		let aggregation = Aggregation::new("tags", "indexed_metadata.tags", Policy::AtLeastOne)
			.with_subgroup(["red", "blue"]);

		assert!(aggregation.keeps_bucket("red"));
		assert!(!aggregation.keeps_bucket("green"));
		assert!(Aggregation::new("tags", "f", Policy::MustAll).keeps_bucket("green"));
	}
}
