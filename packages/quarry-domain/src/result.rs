use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Item, ItemUuid, Policy, Query};

pub const COUNTER_SEPARATOR: &str = "~~";

/// One facet bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
	pub id: String,
	#[serde(rename = "name")]
	pub label: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub level: Option<u32>,
	/// Whether the bucket is one of the query's current selections.
	#[serde(default)]
	pub used: bool,
	pub n: u64,
}
impl Counter {
	/// Parses a composite bucket key `id~~label[~~level]`. A key without separators is both id
	/// and label; an unparseable level is treated as absent.
	pub fn parse(key: &str, n: u64, active_elements: &[String]) -> Self {
		let mut parts = key.split(COUNTER_SEPARATOR);
		let id = parts.next().unwrap_or_default().to_string();
		let label = parts.next().map(str::to_string).unwrap_or_else(|| id.clone());
		let level = parts.next().and_then(|raw| raw.trim().parse::<u32>().ok());
		let used = active_elements.iter().any(|active| active == &id);

		Self { id, label, level, used, n }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultAggregation {
	pub name: String,
	pub policy: Policy,
	pub doc_count: u64,
	pub active_elements: Vec<String>,
	pub counters: BTreeMap<String, Counter>,
}
impl ResultAggregation {
	pub fn new(
		name: impl Into<String>,
		policy: Policy,
		doc_count: u64,
		active_elements: Vec<String>,
	) -> Self {
		Self { name: name.into(), policy, doc_count, active_elements, counters: BTreeMap::new() }
	}

	pub fn add_counter(&mut self, counter: Counter) {
		self.counters.insert(counter.id.clone(), counter);
	}

	/// Keeps only the most specific applicable tier of a hierarchical facet.
	///
	/// The tier is the lowest level among counters that are not current selections (or among
	/// all counters when every one is selected). Counters on any other level are removed;
	/// counters without a level are never removed.
	pub fn prune_levels(&mut self) {
		let unselected_min =
			self.counters.values().filter(|counter| !counter.used).filter_map(|c| c.level).min();
		let Some(level) =
			unselected_min.or_else(|| self.counters.values().filter_map(|c| c.level).min())
		else {
			return;
		};

		self.counters.retain(|_, counter| counter.level.map(|l| l == level).unwrap_or(true));
	}

	pub fn counter(&self, id: &str) -> Option<&Counter> {
		self.counters.get(id)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub query: Query,
	pub total_elements: u64,
	pub total_hits: u64,
	pub items: Vec<Item>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aggregations: Option<BTreeMap<String, ResultAggregation>>,
	#[serde(rename = "suggests", default)]
	pub suggestions: Vec<String>,
}
impl SearchResult {
	pub fn aggregation(&self, name: &str) -> Option<&ResultAggregation> {
		self.aggregations.as_ref().and_then(|aggregations| aggregations.get(name))
	}

	/// Flags the leading items whose uuids are promoted, stopping at the first one that is not.
	/// Relative order is untouched.
	pub fn mark_promoted(&mut self, promoted: &[ItemUuid]) {
		if promoted.is_empty() {
			return;
		}

		for item in &mut self.items {
			if !promoted.contains(&item.uuid) {
				break;
			}

			item.promoted = true;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn counter(key: &str, n: u64, active: &[&str]) -> Counter {
		let active: Vec<String> = active.iter().map(|value| value.to_string()).collect();

		Counter::parse(key, n, &active)
	}

	#[test]
	fn parses_composite_counter_keys() {
		let parsed = counter("12~~Running~~1", 4, &["12"]);

		assert_eq!(parsed.id, "12");
		assert_eq!(parsed.label, "Running");
		assert_eq!(parsed.level, Some(1));
		assert!(parsed.used);

		let plain = counter("red", 2, &[]);

		assert_eq!(plain.id, "red");
		assert_eq!(plain.label, "red");
		assert_eq!(plain.level, None);
		assert!(!plain.used);
	}

	#[test]
	fn pruning_keeps_only_next_tier_after_selection() {
		let mut aggregation =
			ResultAggregation::new("category", Policy::MustAll, 10, vec!["1".to_string()]);

		aggregation.add_counter(counter("1~~Shoes~~0", 10, &["1"]));
		aggregation.add_counter(counter("12~~Running~~1", 6, &["1"]));
		aggregation.add_counter(counter("13~~Hiking~~1", 4, &["1"]));
		aggregation.prune_levels();

		let ids: Vec<&str> = aggregation.counters.keys().map(String::as_str).collect();

		assert_eq!(ids, vec!["12", "13"]);
	}

	#[test]
	fn pruning_never_drops_minimal_tier_without_selection() {
		let mut aggregation = ResultAggregation::new("category", Policy::MustAll, 10, Vec::new());

		aggregation.add_counter(counter("1~~Shoes~~0", 10, &[]));
		aggregation.add_counter(counter("2~~Shirts~~0", 5, &[]));
		aggregation.add_counter(counter("12~~Running~~1", 6, &[]));
		aggregation.prune_levels();

		assert!(aggregation.counter("1").is_some());
		assert!(aggregation.counter("2").is_some());
		assert!(aggregation.counter("12").is_none());
	}

	#[test]
	fn pruning_ignores_flat_facets() {
		let mut aggregation = ResultAggregation::new("color", Policy::AtLeastOne, 3, Vec::new());

		aggregation.add_counter(counter("red", 2, &[]));
		aggregation.add_counter(counter("blue", 1, &[]));
		aggregation.prune_levels();

		assert_eq!(aggregation.counters.len(), 2);
	}

	#[test]
	fn marks_only_leading_promoted_items() {
		let promoted = vec![ItemUuid::new("a", "p"), ItemUuid::new("c", "p")];
		let mut result = SearchResult {
			query: Query::match_all(),
			total_elements: 3,
			total_hits: 3,
			items: ["a", "b", "c"].iter().map(|id| Item::new(ItemUuid::new(*id, "p"))).collect(),
			aggregations: None,
			suggestions: Vec::new(),
		};

		result.mark_promoted(&promoted);

		let flags: Vec<bool> = result.items.iter().map(|item| item.promoted).collect();

		assert_eq!(flags, vec![true, false, false]);
	}
}
