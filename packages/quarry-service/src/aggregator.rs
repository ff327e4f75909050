//! Rebuilds an engine-neutral [`SearchResult`] from a raw backend response.

use std::collections::BTreeMap;

use serde_json::Value;

use quarry_domain::{
	Counter, Item, ItemUuid, Query, ResultAggregation, SearchResult, SortSpec, filter::value_key,
};

use crate::{
	Error, Result,
	compiler::{GLOBAL_SCOPE, UNIVERSE_SCOPE},
};

const HIGHLIGHT_JOINER: &str = " ... ";

/// Missing or malformed aggregation and suggestion sections read as empty. Hits must be
/// well-formed items.
pub fn aggregate(raw: &Value, query: &Query) -> Result<SearchResult> {
	let hits =
		raw.pointer("/hits/hits").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
	let items = hits.iter().map(|hit| item_from_hit(hit, query)).collect::<Result<Vec<_>>>()?;
	let total_hits = total_hits(raw).unwrap_or(items.len() as u64);
	let (aggregations, universe_count) =
		if query.flags.aggregations_enabled && !query.aggregations.is_empty() {
			let (aggregations, universe_count) = aggregations(raw, query);

			(Some(aggregations), universe_count)
		} else {
			(None, None)
		};
	let suggestions =
		if query.flags.suggestions_enabled { suggestions(raw) } else { Vec::new() };

	Ok(SearchResult {
		query: query.clone(),
		total_elements: universe_count.unwrap_or(total_hits),
		total_hits,
		items,
		aggregations,
		suggestions,
	})
}

fn total_hits(raw: &Value) -> Option<u64> {
	let total = raw.pointer("/hits/total")?;

	total.get("value").and_then(Value::as_u64).or_else(|| total.as_u64())
}

fn item_from_hit(hit: &Value, query: &Query) -> Result<Item> {
	let mut source =
		hit.get("_source").cloned().unwrap_or_else(|| Value::Object(Default::default()));
	let Some(document) = source.as_object_mut() else {
		return Err(Error::InvalidFormat { message: "hit _source must be an object.".to_string() });
	};

	if !document.contains_key("uuid") {
		let id = hit.get("_id").and_then(Value::as_str).ok_or_else(|| Error::InvalidFormat {
			message: "hit has neither _source.uuid nor _id.".to_string(),
		})?;

		let uuid = serde_json::to_value(ItemUuid::parse(id)?).map_err(invalid_item)?;

		document.insert("uuid".to_string(), uuid);
	}

	let mut item: Item = serde_json::from_value(source).map_err(invalid_item)?;

	item.score = hit.get("_score").and_then(Value::as_f64);

	if matches!(query.sort, SortSpec::Distance { .. }) {
		item.distance = hit.pointer("/sort/0").and_then(Value::as_f64);
	}
	if query.flags.highlights_enabled
		&& let Some(highlight) = hit.get("highlight").and_then(Value::as_object)
	{
		for (field, fragments) in highlight {
			let fragments: Vec<&str> = fragments
				.as_array()
				.map(|values| values.iter().filter_map(Value::as_str).collect())
				.unwrap_or_default();

			if !fragments.is_empty() {
				item.highlights.insert(field.clone(), fragments.join(HIGHLIGHT_JOINER));
			}
		}
	}

	Ok(item)
}

fn invalid_item(err: serde_json::Error) -> Error {
	Error::InvalidFormat { message: format!("hit is not a valid item: {err}.") }
}

/// Per-aggregation results plus the universe scope's document count.
fn aggregations(raw: &Value, query: &Query) -> (BTreeMap<String, ResultAggregation>, Option<u64>) {
	let universe = raw
		.get("aggregations")
		.and_then(|aggs| aggs.get(GLOBAL_SCOPE))
		.and_then(|global| global.get(UNIVERSE_SCOPE));
	let universe_count = universe.and_then(|scope| scope.get("doc_count")).and_then(Value::as_u64);
	let mut results = BTreeMap::new();

	for aggregation in query.aggregations.values() {
		let scope = universe.and_then(|universe| universe.get(&aggregation.name));
		let doc_count =
			scope.and_then(|scope| scope.get("doc_count")).and_then(Value::as_u64).unwrap_or(0);
		let active_elements = query
			.filters
			.get(&aggregation.name)
			.map(|filter| filter.value_keys())
			.unwrap_or_default();
		let mut result = ResultAggregation::new(
			aggregation.name.clone(),
			aggregation.policy,
			doc_count,
			active_elements,
		);
		let buckets = scope
			.and_then(|scope| scope.get(&aggregation.name))
			.and_then(|node| node.get("buckets"))
			.map(buckets)
			.unwrap_or_default();

		for (key, n) in buckets {
			let counter = Counter::parse(&key, n, &result.active_elements);

			if aggregation.keeps_bucket(&counter.id) {
				result.add_counter(counter);
			}
		}

		result.prune_levels();
		results.insert(aggregation.name.clone(), result);
	}

	(results, universe_count)
}

/// `(key, doc_count)` pairs from a bucket array or a keyed bucket object.
fn buckets(node: &Value) -> Vec<(String, u64)> {
	let count = |bucket: &Value| bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);

	match node {
		Value::Array(buckets) => buckets
			.iter()
			.filter_map(|bucket| {
				let key = bucket.get("key_as_string").or_else(|| bucket.get("key"))?;

				Some((value_key(key), count(bucket)))
			})
			.collect(),
		Value::Object(buckets) =>
			buckets.iter().map(|(key, bucket)| (key.clone(), count(bucket))).collect(),
		_ => Vec::new(),
	}
}

fn suggestions(raw: &Value) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();
	let Some(suggest) = raw.get("suggest").and_then(Value::as_object) else {
		return out;
	};

	for entries in suggest.values().filter_map(Value::as_array) {
		for option in entries
			.iter()
			.filter_map(|entry| entry.get("options").and_then(Value::as_array))
			.flatten()
		{
			if let Some(text) = option.get("text").and_then(Value::as_str)
				&& !out.iter().any(|seen| seen == text)
			{
				out.push(text.to_string());
			}
		}
	}

	out
}
