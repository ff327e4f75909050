use serde_json::{Map, Value, json};

use quarry_config::Search;
use quarry_domain::{Aggregation, Filter, FilterKind, Policy, Query, RangeBounds};

use crate::{
	Error, Result,
	compiler::filter::{self, BoolClauses},
};

/// Filter applied around one aggregation: the free text plus every query filter, with the
/// aggregation's own values dropped when it is an `AT_LEAST_ONE` facet.
pub(crate) fn sibling_scope(
	aggregation: &Aggregation,
	query: &Query,
	search: &Search,
) -> Result<Value> {
	let mut clauses = BoolClauses::default();

	filter::apply_filter(&mut clauses, &Filter::query_text(query.q.as_str()), false, true, search)?;

	for (name, filter) in &query.filters {
		let ignore_own_values =
			aggregation.policy == Policy::AtLeastOne && name == &aggregation.name;

		filter::apply_filter(&mut clauses, filter, ignore_own_values, true, search)?;
	}

	Ok(clauses.into_query())
}

pub(crate) fn bucket_definition(
	aggregation: &Aggregation,
	query: &Query,
	search: &Search,
) -> Result<Value> {
	match aggregation.kind {
		FilterKind::Field => {
			let size = if aggregation.limit == 0 { search.bucket_limit } else { aggregation.limit };

			Ok(json!({
				"terms": {
					"field": aggregation.field,
					"size": size,
					"order": aggregation.order()?,
				}
			}))
		},
		FilterKind::Range => Ok(json!({ "range": range_buckets(aggregation, query)? })),
		FilterKind::DateRange => Ok(json!({ "date_range": range_buckets(aggregation, query)? })),
		FilterKind::QueryText | FilterKind::Geo => Err(Error::InvalidFormat {
			message: format!(
				"aggregation '{}' has kind {:?}, which cannot be bucketed.",
				aggregation.name, aggregation.kind
			),
		}),
	}
}

/// Range buckets keyed by their raw `<from>..<to>` text, taken from the subgroup or, failing
/// that, from the same-named filter's values.
fn range_buckets(aggregation: &Aggregation, query: &Query) -> Result<Value> {
	let keys: Vec<String> = if !aggregation.subgroup.is_empty() {
		aggregation.subgroup.clone()
	} else {
		query.filters.get(&aggregation.name).map(Filter::value_keys).unwrap_or_default()
	};

	if keys.is_empty() {
		return Err(Error::InvalidFormat {
			message: format!(
				"range aggregation '{}' needs a subgroup or a filter with the same name.",
				aggregation.name
			),
		});
	}

	let mut ranges = Vec::with_capacity(keys.len());

	for key in keys {
		let bounds = RangeBounds::parse(&key)?;
		let mut range = Map::new();

		range.insert("key".to_string(), Value::String(bounds.key.clone()));

		for (name, value) in filter::range_body(aggregation.kind, &bounds)? {
			let name = if name == "gte" { "from" } else { "to" };

			range.insert(name.to_string(), value);
		}

		ranges.push(Value::Object(range));
	}

	Ok(json!({ "field": aggregation.field, "keyed": false, "ranges": ranges }))
}
