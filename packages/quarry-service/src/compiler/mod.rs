//! Translates a [`Query`] into the backend's JSON query DSL.

mod aggregation;
mod filter;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use quarry_config::Search;
use quarry_domain::{Filter, Query, SortSpec, TenantReference};

use crate::Result;
use filter::BoolClauses;

/// Name of the global aggregation wrapping every facet.
pub const GLOBAL_SCOPE: &str = "_global";
/// Name of the universe-filtered aggregation under [`GLOBAL_SCOPE`].
pub const UNIVERSE_SCOPE: &str = "_universe";
/// Backend field the distance sort reads coordinates from.
pub const COORDINATE_FIELD: &str = "coordinate";

/// Backend request ready to send to `namespace`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
	pub namespace: String,
	pub body: Value,
	pub from: u32,
	pub size: u32,
}

pub struct Compiler<'a> {
	pub index_prefix: &'a str,
	pub search: &'a Search,
}
impl<'a> Compiler<'a> {
	pub fn new(index_prefix: &'a str, search: &'a Search) -> Self {
		Self { index_prefix, search }
	}

	pub fn compile(&self, query: &Query, tenant: &TenantReference) -> Result<CompiledSearch> {
		let from = query.from;
		let size = query.effective_size();
		let mut body = Map::new();

		body.insert("query".to_string(), self.root_query(query)?);
		body.insert("from".to_string(), Value::from(from));
		body.insert("size".to_string(), Value::from(size));
		body.insert("track_total_hits".to_string(), Value::Bool(true));

		if let Some(sort) = sort_clause(&query.sort) {
			body.insert("sort".to_string(), sort);
		}
		if query.flags.aggregations_enabled && !query.aggregations.is_empty() {
			body.insert("aggs".to_string(), self.aggregations(query)?);
		}
		if query.flags.highlights_enabled {
			body.insert("highlight".to_string(), self.highlight());
		}
		if query.flags.suggestions_enabled && !query.q.trim().is_empty() {
			body.insert("suggest".to_string(), self.suggest(query.q.trim()));
		}

		Ok(CompiledSearch {
			namespace: tenant.namespace(self.index_prefix),
			body: Value::Object(body),
			from,
			size,
		})
	}

	fn root_query(&self, query: &Query) -> Result<Value> {
		let mut clauses = BoolClauses::default();

		for filter in query.universe_filters.values() {
			filter::apply_filter(&mut clauses, filter, false, false, self.search)?;
		}

		filter::apply_filter(
			&mut clauses,
			&Filter::query_text(query.q.as_str()),
			false,
			false,
			self.search,
		)?;

		for filter in query.filters.values() {
			filter::apply_filter(&mut clauses, filter, false, false, self.search)?;
		}

		let total = query.promoted.len();

		for (position, uuid) in query.promoted.iter().enumerate() {
			clauses.should.push(json!({
				"term": { "_id": { "value": uuid.compose(), "boost": total - position } }
			}));
		}

		if total > 0 {
			clauses.minimum_should_match = Some(0);
		}

		let root = clauses.into_query();

		if query.sort == SortSpec::Random {
			return Ok(json!({
				"function_score": {
					"query": root,
					"random_score": { "seed": random_seed(), "field": "_seq_no" },
					"boost_mode": "replace",
				}
			}));
		}

		Ok(root)
	}

	/// `global` → universe filter → per-aggregation sibling filter → bucket definition.
	fn aggregations(&self, query: &Query) -> Result<Value> {
		let mut universe = BoolClauses::default();

		for filter in query.universe_filters.values() {
			filter::apply_filter(&mut universe, filter, false, false, self.search)?;
		}

		let mut facets = Map::new();

		for aggregation in query.aggregations.values() {
			let scope = aggregation::sibling_scope(aggregation, query, self.search)?;
			let buckets = aggregation::bucket_definition(aggregation, query, self.search)?;

			facets.insert(
				aggregation.name.clone(),
				json!({ "filter": scope, "aggs": { aggregation.name.as_str(): buckets } }),
			);
		}

		Ok(json!({
			GLOBAL_SCOPE: {
				"global": {},
				"aggs": {
					UNIVERSE_SCOPE: { "filter": universe.into_query(), "aggs": facets },
				},
			}
		}))
	}

	fn highlight(&self) -> Value {
		let highlight = &self.search.highlight;
		let fields: Map<String, Value> = self
			.search
			.searchable_fields
			.iter()
			.map(|field| {
				(
					field.field.clone(),
					json!({
						"fragment_size": highlight.fragment_size,
						"number_of_fragments": highlight.fragments,
					}),
				)
			})
			.collect();

		json!({
			"pre_tags": [highlight.pre_tag],
			"post_tags": [highlight.post_tag],
			"fields": fields,
		})
	}

	fn suggest(&self, prefix: &str) -> Value {
		json!({
			"completion": {
				"prefix": prefix,
				"completion": {
					"field": self.search.suggest.field,
					"size": self.search.suggest.size,
					"skip_duplicates": true,
				}
			}
		})
	}
}

fn sort_clause(sort: &SortSpec) -> Option<Value> {
	match sort {
		SortSpec::Score | SortSpec::Random => None,
		SortSpec::Field { field, order } =>
			Some(json!([{ field.as_str(): { "order": order.as_str() } }, "_score"])),
		SortSpec::Distance { coordinate, unit, order } => Some(json!([{
			"_geo_distance": {
				COORDINATE_FIELD: { "lat": coordinate.lat, "lon": coordinate.lon },
				"order": order.as_str(),
				"unit": unit,
			}
		}])),
	}
}

/// Fresh per request, so random order is never reproducible.
fn random_seed() -> u64 {
	Uuid::new_v4().as_u64_pair().0 >> 1
}
