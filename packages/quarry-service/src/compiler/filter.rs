use serde_json::{Map, Value, json};

use quarry_config::Search;
use quarry_domain::{Filter, FilterKind, GeoShape, Policy, RangeBounds};

use crate::Result;

/// Clauses collected for one backend `bool` query.
#[derive(Debug, Default)]
pub(crate) struct BoolClauses {
	pub(crate) must: Vec<Value>,
	pub(crate) filter: Vec<Value>,
	pub(crate) should: Vec<Value>,
	pub(crate) must_not: Vec<Value>,
	pub(crate) minimum_should_match: Option<u32>,
}
impl BoolClauses {
	pub(crate) fn into_query(self) -> Value {
		if self.must.is_empty()
			&& self.filter.is_empty()
			&& self.should.is_empty()
			&& self.must_not.is_empty()
		{
			return json!({ "match_all": {} });
		}

		let mut bool_query = Map::new();

		for (occur, clauses) in [
			("must", self.must),
			("filter", self.filter),
			("should", self.should),
			("must_not", self.must_not),
		] {
			if !clauses.is_empty() {
				bool_query.insert(occur.to_string(), Value::Array(clauses));
			}
		}

		if let Some(minimum) = self.minimum_should_match {
			bool_query.insert("minimum_should_match".to_string(), Value::from(minimum));
		}

		json!({ "bool": bool_query })
	}
}

/// Adds `filter` to `clauses`.
///
/// `ignore_own_values` drops the filter's value clauses; `apply_pinned_term` adds its pinned term.
/// A filter without values contributes nothing but its pinned term.
pub(crate) fn apply_filter(
	clauses: &mut BoolClauses,
	filter: &Filter,
	ignore_own_values: bool,
	apply_pinned_term: bool,
	search: &Search,
) -> Result<()> {
	if apply_pinned_term && let Some((field, value)) = &filter.pinned_term {
		clauses.filter.push(json!({ "term": { field.as_str(): value } }));
	}

	if ignore_own_values {
		return Ok(());
	}

	// Blank free text matches everything, so it adds no clause.
	if filter.kind == FilterKind::QueryText {
		if filter.text().trim().is_empty() {
			return Ok(());
		}

		let text = query_text_clause(filter.text(), search);

		match filter.policy {
			Policy::Exclude => clauses.must_not.push(text),
			Policy::MustAll | Policy::AtLeastOne => clauses.must.push(text),
		}

		return Ok(());
	}
	if filter.values.is_empty() {
		return Ok(());
	}

	let value_clauses = filter
		.values
		.iter()
		.map(|value| value_clause(filter, value, search))
		.collect::<Result<Vec<_>>>()?;

	match filter.policy {
		Policy::MustAll => clauses.filter.extend(value_clauses),
		Policy::AtLeastOne => clauses.filter.push(json!({
			"bool": { "should": value_clauses, "minimum_should_match": 1 }
		})),
		Policy::Exclude => clauses.must_not.extend(value_clauses),
	}

	Ok(())
}

/// Scored free-text match over the searchable fields: best-fields or a boosted phrase.
pub(crate) fn query_text_clause(text: &str, search: &Search) -> Value {
	let text = text.trim();

	if text.is_empty() {
		return json!({ "match_all": {} });
	}

	let fields: Vec<String> = search
		.searchable_fields
		.iter()
		.map(|field| format!("{}^{}", field.field, field.boost))
		.collect();

	json!({
		"bool": {
			"should": [
				{ "multi_match": { "query": text, "fields": fields, "type": "best_fields" } },
				{ "multi_match": {
					"query": text,
					"fields": fields,
					"type": "phrase",
					"boost": search.phrase_boost,
				} },
			],
			"minimum_should_match": 1,
		}
	})
}

fn value_clause(filter: &Filter, value: &Value, search: &Search) -> Result<Value> {
	let field = filter.field.as_str();

	match filter.kind {
		FilterKind::Field => Ok(json!({ "term": { field: value } })),
		FilterKind::Range | FilterKind::DateRange => {
			let bounds = RangeBounds::parse_value(value)?;

			range_clause(field, filter.kind, &bounds)
		},
		FilterKind::Geo => Ok(geo_clause(field, &GeoShape::from_value(value)?)),
		FilterKind::QueryText =>
			Ok(query_text_clause(value.as_str().unwrap_or_default(), search)),
	}
}

pub(crate) fn range_body(kind: FilterKind, bounds: &RangeBounds) -> Result<Map<String, Value>> {
	let mut body = Map::new();

	if let Some(from) = &bounds.from {
		body.insert("gte".to_string(), kind.bound_value(from)?);
	}
	if let Some(to) = &bounds.to {
		body.insert("lt".to_string(), kind.bound_value(to)?);
	}

	Ok(body)
}

fn range_clause(field: &str, kind: FilterKind, bounds: &RangeBounds) -> Result<Value> {
	let body = range_body(kind, bounds)?;

	if body.is_empty() {
		return Ok(json!({ "exists": { "field": field } }));
	}

	Ok(json!({ "range": { field: body } }))
}

fn geo_clause(field: &str, shape: &GeoShape) -> Value {
	match shape {
		GeoShape::Radius { coordinate, distance } => json!({
			"geo_distance": {
				"distance": distance,
				field: { "lat": coordinate.lat, "lon": coordinate.lon },
			}
		}),
		GeoShape::Polygon { coordinates } => {
			let mut ring: Vec<Value> =
				coordinates.iter().map(|point| json!([point.lon, point.lat])).collect();

			if let (Some(first), Some(last)) = (coordinates.first(), coordinates.last())
				&& first != last
			{
				ring.push(json!([first.lon, first.lat]));
			}

			json!({
				"geo_shape": {
					field: {
						"shape": { "type": "polygon", "coordinates": [ring] },
						"relation": "within",
					}
				}
			})
		},
		GeoShape::BoundingBox { top_left, bottom_right } => json!({
			"geo_bounding_box": {
				field: {
					"top_left": { "lat": top_left.lat, "lon": top_left.lon },
					"bottom_right": { "lat": bottom_right.lat, "lon": bottom_right.lon },
				}
			}
		}),
	}
}
