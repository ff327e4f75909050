use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Coordinate, Error, Result};

pub const RANGE_SEPARATOR: &str = "..";

/// How a filter's values combine with the rest of the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Policy {
	/// Every value must match.
	#[default]
	MustAll,
	/// Any value may match.
	AtLeastOne,
	/// No value may match.
	Exclude,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterKind {
	#[default]
	Field,
	Range,
	DateRange,
	QueryText,
	Geo,
}
impl FilterKind {
	pub fn is_range(self) -> bool {
		matches!(self, Self::Range | Self::DateRange)
	}

	/// Converts one textual range bound into the JSON value the backend expects.
	pub fn bound_value(self, raw: &str) -> Result<Value> {
		match self {
			Self::Range => {
				if let Ok(int) = raw.parse::<i64>() {
					return Ok(Value::from(int));
				}

				raw.parse::<f64>()
					.ok()
					.filter(|value| value.is_finite())
					.map(Value::from)
					.ok_or_else(|| Error::invalid(format!("range bound '{raw}' is not numeric.")))
			},
			_ => Ok(Value::String(raw.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	pub field: String,
	#[serde(default)]
	pub values: Vec<Value>,
	#[serde(rename = "applicationPolicy", default)]
	pub policy: Policy,
	#[serde(default)]
	pub kind: FilterKind,
	/// Term kept while counting this filter's own facet, even when its values are ignored.
	#[serde(rename = "pinnedTermPair", default, skip_serializing_if = "Option::is_none")]
	pub pinned_term: Option<(String, String)>,
}
impl Filter {
	pub fn new(field: impl Into<String>, values: Vec<Value>, policy: Policy, kind: FilterKind) -> Self {
		Self { field: field.into(), values, policy, kind, pinned_term: None }
	}

	/// A term filter over string values.
	pub fn terms<I, S>(field: impl Into<String>, values: I, policy: Policy) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let values = values.into_iter().map(|value| Value::String(value.into())).collect();

		Self::new(field, values, policy, FilterKind::Field)
	}

	pub fn query_text(text: impl Into<String>) -> Self {
		Self::new("_query", vec![Value::String(text.into())], Policy::MustAll, FilterKind::QueryText)
	}

	pub fn with_pinned_term(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
		self.pinned_term = Some((field.into(), value.into()));

		self
	}

	/// Values rendered as facet ids, used to flag active counters.
	pub fn value_keys(&self) -> Vec<String> {
		self.values.iter().map(value_key).collect()
	}

	/// First value of a `QUERY_TEXT` filter, empty when absent.
	pub fn text(&self) -> &str {
		self.values.first().and_then(Value::as_str).unwrap_or_default()
	}
}

/// Textual key of a filter value: strings verbatim, other JSON values in compact form.
pub fn value_key(value: &Value) -> String {
	match value {
		Value::String(raw) => raw.clone(),
		other => other.to_string(),
	}
}

/// Parsed `<from>..<to>` range value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBounds {
	pub key: String,
	pub from: Option<String>,
	pub to: Option<String>,
}
impl RangeBounds {
	/// A lower bound of `""`, `"0"`, or `"*"` is open, as is an upper bound of `""`, `"-1"`,
	/// `"inf"`, or `"*"`.
	pub fn parse(raw: &str) -> Result<Self> {
		let (from, to) = raw.split_once(RANGE_SEPARATOR).ok_or_else(|| {
			Error::invalid(format!("range value '{raw}' is not in '<from>..<to>' form."))
		})?;
		let from = from.trim();
		let to = to.trim();
		let from = (!matches!(from, "" | "0" | "*")).then(|| from.to_string());
		let to = (!matches!(to, "" | "-1" | "inf" | "*")).then(|| to.to_string());

		Ok(Self { key: raw.to_string(), from, to })
	}

	pub fn parse_value(value: &Value) -> Result<Self> {
		match value {
			Value::String(raw) => Self::parse(raw),
			other => Err(Error::invalid(format!("range value {other} must be a string."))),
		}
	}
}

/// Geo filter payload, recognized by its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeoShape {
	Radius { coordinate: Coordinate, distance: String },
	Polygon { coordinates: Vec<Coordinate> },
	BoundingBox { top_left: Coordinate, bottom_right: Coordinate },
}
impl GeoShape {
	pub fn from_value(value: &Value) -> Result<Self> {
		let shape: Self = serde_json::from_value(value.clone()).map_err(|_| {
			Error::invalid(
				"geo filter value must be a radius, polygon, or bounding box payload.".to_string(),
			)
		})?;

		if let Self::Polygon { coordinates } = &shape
			&& coordinates.len() < 3
		{
			return Err(Error::invalid("geo polygon needs at least three coordinates."));
		}

		Ok(shape)
	}
}
