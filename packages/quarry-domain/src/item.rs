use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

pub const ITEM_ID_SEPARATOR: char = '~';

/// Composite item identity. The backend document id is `<id>~<type>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemUuid {
	pub id: String,
	#[serde(rename = "type")]
	pub item_type: String,
}
impl ItemUuid {
	pub fn new(id: impl Into<String>, item_type: impl Into<String>) -> Self {
		Self { id: id.into(), item_type: item_type.into() }
	}

	pub fn compose(&self) -> String {
		format!("{}{ITEM_ID_SEPARATOR}{}", self.id, self.item_type)
	}

	/// Inverse of [`ItemUuid::compose`]. The type is everything after the last separator.
	pub fn parse(composed: &str) -> Result<Self> {
		let (id, item_type) = composed.rsplit_once(ITEM_ID_SEPARATOR).ok_or_else(|| {
			Error::invalid(format!("item uuid '{composed}' is not in '<id>~<type>' form."))
		})?;

		if id.is_empty() || item_type.is_empty() {
			return Err(Error::invalid(format!(
				"item uuid '{composed}' must have a non-empty id and type."
			)));
		}

		Ok(Self::new(id, item_type))
	}
}
impl fmt::Display for ItemUuid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.compose())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
	pub lat: f64,
	pub lon: f64,
}

/// A document as stored in the backend and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
	pub uuid: ItemUuid,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default)]
	pub indexed_metadata: Map<String, Value>,
	#[serde(default)]
	pub searchable_metadata: Map<String, Value>,
	#[serde(default)]
	pub exact_matching_metadata: Vec<String>,
	#[serde(default)]
	pub suggest: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub coordinate: Option<Coordinate>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub distance: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub highlights: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub promoted: bool,
}
impl Item {
	pub fn new(uuid: ItemUuid) -> Self {
		Self {
			uuid,
			metadata: Map::new(),
			indexed_metadata: Map::new(),
			searchable_metadata: Map::new(),
			exact_matching_metadata: Vec::new(),
			suggest: Vec::new(),
			coordinate: None,
			distance: None,
			score: None,
			highlights: BTreeMap::new(),
			promoted: false,
		}
	}

	/// Backend source document. Response-only fields (distance, score, highlights, promoted)
	/// are never stored.
	pub fn to_document(&self) -> Value {
		let mut doc = serde_json::json!({
			"uuid": self.uuid,
			"metadata": self.metadata,
			"indexed_metadata": self.indexed_metadata,
			"searchable_metadata": self.searchable_metadata,
			"exact_matching_metadata": self.exact_matching_metadata,
			"suggest": self.suggest,
		});

		if let (Some(coordinate), Some(obj)) = (self.coordinate, doc.as_object_mut()) {
			obj.insert("coordinate".to_string(), serde_json::json!(coordinate));
		}

		doc
	}
}
