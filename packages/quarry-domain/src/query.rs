use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Aggregation, Coordinate, Filter, ItemUuid};

pub const DEFAULT_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}
impl SortOrder {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SortSpec {
	/// Backend relevance order.
	#[default]
	Score,
	/// Shuffled order, seeded per request.
	Random,
	Field {
		field: String,
		#[serde(default)]
		order: SortOrder,
	},
	Distance {
		coordinate: Coordinate,
		#[serde(default = "default_distance_unit")]
		unit: String,
		#[serde(default)]
		order: SortOrder,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFlags {
	pub aggregations_enabled: bool,
	pub suggestions_enabled: bool,
	pub highlights_enabled: bool,
	pub results_enabled: bool,
}
impl Default for QueryFlags {
	fn default() -> Self {
		Self {
			aggregations_enabled: true,
			suggestions_enabled: false,
			highlights_enabled: false,
			results_enabled: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
	#[serde(default)]
	pub q: String,
	#[serde(default)]
	pub filters: BTreeMap<String, Filter>,
	#[serde(rename = "universeFilters", default)]
	pub universe_filters: BTreeMap<String, Filter>,
	#[serde(default)]
	pub aggregations: BTreeMap<String, Aggregation>,
	#[serde(default)]
	pub promoted: Vec<ItemUuid>,
	#[serde(default)]
	pub sort: SortSpec,
	#[serde(default)]
	pub from: u32,
	#[serde(default = "default_size")]
	pub size: u32,
	#[serde(default)]
	pub flags: QueryFlags,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<User>,
}
impl Query {
	pub fn new(q: impl Into<String>) -> Self {
		Self {
			q: q.into(),
			filters: BTreeMap::new(),
			universe_filters: BTreeMap::new(),
			aggregations: BTreeMap::new(),
			promoted: Vec::new(),
			sort: SortSpec::Score,
			from: 0,
			size: DEFAULT_SIZE,
			flags: QueryFlags::default(),
			user: None,
		}
	}

	pub fn match_all() -> Self {
		Self::new("")
	}

	pub fn filter_by(mut self, name: impl Into<String>, filter: Filter) -> Self {
		self.filters.insert(name.into(), filter);

		self
	}

	pub fn filter_universe_by(mut self, name: impl Into<String>, filter: Filter) -> Self {
		self.universe_filters.insert(name.into(), filter);

		self
	}

	/// Adds an aggregation keyed by its name.
	pub fn aggregate_by(mut self, aggregation: Aggregation) -> Self {
		self.aggregations.insert(aggregation.name.clone(), aggregation);

		self
	}

	pub fn paginate(mut self, from: u32, size: u32) -> Self {
		self.from = from;
		self.size = size;

		self
	}

	pub fn sorted_by(mut self, sort: SortSpec) -> Self {
		self.sort = sort;

		self
	}

	pub fn by_user(mut self, id: impl Into<String>) -> Self {
		self.user = Some(User { id: id.into() });

		self
	}

	/// Appends `uuid` to the promoted list unless it is already promoted.
	pub fn promote_uuid(&mut self, uuid: ItemUuid) {
		if !self.promoted.contains(&uuid) {
			self.promoted.push(uuid);
		}
	}

	/// Copy of this query with `uuids` promoted after any already promoted ids.
	pub fn with_promoted<'a, I>(&self, uuids: I) -> Self
	where
		I: IntoIterator<Item = &'a ItemUuid>,
	{
		let mut query = self.clone();

		for uuid in uuids {
			query.promote_uuid(uuid.clone());
		}

		query
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user.as_ref().map(|user| user.id.as_str()).filter(|id| !id.trim().is_empty())
	}

	/// Number of hits actually requested from the backend.
	pub fn effective_size(&self) -> u32 {
		if self.flags.results_enabled { self.size } else { 0 }
	}
}

fn default_size() -> u32 {
	DEFAULT_SIZE
}

fn default_distance_unit() -> String {
	"km".to_string()
}
